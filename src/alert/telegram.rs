//! Telegram Bot API notification backend.

use super::{format_downtime, Notifier, NotifyError};
use crate::db::TargetStats;

use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use std::time::Duration;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Sends alerts to a single Telegram chat.
pub struct TelegramNotifier {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        Self::with_api_base(TELEGRAM_API, bot_token, chat_id)
    }

    pub fn with_api_base(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            client,
        })
    }

    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn is_enabled(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    async fn send_down(&self, target_name: &str, url: &str, message: &str) -> Result<(), NotifyError> {
        self.send_message(&down_text(target_name, url, message, &now()))
            .await
    }

    async fn send_up(&self, target_name: &str, url: &str, downtime: Duration) -> Result<(), NotifyError> {
        self.send_message(&up_text(target_name, url, downtime, &now()))
            .await
    }

    async fn send_summary(&self, stats: &[TargetStats]) -> Result<(), NotifyError> {
        self.send_message(&summary_text(stats, &now())).await
    }
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn down_text(target_name: &str, url: &str, message: &str, time: &str) -> String {
    format!(
        "🚨 *Website Down Alert*\n\n*Website:* {}\n*URL:* {}\n*Status:* DOWN\n*Message:* {}\n*Time:* {}",
        escape_markdown(target_name),
        escape_markdown(url),
        escape_markdown(message),
        escape_markdown(time),
    )
}

fn up_text(target_name: &str, url: &str, downtime: Duration, time: &str) -> String {
    format!(
        "✅ *Website Restored*\n\n*Website:* {}\n*URL:* {}\n*Status:* UP\n*Downtime:* {}\n*Time:* {}",
        escape_markdown(target_name),
        escape_markdown(url),
        escape_markdown(&format_downtime(downtime)),
        escape_markdown(time),
    )
}

fn summary_text(stats: &[TargetStats], time: &str) -> String {
    let mut text = String::from("📊 *Summary Report*\n\n");

    for stat in stats {
        let marker = if stat.last_status.as_deref() == Some("DOWN") {
            "🔴"
        } else {
            "🟢"
        };
        text.push_str(&format!("{} *{}*\n", marker, escape_markdown(&stat.target_name)));
        text.push_str(&escape_markdown(&format!(
            "   Uptime: {:.2}%\n   Avg Response: {}ms\n   Total Checks: {}\n\n",
            stat.uptime_percent, stat.avg_response_time_ms, stat.total_checks
        )));
    }

    text.push_str(&format!("*Report time:* {}", escape_markdown(time)));
    text
}

/// Escape text for Telegram's MarkdownV2 parse mode.
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
        '\\',
    ];

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    type Inbox = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn spawn_api(status: StatusCode) -> (String, Inbox) {
        let inbox: Inbox = Arc::default();
        let app = Router::new()
            .route(
                "/bottest-token/sendMessage",
                post(
                    move |State(inbox): State<Inbox>, Json(body): Json<serde_json::Value>| async move {
                        inbox.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(inbox.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), inbox)
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown("https://x.io/a-b"), "https://x\\.io/a\\-b");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn test_down_text() {
        let text = down_text("My.Site", "https://my.site", "status 500 (expected 200)", "2024-01-01 00:00:00");
        assert!(text.contains("*Website:* My\\.Site"));
        assert!(text.contains("status 500 \\(expected 200\\)"));
        assert!(text.contains("DOWN"));
    }

    #[test]
    fn test_up_text_includes_downtime() {
        let text = up_text("api", "https://api.example", Duration::from_secs(125), "now");
        assert!(text.contains("*Downtime:* 2m 5s"));
    }

    #[test]
    fn test_summary_text() {
        let stats = vec![TargetStats {
            target_name: "api".to_string(),
            url: "https://api.example".to_string(),
            total_checks: 4,
            successful_checks: 3,
            uptime_percent: 75.0,
            avg_response_time_ms: 120,
            last_check: None,
            last_status: Some("DOWN".to_string()),
        }];

        let text = summary_text(&stats, "now");
        assert!(text.contains("🔴 *api*"));
        assert!(text.contains("Uptime: 75\\.00%"));
        assert!(text.contains("Total Checks: 4"));
    }

    #[test]
    fn test_enabled_requires_token_and_chat() {
        assert!(TelegramNotifier::new("token", "chat").unwrap().is_enabled());
        assert!(!TelegramNotifier::new("", "chat").unwrap().is_enabled());
        assert!(!TelegramNotifier::new("token", "").unwrap().is_enabled());
    }

    #[tokio::test]
    async fn test_send_down_posts_message() {
        let (base, inbox) = spawn_api(StatusCode::OK).await;
        let notifier = TelegramNotifier::with_api_base(&base, "test-token", "42").unwrap();

        notifier
            .send_down("api", "https://api.example", "request failed")
            .await
            .unwrap();

        let sent = inbox.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], "42");
        assert_eq!(sent[0]["parse_mode"], "MarkdownV2");
        assert!(sent[0]["text"].as_str().unwrap().contains("request failed"));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let (base, _inbox) = spawn_api(StatusCode::BAD_REQUEST).await;
        let notifier = TelegramNotifier::with_api_base(&base, "test-token", "42").unwrap();

        let err = notifier.send_summary(&[]).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(400)));
    }
}
