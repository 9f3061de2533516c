//! Discord delivery of "went live" announcements.
//!
//! Two strategies, chosen by the configured credential:
//! - webhook URL: plain POST, no auth header
//! - bot token: POST to the channel messages endpoint with `Authorization: Bot <token>`
//!
//! Both go through the shared [`RetryPolicy`], which honors `retry_after` on 429.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{Credential, MessageStyle};
use crate::http::{ApiRequest, HttpTransport};
use crate::retry::{Attempt, RetryPolicy, classify_response};
use crate::types::ChannelStatus;
use crate::{DISCORD_API_BASE, KICK_WEB_BASE};

const EMBED_FOOTER: &str = "Kick";

/// Everything a message says about the stream. Built once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub display_name: String,
    pub title: String,
    pub link: String,
    pub thumbnail_url: Option<String>,
    /// Stream start if known, otherwise the time of the poll.
    pub timestamp: DateTime<Utc>,
}

impl Announcement {
    /// `None` when the channel is not live.
    pub fn from_status(
        status: &ChannelStatus,
        user: &str,
        started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let live = status.livestream.as_ref()?;
        Some(Self {
            display_name: status.username().unwrap_or(user).to_string(),
            title: live.title(),
            link: format!("{KICK_WEB_BASE}/{user}"),
            thumbnail_url: live.thumbnail_url(),
            timestamp: started_at.unwrap_or(now),
        })
    }

    pub fn text(&self) -> String {
        format!(
            "🔴 **{} is LIVE** — **{}**\n{}",
            self.display_name, self.title, self.link
        )
    }

    pub fn embed(&self, color: u32) -> Value {
        let mut embed = json!({
            "title": format!("{} is LIVE", self.display_name),
            "url": self.link,
            "description": self.title,
            "color": color,
            "timestamp": self.timestamp.to_rfc3339(),
            "footer": { "text": EMBED_FOOTER },
        });
        if let Some(thumb) = &self.thumbnail_url {
            embed["thumbnail"] = json!({ "url": thumb });
        }
        embed
    }

    /// Message payload. Mentions are always suppressed.
    pub fn payload(&self, style: MessageStyle, color: u32) -> Value {
        let mut payload = match style {
            MessageStyle::Text => json!({ "content": self.text() }),
            MessageStyle::Embed => json!({ "embeds": [self.embed(color)] }),
        };
        payload["allowed_mentions"] = json!({ "parse": [] });
        payload
    }
}

/// Posts payloads to Discord with bounded retry.
pub struct Notifier<'a> {
    http: &'a dyn HttpTransport,
    credential: &'a Credential,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<'a> Notifier<'a> {
    pub fn new(
        http: &'a dyn HttpTransport,
        credential: &'a Credential,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            credential,
            policy,
            timeout,
        }
    }

    fn strategy(&self) -> &'static str {
        match self.credential {
            Credential::Webhook { .. } => "webhook",
            Credential::Bot { .. } => "bot",
        }
    }

    fn request(&self, payload: &Value) -> ApiRequest {
        match self.credential {
            Credential::Webhook { url } => {
                ApiRequest::post(url.clone(), payload.clone(), self.timeout)
            }
            Credential::Bot { token, channel_id } => ApiRequest::post(
                format!("{DISCORD_API_BASE}/channels/{channel_id}/messages"),
                payload.clone(),
                self.timeout,
            )
            .with_authorization(format!("Bot {token}")),
        }
    }

    /// Deliver `payload`. `Err` only after every attempt failed.
    pub async fn send(&self, payload: &Value) -> Result<()> {
        let label = format!("discord {}", self.strategy());
        self.policy
            .run(&label, |attempt| {
                let request = self.request(payload);
                async move {
                    debug!("Posting notification (attempt {attempt})");
                    match classify_response(self.http.execute(request).await) {
                        Attempt::Done(_) => Attempt::Done(()),
                        Attempt::RateLimited(hint) => Attempt::RateLimited(hint),
                        Attempt::Failed(e) => Attempt::Failed(e),
                    }
                }
            })
            .await?;
        info!("Notification sent via {}", self.strategy());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::http::Method;
    use crate::http::testing::{Scripted, ScriptedTransport, reply, reply_with_header};

    const T: Duration = Duration::from_secs(10);

    fn status(json: &str) -> ChannelStatus {
        serde_json::from_str(json).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap()
    }

    fn webhook() -> Credential {
        Credential::Webhook {
            url: "https://discord.com/api/webhooks/1/abc".into(),
        }
    }

    fn bot() -> Credential {
        Credential::Bot {
            token: "tkn".into(),
            channel_id: "555".into(),
        }
    }

    #[test]
    fn announcement_fields() {
        let s = status(
            r#"{"livestream":{"id":"42","title":"Ranked","thumbnail":{"url":"https://img"}},"user":{"username":"Streamer"}}"#,
        );
        let a = Announcement::from_status(&s, "streamer", None, now()).unwrap();
        assert_eq!(a.display_name, "Streamer");
        assert_eq!(a.title, "Ranked");
        assert_eq!(a.link, "https://kick.com/streamer");
        assert_eq!(a.thumbnail_url.as_deref(), Some("https://img"));
        assert_eq!(a.timestamp, now());
    }

    #[test]
    fn announcement_none_when_offline() {
        let s = status(r#"{"livestream":null}"#);
        assert!(Announcement::from_status(&s, "x", None, now()).is_none());
    }

    #[test]
    fn display_name_falls_back_to_configured_user() {
        let s = status(r#"{"livestream":{"id":1}}"#);
        let a = Announcement::from_status(&s, "slug", None, now()).unwrap();
        assert_eq!(a.display_name, "slug");
        assert_eq!(a.title, "Live now");
    }

    #[test]
    fn text_payload() {
        let s = status(r#"{"livestream":{"title":"Ranked"},"user":{"username":"Streamer"}}"#);
        let payload = Announcement::from_status(&s, "streamer", None, now())
            .unwrap()
            .payload(MessageStyle::Text, 0);
        assert_eq!(
            payload["content"],
            "🔴 **Streamer is LIVE** — **Ranked**\nhttps://kick.com/streamer"
        );
        assert_eq!(payload["allowed_mentions"]["parse"], json!([]));
        assert!(payload.get("embeds").is_none());
    }

    #[test]
    fn embed_payload() {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let s = status(r#"{"livestream":{"title":"Ranked"},"user":{"username":"Streamer"}}"#);
        let payload = Announcement::from_status(&s, "streamer", Some(started), now())
            .unwrap()
            .payload(MessageStyle::Embed, 0x53fc18);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Streamer is LIVE");
        assert_eq!(embed["description"], "Ranked");
        assert_eq!(embed["url"], "https://kick.com/streamer");
        assert_eq!(embed["timestamp"], "2024-01-01T00:00:00+00:00");
        assert_eq!(embed["footer"]["text"], "Kick");
        assert_eq!(embed["color"], 0x53fc18);
        assert!(embed.get("thumbnail").is_none());
        assert_eq!(payload["allowed_mentions"]["parse"], json!([]));
    }

    #[tokio::test]
    async fn webhook_posts_without_auth() {
        let http = ScriptedTransport::new(vec![reply(204, "")]);
        let cred = webhook();
        let notifier = Notifier::new(&http, &cred, RetryPolicy::default(), T);
        notifier.send(&json!({"content": "hi"})).await.unwrap();

        let reqs = http.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, Method::Post);
        assert_eq!(reqs[0].url, "https://discord.com/api/webhooks/1/abc");
        assert!(reqs[0].authorization.is_none());
        assert_eq!(reqs[0].body, Some(json!({"content": "hi"})));
    }

    #[tokio::test]
    async fn bot_posts_with_auth_header() {
        let http = ScriptedTransport::new(vec![reply(200, r#"{"id":"1"}"#)]);
        let cred = bot();
        let notifier = Notifier::new(&http, &cred, RetryPolicy::default(), T);
        notifier.send(&json!({"content": "hi"})).await.unwrap();

        let reqs = http.requests();
        assert_eq!(
            reqs[0].url,
            "https://discord.com/api/v10/channels/555/messages"
        );
        assert_eq!(reqs[0].authorization.as_deref(), Some("Bot tkn"));
        assert_eq!(reqs[0].timeout, T);
    }

    #[tokio::test(start_paused = true)]
    async fn two_429s_then_success() {
        let http = ScriptedTransport::new(vec![
            reply(429, r#"{"retry_after": 1.0}"#),
            reply_with_header(429, "", "2"),
            reply(204, ""),
        ]);
        let cred = bot();
        let notifier = Notifier::new(&http, &cred, RetryPolicy::default(), T);
        let start = tokio::time::Instant::now();
        notifier.send(&json!({"content": "hi"})).await.unwrap();

        assert_eq!(http.count(Method::Post), 3);
        // (1.0 + 0.25) + (2.0 + 0.25)
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3600), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_failures() {
        let http = ScriptedTransport::new(vec![
            Scripted::Error("connection reset"),
            reply(500, "oops"),
            reply(400, "bad"),
            reply(204, ""),
        ]);
        let cred = webhook();
        let notifier = Notifier::new(&http, &cred, RetryPolicy::default(), T);
        let err = notifier.send(&json!({"content": "hi"})).await.unwrap_err();

        assert_eq!(http.count(Method::Post), 3);
        assert!(format!("{err:#}").contains("HTTP 400"));
    }
}
