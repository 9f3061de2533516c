use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::DISCORD_API_BASE;
use crate::http::{ApiRequest, HttpTransport};
use crate::retry::{Attempt, RetryPolicy, classify_response};

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    #[serde(default)]
    name: Option<String>,
}

/// Renames one Discord channel to mirror live/offline status.
pub struct ChannelRenamer<'a> {
    http: &'a dyn HttpTransport,
    token: &'a str,
    channel_id: &'a str,
    policy: RetryPolicy,
    timeout: Duration,
}

/// What [`ChannelRenamer::rename`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameResult {
    AlreadyNamed,
    Renamed,
}

impl<'a> ChannelRenamer<'a> {
    pub fn new(
        http: &'a dyn HttpTransport,
        token: &'a str,
        channel_id: &'a str,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            token,
            channel_id,
            policy,
            timeout,
        }
    }

    fn url(&self) -> String {
        format!("{DISCORD_API_BASE}/channels/{}", self.channel_id)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Current channel name.
    pub async fn current_name(&self) -> Result<Option<String>> {
        let resp = self
            .policy
            .run("discord get channel", |_| {
                let request = ApiRequest::get(self.url(), self.timeout).with_authorization(self.auth());
                async move { classify_response(self.http.execute(request).await) }
            })
            .await?;
        let channel: DiscordChannel = resp.json().context("unexpected channel payload")?;
        Ok(channel.name)
    }

    /// Set the channel name to `desired`, skipping the PATCH if it already matches.
    pub async fn rename(&self, desired: &str) -> Result<RenameResult> {
        let current = self.current_name().await?;
        if current.as_deref() == Some(desired) {
            debug!("Channel {} already named {desired:?}", self.channel_id);
            return Ok(RenameResult::AlreadyNamed);
        }

        self.policy
            .run("discord rename channel", |_| {
                let request = ApiRequest::patch(self.url(), json!({ "name": desired }), self.timeout)
                    .with_authorization(self.auth());
                async move {
                    match classify_response(self.http.execute(request).await) {
                        Attempt::Done(_) => Attempt::Done(()),
                        Attempt::RateLimited(hint) => Attempt::RateLimited(hint),
                        Attempt::Failed(e) => Attempt::Failed(e),
                    }
                }
            })
            .await?;
        info!(
            "Renamed channel {} from {:?} to {desired:?}",
            self.channel_id,
            current.unwrap_or_default()
        );
        Ok(RenameResult::Renamed)
    }
}
