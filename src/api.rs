use std::time::Duration;

use anyhow::{Result, bail};
use tracing::debug;

use crate::KICK_API_BASE;
use crate::http::{ApiRequest, HttpTransport};
use crate::types::ChannelStatus;

/// Channel status URL for a Kick slug.
pub fn channel_url(user: &str) -> String {
    format!("{KICK_API_BASE}/channels/{user}")
}

/// Fetch the current channel status for `user`.
///
/// Transport errors, non-2xx statuses and unparseable bodies are all errors;
/// callers treat them as "nothing to do this cycle".
pub async fn fetch_channel_status(
    http: &dyn HttpTransport,
    user: &str,
    timeout: Duration,
) -> Result<ChannelStatus> {
    let resp = http.execute(ApiRequest::get(channel_url(user), timeout)).await?;
    if !resp.is_success() {
        bail!("Kick API returned status {}", resp.status);
    }
    let status: ChannelStatus = resp.json()?;
    debug!("Fetched channel status for {user} (live: {})", status.is_live());
    Ok(status)
}
