use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Kick channel status as returned by `GET /api/v1/channels/{user}`.
///
/// Only the fields the notifier needs are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelStatus {
    /// Present iff the channel is broadcasting.
    #[serde(default, deserialize_with = "live_record")]
    pub livestream: Option<Livestream>,
    #[serde(default)]
    pub user: Option<ChannelUser>,
}

impl ChannelStatus {
    pub fn is_live(&self) -> bool {
        self.livestream.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.username.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelUser {
    #[serde(default)]
    pub username: Option<String>,
}

/// The `livestream` record. Field spellings drift between API revisions, so
/// the raw object is kept and looked up by alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Livestream {
    pub fields: Map<String, Value>,
}

/// Title field aliases, in priority order.
pub const TITLE_FIELDS: &[&str] = &["session_title", "title", "name"];

/// Title used when the stream carries none.
pub const DEFAULT_TITLE: &str = "Live now";

impl Livestream {
    /// Non-empty string value of `key`. Numbers are rendered as strings.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Opaque stream-session identifier.
    pub fn session_id(&self) -> Option<String> {
        self.text("id")
    }

    pub fn title(&self) -> String {
        TITLE_FIELDS
            .iter()
            .find_map(|k| self.text(k))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    /// Thumbnail URL: either `thumbnailUrl`, `thumbnail_url`, or Kick's nested `thumbnail.url`.
    pub fn thumbnail_url(&self) -> Option<String> {
        self.text("thumbnailUrl")
            .or_else(|| self.text("thumbnail_url"))
            .or_else(|| {
                self.fields
                    .get("thumbnail")
                    .and_then(|t| t.get("url"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
    }
}

/// `null`, a missing key, `false`, or `{}` all mean "not live".
fn live_record<'de, D>(deserializer: D) -> Result<Option<Livestream>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(fields)) if !fields.is_empty() => Some(Livestream { fields }),
        _ => None,
    })
}

/// Outcome of the liveness/window evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDecision {
    NotLive,
    /// Live, and either inside the window or no usable start time.
    Notify { started_at: Option<DateTime<Utc>> },
    /// Live, but the stream started too long ago.
    OutsideWindow {
        started_at: DateTime<Utc>,
        elapsed_secs: i64,
    },
}

impl NotifyDecision {
    pub fn should_notify(&self) -> bool {
        matches!(self, NotifyDecision::Notify { .. })
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Kick could not be polled; nothing to do this cycle.
    PollFailed,
    NotLive,
    AlreadyNotified,
    OutsideWindow,
    Notified,
    DeliveryFailed,
    DryRun,
}

impl RunOutcome {
    /// Only a failed delivery is a failed run.
    pub fn is_failure(self) -> bool {
        self == RunOutcome::DeliveryFailed
    }
}

/// One JSON line summarising a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub user: String,
    pub live: bool,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// `None` when no rename was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_renamed: Option<bool>,
    /// `None` when the marker was not touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_persisted: Option<bool>,
}
