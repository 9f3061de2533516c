use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default settings file path. A missing file is not an error.
pub const CONFIG_PATH: &str = "kick-notify.toml";

/// Default marker file path, relative to the working directory.
pub const MARKER_PATH: &str = "last_notified.txt";

pub const DEFAULT_WINDOW_MINUTES: i64 = 10;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LIVE_CHANNEL_NAME: &str = "🔴-live";
pub const DEFAULT_OFFLINE_CHANNEL_NAME: &str = "⚫-offline";
/// Kick brand green.
pub const DEFAULT_EMBED_COLOR: u32 = 0x53fc18;

/// Command-line flags, each backed by an environment variable.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "kick-notify", about = "Notify a Discord channel when a Kick streamer goes live")]
pub struct Args {
    /// Kick channel slug to watch
    #[arg(long, env = "STREAM_USER")]
    pub user: Option<String>,

    /// Discord webhook URL, or a bot token
    #[arg(long, env = "NOTIFY_CREDENTIAL", hide_env_values = true)]
    pub credential: Option<String>,

    /// Channel to post into (required with a bot token)
    #[arg(long, env = "CHAT_CHANNEL_ID")]
    pub channel_id: Option<String>,

    /// Only notify if the stream started at most this many minutes ago
    #[arg(long, env = "NOTIFY_WINDOW_MINUTES")]
    pub window_minutes: Option<i64>,

    /// Channel to rename to reflect live/offline status
    #[arg(long, env = "RENAME_CHANNEL_ID")]
    pub rename_channel_id: Option<String>,

    /// Token used to push the marker file; enables dedup
    #[arg(long, env = "REPO_PUSH_CREDENTIAL", hide_env_values = true)]
    pub push_credential: Option<String>,

    /// `owner/repo` to push the marker to
    #[arg(long, env = "REPO_SLUG")]
    pub repo_slug: Option<String>,

    /// Set by GitHub Actions; used when `REPO_SLUG` is not
    #[arg(long, env = "GITHUB_REPOSITORY", hide = true)]
    pub github_repository: Option<String>,

    /// Marker file path
    #[arg(long, env = "MARKER_PATH")]
    pub marker_path: Option<PathBuf>,

    /// Settings file
    #[arg(long, env = "NOTIFY_CONFIG", default_value = CONFIG_PATH)]
    pub config: PathBuf,

    /// Evaluate only; send nothing and write nothing
    #[arg(long)]
    pub dry_run: bool,
}

/// Optional settings file deserialized from `kick-notify.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub settings: FileSettings,
}

/// Non-secret settings. Every field is optional; flags and env win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSettings {
    pub window_minutes: Option<i64>,
    pub marker_path: Option<PathBuf>,
    pub message_style: Option<MessageStyle>,
    pub live_channel_name: Option<String>,
    pub offline_channel_name: Option<String>,
    pub poll_timeout_secs: Option<u64>,
    pub chat_timeout_secs: Option<u64>,
    pub embed_color: Option<u32>,
    pub git_branch: Option<String>,
}

impl FileConfig {
    /// Load settings from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Like [`FileConfig::load`], but a missing file yields defaults.
    pub fn load_optional(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStyle {
    Text,
    #[default]
    Embed,
}

/// Where notifications go. Chosen by the shape of `NOTIFY_CREDENTIAL`.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Webhook { url: String },
    Bot { token: String, channel_id: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Webhook { .. } => f.write_str("Webhook { .. }"),
            Credential::Bot { channel_id, .. } => {
                write!(f, "Bot {{ channel_id: {channel_id:?}, .. }}")
            }
        }
    }
}

impl Credential {
    /// A credential that is itself a URL is a webhook; anything else is a bot token.
    pub fn classify(raw: &str, channel_id: Option<&str>) -> Result<Self> {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            url::Url::parse(raw).context("NOTIFY_CREDENTIAL looks like a URL but is not valid")?;
            return Ok(Credential::Webhook {
                url: raw.to_string(),
            });
        }
        let channel_id = channel_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context("CHAT_CHANNEL_ID is required when NOTIFY_CREDENTIAL is a bot token")?;
        Ok(Credential::Bot {
            token: raw.to_string(),
            channel_id: channel_id.to_string(),
        })
    }

    pub fn bot_token(&self) -> Option<&str> {
        match self {
            Credential::Bot { token, .. } => Some(token),
            Credential::Webhook { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameConfig {
    pub channel_id: String,
    pub live_name: String,
    pub offline_name: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    pub token: String,
    /// `owner/repo`.
    pub repo_slug: String,
    pub branch: Option<String>,
}

impl std::fmt::Debug for PersistenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceConfig")
            .field("repo_slug", &self.repo_slug)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

/// Validated, immutable run configuration. Built once in `main`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub user: String,
    pub credential: Credential,
    pub window_minutes: i64,
    pub window: chrono::TimeDelta,
    pub rename: Option<RenameConfig>,
    pub persistence: Option<PersistenceConfig>,
    pub marker_path: PathBuf,
    pub message_style: MessageStyle,
    pub embed_color: u32,
    pub poll_timeout: Duration,
    pub chat_timeout: Duration,
    pub dry_run: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `owner/repo`, with surrounding slashes stripped.
fn validate_slug(raw: &str) -> Result<String> {
    let slug = raw.trim_matches('/');
    match slug.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok(slug.to_string())
        }
        _ => anyhow::bail!("REPO_SLUG must look like owner/repo (got {raw:?})"),
    }
}

impl AppConfig {
    /// Merge flags/env over the settings file over defaults, and validate.
    pub fn resolve(args: Args, file: FileConfig) -> Result<Self> {
        let settings = file.settings;

        let user = non_empty(args.user).context("STREAM_USER is not set")?;
        let raw_credential = non_empty(args.credential).context("NOTIFY_CREDENTIAL is not set")?;
        let credential = Credential::classify(&raw_credential, args.channel_id.as_deref())?;

        let window_minutes = args
            .window_minutes
            .or(settings.window_minutes)
            .unwrap_or(DEFAULT_WINDOW_MINUTES);
        if window_minutes <= 0 {
            anyhow::bail!("NOTIFY_WINDOW_MINUTES must be positive (got {window_minutes})");
        }
        let window = chrono::TimeDelta::try_minutes(window_minutes)
            .with_context(|| format!("NOTIFY_WINDOW_MINUTES is too large (got {window_minutes})"))?;

        let rename = match non_empty(args.rename_channel_id) {
            Some(channel_id) if credential.bot_token().is_some() => Some(RenameConfig {
                channel_id,
                live_name: settings
                    .live_channel_name
                    .unwrap_or_else(|| DEFAULT_LIVE_CHANNEL_NAME.to_string()),
                offline_name: settings
                    .offline_channel_name
                    .unwrap_or_else(|| DEFAULT_OFFLINE_CHANNEL_NAME.to_string()),
            }),
            Some(_) => {
                warn!("RENAME_CHANNEL_ID is set but renaming needs a bot token; renamer disabled");
                None
            }
            None => None,
        };

        let persistence = match non_empty(args.push_credential) {
            Some(token) => {
                let repo_slug = non_empty(args.repo_slug)
                    .or_else(|| non_empty(args.github_repository))
                    .context(
                        "REPO_SLUG (or GITHUB_REPOSITORY) is required when REPO_PUSH_CREDENTIAL is set",
                    )?;
                Some(PersistenceConfig {
                    token,
                    repo_slug: validate_slug(&repo_slug)?,
                    branch: non_empty(settings.git_branch),
                })
            }
            None => None,
        };

        Ok(Self {
            user,
            credential,
            window_minutes,
            window,
            rename,
            persistence,
            marker_path: args
                .marker_path
                .or(settings.marker_path)
                .unwrap_or_else(|| PathBuf::from(MARKER_PATH)),
            message_style: settings.message_style.unwrap_or_default(),
            embed_color: settings.embed_color.unwrap_or(DEFAULT_EMBED_COLOR),
            poll_timeout: Duration::from_secs(
                settings.poll_timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            ),
            chat_timeout: Duration::from_secs(
                settings.chat_timeout_secs.unwrap_or(DEFAULT_CHAT_TIMEOUT_SECS),
            ),
            dry_run: args.dry_run,
        })
    }

    /// Parse flags/env, read the settings file, and validate.
    pub fn from_args(args: Args) -> Result<Self> {
        let file = FileConfig::load_optional(&args.config)?;
        Self::resolve(args, file)
    }

    pub fn window(&self) -> chrono::TimeDelta {
        self.window
    }

    /// Dedup is active only when the marker can be persisted between runs.
    pub fn dedup_enabled(&self) -> bool {
        self.persistence.is_some()
    }
}
