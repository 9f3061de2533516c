pub mod api;
pub mod config;
pub mod engine;
pub mod http;
pub mod notifier;
pub mod publish;
pub mod renamer;
pub mod reporter;
pub mod retry;
pub mod runner;
pub mod state;
pub mod types;

/// Kick public API base URL (no auth required)
pub const KICK_API_BASE: &str = "https://kick.com/api/v1";

/// Kick web base URL, used for viewer-facing channel links
pub const KICK_WEB_BASE: &str = "https://kick.com";

/// Discord REST API base URL (v10)
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// User-Agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("kick-live-notify/", env!("CARGO_PKG_VERSION"));
