//! Probe: fetch a Kick channel and show what the notifier would see.
//!
//! Prints the live flag, session id, the resolved start time (and which
//! field it came from), title, and thumbnail. Useful when Kick changes
//! field names.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use kick_live_notify::api::fetch_channel_status;
use kick_live_notify::engine::{START_TIME_FIELDS, extract_start_time};
use kick_live_notify::http::ReqwestTransport;

#[derive(Parser)]
#[command(name = "probe_channel", about = "Inspect a Kick channel status payload")]
struct Args {
    /// Kick channel slug
    user: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let http = ReqwestTransport::new()?;
    let status =
        fetch_channel_status(&http, &args.user, Duration::from_secs(args.timeout_secs)).await?;

    println!("=== Probe: {} ===", args.user);
    println!("  username:   {}", status.username().unwrap_or("-"));

    let Some(live) = &status.livestream else {
        println!("  live:       no");
        return Ok(());
    };

    println!("  live:       yes");
    println!("  session id: {}", live.session_id().unwrap_or_else(|| "-".into()));
    println!("  title:      {}", live.title());
    println!(
        "  thumbnail:  {}",
        live.thumbnail_url().unwrap_or_else(|| "-".into())
    );
    match extract_start_time(live) {
        Some((field, ts)) => {
            let ago = chrono::Utc::now() - ts;
            println!("  started:    {ts} (from \"{field}\", {}m ago)", ago.num_minutes());
        }
        None => {
            println!("  started:    unknown (checked {})", START_TIME_FIELDS.join(", "));
        }
    }
    for field in START_TIME_FIELDS {
        if let Some(raw) = live.fields.get(*field) {
            println!("    {field:<18} {raw}");
        }
    }

    Ok(())
}
