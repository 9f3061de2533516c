use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::api::fetch_channel_status;
use crate::config::AppConfig;
use crate::engine;
use crate::http::HttpTransport;
use crate::notifier::{Announcement, Notifier};
use crate::publish::MarkerPublisher;
use crate::renamer::ChannelRenamer;
use crate::retry::RetryPolicy;
use crate::state::MarkerStore;
use crate::types::{ChannelStatus, NotifyDecision, RunOutcome, RunReport};

/// One poll → decide → deliver → rename pass.
pub struct Runner<'a> {
    config: &'a AppConfig,
    http: &'a dyn HttpTransport,
    publisher: Option<&'a dyn MarkerPublisher>,
    store: MarkerStore,
    policy: RetryPolicy,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a AppConfig,
        http: &'a dyn HttpTransport,
        publisher: Option<&'a dyn MarkerPublisher>,
    ) -> Self {
        Self {
            config,
            http,
            publisher,
            store: MarkerStore::new(&config.marker_path),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute one run. Never fails; the outcome is in the report.
    pub async fn run_once(&self, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport {
            timestamp: now.to_rfc3339(),
            user: self.config.user.clone(),
            live: false,
            outcome: RunOutcome::PollFailed,
            session_id: None,
            started_at: None,
            channel_renamed: None,
            marker_persisted: None,
        };

        let status = match fetch_channel_status(
            self.http,
            &self.config.user,
            self.config.poll_timeout,
        )
        .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!("Kick API error, nothing to do this cycle: {e:#}");
                return report;
            }
        };

        report.live = status.is_live();
        report.session_id = status.livestream.as_ref().and_then(|l| l.session_id());
        report.outcome = self.notify_stage(&status, now, &mut report).await;
        report.channel_renamed = self.rename_stage(report.live).await;
        report
    }

    async fn notify_stage(
        &self,
        status: &ChannelStatus,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) -> RunOutcome {
        if !status.is_live() {
            info!("{} is not live", self.config.user);
            return RunOutcome::NotLive;
        }

        if self.config.dedup_enabled()
            && let Some(session_id) = &report.session_id
            && self.store.is_already_notified(session_id)
        {
            info!("Already notified for session {session_id}");
            return RunOutcome::AlreadyNotified;
        }

        let started_at = match engine::evaluate(status, self.config.window(), now) {
            NotifyDecision::NotLive => return RunOutcome::NotLive,
            NotifyDecision::OutsideWindow { started_at, .. } => {
                report.started_at = Some(started_at.to_rfc3339());
                return RunOutcome::OutsideWindow;
            }
            NotifyDecision::Notify { started_at } => started_at,
        };
        report.started_at = started_at.map(|t| t.to_rfc3339());

        let Some(announcement) =
            Announcement::from_status(status, &self.config.user, started_at, now)
        else {
            return RunOutcome::NotLive;
        };
        let payload = announcement.payload(self.config.message_style, self.config.embed_color);

        if self.config.dry_run {
            info!("[dry-run] would notify: {payload}");
            return RunOutcome::DryRun;
        }

        let notifier = Notifier::new(
            self.http,
            &self.config.credential,
            self.policy,
            self.config.chat_timeout,
        );
        if let Err(e) = notifier.send(&payload).await {
            error!("Failed to send notification: {e:#}");
            return RunOutcome::DeliveryFailed;
        }

        if let Some(session_id) = report.session_id.clone() {
            report.marker_persisted = Some(self.persist_marker(&session_id).await);
        }
        RunOutcome::Notified
    }

    /// Write the marker, then publish it if configured. Failures only warn.
    async fn persist_marker(&self, session_id: &str) -> bool {
        if let Err(e) = self.store.write(session_id) {
            warn!("Failed to write marker: {e:#}");
            return false;
        }
        let Some(publisher) = self.publisher else {
            return true;
        };
        match publisher.publish(self.store.path(), session_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist marker: {e:#}");
                false
            }
        }
    }

    /// Mirror raw live/offline status in the channel name. `None` if disabled.
    async fn rename_stage(&self, live: bool) -> Option<bool> {
        let rename = self.config.rename.as_ref()?;
        let token = self.config.credential.bot_token()?;
        let desired = if live {
            &rename.live_name
        } else {
            &rename.offline_name
        };

        if self.config.dry_run {
            info!("[dry-run] would rename channel {} to {desired:?}", rename.channel_id);
            return None;
        }

        let renamer = ChannelRenamer::new(
            self.http,
            token,
            &rename.channel_id,
            self.policy,
            self.config.chat_timeout,
        );
        match renamer.rename(desired).await {
            Ok(_) => Some(true),
            Err(e) => {
                warn!("Failed to rename channel {}: {e:#}", rename.channel_id);
                Some(false)
            }
        }
    }
}
