// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sweep implementation and the periodic driver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_config::model::{InstanceConfig, ReaperConfig};
use switchboard_core::{
    BotSession, BotStatus, CancelReason, ChatGateway, Session, SessionStatus, SwitchboardError,
    best_effort, is_group_address,
};
use switchboard_presence::{PresenceRegistry, QueueChange};
use switchboard_queue::{Notices, SessionRegistry, announce};

/// Counts from one reaper pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sweep 1: `bot` sessions cancelled for having no live upstream session.
    pub no_session_cancelled: usize,
    /// Sweep 2: idle upstream bot sessions closed.
    pub idle_closed: usize,
    /// Sweep 2: local sessions cancelled alongside an idle upstream session.
    pub idle_cancelled: usize,
    /// Sweep 3: `waiting` sessions cancelled on timeout.
    pub waiting_cancelled: usize,
    /// Per-session or per-instance failures that were logged and skipped.
    pub errors: usize,
}

impl SweepReport {
    pub fn cancelled(&self) -> usize {
        self.no_session_cancelled + self.idle_cancelled + self.waiting_cancelled
    }
}

fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// An upstream session still counts as live until it is closed.
fn is_live(snapshot: &BotSession) -> bool {
    snapshot.status != BotStatus::Closed
}

/// Upstream sessions eligible for the idle sweep.
fn idle_upstream(snapshots: &[BotSession], cutoff: DateTime<Utc>) -> Vec<&BotSession> {
    snapshots
        .iter()
        .filter(|s| s.status == BotStatus::Opened)
        .filter(|s| s.updated_at < cutoff)
        .filter(|s| !is_group_address(&s.remote_jid))
        .collect()
}

pub struct Reaper {
    sessions: Arc<SessionRegistry>,
    gateway: Arc<dyn ChatGateway>,
    presence: Arc<PresenceRegistry>,
    notices: Notices,
    config: ReaperConfig,
    instances: Vec<InstanceConfig>,
}

impl Reaper {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        gateway: Arc<dyn ChatGateway>,
        presence: Arc<PresenceRegistry>,
        notices: Notices,
        config: ReaperConfig,
        instances: Vec<InstanceConfig>,
    ) -> Self {
        Self {
            sessions,
            gateway,
            presence,
            notices,
            config,
            instances,
        }
    }

    /// Runs all three sweeps once against the current time.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Runs all three sweeps once, treating `now` as the current time.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let upstream = self.fetch_upstream(&mut report).await;

        self.sweep_no_session(now, &upstream, &mut report).await;
        self.sweep_idle_upstream(now, &upstream, &mut report).await;
        self.sweep_waiting(now, &mut report).await;

        if report.cancelled() > 0 || report.errors > 0 {
            info!(
                no_session = report.no_session_cancelled,
                idle_closed = report.idle_closed,
                idle_cancelled = report.idle_cancelled,
                waiting = report.waiting_cancelled,
                errors = report.errors,
                "reaper sweep finished"
            );
        } else {
            debug!("reaper sweep found nothing to do");
        }
        report
    }

    /// Upstream bot sessions per configured instance. Instances whose
    /// listing failed are absent from the map.
    async fn fetch_upstream(&self, report: &mut SweepReport) -> HashMap<String, Vec<BotSession>> {
        let mut upstream = HashMap::new();
        for instance in &self.instances {
            match self
                .gateway
                .list_bot_sessions(&instance.name, &instance.bot_id)
                .await
            {
                Ok(list) => {
                    upstream.insert(instance.name.clone(), list);
                }
                Err(e) => {
                    warn!(instance = %instance.name, error = %e, "failed to list upstream bot sessions");
                    report.errors += 1;
                }
            }
        }
        upstream
    }

    fn is_configured(&self, instance: &str) -> bool {
        self.instances.iter().any(|i| i.name == instance)
    }

    /// Cancels a session and announces it. A rejection means the session
    /// moved on concurrently and is not an error.
    async fn cancel(
        &self,
        session: &Session,
        reason: CancelReason,
    ) -> Result<Option<Session>, SwitchboardError> {
        match self.sessions.cancel(&session.id, reason).await {
            Ok(cancelled) => {
                announce(&self.presence, QueueChange::Cancelled, &cancelled);
                Ok(Some(cancelled))
            }
            Err(e) if e.rejection().is_some() => {
                debug!(session_id = %session.id, error = %e, "session no longer cancellable, skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn close_upstream(&self, instance: &str, address: &str) {
        best_effort(
            "close_bot_session",
            self.gateway
                .change_bot_status(instance, address, BotStatus::Closed),
        )
        .await;
    }

    async fn notify(&self, instance: &str, address: &str, label: &str, text: String) {
        best_effort(label, self.gateway.send_text(instance, address, &text)).await;
    }

    async fn sweep_no_session(
        &self,
        now: DateTime<Utc>,
        upstream: &HashMap<String, Vec<BotSession>>,
        report: &mut SweepReport,
    ) {
        let stale = match self
            .sessions
            .stale(SessionStatus::Bot, cutoff(now, self.config.bot_no_session_cutoff()))
            .await
        {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "failed to list stale bot sessions");
                report.errors += 1;
                return;
            }
        };

        for session in stale {
            let snapshots = match upstream.get(&session.instance) {
                Some(list) => list.as_slice(),
                // Listing failed for this instance; liveness is unknown.
                None if self.is_configured(&session.instance) => continue,
                None => &[],
            };
            let matching: Vec<&BotSession> = snapshots
                .iter()
                .filter(|s| s.remote_jid == session.address)
                .collect();
            if matching.iter().any(|s| is_live(s)) {
                continue;
            }
            let has_stray = !matching.is_empty();

            match self.cancel(&session, CancelReason::InactivityNoSession).await {
                Ok(Some(_)) => {
                    info!(session_id = %session.id, address = %session.address, "bot session without upstream cancelled");
                    report.no_session_cancelled += 1;
                    if has_stray {
                        self.close_upstream(&session.instance, &session.address).await;
                    }
                    self.notify(
                        &session.instance,
                        &session.address,
                        "send_inactivity_notice",
                        self.notices.inactivity(),
                    )
                    .await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "failed to cancel bot session");
                    report.errors += 1;
                }
            }
        }
    }

    async fn sweep_idle_upstream(
        &self,
        now: DateTime<Utc>,
        upstream: &HashMap<String, Vec<BotSession>>,
        report: &mut SweepReport,
    ) {
        let idle_cutoff = cutoff(now, self.config.bot_idle_cutoff());
        for (instance, snapshots) in upstream {
            for snapshot in idle_upstream(snapshots, idle_cutoff) {
                let address = snapshot.remote_jid.as_str();
                let local = match self.sessions.find_open(address).await {
                    Ok(local) => local,
                    Err(e) => {
                        warn!(instance = %instance, address, error = %e, "failed to look up session");
                        report.errors += 1;
                        continue;
                    }
                };
                // An operator owns the conversation now; leave it alone.
                if local
                    .as_ref()
                    .is_some_and(|s| s.status != SessionStatus::Bot)
                {
                    continue;
                }

                self.close_upstream(instance, address).await;
                report.idle_closed += 1;
                self.notify(instance, address, "send_inactivity_notice", self.notices.inactivity())
                    .await;

                if let Some(session) = local {
                    match self.cancel(&session, CancelReason::Inactivity).await {
                        Ok(Some(_)) => {
                            info!(session_id = %session.id, address, "idle bot session cancelled");
                            report.idle_cancelled += 1;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(session_id = %session.id, error = %e, "failed to cancel idle session");
                            report.errors += 1;
                        }
                    }
                }
            }
        }
    }

    async fn sweep_waiting(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let stale = match self
            .sessions
            .stale(SessionStatus::Waiting, cutoff(now, self.config.waiting_timeout()))
            .await
        {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "failed to list stale waiting sessions");
                report.errors += 1;
                return;
            }
        };

        for session in stale {
            match self.cancel(&session, CancelReason::WaitingTimeout).await {
                Ok(Some(_)) => {
                    info!(session_id = %session.id, address = %session.address, "waiting session timed out");
                    report.waiting_cancelled += 1;
                    self.close_upstream(&session.instance, &session.address).await;
                    self.notify(
                        &session.instance,
                        &session.address,
                        "send_waiting_timeout_notice",
                        self.notices.waiting_timeout(),
                    )
                    .await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "failed to cancel waiting session");
                    report.errors += 1;
                }
            }
        }
    }

    /// Sweeps on the configured interval until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("reaper disabled");
            return;
        }
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick.
        interval.tick().await;
        info!(interval_secs = self.config.interval_secs, "reaper started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }
                _ = cancel.cancelled() => {
                    info!("reaper shutting down");
                    break;
                }
            }
        }
    }
}
