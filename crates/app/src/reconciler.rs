//! Config reconciler — the only way a configuration becomes the baseline.
//!
//! Every snapshot, pushed or polled, goes through [`Reconciler::apply`]. A
//! snapshot is committed only when its version differs from the committed
//! one and its fetch was not overtaken by a newer committed fetch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use signage_domain::error::SignageError;
use signage_domain::id::VersionToken;
use signage_domain::push::ConfigSnapshot;
use signage_domain::schedule::Schedule;
use signage_domain::settings::{SanitizeReport, Settings};

/// Sequence number taken when a fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// Shared ticket dispenser; clones hand out from the same sequence.
#[derive(Debug, Clone, Default)]
pub struct FetchTickets(Arc<AtomicU64>);

impl FetchTickets {
    /// Take the next ticket.
    #[must_use]
    pub fn next(&self) -> FetchTicket {
        FetchTicket(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// The committed configuration, sanitized and with rows sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub schedule: Schedule,
    pub settings: Settings,
    pub version: VersionToken,
}

/// Result of [`Reconciler::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// A new baseline was committed.
    Committed(Arc<Baseline>),
    /// Same version as the committed one.
    Unchanged,
    /// The fetch started before the one that produced the baseline.
    Stale,
}

/// Holds the committed baseline.
#[derive(Debug, Default)]
pub struct Reconciler {
    tickets: FetchTickets,
    committed: Option<Arc<Baseline>>,
    committed_ticket: Option<FetchTicket>,
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket dispenser for fetch tasks.
    #[must_use]
    pub fn tickets(&self) -> FetchTickets {
        self.tickets.clone()
    }

    #[must_use]
    pub fn committed(&self) -> Option<&Arc<Baseline>> {
        self.committed.as_ref()
    }

    /// Forget the baseline, e.g. when the terminal changes mode.
    pub fn clear(&mut self) {
        self.committed = None;
        self.committed_ticket = None;
    }

    /// Validate, sanitize and commit a snapshot.
    ///
    /// Tokens and tickets are compared here, at commit time, so a slow
    /// fetch resolving after a newer one is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SignageError::InvalidPayload`] when the schedule or any
    /// event plan's schedule is malformed; the committed baseline is left
    /// untouched.
    #[tracing::instrument(skip_all, fields(version = %snapshot.version, ?ticket))]
    pub fn apply(
        &mut self,
        snapshot: ConfigSnapshot,
        ticket: FetchTicket,
    ) -> Result<ApplyOutcome, SignageError> {
        if self.committed_ticket.is_some_and(|committed| ticket < committed) {
            tracing::debug!("fetch overtaken by a newer commit");
            return Ok(ApplyOutcome::Stale);
        }
        if self
            .committed
            .as_ref()
            .is_some_and(|baseline| baseline.version == snapshot.version)
        {
            tracing::debug!("version already committed");
            return Ok(ApplyOutcome::Unchanged);
        }

        let ConfigSnapshot {
            mut schedule,
            mut settings,
            version,
        } = snapshot;
        schedule.validate()?;
        for plan in &settings.automation.event_plans {
            if let Err(err) = plan.schedule.validate() {
                tracing::warn!(event_plan = %plan.id, error = %err, "malformed event plan");
                return Err(err.into());
            }
        }

        let report = settings.sanitize(&mut schedule);
        log_report(report);
        schedule.sort_rows();
        for plan in &mut settings.automation.event_plans {
            plan.schedule.sort_rows();
        }
        settings.zone_status = settings.zone_statuses(&schedule);

        let baseline = Arc::new(Baseline {
            schedule,
            settings,
            version,
        });
        tracing::info!(
            zones = baseline.schedule.zones.len(),
            rows = baseline.schedule.rows.len(),
            "configuration committed"
        );
        self.committed = Some(Arc::clone(&baseline));
        self.committed_ticket = Some(ticket);
        Ok(ApplyOutcome::Committed(baseline))
    }
}

fn log_report(report: SanitizeReport) {
    if !report.is_clean() {
        tracing::warn!(
            dropped_tracks = report.dropped_tracks,
            dropped_badges = report.dropped_badges,
            dropped_badge_refs = report.dropped_badge_refs,
            "sanitized settings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_domain::automation::EventPlan;
    use signage_domain::schedule::{Cell, ScheduleRow};
    use signage_domain::settings::{AudioTrack, ZoneStatus};

    fn snapshot(version: &str) -> ConfigSnapshot {
        let row = |time: &str, title: &str| ScheduleRow {
            time: time.parse().unwrap(),
            day_offset: 0,
            entries: vec![
                Some(Cell {
                    title: title.to_string(),
                    ..Cell::default()
                }),
                None,
            ],
        };
        ConfigSnapshot {
            schedule: Schedule {
                zones: vec!["A".to_string(), "B".to_string()],
                rows: vec![row("18:00", "Late"), row("10:00", "Early")],
            },
            settings: Settings::default(),
            version: VersionToken::new(version),
        }
    }

    fn committed(outcome: ApplyOutcome) -> Arc<Baseline> {
        match outcome {
            ApplyOutcome::Committed(baseline) => baseline,
            other => panic!("expected a commit, got {other:?}"),
        }
    }

    #[test]
    fn should_commit_sorted_schedule_with_derived_statuses() {
        let mut reconciler = Reconciler::new();
        let ticket = reconciler.tickets().next();
        let baseline = committed(reconciler.apply(snapshot("v1"), ticket).unwrap());

        assert_eq!(baseline.schedule.rows[0].time.to_string(), "10:00");
        assert_eq!(baseline.settings.zone_status["A"], ZoneStatus::Active);
        assert_eq!(baseline.settings.zone_status["B"], ZoneStatus::NoInfusions);
    }

    #[test]
    fn should_not_recommit_identical_version() {
        let mut reconciler = Reconciler::new();
        let tickets = reconciler.tickets();
        reconciler.apply(snapshot("v1"), tickets.next()).unwrap();

        let again = reconciler.apply(snapshot("v1"), tickets.next()).unwrap();
        assert_eq!(again, ApplyOutcome::Unchanged);
    }

    #[test]
    fn should_drop_result_of_overtaken_fetch() {
        let mut reconciler = Reconciler::new();
        let tickets = reconciler.tickets();
        let slow = tickets.next();
        let fast = tickets.next();

        reconciler.apply(snapshot("v2"), fast).unwrap();
        let late = reconciler.apply(snapshot("v1"), slow).unwrap();

        assert_eq!(late, ApplyOutcome::Stale);
        assert_eq!(
            reconciler.committed().unwrap().version,
            VersionToken::new("v2")
        );
    }

    #[test]
    fn should_keep_last_good_baseline_on_invalid_payload() {
        let mut reconciler = Reconciler::new();
        let tickets = reconciler.tickets();
        reconciler.apply(snapshot("v1"), tickets.next()).unwrap();

        let mut broken = snapshot("v2");
        broken.schedule.rows[0].entries.pop();
        let err = reconciler.apply(broken, tickets.next()).unwrap_err();

        assert!(matches!(err, SignageError::InvalidPayload(_)));
        assert_eq!(
            reconciler.committed().unwrap().version,
            VersionToken::new("v1")
        );
    }

    #[test]
    fn should_reject_snapshot_with_malformed_event_plan() {
        let mut reconciler = Reconciler::new();
        let tickets = reconciler.tickets();
        reconciler.apply(snapshot("v1"), tickets.next()).unwrap();

        let mut snap = snapshot("v2");
        snap.settings.automation.event_plans.push(EventPlan {
            id: "gala".to_string(),
            name: "Gala".to_string(),
            schedule: Schedule {
                zones: vec!["X".to_string(), "Y".to_string()],
                rows: vec![ScheduleRow {
                    time: "20:00".parse().unwrap(),
                    day_offset: 0,
                    entries: vec![],
                }],
            },
        });
        let err = reconciler.apply(snap, tickets.next()).unwrap_err();

        assert!(matches!(err, SignageError::InvalidPayload(_)));
        assert_eq!(
            reconciler.committed().unwrap().version,
            VersionToken::new("v1")
        );
    }

    #[test]
    fn should_sort_event_plan_rows_on_commit() {
        let mut reconciler = Reconciler::new();
        let mut snap = snapshot("v1");
        let plan_schedule = snap.schedule.clone();
        snap.settings.automation.event_plans.push(EventPlan {
            id: "gala".to_string(),
            name: "Gala".to_string(),
            schedule: plan_schedule,
        });

        let ticket = reconciler.tickets().next();
        let baseline = committed(reconciler.apply(snap, ticket).unwrap());

        let plan = baseline.settings.automation.plan("gala").unwrap();
        assert_eq!(plan.schedule.rows[0].time.to_string(), "10:00");
        assert_eq!(plan.schedule.rows[1].time.to_string(), "18:00");
    }

    #[test]
    fn should_sanitize_audio_registry_on_commit() {
        let mut reconciler = Reconciler::new();
        let mut snap = snapshot("v1");
        snap.settings.audio.tracks = vec![AudioTrack {
            id: String::new(),
            title: "nameless".to_string(),
            url: "https://cdn.example/a.mp3".to_string(),
            volume: None,
        }];
        snap.settings.audio.active_track = Some("ghost".to_string());

        let ticket = reconciler.tickets().next();
        let baseline = committed(reconciler.apply(snap, ticket).unwrap());
        assert!(baseline.settings.audio.tracks.is_empty());
        assert!(baseline.settings.audio.active_track.is_none());
    }

    #[test]
    fn should_accept_any_version_after_clear() {
        let mut reconciler = Reconciler::new();
        let tickets = reconciler.tickets();
        reconciler.apply(snapshot("v1"), tickets.next()).unwrap();
        reconciler.clear();

        let outcome = reconciler.apply(snapshot("v1"), tickets.next()).unwrap();
        assert!(matches!(outcome, ApplyOutcome::Committed(_)));
    }
}
