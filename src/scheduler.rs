//! # Daily Scheduler
//! Fires the aggregation engine once a day at a fixed wall-clock time.
//!
//! States: `Idle → Waiting → Running → Waiting … → Stopped`.
//!
//! The absolute next-fire instant is kept and the wait is done in short naps
//! that re-read the clock, so sleeping past a fire (suspended laptop, stalled
//! host) is noticed on the next nap. A late fire runs exactly once; the next
//! fire is then computed from the completion time.
//!
//! [`Scheduler::tick`] is one poll and is what tests drive with [`ManualClock`].
//! [`Scheduler::run`] loops `tick` until the shutdown channel flips.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, Utc};
use tokio::sync::watch;

use crate::engine::AggregationEngine;
use crate::error::ConfigError;
use crate::notify::{all_feeds_failed_notice, deliver_run, DeliverySink};
use crate::status::StatusHandle;

/// Longest single sleep in [`Scheduler::run`].
pub const MAX_NAP: StdDuration = StdDuration::from_secs(60);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the host's local offset.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: DateTime<FixedOffset>) {
        *self.now.lock().expect("clock mutex poisoned") = t;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

/// Time of day to fire, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    /// Parse `HH:MM` (24-hour).
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let s = raw.trim();
        let bad = || ConfigError::InvalidScheduleTime(raw.to_string());
        let (h, m) = s.split_once(':').ok_or_else(bad)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(bad());
        }
        let h: u32 = h.parse().map_err(|_| bad())?;
        let m: u32 = m.parse().map_err(|_| bad())?;
        let at = NaiveTime::from_hms_opt(h, m, 0).ok_or_else(bad)?;
        Ok(Self { at })
    }

    pub fn time(&self) -> NaiveTime {
        self.at
    }

    /// First occurrence strictly after `now`, in `now`'s offset.
    pub fn next_after(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let local = now.naive_local();
        let today = local.date().and_time(self.at);
        let naive = if today > local {
            today
        } else {
            today + Duration::days(1)
        };
        // a fixed offset maps every naive time to exactly one instant
        DateTime::from_naive_utc_and_offset(naive - *now.offset(), *now.offset())
    }
}

impl std::fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.at.format("%H:%M"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Waiting { next_fire: DateTime<FixedOffset> },
    Running { scheduled_for: DateTime<FixedOffset> },
    Stopped,
}

impl SchedulerState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting { .. } => "waiting",
            Self::Running { .. } => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// What one fired run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub scheduled_for: DateTime<FixedOffset>,
    pub started_at: DateTime<FixedOffset>,
    pub articles: usize,
    pub feed_errors: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Fired {
        report: RunReport,
        next_fire: DateTime<FixedOffset>,
    },
    Waiting {
        next_fire: DateTime<FixedOffset>,
        remaining: Duration,
    },
    Stopped,
}

pub struct Scheduler {
    engine: Arc<AggregationEngine>,
    sink: Arc<dyn DeliverySink>,
    schedule: DailySchedule,
    clock: Arc<dyn Clock>,
    status: StatusHandle,
    snapshot_path: Option<PathBuf>,
    max_nap: StdDuration,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(
        engine: Arc<AggregationEngine>,
        sink: Arc<dyn DeliverySink>,
        schedule: DailySchedule,
        clock: Arc<dyn Clock>,
        status: StatusHandle,
    ) -> Self {
        status.set_state(SchedulerState::Idle);
        Self {
            engine,
            sink,
            schedule,
            clock,
            status,
            snapshot_path: None,
            max_nap: MAX_NAP,
            state: SchedulerState::Idle,
        }
    }

    /// Write the dedup snapshot here after every run.
    pub fn with_snapshot_path(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot_path = path;
        self
    }

    pub fn with_max_nap(mut self, nap: StdDuration) -> Self {
        self.max_nap = nap.max(StdDuration::from_millis(1));
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    fn set_state(&mut self, state: SchedulerState) {
        tracing::debug!(from = self.state.label(), to = state.label(), "scheduler state");
        self.state = state;
        self.status.set_state(state);
    }

    /// One poll: fire if due, otherwise report how long until the next fire.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        let next_fire = match self.state {
            SchedulerState::Stopped => return TickOutcome::Stopped,
            SchedulerState::Waiting { next_fire } => next_fire,
            SchedulerState::Idle | SchedulerState::Running { .. } => {
                let next_fire = self.schedule.next_after(now);
                self.set_state(SchedulerState::Waiting { next_fire });
                tracing::info!(next_fire = %next_fire, "next news run scheduled");
                next_fire
            }
        };

        if now < next_fire {
            return TickOutcome::Waiting {
                next_fire,
                remaining: next_fire - now,
            };
        }

        if now - next_fire > Duration::minutes(1) {
            tracing::warn!(scheduled_for = %next_fire, now = %now, "late fire, running once");
        }

        self.set_state(SchedulerState::Running {
            scheduled_for: next_fire,
        });
        let report = self.fire(next_fire, now).await;

        let done = self.clock.now();
        let next_fire = self.schedule.next_after(done);
        self.set_state(SchedulerState::Waiting { next_fire });
        tracing::info!(next_fire = %next_fire, "next news run scheduled");

        TickOutcome::Fired { report, next_fire }
    }

    async fn fire(
        &self,
        scheduled_for: DateTime<FixedOffset>,
        started_at: DateTime<FixedOffset>,
    ) -> RunReport {
        tracing::info!(scheduled_for = %scheduled_for, "news run starting");
        let result = self.engine.run_once(started_at.with_timezone(&Utc)).await;

        let delivery = deliver_run(self.sink.as_ref(), &result, self.engine.keywords()).await;

        let feeds = self.engine.feeds().len();
        if feeds > 0 && result.errors.len() == feeds {
            tracing::warn!(feeds, "every feed failed this run");
            if let Err(e) = self.sink.announce(&all_feeds_failed_notice(&result)).await {
                tracing::warn!(error = %e, "error notice not delivered");
            }
        }

        if let Some(path) = &self.snapshot_path {
            if let Err(e) = self.engine.cache().save(path).await {
                tracing::warn!(path = %path.display(), "saving dedup snapshot: {e:#}");
            }
        }

        self.status
            .record_run(started_at, result.articles.len(), result.errors.len());

        RunReport {
            scheduled_for,
            started_at,
            articles: result.articles.len(),
            feed_errors: result.errors.len(),
            delivered: delivery.delivered,
            delivery_failures: delivery.failures.len(),
        }
    }

    /// Loop until `shutdown` carries `true` or its sender is dropped.
    ///
    /// A signal during a wait cancels it at once; a run in progress finishes first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(at = %self.schedule, "scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let remaining = match self.tick().await {
                TickOutcome::Stopped => break,
                TickOutcome::Fired { .. } => continue,
                TickOutcome::Waiting { remaining, .. } => remaining,
            };
            let nap = remaining.to_std().unwrap_or_default().min(self.max_nap);
            tokio::select! {
                _ = tokio::time::sleep(nap) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.set_state(SchedulerState::Stopped);
        tracing::info!("scheduler stopped");
    }
}
