// src/status.rs
//! Read-only view of the scheduler for the status endpoint.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::dedup::DedupCache;
use crate::scheduler::SchedulerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastRun {
    at: DateTime<FixedOffset>,
    articles: usize,
    errors: usize,
}

#[derive(Debug)]
struct Inner {
    state: SchedulerState,
    last_run: Option<LastRun>,
}

/// Shared between the scheduler (writer) and the API (reader).
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<RwLock<Inner>>,
    cache: Arc<DedupCache>,
}

/// JSON body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub state: &'static str,
    pub last_run_at: Option<DateTime<FixedOffset>>,
    pub last_run_articles: Option<usize>,
    pub last_run_errors: Option<usize>,
    pub next_fire: Option<DateTime<FixedOffset>>,
    pub cache_size: usize,
}

impl StatusHandle {
    pub fn new(cache: Arc<DedupCache>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: SchedulerState::Idle,
                last_run: None,
            })),
            cache,
        }
    }

    pub fn set_state(&self, state: SchedulerState) {
        self.inner.write().expect("status rwlock poisoned").state = state;
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.read().expect("status rwlock poisoned").state
    }

    pub fn record_run(&self, at: DateTime<FixedOffset>, articles: usize, errors: usize) {
        self.inner.write().expect("status rwlock poisoned").last_run = Some(LastRun {
            at,
            articles,
            errors,
        });
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let guard = self.inner.read().expect("status rwlock poisoned");
        let next_fire = match guard.state {
            SchedulerState::Waiting { next_fire } => Some(next_fire),
            _ => None,
        };
        StatusSnapshot {
            state: guard.state.label(),
            last_run_at: guard.last_run.map(|r| r.at),
            last_run_articles: guard.last_run.map(|r| r.articles),
            last_run_errors: guard.last_run.map(|r| r.errors),
            next_fire,
            cache_size: self.cache.len(),
        }
    }
}
