//! Fixed-interval driver for [`CollectionCycle`].
//!
//! The first cycle runs immediately, then one per interval. Every tick spawns
//! its own task, so a cycle that is still waiting on the agent never delays
//! the next one; overlapping cycles are allowed.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cycle::CollectionCycle;

/// A scheduler that has not started yet.
pub struct Scheduler {
    cycle: Arc<CollectionCycle>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(cycle: CollectionCycle, interval: Duration) -> Self {
        Self {
            cycle: Arc::new(cycle),
            interval,
        }
    }

    /// Start ticking on the current tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let Self { cycle, interval } = self;
        info!("scheduler started, interval {} ms", interval.as_millis());
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let cycle = Arc::clone(&cycle);
                tokio::spawn(async move {
                    cycle.run().await;
                });
            }
        });
        SchedulerHandle { task }
    }
}

/// A running scheduler.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop issuing new cycles. Cycles already in flight finish on their own.
    pub fn abort(&self) {
        self.task.abort();
    }
}
