use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use uuid::Uuid;

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type RepeatingTask = Arc<dyn Fn() -> Task + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    Refresh,
    Notification,
    Start,
    End,
}

impl TimerSlot {
    pub const EVENT_SLOTS: [TimerSlot; 3] = [TimerSlot::Notification, TimerSlot::Start, TimerSlot::End];
}

impl fmt::Display for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerSlot::Refresh => "refresh",
            TimerSlot::Notification => "notification",
            TimerSlot::Start => "start",
            TimerSlot::End => "end",
        };
        f.write_str(name)
    }
}

/// Cancellable reference to one scheduled callback. Dropping it does not cancel.
#[derive(Debug)]
pub struct TimerHandle {
    id: Uuid,
    slot: TimerSlot,
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(slot: TimerSlot, abort: Option<AbortHandle>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slot,
            cancelled: Arc::new(AtomicBool::new(false)),
            abort,
        }
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::trace!(timer = %self.id, slot = %self.slot, "timer cancelled");
        }
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared flag that flips when the handle is cancelled.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

pub trait TaskScheduler: Send + Sync {
    /// Runs `task` once, `delay` from now.
    fn schedule(&self, slot: TimerSlot, delay: Duration, task: Task) -> TimerHandle;

    /// Runs a fresh task from `factory` after `initial_delay`, then every
    /// `period`. A slow run postpones the next tick instead of overlapping it.
    fn schedule_repeating(
        &self,
        slot: TimerSlot,
        initial_delay: Duration,
        period: Duration,
        factory: RepeatingTask,
    ) -> TimerHandle;
}

/// Spawns every timer onto the ambient tokio runtime.
pub struct TokioScheduler;

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, slot: TimerSlot, delay: Duration, task: Task) -> TimerHandle {
        let join = tokio::spawn(async move {
            sleep(delay).await;
            task.await;
        });
        TimerHandle::new(slot, Some(join.abort_handle()))
    }

    fn schedule_repeating(
        &self,
        slot: TimerSlot,
        initial_delay: Duration,
        period: Duration,
        factory: RepeatingTask,
    ) -> TimerHandle {
        let join = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + initial_delay, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                factory().await;
            }
        });
        TimerHandle::new(slot, Some(join.abort_handle()))
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_runs() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let handle = TokioScheduler.schedule(
            TimerSlot::Start,
            Duration::from_secs(60),
            Box::pin(async move { flag.store(true, Ordering::SeqCst) }),
        );
        handle.cancel();
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_timer_ticks_until_cancelled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = TokioScheduler.schedule_repeating(
            TimerSlot::Refresh,
            Duration::ZERO,
            Duration::from_secs(10),
            Arc::new(move || {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            }),
        );
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
