//! Keeps current/next calendar state in step with the wall clock.
//!
//! A refresh fetches the feed outside the lock and only takes the lock to
//! install the result. Everything that touches [`SchedulerState`] (timeline
//! swap, current/next derivation, publishing, timer re-arming) happens in one
//! critical section, so a refresh tick and a timer fire never interleave.
//! Commands are dispatched after the lock is released, behind a gate that
//! `deactivate` closes and waits on.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::clients::calendar_client::CalendarSource;
use crate::config::BindingConfig;
use crate::error::{CalendarError, ConfigError};
use crate::models::channel::{BindingStatus, ChannelId};
use crate::models::event::Event;
use crate::models::timeline::EventTimeline;
use crate::service::command_dispatcher::{dispatch_text, CommandDispatcher};
use crate::service::notification_policy::notification_instant;
use crate::service::projection::{Flags, Projection};
use crate::service::state_sink::StateSink;
use crate::tasks::timers::{Clock, RepeatingTask, TaskScheduler, TimerHandle, TimerSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerPhase {
    Uninitialized,
    Syncing,
    Idle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Applied,
    /// A newer fetch already installed its timeline.
    Stale,
    Failed(CalendarError),
    /// The binding was deactivated before the fetch finished.
    Inactive,
}

#[derive(Debug)]
struct ArmedTimer {
    handle: TimerHandle,
    generation: u64,
    target: DateTime<Utc>,
    event: Arc<Event>,
}

/// Commands captured inside the critical section, sent once it is left.
#[derive(Debug, Default)]
struct PendingDispatch {
    epoch: u64,
    commands: Vec<String>,
}

#[derive(Debug)]
pub struct SchedulerState {
    phase: SchedulerPhase,
    timeline: Arc<EventTimeline>,
    current: Option<Arc<Event>>,
    next: Option<Arc<Event>>,
    last_fetch: Option<DateTime<Utc>>,
    flags: Flags,
    applied_seq: u64,
    next_generation: u64,
    /// Bumped by every deactivation.
    epoch: u64,
    refresh: Option<TimerHandle>,
    notification: Option<ArmedTimer>,
    start: Option<ArmedTimer>,
    end: Option<ArmedTimer>,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            phase: SchedulerPhase::Uninitialized,
            timeline: Arc::new(EventTimeline::default()),
            current: None,
            next: None,
            last_fetch: None,
            flags: Flags::default(),
            applied_seq: 0,
            next_generation: 0,
            epoch: 0,
            refresh: None,
            notification: None,
            start: None,
            end: None,
        }
    }

    fn slot(&self, slot: TimerSlot) -> Option<&ArmedTimer> {
        match slot {
            TimerSlot::Notification => self.notification.as_ref(),
            TimerSlot::Start => self.start.as_ref(),
            TimerSlot::End => self.end.as_ref(),
            TimerSlot::Refresh => None,
        }
    }

    fn take_slot(&mut self, slot: TimerSlot) -> Option<ArmedTimer> {
        match slot {
            TimerSlot::Notification => self.notification.take(),
            TimerSlot::Start => self.start.take(),
            TimerSlot::End => self.end.take(),
            TimerSlot::Refresh => None,
        }
    }

    fn put_slot(&mut self, slot: TimerSlot, armed: ArmedTimer) {
        match slot {
            TimerSlot::Notification => self.notification = Some(armed),
            TimerSlot::Start => self.start = Some(armed),
            TimerSlot::End => self.end = Some(armed),
            TimerSlot::Refresh => armed.handle.cancel(),
        }
    }
}

/// Read-only copy of the scheduler state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub phase: SchedulerPhase,
    pub current: Option<Event>,
    pub next: Option<Event>,
    pub last_fetch: Option<DateTime<Utc>>,
    pub flags: Flags,
    pub timeline_len: usize,
    pub refresh_armed: bool,
    pub notification_at: Option<DateTime<Utc>>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl SchedulerSnapshot {
    pub fn armed_at(&self, slot: TimerSlot) -> Option<DateTime<Utc>> {
        match slot {
            TimerSlot::Notification => self.notification_at,
            TimerSlot::Start => self.start_at,
            TimerSlot::End => self.end_at,
            TimerSlot::Refresh => None,
        }
    }
}

pub struct Collaborators {
    pub source: Arc<dyn CalendarSource>,
    pub scheduler: Arc<dyn TaskScheduler>,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn StateSink>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
}

pub struct SchedulerCore {
    config: BindingConfig,
    source: Arc<dyn CalendarSource>,
    scheduler: Arc<dyn TaskScheduler>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn StateSink>,
    dispatcher: Arc<dyn CommandDispatcher>,
    fetch_seq: AtomicU64,
    state: Mutex<SchedulerState>,
    dispatch_gate: RwLock<()>,
    this: Weak<SchedulerCore>,
}

impl SchedulerCore {
    pub fn new(config: BindingConfig, collaborators: Collaborators) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            source: collaborators.source,
            scheduler: collaborators.scheduler,
            clock: collaborators.clock,
            sink: collaborators.sink,
            dispatcher: collaborators.dispatcher,
            fetch_seq: AtomicU64::new(0),
            state: Mutex::new(SchedulerState::new()),
            dispatch_gate: RwLock::new(()),
            this: this.clone(),
        })
    }

    /// Starts the repeating refresh; its first tick fires immediately.
    pub fn activate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        let mut state = self.state.lock();
        if state.phase != SchedulerPhase::Uninitialized {
            tracing::warn!("binding already active");
            return Ok(());
        }
        tracing::debug!(url = %self.config.url, "Start initializing!");
        state.phase = SchedulerPhase::Syncing;
        self.sink.update_status(BindingStatus::Unknown);

        let this = self.this.clone();
        let factory: RepeatingTask = Arc::new(move || {
            let this = this.clone();
            Box::pin(async move {
                if let Some(core) = this.upgrade() {
                    core.refresh().await;
                }
            })
        });
        state.refresh = Some(self.scheduler.schedule_repeating(
            TimerSlot::Refresh,
            Duration::ZERO,
            self.config.refresh_interval,
            factory,
        ));
        tracing::info!(
            interval_secs = self.config.refresh_interval.as_secs(),
            "calendar binding activated"
        );
        Ok(())
    }

    /// Cancels every timer. Waits for a reconcile in progress, and for any
    /// command dispatch already under way, before returning.
    pub async fn deactivate(&self) {
        {
            let mut state = self.state.lock();
            if let Some(refresh) = state.refresh.take() {
                refresh.cancel();
            }
            for slot in TimerSlot::EVENT_SLOTS {
                if let Some(armed) = state.take_slot(slot) {
                    armed.handle.cancel();
                }
            }
            if state.phase != SchedulerPhase::Uninitialized {
                tracing::info!("calendar binding deactivated");
            }
            state.phase = SchedulerPhase::Uninitialized;
            state.epoch += 1;
        }
        drop(self.dispatch_gate.write().await);
    }

    /// Fetches the feed and installs it. The sequence number is taken when
    /// this is called, so a fetch that finishes after a newer one is dropped.
    pub fn refresh(&self) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'static>> {
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let core = self.this.upgrade();
        Box::pin(async move {
            match core {
                Some(core) => core.fetch_and_install(seq).await,
                None => FetchOutcome::Inactive,
            }
        })
    }

    async fn fetch_and_install(&self, seq: u64) -> FetchOutcome {
        {
            let mut state = self.state.lock();
            match state.phase {
                SchedulerPhase::Uninitialized => return FetchOutcome::Inactive,
                SchedulerPhase::Idle => state.phase = SchedulerPhase::Syncing,
                SchedulerPhase::Syncing => {}
            }
        }
        tracing::info!(url = %self.config.url, seq, "updating calendar");
        let fetched = self.fetch_timeline().await;

        let (outcome, pending) = self.install(seq, fetched);
        self.dispatch_pending(pending).await;
        outcome
    }

    fn install(
        &self,
        seq: u64,
        fetched: Result<EventTimeline, CalendarError>,
    ) -> (FetchOutcome, PendingDispatch) {
        let mut state = self.state.lock();
        if state.phase == SchedulerPhase::Uninitialized {
            tracing::debug!(seq, "binding deactivated during fetch, discarding");
            return (FetchOutcome::Inactive, PendingDispatch::default());
        }
        if seq <= state.applied_seq {
            tracing::debug!(seq, applied = state.applied_seq, "discarding out-of-order fetch");
            return (FetchOutcome::Stale, PendingDispatch::default());
        }
        match fetched {
            Ok(timeline) => {
                let now = self.clock.now();
                tracing::info!(seq, events = timeline.len(), "calendar updated");
                state.applied_seq = seq;
                state.last_fetch = Some(now);
                state.timeline = Arc::new(timeline);
                let pending = self.reconcile_locked(&mut state, now);
                self.sink.update_status(BindingStatus::Online);
                (FetchOutcome::Applied, pending)
            }
            Err(e) => {
                tracing::error!(url = %self.config.url, error = %e, "calendar refresh failed");
                if state.applied_seq > 0 {
                    state.phase = SchedulerPhase::Idle;
                }
                self.sink.update_status(BindingStatus::Offline(e.to_string()));
                (FetchOutcome::Failed(e), PendingDispatch::default())
            }
        }
    }

    async fn fetch_timeline(&self) -> Result<EventTimeline, CalendarError> {
        let text = self.source.fetch(&self.config.url).await?;
        Ok(EventTimeline::from_ics(&text, self.config.timezone)?)
    }

    /// Installs `timeline` as of `now`. Returns false when the binding is not active.
    pub async fn reconcile(&self, timeline: EventTimeline, now: DateTime<Utc>) -> bool {
        let pending = {
            let mut state = self.state.lock();
            if state.phase == SchedulerPhase::Uninitialized {
                tracing::warn!("reconcile on inactive binding ignored");
                return false;
            }
            state.timeline = Arc::new(timeline);
            self.reconcile_locked(&mut state, now)
        };
        self.dispatch_pending(pending).await;
        true
    }

    fn reconcile_locked(&self, state: &mut SchedulerState, now: DateTime<Utc>) -> PendingDispatch {
        state.phase = SchedulerPhase::Syncing;
        let projection = Projection::from_timeline(
            &state.timeline,
            now,
            state.last_fetch,
            self.config.notification_offset,
        );
        for (channel, value) in projection.channels() {
            self.sink.publish(channel, value);
        }
        state.current = projection.current;
        state.next = projection.next;
        state.flags = projection.flags;
        let commands = self.rearm(state, now);
        state.phase = SchedulerPhase::Idle;
        PendingDispatch {
            epoch: state.epoch,
            commands,
        }
    }

    /// Replaces the event timers. Returns the commands of notification
    /// timers that were due but had not run yet.
    fn rearm(&self, state: &mut SchedulerState, now: DateTime<Utc>) -> Vec<String> {
        let mut overdue = Vec::new();
        for slot in TimerSlot::EVENT_SLOTS {
            let target = self.target_for(state, slot);
            if let Some(previous) = state.take_slot(slot) {
                tracing::debug!(slot = %slot, target = %previous.target, "cancelling timer");
                previous.handle.cancel();
                if slot == TimerSlot::Notification && previous.target <= now {
                    tracing::debug!(target = %previous.target, "notification overtaken before it ran");
                    overdue.extend(previous.event.description().map(str::to_string));
                }
            }
            let Some((event, target)) = target.filter(|(_, t)| *t > now) else {
                continue;
            };
            let delay = (target - now).to_std().unwrap_or_default();
            state.next_generation += 1;
            let generation = state.next_generation;
            let handle = self.arm(slot, generation, delay);
            tracing::debug!(slot = %slot, target = %target, "timer armed");
            state.put_slot(
                slot,
                ArmedTimer {
                    handle,
                    generation,
                    target,
                    event,
                },
            );
        }
        overdue
    }

    fn target_for(
        &self,
        state: &SchedulerState,
        slot: TimerSlot,
    ) -> Option<(Arc<Event>, DateTime<Utc>)> {
        let event = match slot {
            TimerSlot::Notification | TimerSlot::Start => state.next.clone(),
            TimerSlot::End => state.current.clone().or_else(|| state.next.clone()),
            TimerSlot::Refresh => None,
        }?;
        let target = match slot {
            TimerSlot::Notification => notification_instant(&event, self.config.notification_offset),
            TimerSlot::Start => event.start(),
            _ => event.end(),
        };
        Some((event, target))
    }

    fn arm(&self, slot: TimerSlot, generation: u64, delay: Duration) -> TimerHandle {
        let this = self.this.clone();
        self.scheduler.schedule(
            slot,
            delay,
            Box::pin(async move {
                if let Some(core) = this.upgrade() {
                    core.on_timer(slot, generation).await;
                }
            }),
        )
    }

    /// Runs when an event timer elapses. Re-derives state against the timeline
    /// already held; a notification fire also dispatches the next event's
    /// description once the lock is released.
    pub async fn on_timer(&self, slot: TimerSlot, generation: u64) {
        let pending = {
            let mut state = self.state.lock();
            if state.phase == SchedulerPhase::Uninitialized {
                tracing::debug!(slot = %slot, "timer fired after deactivation, ignoring");
                return;
            }
            let live = state.slot(slot).is_some_and(|a| a.generation == generation);
            if !live {
                tracing::debug!(slot = %slot, generation, "ignoring stale timer");
                return;
            }
            // spent, so the re-arm below must not cancel the running task
            drop(state.take_slot(slot));
            tracing::info!(slot = %slot, "timer fired");

            let command_text = match slot {
                TimerSlot::Notification => state
                    .next
                    .as_deref()
                    .and_then(Event::description)
                    .map(str::to_string),
                _ => None,
            };
            let now = self.clock.now();
            let mut pending = self.reconcile_locked(&mut state, now);
            if let Some(text) = command_text {
                pending.commands.insert(0, text);
            }
            pending
        };

        self.dispatch_pending(pending).await;
    }

    async fn dispatch_pending(&self, pending: PendingDispatch) {
        if pending.commands.is_empty() {
            return;
        }
        let _gate = self.dispatch_gate.read().await;
        let epoch = self.state.lock().epoch;
        if epoch != pending.epoch {
            tracing::debug!(dropped = pending.commands.len(), "binding deactivated before dispatch");
            return;
        }
        for text in &pending.commands {
            dispatch_text(self.dispatcher.as_ref(), text).await;
        }
    }

    /// Re-publishes one channel from the last reconcile without fetching.
    pub fn refresh_channel(&self, channel: ChannelId) {
        let state = self.state.lock();
        let value = self.projection_locked(&state).channel(channel);
        self.sink.publish(channel, value);
    }

    pub fn publish_all(&self) {
        let state = self.state.lock();
        for (channel, value) in self.projection_locked(&state).channels() {
            self.sink.publish(channel, value);
        }
    }

    fn projection_locked(&self, state: &SchedulerState) -> Projection {
        Projection {
            current: state.current.clone(),
            next: state.next.clone(),
            last_fetch: state.last_fetch,
            offset: self.config.notification_offset,
            flags: state.flags,
        }
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.state.lock();
        SchedulerSnapshot {
            phase: state.phase,
            current: state.current.as_deref().cloned(),
            next: state.next.as_deref().cloned(),
            last_fetch: state.last_fetch,
            flags: state.flags,
            timeline_len: state.timeline.len(),
            refresh_armed: state.refresh.is_some(),
            notification_at: state.notification.as_ref().map(|a| a.target),
            start_at: state.start.as_ref().map(|a| a.target),
            end_at: state.end.as_ref().map(|a| a.target),
        }
    }
}
