// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Heartbeat scheduler keeping the user's container warm.
//!
//! The scheduler sends a heartbeat when started, then every interval
//! (default: 5 minutes). User activity adds extra heartbeats, throttled to
//! one per [`ACTIVITY_THROTTLE_INTERVAL`] and batched over
//! [`ACTIVITY_BATCH_DELAY`] so a stream of pointer moves costs one request.
//! Returning to a hidden client after a long pause sends immediately.
//!
//! Heartbeats are best-effort:
//! - network and server failures are logged, never returned to callers
//! - a 401 stops the scheduler; the next `start()` resumes it
//! - `container_recreated` stores the new URL under
//!   [`REDIRECT_URL_KEY`](crate::storage::REDIRECT_URL_KEY) and raises
//!   [`ResyncRequired`]
//!
//! `stop()` cancels the interval and any pending batched send, but requests
//! already on the wire complete and are still acted upon.
//!
//! One scheduler exists per client session. Clones share the same state.

pub mod gate;
pub mod retry;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use codedeck_protocol::{HeartbeatRequest, HeartbeatResponse, HeartbeatStatus};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::activity::{
    ActivityEvent, ActivityKind, ActivityListener, ActivitySource, ListenerId, Visibility,
};
use crate::backend::LifecycleBackend;
use crate::error::{Result, SdkError};
use crate::resync::{LogOnlyResync, ResyncHandler, ResyncRequired};
use crate::storage::{ClientStorage, REDIRECT_URL_KEY};
use retry::{NextTriggerRetry, RetryDecision, RetryPolicy};

/// Default interval between recurring heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);

/// Minimum gap between the last heartbeat and an activity-triggered one.
pub const ACTIVITY_THROTTLE_INTERVAL: Duration = Duration::from_secs(60);

/// Window over which a burst of activity events is coalesced.
pub const ACTIVITY_BATCH_DELAY: Duration = Duration::from_millis(250);

/// Language assumed when a problem context does not name one.
pub const DEFAULT_LANGUAGE: &str = "c";

/// Problem attached to heartbeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemContext {
    pub problem_id: String,
    pub language: String,
}

impl ProblemContext {
    pub fn new(problem_id: impl Into<String>) -> Self {
        Self {
            problem_id: problem_id.into(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Periodic and activity-driven liveness signal.
#[derive(Clone)]
pub struct HeartbeatScheduler {
    inner: Arc<Inner>,
}

/// Builder for a [`HeartbeatScheduler`].
pub struct HeartbeatSchedulerBuilder {
    backend: Arc<dyn LifecycleBackend>,
    storage: Arc<dyn ClientStorage>,
    activity: Arc<dyn ActivitySource>,
    resync: Arc<dyn ResyncHandler>,
    retry: Arc<dyn RetryPolicy>,
    throttle_interval: Duration,
    batch_delay: Duration,
}

impl HeartbeatSchedulerBuilder {
    /// Install the handler invoked when the container was recreated.
    pub fn resync(mut self, resync: Arc<dyn ResyncHandler>) -> Self {
        self.resync = resync;
        self
    }

    /// Install the strategy consulted after a failed heartbeat.
    pub fn retry(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    /// Override [`ACTIVITY_THROTTLE_INTERVAL`].
    pub fn throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    /// Override [`ACTIVITY_BATCH_DELAY`].
    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn build(self) -> HeartbeatScheduler {
        HeartbeatScheduler {
            inner: Arc::new(Inner {
                backend: self.backend,
                storage: self.storage,
                activity: self.activity,
                resync: self.resync,
                retry: self.retry,
                throttle_interval: self.throttle_interval,
                batch_delay: self.batch_delay,
                state: Mutex::new(HeartbeatState::default()),
            }),
        }
    }
}

impl HeartbeatScheduler {
    /// Start building a scheduler.
    pub fn builder(
        backend: Arc<dyn LifecycleBackend>,
        storage: Arc<dyn ClientStorage>,
        activity: Arc<dyn ActivitySource>,
    ) -> HeartbeatSchedulerBuilder {
        HeartbeatSchedulerBuilder {
            backend,
            storage,
            activity,
            resync: Arc::new(LogOnlyResync),
            retry: Arc::new(NextTriggerRetry),
            throttle_interval: ACTIVITY_THROTTLE_INTERVAL,
            batch_delay: ACTIVITY_BATCH_DELAY,
        }
    }

    /// Start (or restart) heartbeats.
    ///
    /// Sends one heartbeat right away and then one every `interval`. A running
    /// scheduler has its interval and pending batched send cleared first;
    /// activity listeners are registered once and kept across restarts.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(SdkError::InvalidInput(
                "heartbeat interval must be greater than zero".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|e| SdkError::Runtime(e.to_string()))?;

        let (beat, cancel) = {
            let mut state = self.inner.state();
            if state.is_running() {
                debug!(
                    generation = state.generation,
                    "Heartbeat scheduler already running, restarting"
                );
            }
            state.clear_timers();
            state.generation += 1;
            let cancel = CancellationToken::new();
            state.interval = Some(cancel.clone());
            state.runtime = Some(runtime.clone());
            (state.begin_beat(1), cancel)
        };
        let generation = beat.generation;

        self.inner.register_listeners();
        runtime.spawn(self.inner.clone().run_beat(beat));
        self.inner.spawn_interval(&runtime, cancel, interval, generation);

        info!(
            interval_ms = interval.as_millis() as u64,
            generation, "Heartbeat scheduler started"
        );
        Ok(())
    }

    /// Stop heartbeats and remove activity listeners. No-op when idle.
    pub fn stop(&self) {
        if self.inner.stop_all() {
            info!("Heartbeat scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().is_running()
    }

    /// Attach a problem to subsequent heartbeats. Does not affect timing.
    ///
    /// `language` defaults to [`DEFAULT_LANGUAGE`].
    pub fn set_problem_context(&self, problem_id: impl Into<String>, language: Option<&str>) {
        let mut context = ProblemContext::new(problem_id);
        if let Some(language) = language {
            context = context.with_language(language);
        }
        debug!(
            problem_id = %context.problem_id,
            language = %context.language,
            "Heartbeat problem context set"
        );
        self.inner.state().problem_context = Some(context);
    }

    /// Send subsequent heartbeats without a problem.
    pub fn clear_problem_context(&self) {
        self.inner.state().problem_context = None;
    }

    pub fn problem_context(&self) -> Option<ProblemContext> {
        self.inner.state().problem_context.clone()
    }

    /// When the most recent heartbeat was issued (not answered).
    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.inner.state().last_heartbeat
    }

    /// Send one heartbeat now and wait for it to be handled.
    ///
    /// Ignores the activity throttle. Failures are handled exactly like
    /// scheduled heartbeats.
    pub async fn beat_now(&self) {
        let beat = self.inner.state().begin_beat(1);
        self.inner.clone().run_beat(beat).await;
    }
}

struct Inner {
    backend: Arc<dyn LifecycleBackend>,
    storage: Arc<dyn ClientStorage>,
    activity: Arc<dyn ActivitySource>,
    resync: Arc<dyn ResyncHandler>,
    retry: Arc<dyn RetryPolicy>,
    throttle_interval: Duration,
    batch_delay: Duration,
    state: Mutex<HeartbeatState>,
}

#[derive(Default)]
struct HeartbeatState {
    /// Cancels the recurring heartbeat task; `Some` while running.
    interval: Option<CancellationToken>,
    /// Runtime captured by `start`, used to spawn from activity listeners.
    runtime: Option<Handle>,
    last_heartbeat: Option<Instant>,
    problem_context: Option<ProblemContext>,
    activity_listeners_active: bool,
    listener_ids: Vec<ListenerId>,
    /// Pending batched activity heartbeat.
    throttle: Option<JoinHandle<()>>,
    /// Identifies the pending batched send; bumped whenever it is cancelled.
    batch: u64,
    /// Incremented by every `start`; ties in-flight work to the run that issued it.
    generation: u64,
}

impl HeartbeatState {
    fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    fn clear_timers(&mut self) {
        if let Some(cancel) = self.interval.take() {
            cancel.cancel();
        }
        self.cancel_batch();
    }

    /// A batch task already past its sleep and waiting on the lock sees the
    /// new id and gives up, since `abort` cannot interrupt a running poll.
    fn cancel_batch(&mut self) {
        self.batch += 1;
        if let Some(throttle) = self.throttle.take() {
            throttle.abort();
        }
    }

    fn payload(&self) -> HeartbeatRequest {
        match &self.problem_context {
            Some(ctx) => HeartbeatRequest::for_problem(&ctx.problem_id, &ctx.language),
            None => HeartbeatRequest::default(),
        }
    }

    /// Record the send before it happens so concurrent triggers see it.
    fn begin_beat(&mut self, attempt: u32) -> Beat {
        self.last_heartbeat = Some(Instant::now());
        Beat {
            request: self.payload(),
            generation: self.generation,
            attempt,
        }
    }

    fn elapsed_since_last(&self) -> Option<Duration> {
        self.last_heartbeat.map(|last| last.elapsed())
    }
}

struct Beat {
    request: HeartbeatRequest,
    generation: u64,
    attempt: u32,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, HeartbeatState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn register_listeners(self: &Arc<Self>) {
        {
            let mut state = self.state();
            if state.activity_listeners_active {
                return;
            }
            state.activity_listeners_active = true;
        }

        let weak = Arc::downgrade(self);
        let listener: ActivityListener = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_activity(event);
            }
        });

        let ids: Vec<ListenerId> = ActivityKind::INTERACTIONS
            .into_iter()
            .chain([ActivityKind::VisibilityChange])
            .map(|kind| self.activity.add_listener(kind, listener.clone()))
            .collect();

        let mut state = self.state();
        if state.activity_listeners_active {
            state.listener_ids = ids;
        } else {
            // stopped while registering
            drop(state);
            for id in ids {
                self.activity.remove_listener(id);
            }
        }
    }

    fn unregister_listeners(&self) -> bool {
        let ids = {
            let mut state = self.state();
            state.activity_listeners_active = false;
            std::mem::take(&mut state.listener_ids)
        };
        let removed = !ids.is_empty();
        for id in ids {
            self.activity.remove_listener(id);
        }
        removed
    }

    /// Returns whether anything was active.
    fn stop_all(&self) -> bool {
        let was_running = {
            let mut state = self.state();
            let was_running = state.is_running() || state.throttle.is_some();
            state.clear_timers();
            was_running
        };
        let had_listeners = self.unregister_listeners();
        was_running || had_listeners
    }

    fn stop_generation(&self, generation: u64) {
        {
            let mut state = self.state();
            if state.generation != generation || !state.is_running() {
                return;
            }
            state.clear_timers();
        }
        self.unregister_listeners();
        info!(generation, "Heartbeat scheduler stopped after authentication loss");
    }

    fn spawn_interval(
        self: &Arc<Self>,
        runtime: &Handle,
        cancel: CancellationToken,
        period: Duration,
        generation: u64,
    ) {
        let weak = Arc::downgrade(self);
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!(generation, "Heartbeat interval cancelled");
                        break;
                    }

                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        let beat = {
                            let mut state = inner.state();
                            if !state.is_running() || state.generation != generation {
                                break;
                            }
                            state.begin_beat(1)
                        };
                        // Detached: stopping must not abort a request on the wire.
                        tokio::spawn(inner.run_beat(beat));
                    }
                }
            }
        });
    }

    fn on_activity(self: &Arc<Self>, event: ActivityEvent) {
        match event {
            ActivityEvent::Visibility(Visibility::Visible) => self.on_visible(),
            ActivityEvent::Visibility(Visibility::Hidden) => {}
            _ => self.on_interaction(),
        }
    }

    fn on_interaction(self: &Arc<Self>) {
        let mut state = self.state();
        if !state.is_running() || state.throttle.is_some() {
            return;
        }
        if state
            .elapsed_since_last()
            .is_some_and(|elapsed| elapsed < self.throttle_interval)
        {
            return;
        }
        let Some(runtime) = state.runtime.clone() else {
            return;
        };

        let generation = state.generation;
        let batch = state.batch;
        let delay = self.batch_delay;
        let inner = self.clone();
        debug!("Activity detected, batching heartbeat");

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let beat = {
                let mut state = inner.state();
                if state.batch != batch {
                    return;
                }
                state.throttle = None;
                if !state.is_running() || state.generation != generation {
                    return;
                }
                state.begin_beat(1)
            };
            inner.run_beat(beat).await;
        });
        state.throttle = Some(handle);
    }

    fn on_visible(self: &Arc<Self>) {
        let (beat, runtime) = {
            let mut state = self.state();
            if !state.is_running() {
                return;
            }
            if state
                .elapsed_since_last()
                .is_some_and(|elapsed| elapsed <= self.throttle_interval)
            {
                return;
            }
            let Some(runtime) = state.runtime.clone() else {
                return;
            };
            state.cancel_batch();
            (state.begin_beat(1), runtime)
        };
        debug!("Client visible again after a long pause, sending heartbeat");
        runtime.spawn(self.clone().run_beat(beat));
    }

    async fn run_beat(self: Arc<Self>, mut beat: Beat) {
        loop {
            let delay = match self.backend.heartbeat(&beat.request).await {
                Ok(response) => {
                    self.handle_response(response);
                    return;
                }
                Err(SdkError::Unauthorized) => {
                    warn!("Heartbeat rejected as unauthorized, stopping heartbeats");
                    self.stop_generation(beat.generation);
                    return;
                }
                Err(e) => {
                    warn!(error = %e, attempt = beat.attempt, "Failed to send heartbeat");
                    match self.retry.decide(beat.attempt, &e) {
                        RetryDecision::WaitForNextTrigger => return,
                        RetryDecision::RetryAfter(delay) => delay,
                    }
                }
            };

            tokio::time::sleep(delay).await;

            beat = {
                let mut state = self.state();
                if !state.is_running() || state.generation != beat.generation {
                    return;
                }
                state.begin_beat(beat.attempt + 1)
            };
        }
    }

    fn handle_response(&self, response: HeartbeatResponse) {
        match response.status {
            HeartbeatStatus::Ok => debug!("Heartbeat acknowledged"),
            HeartbeatStatus::ContainerRecreated => match response.container_url() {
                Some(url) => {
                    info!(container_url = %url, "Container was recreated, resynchronizing");
                    if let Err(e) = self.storage.set(REDIRECT_URL_KEY, url) {
                        error!(error = %e, "Failed to store container redirect URL");
                    }
                    self.resync.resync_required(ResyncRequired {
                        container_url: url.to_string(),
                    });
                }
                None => {
                    warn!("Container was recreated but no container URL was provided");
                }
            },
            HeartbeatStatus::Unknown => debug!("Heartbeat answered with an unknown status"),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        state.clear_timers();
        for id in std::mem::take(&mut state.listener_ids) {
            self.activity.remove_listener(id);
        }
    }
}
