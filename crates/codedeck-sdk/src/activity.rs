// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! User activity signals.
//!
//! The embedding application feeds pointer, keyboard, click, scroll and
//! visibility events into an [`ActivitySource`]; the heartbeat scheduler
//! listens to them to keep the container warm while the user is active.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Kinds of activity a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    KeyInput,
    Click,
    Scroll,
    VisibilityChange,
}

impl ActivityKind {
    /// Interaction kinds that count as "the user is here".
    pub const INTERACTIONS: [ActivityKind; 4] = [
        ActivityKind::PointerMove,
        ActivityKind::KeyInput,
        ActivityKind::Click,
        ActivityKind::Scroll,
    ];
}

/// Whether the client surface is currently shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// A single activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    PointerMove,
    KeyInput,
    Click,
    Scroll,
    Visibility(Visibility),
}

impl ActivityEvent {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityEvent::PointerMove => ActivityKind::PointerMove,
            ActivityEvent::KeyInput => ActivityKind::KeyInput,
            ActivityEvent::Click => ActivityKind::Click,
            ActivityEvent::Scroll => ActivityKind::Scroll,
            ActivityEvent::Visibility(_) => ActivityKind::VisibilityChange,
        }
    }
}

/// Callback invoked for each event of the subscribed kind.
pub type ActivityListener = Arc<dyn Fn(ActivityEvent) + Send + Sync>;

/// Opaque registration handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Something listeners can be attached to.
pub trait ActivitySource: Send + Sync {
    fn add_listener(&self, kind: ActivityKind, listener: ActivityListener) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);
}

/// In-process activity dispatcher.
///
/// Listeners are invoked synchronously from [`ActivityHub::emit`], outside of
/// the hub's lock, so a listener may itself add or remove listeners.
#[derive(Default)]
pub struct ActivityHub {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, ActivityKind, ActivityListener)>>,
}

impl ActivityHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, ActivityKind, ActivityListener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver `event` to every listener registered for its kind.
    pub fn emit(&self, event: ActivityEvent) {
        let kind = event.kind();
        let targets: Vec<ActivityListener> = self
            .listeners()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();

        for listener in targets {
            listener(event);
        }
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: ActivityKind) -> usize {
        self.listeners().iter().filter(|(_, k, _)| *k == kind).count()
    }
}

impl ActivitySource for ActivityHub {
    fn add_listener(&self, kind: ActivityKind, listener: ActivityListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners().retain(|(existing, _, _)| *existing != id);
    }
}
