// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change notifications for live views.
//!
//! Stores publish a [`StoreEvent`] after every successful write. Read models
//! subscribe through the [`ChangeSource`] capability and never see the
//! transport, so the in-process broadcast used here can be swapped for a
//! polling loop or a message queue.

use crate::models::{Booking, OverridesConfig, UserProfile};
use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

/// A committed change in the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    BookingCreated(Booking),
    BookingUpdated { before: Booking, after: Booking },
    BookingDeleted(Booking),
    OverridesChanged(OverridesConfig),
    ProfileChanged(UserProfile),
    /// Events were dropped for this subscriber; derived state must be rebuilt.
    Resync,
}

impl StoreEvent {
    /// Bookings affected by this event (both sides of an update).
    pub fn bookings(&self) -> Vec<&Booking> {
        match self {
            StoreEvent::BookingCreated(b) | StoreEvent::BookingDeleted(b) => vec![b],
            StoreEvent::BookingUpdated { before, after } => vec![before, after],
            _ => Vec::new(),
        }
    }

    /// Whether a view over the given dates must be refreshed.
    pub fn touches_dates(&self, mut in_view: impl FnMut(NaiveDate) -> bool) -> bool {
        matches!(self, StoreEvent::Resync) || self.bookings().iter().any(|b| in_view(b.date))
    }

    /// Whether a view over one user's bookings must be refreshed.
    pub fn touches_user(&self, user_id: &str) -> bool {
        matches!(self, StoreEvent::Resync) || self.bookings().iter().any(|b| b.user_id == user_id)
    }
}

/// Async callback invoked for each event, in publication order.
pub type Listener = Arc<dyn Fn(StoreEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`Listener`].
pub fn listener<F, Fut>(f: F) -> Listener
where
    F: Fn(StoreEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Subscribe-to-changes capability exposed by the storage layer.
pub trait ChangeSource: Send + Sync {
    /// Deliver every event published after this call returns.
    fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Handle for a live subscription. Delivery stops when it is dropped.
#[must_use = "dropping a Subscription ends delivery"]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// In-process broadcast hub shared by a store and its subscribers.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<StoreEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. No-op if nobody is listening.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }
}

impl ChangeSource for ChangeFeed {
    fn subscribe(&self, listener: Listener) -> Subscription {
        let mut receiver = self.sender.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => listener(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Change subscriber lagged, requesting resync");
                        listener(StoreEvent::Resync).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription::from_task(task)
    }
}
