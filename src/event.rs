//! Query telemetry passed from the responder to the live view.
//!
//! The channel is bounded and submission never waits: when the live view
//! falls behind, new events are dropped and counted.

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Local};
use log::debug;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::telemetry;

/// One successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub domain: String,
    pub resolved_address: Ipv4Addr,
    pub source_address: IpAddr,
    pub timestamp: DateTime<Local>,
}

impl QueryEvent {
    pub fn new(domain: impl Into<String>, resolved_address: Ipv4Addr, source_address: IpAddr) -> Self {
        Self {
            domain: domain.into(),
            resolved_address,
            source_address,
            timestamp: Local::now(),
        }
    }
}

/// Outcome of a non-blocking submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted,
    Dropped,
}

/// Producer half of the event channel. Cheap to clone, one per query task.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<QueryEvent>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half of the event channel, owned by the live view.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<QueryEvent>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded event channel holding at most `capacity` events.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        EventReceiver { rx, dropped },
    )
}

impl EventSender {
    /// Enqueue `event` without waiting. A full or closed channel drops it.
    pub fn try_send(&self, event: QueryEvent) -> SendOutcome {
        match self.tx.try_send(event) {
            Ok(()) => SendOutcome::Accepted,
            Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                telemetry::event_dropped();
                debug!("Dropped query event for {}", event.domain);
                SendOutcome::Dropped
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once every sender is gone and
    /// the queue is drained.
    pub async fn receive(&mut self) -> Option<QueryEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event, if one is ready.
    pub fn try_receive(&mut self) -> Option<QueryEvent> {
        self.rx.try_recv().ok()
    }

    /// Number of events dropped by producers so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
