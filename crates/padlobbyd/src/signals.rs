use std::fmt;
use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::presence::{ConnectedRecord, ReadyRecord};
use crate::print_debug;

/// Outbound notification for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Connected(ConnectedRecord),
    Disconnected { unique_id: String },
    /// A ready controller went back to connected or disappeared.
    Unreadied { unique_id: String },
    Ready(ReadyRecord),
    Activity { unique_id: String },
    StartPressed { unique_id: String },
    Battery { unique_id: String, percent: u8 },
    /// The record's profile was edited.
    Updated(ConnectedRecord),
}

impl Signal {
    pub fn unique_id(&self) -> &str {
        match self {
            Signal::Connected(record) | Signal::Updated(record) => &record.unique_id,
            Signal::Ready(ready) => ready.unique_id(),
            Signal::Disconnected { unique_id }
            | Signal::Unreadied { unique_id }
            | Signal::Activity { unique_id }
            | Signal::StartPressed { unique_id }
            | Signal::Battery { unique_id, .. } => unique_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Signal::Connected(_) => "connected",
            Signal::Disconnected { .. } => "disconnected",
            Signal::Unreadied { .. } => "unreadied",
            Signal::Ready(_) => "ready",
            Signal::Activity { .. } => "activity",
            Signal::StartPressed { .. } => "start_pressed",
            Signal::Battery { .. } => "battery",
            Signal::Updated(_) => "updated",
        }
    }
}

/// One line per signal, as streamed to `watch` clients.
impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.unique_id())?;
        match self {
            Signal::Connected(record) | Signal::Updated(record) => write!(f, " {}", record.name),
            Signal::Ready(ready) => write!(f, " slot {}", ready.slot_index),
            Signal::Battery { percent, .. } => write!(f, " {percent}%"),
            _ => Ok(()),
        }
    }
}

/// Fan-out of signals to any number of subscribers. Emitting never blocks;
/// subscribers whose receiver is gone are dropped.
#[derive(Default)]
pub struct SignalHub {
    subscribers: Mutex<Vec<Sender<Signal>>>,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Signal> {
        let (tx, rx) = unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    pub fn emit(&self, signal: Signal) {
        print_debug!("signal {} {}", signal.kind(), signal.unique_id());
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|tx| tx.send(signal.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map_or(0, |subs| subs.len())
    }
}
