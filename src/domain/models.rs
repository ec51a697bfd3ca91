use crate::domain::direction::normalize_degrees;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where a heading value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadingOrigin {
    Ble,
    Sensor,
    None,
}

/// A single heading value, always wrapped into [0, 360)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSample {
    pub angle_degrees: f64,
    pub source: HeadingOrigin,
}

impl HeadingSample {
    pub fn new(angle_degrees: f64, source: HeadingOrigin) -> Self {
        Self {
            angle_degrees: normalize_degrees(angle_degrees),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Scanning => "SCANNING...",
            Self::Connecting => "CONNECTING...",
            Self::Connected => "CONNECTED",
        }
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionState(ConnectionState),
    LogMessage(StatusMessage),
    /// Raw decoded angle from the peripheral, before wrapping
    BleAngle(i16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BluetoothCommand {
    StartScan,
    /// Stop an active scan or close a pending/active link
    Cancel,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Append-only, user-visible log of status lines.
///
/// Old lines are evicted once `capacity` is reached so a long session does
/// not grow without bound.
#[derive(Debug, Clone)]
pub struct StatusLog {
    entries: VecDeque<StatusMessage>,
    capacity: usize,
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, message: StatusMessage) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn latest(&self) -> Option<&StatusMessage> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &StatusMessage> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(200)
    }
}
