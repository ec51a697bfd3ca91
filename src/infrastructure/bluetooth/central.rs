//! BLE Central Capability
//!
//! The surface the heading source needs from a platform Bluetooth stack.
//! Requests are fire-and-forget; outcomes come back as [`BleEvent`]s on the
//! channel the backend was created with.

use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// A discovered GATT service and the short UUIDs of its characteristics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattServiceInfo {
    pub uuid: u16,
    pub characteristics: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    DeviceFound { name: String, address: u64 },
    ConnectionChanged(LinkState),
    ServicesReady(Vec<GattServiceInfo>),
    NotificationsEnabled { characteristic: u16 },
    CharacteristicValue { characteristic: u16, value: Vec<u8> },
}

pub type BleEventSender = mpsc::UnboundedSender<BleEvent>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BleError {
    #[error("Bluetooth adapter unavailable or disabled")]
    AdapterUnavailable,
    #[error("link is not ready for service discovery yet")]
    LinkNotReady,
    #[error("no peripheral connected")]
    NotConnected,
    #[error("characteristic {characteristic:#06X} not found in service {service:#06X}")]
    CharacteristicNotFound { service: u16, characteristic: u16 },
    #[error("Bluetooth backend error: {0}")]
    Backend(String),
}

pub trait BleCentral {
    /// Adapter present and powered on
    fn is_available(&self) -> bool;

    fn start_scan(&mut self) -> Result<(), BleError>;

    fn stop_scan(&mut self) -> Result<(), BleError>;

    fn connect(&mut self, address: u64) -> Result<(), BleError>;

    /// Request service discovery; answers with `ServicesReady`.
    /// Returns `LinkNotReady` while the link is still settling.
    fn discover_services(&mut self) -> Result<(), BleError>;

    /// Write the client characteristic configuration descriptor with the
    /// notify value; answers with `NotificationsEnabled`.
    fn enable_notifications(&mut self, service: u16, characteristic: u16)
        -> Result<(), BleError>;

    fn disconnect(&mut self);
}

impl<T: BleCentral + ?Sized> BleCentral for Box<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn start_scan(&mut self) -> Result<(), BleError> {
        (**self).start_scan()
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        (**self).stop_scan()
    }

    fn connect(&mut self, address: u64) -> Result<(), BleError> {
        (**self).connect(address)
    }

    fn discover_services(&mut self) -> Result<(), BleError> {
        (**self).discover_services()
    }

    fn enable_notifications(
        &mut self,
        service: u16,
        characteristic: u16,
    ) -> Result<(), BleError> {
        (**self).enable_notifications(service, characteristic)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}
