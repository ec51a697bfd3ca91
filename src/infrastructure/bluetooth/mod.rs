//! Bluetooth Module
//!
//! Acquires headings from the Arduino BLE peripheral.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                      │
//! │   (worker thread, commands in / AppEvents out)           │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//!              ┌──────────────────┐      ┌──────────┐
//!              │ BleHeadingSource │─────▶│ Protocol │
//!              │  (state machine) │      │ - UUIDs  │
//!              └────────┬─────────┘      │ - decode │
//!                       │ BleCentral     └──────────┘
//!            ┌──────────┴──────────┐
//!            ▼                     ▼
//!   ┌──────────────────┐  ┌──────────────┐
//!   │ SimulatedCentral │  │ WinRtCentral │
//!   └──────────────────┘  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Peripheral identifiers and payload decoding
//! - [`central`] - Capability trait and events a backend provides
//! - [`heading_source`] - Scan/connect/subscribe state machine
//! - [`simulator`] - In-process peripheral for hosts without BLE
//! - `winrt` - Windows backend
//! - [`service`] - Worker thread running the source

pub mod central;
pub mod heading_source;
pub mod protocol;
pub mod service;
pub mod simulator;
#[cfg(windows)]
pub mod winrt;

pub use service::{BackendKind, BluetoothService};
