//! Bluetooth Service Module
//!
//! Runs the heading source on its own thread with a single-threaded tokio
//! runtime. The UI talks to it with [`BluetoothCommand`]s and hears back
//! through [`AppEvent`]s; decoded angles land in the shared BLE slot.

use crate::domain::heading::HeadingSlot;
use crate::domain::models::{AppEvent, BluetoothCommand, MessageSeverity, StatusMessage};
use crate::infrastructure::bluetooth::central::{BleCentral, BleEventSender};
use crate::infrastructure::bluetooth::heading_source::{BleHeadingSource, HeadingSourceConfig};
use crate::infrastructure::bluetooth::simulator::{SimulatedCentral, SimulatorConfig};
use anyhow::Result;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Interval at which pending discovery retries are checked
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Simulated,
    #[cfg(windows)]
    WinRt,
}

impl BackendKind {
    pub fn from_settings(use_simulated: bool) -> Self {
        if use_simulated {
            return Self::Simulated;
        }
        Self::native().unwrap_or_else(|| {
            tracing::warn!("No native Bluetooth backend on this platform, using the simulator");
            Self::Simulated
        })
    }

    #[cfg(windows)]
    fn native() -> Option<Self> {
        Some(Self::WinRt)
    }

    #[cfg(not(windows))]
    fn native() -> Option<Self> {
        None
    }
}

/// Handle to the Bluetooth worker thread
pub struct BluetoothService {
    command_sender: mpsc::UnboundedSender<BluetoothCommand>,
    worker: Option<JoinHandle<()>>,
}

impl BluetoothService {
    pub fn spawn(
        event_sender: mpsc::UnboundedSender<AppEvent>,
        ble_slot: Arc<HeadingSlot>,
        config: HeadingSourceConfig,
        backend: BackendKind,
    ) -> Result<Self> {
        let (command_sender, command_receiver) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("bluetooth".into())
            .spawn(move || run_worker(command_receiver, event_sender, ble_slot, config, backend))?;

        Ok(Self {
            command_sender,
            worker: Some(worker),
        })
    }

    pub fn send(&self, command: BluetoothCommand) {
        if self.command_sender.send(command).is_err() {
            error!("Bluetooth worker is gone; dropped {:?}", command);
        }
    }

    /// Close the link and wait for the worker to exit
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.command_sender.send(BluetoothCommand::Shutdown);
        if worker.join().is_err() {
            error!("Bluetooth worker panicked during shutdown");
        }
    }
}

impl Drop for BluetoothService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    mut commands: mpsc::UnboundedReceiver<BluetoothCommand>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    ble_slot: Arc<HeadingSlot>,
    config: HeadingSourceConfig,
    backend: BackendKind,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime for Bluetooth: {}", e);
            let _ = event_sender.send(AppEvent::LogMessage(StatusMessage::new(
                format!("Bluetooth unavailable: {}", e),
                MessageSeverity::Error,
            )));
            return;
        }
    };

    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async move {
        let (ble_tx, mut ble_rx) = mpsc::unbounded_channel();
        let central = create_central(backend, ble_tx).await;
        let mut source = BleHeadingSource::new(central, config, event_sender, ble_slot);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        info!("Bluetooth worker started ({:?} backend)", backend);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(BluetoothCommand::StartScan) => {
                        // Failures are already reported to the log by the source
                        let _ = source.start_scan();
                    }
                    Some(BluetoothCommand::Cancel) => source.cancel(),
                    Some(BluetoothCommand::Shutdown) | None => {
                        source.shutdown();
                        break;
                    }
                },
                Some(event) = ble_rx.recv() => source.handle_event(event, Instant::now()),
                _ = ticker.tick() => source.poll(Instant::now()),
            }
        }
        info!("Bluetooth worker stopped");
    });
}

async fn create_central(backend: BackendKind, events: BleEventSender) -> Box<dyn BleCentral> {
    match backend {
        BackendKind::Simulated => Box::new(SimulatedCentral::new(events, SimulatorConfig::default())),
        #[cfg(windows)]
        BackendKind::WinRt => Box::new(
            crate::infrastructure::bluetooth::winrt::WinRtCentral::new(events).await,
        ),
    }
}
