//! Simulated BLE Central
//!
//! Stands in for a platform Bluetooth stack on hosts without one. It
//! advertises a heading peripheral with the expected GATT layout and, once
//! subscribed, streams a slowly rotating angle. Every full turn it also sends
//! one malformed payload so the error path stays exercised.
//!
//! Background work runs as `spawn_local` tasks, so the central must be used
//! from inside a `tokio::task::LocalSet`.

use crate::infrastructure::bluetooth::central::{
    BleCentral, BleError, BleEvent, BleEventSender, GattServiceInfo, LinkState,
};
use crate::infrastructure::bluetooth::protocol;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub adapter_available: bool,
    pub device_name: String,
    pub address: u64,
    pub advertise_interval: Duration,
    pub connect_delay: Duration,
    /// Time after link-up during which discovery answers `LinkNotReady`
    pub link_settle: Duration,
    pub notify_interval: Duration,
    pub step_degrees: i16,
    pub services: Vec<GattServiceInfo>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            adapter_available: true,
            device_name: protocol::TARGET_DEVICE_NAME.to_string(),
            address: 0x00A0_C0FF_EE01,
            advertise_interval: Duration::from_millis(400),
            connect_delay: Duration::from_millis(300),
            link_settle: Duration::from_millis(500),
            notify_interval: Duration::from_millis(100),
            step_degrees: 3,
            services: vec![
                GattServiceInfo {
                    uuid: 0x1800,
                    characteristics: vec![0x2A00, 0x2A01],
                },
                GattServiceInfo {
                    uuid: protocol::HEADING_SERVICE_UUID16,
                    characteristics: vec![protocol::HEADING_CHAR_UUID16],
                },
            ],
        }
    }
}

pub struct SimulatedCentral {
    config: SimulatorConfig,
    events: BleEventSender,
    scan_task: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
    stream_task: Option<JoinHandle<()>>,
    /// Set by the connect task once the link is up
    link_up_at: Rc<Cell<Option<Instant>>>,
}

impl SimulatedCentral {
    pub fn new(events: BleEventSender, config: SimulatorConfig) -> Self {
        Self {
            config,
            events,
            scan_task: None,
            connect_task: None,
            stream_task: None,
            link_up_at: Rc::new(Cell::new(None)),
        }
    }

    fn abort_link_tasks(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
    }
}

impl BleCentral for SimulatedCentral {
    fn is_available(&self) -> bool {
        self.config.adapter_available
    }

    fn start_scan(&mut self) -> Result<(), BleError> {
        if !self.config.adapter_available {
            return Err(BleError::AdapterUnavailable);
        }
        self.stop_scan()?;
        info!("Simulated scan started");

        let events = self.events.clone();
        let name = self.config.device_name.clone();
        let address = self.config.address;
        let interval = self.config.advertise_interval;
        self.scan_task = Some(tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Unrelated advertiser first, then the target
                let _ = events.send(BleEvent::DeviceFound {
                    name: "LE-Speaker".to_string(),
                    address: 0x0011_2233_4455,
                });
                if events
                    .send(BleEvent::DeviceFound {
                        name: name.clone(),
                        address,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        if let Some(task) = self.scan_task.take() {
            debug!("Simulated scan stopped");
            task.abort();
        }
        Ok(())
    }

    fn connect(&mut self, address: u64) -> Result<(), BleError> {
        if address != self.config.address {
            return Err(BleError::Backend(format!(
                "no simulated peripheral at {:#X}",
                address
            )));
        }
        self.abort_link_tasks();
        self.link_up_at.set(None);

        let events = self.events.clone();
        let delay = self.config.connect_delay;
        let link_up_at = self.link_up_at.clone();
        self.connect_task = Some(tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            link_up_at.set(Some(Instant::now()));
            let _ = events.send(BleEvent::ConnectionChanged(LinkState::Connected));
        }));
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), BleError> {
        let Some(up_at) = self.link_up_at.get() else {
            return Err(BleError::NotConnected);
        };
        if up_at.elapsed() < self.config.link_settle {
            return Err(BleError::LinkNotReady);
        }
        let _ = self
            .events
            .send(BleEvent::ServicesReady(self.config.services.clone()));
        Ok(())
    }

    fn enable_notifications(&mut self, service: u16, characteristic: u16) -> Result<(), BleError> {
        if self.link_up_at.get().is_none() {
            return Err(BleError::NotConnected);
        }
        let known = self
            .config
            .services
            .iter()
            .any(|s| s.uuid == service && s.characteristics.contains(&characteristic));
        if !known {
            return Err(BleError::CharacteristicNotFound {
                service,
                characteristic,
            });
        }

        let _ = self
            .events
            .send(BleEvent::NotificationsEnabled { characteristic });

        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
        let events = self.events.clone();
        let interval = self.config.notify_interval;
        let step = self.config.step_degrees.max(1);
        self.stream_task = Some(tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            // Peripheral reports in [-180, 180)
            let mut angle: i16 = -180;
            loop {
                ticker.tick().await;
                let mut value = protocol::encode_heading(angle).to_vec();
                angle += step;
                if angle >= 180 {
                    angle -= 360;
                    value.push(0xFF);
                }
                if events
                    .send(BleEvent::CharacteristicValue {
                        characteristic,
                        value,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.abort_link_tasks();
        if self.link_up_at.take().is_some() {
            info!("Simulated link closed");
            let _ = self
                .events
                .send(BleEvent::ConnectionChanged(LinkState::Disconnected));
        }
    }
}

impl Drop for SimulatedCentral {
    fn drop(&mut self) {
        let _ = self.stop_scan();
        self.abort_link_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::heading::HeadingSlot;
    use crate::domain::models::ConnectionState;
    use crate::infrastructure::bluetooth::heading_source::{BleHeadingSource, HeadingSourceConfig};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn fast_config() -> SimulatorConfig {
        SimulatorConfig {
            advertise_interval: Duration::from_millis(5),
            connect_delay: Duration::from_millis(5),
            link_settle: Duration::from_millis(20),
            notify_interval: Duration::from_millis(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_unavailable_adapter() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut central = SimulatedCentral::new(
            tx,
            SimulatorConfig {
                adapter_available: false,
                ..Default::default()
            },
        );
        assert!(!central.is_available());
        assert_eq!(central.start_scan(), Err(BleError::AdapterUnavailable));
    }

    #[test]
    fn test_requests_before_link() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut central = SimulatedCentral::new(tx, SimulatorConfig::default());
        assert_eq!(central.discover_services(), Err(BleError::NotConnected));
        assert_eq!(
            central.enable_notifications(0x180A, 0x2A57),
            Err(BleError::NotConnected)
        );
        assert!(matches!(central.connect(0x1234), Err(BleError::Backend(_))));
    }

    #[tokio::test]
    async fn test_full_session_streams_headings() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (ble_tx, mut ble_rx) = mpsc::unbounded_channel();
                let (app_tx, _app_rx) = mpsc::unbounded_channel();
                let slot = Arc::new(HeadingSlot::new());
                let config = HeadingSourceConfig {
                    discovery_initial_backoff: Duration::from_millis(5),
                    discovery_max_retries: 10,
                    ..Default::default()
                };
                let mut source = BleHeadingSource::new(
                    SimulatedCentral::new(ble_tx, fast_config()),
                    config,
                    app_tx,
                    slot.clone(),
                );
                source.start_scan().unwrap();

                let run = async {
                    let mut ticker = tokio::time::interval(Duration::from_millis(1));
                    loop {
                        tokio::select! {
                            Some(event) = ble_rx.recv() => source.handle_event(event, Instant::now()),
                            _ = ticker.tick() => source.poll(Instant::now()),
                        }
                        if slot.load().is_some() && source.is_subscribed() {
                            break;
                        }
                    }
                };
                tokio::time::timeout(Duration::from_secs(5), run)
                    .await
                    .expect("simulated session did not produce a heading");

                assert_eq!(source.state(), ConnectionState::Connected);
                let angle = slot.load().unwrap();
                assert!((-180.0..180.0).contains(&angle));

                source.cancel();
                assert_eq!(source.state(), ConnectionState::Disconnected);
            })
            .await;
    }
}
