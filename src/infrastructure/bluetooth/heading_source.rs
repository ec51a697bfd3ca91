//! BLE Heading Source
//!
//! Connection state machine for the heading peripheral:
//!
//! ```text
//! DISCONNECTED --start_scan--> SCANNING --name match--> CONNECTING
//!      ^                                                    |
//!      +------------- link lost / cancel ----------- CONNECTED <-+
//! ```
//!
//! The source never blocks. It issues requests to a [`BleCentral`] and reacts
//! to the events the backend delivers. Decoded angles are published into a
//! [`HeadingSlot`]; progress and failures go to the application log.

use crate::domain::heading::HeadingSlot;
use crate::domain::models::{AppEvent, ConnectionState, MessageSeverity, StatusMessage};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::central::{
    BleCentral, BleError, BleEvent, GattServiceInfo, LinkState,
};
use crate::infrastructure::bluetooth::protocol;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Configuration for the heading source
#[derive(Debug, Clone)]
pub struct HeadingSourceConfig {
    /// Exact advertised name to connect to
    pub target_name: String,
    pub service_uuid: u16,
    pub characteristic_uuid: u16,
    /// Discovery attempts after the first one fails with `LinkNotReady`
    pub discovery_max_retries: u32,
    /// Delay before the first retry; doubles on every further attempt
    pub discovery_initial_backoff: Duration,
}

impl Default for HeadingSourceConfig {
    fn default() -> Self {
        Self {
            target_name: protocol::TARGET_DEVICE_NAME.to_string(),
            service_uuid: protocol::HEADING_SERVICE_UUID16,
            characteristic_uuid: protocol::HEADING_CHAR_UUID16,
            discovery_max_retries: 5,
            discovery_initial_backoff: Duration::from_millis(250),
        }
    }
}

impl HeadingSourceConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            target_name: settings.ble_target_name.clone(),
            service_uuid: settings.ble_service_uuid16,
            characteristic_uuid: settings.ble_characteristic_uuid16,
            discovery_max_retries: settings.discovery_max_retries,
            discovery_initial_backoff: Duration::from_millis(settings.discovery_initial_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiscoveryRetry {
    attempt: u32,
    due: Instant,
}

pub struct BleHeadingSource<C: BleCentral> {
    central: C,
    config: HeadingSourceConfig,
    state: ConnectionState,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    ble_slot: Arc<HeadingSlot>,
    peer: Option<u64>,
    pending_discovery: Option<DiscoveryRetry>,
    subscribed: bool,
}

impl<C: BleCentral> BleHeadingSource<C> {
    pub fn new(
        central: C,
        config: HeadingSourceConfig,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        ble_slot: Arc<HeadingSlot>,
    ) -> Self {
        Self {
            central,
            config,
            state: ConnectionState::Disconnected,
            event_sender,
            ble_slot,
            peer: None,
            pending_discovery: None,
            subscribed: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Notifications are flowing from the heading characteristic
    #[cfg(test)]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    #[cfg(test)]
    pub fn central(&self) -> &C {
        &self.central
    }

    /// Begin scanning for the target peripheral
    pub fn start_scan(&mut self) -> Result<(), BleError> {
        if self.state != ConnectionState::Disconnected {
            debug!("Scan requested while {:?}; ignoring", self.state);
            return Ok(());
        }

        if !self.central.is_available() {
            error!("Cannot scan: Bluetooth adapter unavailable");
            self.send_log(
                "Bluetooth adapter unavailable or disabled",
                MessageSeverity::Error,
            );
            return Err(BleError::AdapterUnavailable);
        }

        if let Err(e) = self.central.start_scan() {
            error!("Failed to start scan: {}", e);
            self.send_log(format!("Failed to start scan: {}", e), MessageSeverity::Error);
            return Err(e);
        }

        info!("Scanning for {}", self.config.target_name);
        self.send_log(
            format!("Scanning for {}...", self.config.target_name),
            MessageSeverity::Info,
        );
        self.set_state(ConnectionState::Scanning);
        Ok(())
    }

    /// Stop an active scan or close a pending/active link
    pub fn cancel(&mut self) {
        match self.state {
            ConnectionState::Disconnected => {}
            ConnectionState::Scanning => {
                if let Err(e) = self.central.stop_scan() {
                    warn!("Failed to stop scan: {}", e);
                }
                info!("Scan cancelled");
                self.send_log("Scan cancelled", MessageSeverity::Info);
                self.reset_link();
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.central.disconnect();
                info!("Link closed on request");
                self.send_log("Disconnected", MessageSeverity::Info);
                self.reset_link();
            }
        }
    }

    /// Release every platform resource regardless of state
    pub fn shutdown(&mut self) {
        let _ = self.central.stop_scan();
        self.central.disconnect();
        if self.state != ConnectionState::Disconnected {
            info!("Bluetooth link closed for shutdown");
            self.reset_link();
        }
    }

    pub fn handle_event(&mut self, event: BleEvent, now: Instant) {
        match event {
            BleEvent::DeviceFound { name, address } => self.on_device_found(&name, address),
            BleEvent::ConnectionChanged(link) => self.on_connection_changed(link, now),
            BleEvent::ServicesReady(services) => self.on_services_ready(&services),
            BleEvent::NotificationsEnabled { characteristic } => {
                self.on_notifications_enabled(characteristic)
            }
            BleEvent::CharacteristicValue {
                characteristic,
                value,
            } => self.on_characteristic_value(characteristic, &value),
        }
    }

    pub fn on_device_found(&mut self, name: &str, address: u64) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        if name != self.config.target_name {
            debug!("Ignoring advertisement from {:?} ({:#X})", name, address);
            return;
        }

        // Single target: stop scanning as soon as the peripheral shows up
        if let Err(e) = self.central.stop_scan() {
            warn!("Failed to stop scan: {}", e);
        }

        info!("Found {} at {:#X}, connecting", name, address);
        self.send_log(format!("Found {}, connecting...", name), MessageSeverity::Info);
        self.peer = Some(address);
        self.set_state(ConnectionState::Connecting);

        if let Err(e) = self.central.connect(address) {
            error!("Connection to {:#X} failed: {}", address, e);
            self.send_log(format!("Connection failed: {}", e), MessageSeverity::Error);
            self.reset_link();
        }
    }

    pub fn on_connection_changed(&mut self, link: LinkState, now: Instant) {
        match link {
            LinkState::Connected => {
                if self.state != ConnectionState::Connecting {
                    debug!("Link up reported while {:?}; ignoring", self.state);
                    return;
                }
                info!("Link established with {:#X}", self.peer.unwrap_or_default());
                self.send_log("Connected", MessageSeverity::Success);
                self.set_state(ConnectionState::Connected);
                self.request_discovery(1, now);
            }
            LinkState::Disconnected => {
                if !matches!(
                    self.state,
                    ConnectionState::Connecting | ConnectionState::Connected
                ) {
                    return;
                }
                warn!("Link lost");
                self.send_log("Disconnected from peripheral", MessageSeverity::Warning);
                self.reset_link();
            }
        }
    }

    /// Drive pending discovery retries
    pub fn poll(&mut self, now: Instant) {
        let Some(retry) = self.pending_discovery else {
            return;
        };
        if now < retry.due {
            return;
        }
        self.pending_discovery = None;
        if self.state == ConnectionState::Connected {
            self.request_discovery(retry.attempt, now);
        }
    }

    fn request_discovery(&mut self, attempt: u32, now: Instant) {
        match self.central.discover_services() {
            Ok(()) => {
                debug!("Service discovery requested (attempt {})", attempt);
            }
            Err(BleError::LinkNotReady) => {
                if attempt > self.config.discovery_max_retries {
                    warn!("Service discovery gave up after {} attempts", attempt);
                    self.send_log(
                        "Link never became ready for service discovery",
                        MessageSeverity::Warning,
                    );
                    return;
                }
                let delay = self.backoff(attempt);
                debug!("Link not ready, retrying discovery in {:?}", delay);
                self.pending_discovery = Some(DiscoveryRetry {
                    attempt: attempt + 1,
                    due: now + delay,
                });
            }
            Err(e) => {
                error!("Service discovery failed: {}", e);
                self.send_log(
                    format!("Service discovery failed: {}", e),
                    MessageSeverity::Error,
                );
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.config.discovery_initial_backoff * factor
    }

    pub fn on_services_ready(&mut self, services: &[GattServiceInfo]) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let service_uuid = self.config.service_uuid;
        let characteristic_uuid = self.config.characteristic_uuid;

        let Some(service) = services.iter().find(|s| s.uuid == service_uuid) else {
            warn!("Service {:#06X} not found", service_uuid);
            self.send_log(
                format!(
                    "Heading service {:#06X} not found; no headings will arrive",
                    service_uuid
                ),
                MessageSeverity::Warning,
            );
            return;
        };

        if !service.characteristics.contains(&characteristic_uuid) {
            warn!("Characteristic {:#06X} not found", characteristic_uuid);
            self.send_log(
                format!(
                    "Heading characteristic {:#06X} not found; no headings will arrive",
                    characteristic_uuid
                ),
                MessageSeverity::Warning,
            );
            return;
        }

        info!("Enabling notifications on {:#06X}", characteristic_uuid);
        if let Err(e) = self
            .central
            .enable_notifications(service_uuid, characteristic_uuid)
        {
            error!("Could not enable notifications: {}", e);
            self.send_log(
                format!("Could not enable notifications: {}", e),
                MessageSeverity::Error,
            );
        }
    }

    pub fn on_notifications_enabled(&mut self, characteristic: u16) {
        if self.state != ConnectionState::Connected
            || characteristic != self.config.characteristic_uuid
        {
            return;
        }
        self.subscribed = true;
        info!("Notifications enabled");
        self.send_log("Receiving heading updates", MessageSeverity::Success);
    }

    pub fn on_characteristic_value(&mut self, characteristic: u16, value: &[u8]) {
        if characteristic != self.config.characteristic_uuid {
            return;
        }
        // Values still queued from a closed link must not reach the slot
        if self.state != ConnectionState::Connected || !self.subscribed {
            debug!("Dropping notification received while {:?}", self.state);
            return;
        }
        match protocol::decode_heading(value) {
            Ok(angle) => {
                self.ble_slot.store(angle as f64);
                let _ = self.event_sender.send(AppEvent::BleAngle(angle));
            }
            Err(e) => {
                warn!("Dropping malformed heading payload {:02X?}: {}", value, e);
                self.send_log(
                    format!("Malformed heading payload: {}", e),
                    MessageSeverity::Warning,
                );
            }
        }
    }

    fn reset_link(&mut self) {
        self.peer = None;
        self.pending_discovery = None;
        self.subscribed = false;
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!("Connection state {:?} -> {:?}", self.state, state);
        self.state = state;
        let _ = self.event_sender.send(AppEvent::ConnectionState(state));
    }

    fn send_log(&self, message: impl Into<String>, severity: MessageSeverity) {
        let _ = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::{HEADING_CHAR_UUID16, HEADING_SERVICE_UUID16};
    use std::collections::VecDeque;

    /// Scripted central recording every request
    #[derive(Default)]
    struct MockCentral {
        available: bool,
        scans_started: u32,
        scans_stopped: u32,
        connects: Vec<u64>,
        discoveries: u32,
        discovery_results: VecDeque<Result<(), BleError>>,
        subscriptions: Vec<(u16, u16)>,
        disconnects: u32,
    }

    impl BleCentral for MockCentral {
        fn is_available(&self) -> bool {
            self.available
        }
        fn start_scan(&mut self) -> Result<(), BleError> {
            self.scans_started += 1;
            Ok(())
        }
        fn stop_scan(&mut self) -> Result<(), BleError> {
            self.scans_stopped += 1;
            Ok(())
        }
        fn connect(&mut self, address: u64) -> Result<(), BleError> {
            self.connects.push(address);
            Ok(())
        }
        fn discover_services(&mut self) -> Result<(), BleError> {
            self.discoveries += 1;
            self.discovery_results.pop_front().unwrap_or(Ok(()))
        }
        fn enable_notifications(
            &mut self,
            service: u16,
            characteristic: u16,
        ) -> Result<(), BleError> {
            self.subscriptions.push((service, characteristic));
            Ok(())
        }
        fn disconnect(&mut self) {
            self.disconnects += 1;
        }
    }

    struct Harness {
        source: BleHeadingSource<MockCentral>,
        events: mpsc::UnboundedReceiver<AppEvent>,
        slot: Arc<HeadingSlot>,
    }

    impl Harness {
        fn new(central: MockCentral) -> Self {
            let (tx, events) = mpsc::unbounded_channel();
            let slot = Arc::new(HeadingSlot::new());
            Self {
                source: BleHeadingSource::new(
                    central,
                    HeadingSourceConfig::default(),
                    tx,
                    slot.clone(),
                ),
                events,
                slot,
            }
        }

        fn available() -> Self {
            Self::new(MockCentral {
                available: true,
                ..Default::default()
            })
        }

        fn drain(&mut self) -> Vec<AppEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn states(&mut self) -> Vec<ConnectionState> {
            self.drain()
                .into_iter()
                .filter_map(|e| match e {
                    AppEvent::ConnectionState(s) => Some(s),
                    _ => None,
                })
                .collect()
        }

        fn connect(&mut self, now: Instant) {
            self.source.start_scan().unwrap();
            self.source.on_device_found("Arduino_GCS", 0xAABB);
            self.source.on_connection_changed(LinkState::Connected, now);
        }

        fn subscribe(&mut self, now: Instant) {
            self.connect(now);
            self.source.on_services_ready(&heading_services());
            self.source.on_notifications_enabled(HEADING_CHAR_UUID16);
        }
    }

    fn heading_services() -> Vec<GattServiceInfo> {
        vec![
            GattServiceInfo {
                uuid: 0x1800,
                characteristics: vec![0x2A00],
            },
            GattServiceInfo {
                uuid: HEADING_SERVICE_UUID16,
                characteristics: vec![HEADING_CHAR_UUID16],
            },
        ]
    }

    fn log_lines(events: &[AppEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, AppEvent::LogMessage(_)))
            .count()
    }

    #[test]
    fn test_successful_session_state_sequence() {
        let mut h = Harness::available();
        let now = Instant::now();
        h.connect(now);

        assert_eq!(
            h.states(),
            vec![
                ConnectionState::Scanning,
                ConnectionState::Connecting,
                ConnectionState::Connected
            ]
        );
        assert_eq!(h.source.central().scans_stopped, 1);
        assert_eq!(h.source.central().connects, vec![0xAABB]);
        assert_eq!(h.source.central().discoveries, 1);

        h.source.on_services_ready(&heading_services());
        assert_eq!(
            h.source.central().subscriptions,
            vec![(HEADING_SERVICE_UUID16, HEADING_CHAR_UUID16)]
        );
        h.source.on_notifications_enabled(HEADING_CHAR_UUID16);
        assert!(h.source.is_subscribed());
    }

    #[test]
    fn test_scan_with_adapter_disabled() {
        let mut h = Harness::new(MockCentral::default());
        assert_eq!(h.source.start_scan(), Err(BleError::AdapterUnavailable));
        assert_eq!(h.source.state(), ConnectionState::Disconnected);
        assert_eq!(h.source.central().scans_started, 0);

        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(log_lines(&events), 1);
    }

    #[test]
    fn test_other_advertisers_ignored() {
        let mut h = Harness::available();
        h.source.start_scan().unwrap();
        h.source.on_device_found("Arduino_GCS_2", 1);
        h.source.on_device_found("arduino_gcs", 2);
        h.source.on_device_found("", 3);
        assert_eq!(h.source.state(), ConnectionState::Scanning);
        assert!(h.source.central().connects.is_empty());
    }

    #[test]
    fn test_advertisement_outside_scan_ignored() {
        let mut h = Harness::available();
        h.source.on_device_found("Arduino_GCS", 1);
        assert_eq!(h.source.state(), ConnectionState::Disconnected);
        assert!(h.source.central().connects.is_empty());
    }

    #[test]
    fn test_link_loss_from_connecting_and_connected() {
        let mut h = Harness::available();
        h.source.start_scan().unwrap();
        h.source.on_device_found("Arduino_GCS", 7);
        h.source
            .on_connection_changed(LinkState::Disconnected, Instant::now());
        assert_eq!(h.source.state(), ConnectionState::Disconnected);

        let mut h = Harness::available();
        h.connect(Instant::now());
        h.drain();
        h.source
            .on_connection_changed(LinkState::Disconnected, Instant::now());
        assert_eq!(h.states(), vec![ConnectionState::Disconnected]);
        // no automatic rescan
        assert_eq!(h.source.central().scans_started, 1);
    }

    #[test]
    fn test_notification_decodes_into_slot() {
        let mut h = Harness::available();
        h.subscribe(Instant::now());
        h.drain();

        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0xF6, 0xFF]);
        assert_eq!(h.slot.load(), Some(-10.0));
        let events = h.drain();
        assert!(matches!(events.as_slice(), [AppEvent::BleAngle(-10)]));
    }

    #[test]
    fn test_notifications_ignored_after_cancel_or_link_loss() {
        let mut h = Harness::available();
        h.subscribe(Instant::now());
        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x10, 0x00]);
        assert_eq!(h.slot.load(), Some(16.0));

        // Coordinator clears the slot once the link is reported down
        h.source.cancel();
        h.slot.clear();
        h.drain();

        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x20, 0x00]);
        assert_eq!(h.slot.load(), None);
        assert!(h.drain().is_empty());

        h.subscribe(Instant::now());
        h.source
            .on_connection_changed(LinkState::Disconnected, Instant::now());
        h.slot.clear();
        h.drain();
        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x30, 0x00]);
        assert_eq!(h.slot.load(), None);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_sensor_heading_returns_after_cancel_with_fallback_policy() {
        use crate::domain::heading::{HeadingCoordinator, HeadingPolicy};
        use crate::domain::models::HeadingOrigin;

        let mut h = Harness::available();
        let sensor = Arc::new(HeadingSlot::new());
        sensor.store(200.0);
        let mut coordinator = HeadingCoordinator::new(
            h.slot.clone(),
            sensor,
            HeadingPolicy::FallbackOnDisconnect,
        );

        h.subscribe(Instant::now());
        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x10, 0x00]);
        assert_eq!(coordinator.tick().sample.source, HeadingOrigin::Ble);

        h.source.cancel();
        coordinator.on_connection_state(ConnectionState::Disconnected);
        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x20, 0x00]);

        let reading = coordinator.tick();
        assert_eq!(reading.sample.source, HeadingOrigin::Sensor);
        assert_eq!(reading.sample.angle_degrees, 200.0);
    }

    #[test]
    fn test_values_before_subscription_are_dropped() {
        let mut h = Harness::available();
        h.connect(Instant::now());
        h.drain();
        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x10, 0x00]);
        assert_eq!(h.slot.load(), None);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_malformed_payload_logged_once_without_state_change() {
        let mut h = Harness::available();
        h.subscribe(Instant::now());
        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x10, 0x00]);
        h.drain();

        h.source
            .on_characteristic_value(HEADING_CHAR_UUID16, &[0x01, 0x02, 0x03]);
        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(log_lines(&events), 1);
        assert_eq!(h.source.state(), ConnectionState::Connected);
        assert_eq!(h.slot.load(), Some(16.0));
    }

    #[test]
    fn test_missing_service_is_warned_but_stays_connected() {
        let mut h = Harness::available();
        h.connect(Instant::now());
        h.drain();

        h.source.on_services_ready(&[GattServiceInfo {
            uuid: 0x1800,
            characteristics: vec![0x2A00],
        }]);
        assert_eq!(h.source.state(), ConnectionState::Connected);
        assert!(h.source.central().subscriptions.is_empty());
        match h.drain().as_slice() {
            [AppEvent::LogMessage(msg)] => assert_eq!(msg.severity, MessageSeverity::Warning),
            other => panic!("unexpected events: {:?}", other),
        }

        h.source.on_services_ready(&[GattServiceInfo {
            uuid: HEADING_SERVICE_UUID16,
            characteristics: vec![0x2A29],
        }]);
        assert!(h.source.central().subscriptions.is_empty());
        assert_eq!(log_lines(&h.drain()), 1);
    }

    #[test]
    fn test_discovery_retries_with_backoff() {
        let mut central = MockCentral {
            available: true,
            ..Default::default()
        };
        central.discovery_results = VecDeque::from([
            Err(BleError::LinkNotReady),
            Err(BleError::LinkNotReady),
            Ok(()),
        ]);
        let mut h = Harness::new(central);
        let start = Instant::now();
        h.connect(start);
        assert_eq!(h.source.central().discoveries, 1);

        // First retry after 250ms, not before
        h.source.poll(start + Duration::from_millis(100));
        assert_eq!(h.source.central().discoveries, 1);
        h.source.poll(start + Duration::from_millis(250));
        assert_eq!(h.source.central().discoveries, 2);

        // Second retry waits twice as long
        let second = start + Duration::from_millis(250);
        h.source.poll(second + Duration::from_millis(400));
        assert_eq!(h.source.central().discoveries, 2);
        h.source.poll(second + Duration::from_millis(500));
        assert_eq!(h.source.central().discoveries, 3);

        // Succeeded; nothing left pending
        h.source.poll(second + Duration::from_secs(60));
        assert_eq!(h.source.central().discoveries, 3);
    }

    #[test]
    fn test_discovery_gives_up_after_max_retries() {
        let mut central = MockCentral {
            available: true,
            ..Default::default()
        };
        central.discovery_results = (0..20).map(|_| Err(BleError::LinkNotReady)).collect();
        let mut h = Harness::new(central);
        let mut now = Instant::now();
        h.connect(now);

        for _ in 0..20 {
            now += Duration::from_secs(60);
            h.source.poll(now);
        }
        // initial attempt + 5 retries
        assert_eq!(h.source.central().discoveries, 6);
        assert_eq!(h.source.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_no_discovery_retry_after_link_loss() {
        let mut central = MockCentral {
            available: true,
            ..Default::default()
        };
        central.discovery_results = VecDeque::from([Err(BleError::LinkNotReady)]);
        let mut h = Harness::new(central);
        let now = Instant::now();
        h.connect(now);
        h.source.on_connection_changed(LinkState::Disconnected, now);
        h.source.poll(now + Duration::from_secs(10));
        assert_eq!(h.source.central().discoveries, 1);
    }

    #[test]
    fn test_cancel_scan_and_link() {
        let mut h = Harness::available();
        h.source.start_scan().unwrap();
        h.source.cancel();
        assert_eq!(h.source.state(), ConnectionState::Disconnected);
        assert_eq!(h.source.central().scans_stopped, 1);

        h.source.start_scan().unwrap();
        h.source.on_device_found("Arduino_GCS", 9);
        h.source.cancel();
        assert_eq!(h.source.state(), ConnectionState::Disconnected);
        assert_eq!(h.source.central().disconnects, 1);

        // Late link-up from the cancelled attempt is ignored
        h.source
            .on_connection_changed(LinkState::Connected, Instant::now());
        assert_eq!(h.source.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_shutdown_always_closes() {
        let mut h = Harness::available();
        h.source.shutdown();
        assert_eq!(h.source.central().disconnects, 1);

        h.connect(Instant::now());
        h.source.shutdown();
        assert_eq!(h.source.central().disconnects, 2);
        assert_eq!(h.source.state(), ConnectionState::Disconnected);
    }
}
