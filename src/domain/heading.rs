//! Heading display coordination
//!
//! Two producers (the BLE link and the rotation sensor) each publish into
//! their own [`HeadingSlot`]. The [`HeadingCoordinator`] only reads the slots
//! and decides which one to show.

use crate::domain::direction::Octant;
use crate::domain::models::{ConnectionState, HeadingOrigin, HeadingSample};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Single-value handoff between a producer thread and the UI thread.
///
/// The angle is stored as the bit pattern of an `f64`; NaN marks an empty slot.
#[derive(Debug)]
pub struct HeadingSlot {
    bits: AtomicU64,
}

impl HeadingSlot {
    const EMPTY: u64 = 0x7ff8_0000_0000_0000; // canonical quiet NaN

    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(Self::EMPTY),
        }
    }

    pub fn store(&self, angle_degrees: f64) {
        if angle_degrees.is_nan() {
            return;
        }
        self.bits.store(angle_degrees.to_bits(), Ordering::Release);
    }

    pub fn load(&self) -> Option<f64> {
        let value = f64::from_bits(self.bits.load(Ordering::Acquire));
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }

    pub fn clear(&self) {
        self.bits.store(Self::EMPTY, Ordering::Release);
    }
}

impl Default for HeadingSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Rule deciding what happens to the BLE heading once the link drops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeadingPolicy {
    /// Once a BLE angle has been received it stays authoritative for the
    /// rest of the session, even after the link is lost.
    #[default]
    BlePermanent,
    /// Forget the BLE angle on disconnect and show the sensor value again.
    FallbackOnDisconnect,
}

impl HeadingPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BlePermanent => "Keep last BLE heading",
            Self::FallbackOnDisconnect => "Fall back to sensor on disconnect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingReading {
    pub sample: HeadingSample,
    pub octant: Octant,
}

impl HeadingReading {
    pub fn new(sample: HeadingSample) -> Self {
        Self {
            octant: Octant::classify(sample.angle_degrees),
            sample,
        }
    }
}

pub struct HeadingCoordinator {
    ble: Arc<HeadingSlot>,
    sensor: Arc<HeadingSlot>,
    policy: HeadingPolicy,
    prefer_ble: bool,
    /// Shown when no sensor is present and BLE has not produced anything
    fixed_fallback: f64,
}

impl HeadingCoordinator {
    pub fn new(
        ble: Arc<HeadingSlot>,
        sensor: Arc<HeadingSlot>,
        policy: HeadingPolicy,
    ) -> Self {
        Self {
            ble,
            sensor,
            policy,
            prefer_ble: true,
            fixed_fallback: 0.0,
        }
    }

    pub fn set_policy(&mut self, policy: HeadingPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> HeadingPolicy {
        self.policy
    }

    /// When disabled the BLE slot is ignored entirely
    pub fn set_prefer_ble(&mut self, prefer_ble: bool) {
        self.prefer_ble = prefer_ble;
    }

    pub fn set_fixed_fallback(&mut self, angle_degrees: f64) {
        self.fixed_fallback = angle_degrees;
    }

    /// Apply the policy to a link state change reported by the BLE source
    pub fn on_connection_state(&mut self, state: ConnectionState) {
        if state == ConnectionState::Disconnected
            && self.policy == HeadingPolicy::FallbackOnDisconnect
            && self.ble.load().is_some()
        {
            tracing::info!("BLE link lost, returning to sensor heading");
            self.ble.clear();
        }
    }

    pub fn tick(&self) -> HeadingReading {
        if self.prefer_ble {
            if let Some(angle) = self.ble.load() {
                return HeadingReading::new(HeadingSample::new(angle, HeadingOrigin::Ble));
            }
        }

        let sample = match self.sensor.load() {
            Some(angle) => HeadingSample::new(angle, HeadingOrigin::Sensor),
            None => HeadingSample::new(self.fixed_fallback, HeadingOrigin::None),
        };
        HeadingReading::new(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(policy: HeadingPolicy) -> (HeadingCoordinator, Arc<HeadingSlot>, Arc<HeadingSlot>) {
        let ble = Arc::new(HeadingSlot::new());
        let sensor = Arc::new(HeadingSlot::new());
        (
            HeadingCoordinator::new(ble.clone(), sensor.clone(), policy),
            ble,
            sensor,
        )
    }

    #[test]
    fn test_slot_roundtrip_and_clear() {
        let slot = HeadingSlot::new();
        assert_eq!(slot.load(), None);
        slot.store(-10.0);
        assert_eq!(slot.load(), Some(-10.0));
        slot.store(f64::NAN);
        assert_eq!(slot.load(), Some(-10.0));
        slot.clear();
        assert_eq!(slot.load(), None);
    }

    #[test]
    fn test_fixed_value_without_any_producer() {
        let (mut coordinator, _, _) = coordinator(HeadingPolicy::BlePermanent);
        coordinator.set_fixed_fallback(90.0);
        let reading = coordinator.tick();
        assert_eq!(reading.sample.source, HeadingOrigin::None);
        assert_eq!(reading.sample.angle_degrees, 90.0);
        assert_eq!(reading.octant, Octant::East);
    }

    #[test]
    fn test_sensor_used_until_ble_arrives() {
        let (coordinator, ble, sensor) = coordinator(HeadingPolicy::BlePermanent);
        sensor.store(120.0);
        assert_eq!(coordinator.tick().sample.source, HeadingOrigin::Sensor);

        ble.store(-10.0);
        let reading = coordinator.tick();
        assert_eq!(reading.sample.source, HeadingOrigin::Ble);
        assert_eq!(reading.sample.angle_degrees, 350.0);
        assert_eq!(reading.octant, Octant::North);
    }

    #[test]
    fn test_ble_wins_across_repeated_ticks() {
        let (mut coordinator, ble, sensor) = coordinator(HeadingPolicy::BlePermanent);
        ble.store(45.0);
        for angle in [10.0, 200.0, 300.0] {
            sensor.store(angle);
            let reading = coordinator.tick();
            assert_eq!(reading.sample.source, HeadingOrigin::Ble);
            assert_eq!(reading.sample.angle_degrees, 45.0);
        }

        // Permanent policy keeps BLE authoritative after link loss
        coordinator.on_connection_state(ConnectionState::Disconnected);
        assert_eq!(coordinator.tick().sample.source, HeadingOrigin::Ble);
    }

    #[test]
    fn test_fallback_policy_resets_on_disconnect() {
        let (mut coordinator, ble, sensor) = coordinator(HeadingPolicy::FallbackOnDisconnect);
        sensor.store(200.0);
        ble.store(45.0);
        coordinator.on_connection_state(ConnectionState::Connected);
        assert_eq!(coordinator.tick().sample.source, HeadingOrigin::Ble);

        coordinator.on_connection_state(ConnectionState::Disconnected);
        let reading = coordinator.tick();
        assert_eq!(reading.sample.source, HeadingOrigin::Sensor);
        assert_eq!(reading.octant, Octant::South);
    }

    #[test]
    fn test_ble_preference_can_be_disabled() {
        let (mut coordinator, ble, sensor) = coordinator(HeadingPolicy::BlePermanent);
        ble.store(45.0);
        sensor.store(270.0);
        coordinator.set_prefer_ble(false);
        assert_eq!(coordinator.tick().octant, Octant::West);
    }
}
