//! WinRT BLE Central
//!
//! Windows backend built on `Windows.Devices.Bluetooth`. WinRT raises its
//! callbacks on thread-pool threads; every handler only forwards a
//! [`BleEvent`] over the channel and never touches shared state beyond the
//! characteristic cache.
//!
//! Async WinRT operations run as `spawn_local` tasks on the Bluetooth worker.

use crate::infrastructure::bluetooth::central::{
    BleCentral, BleError, BleEvent, BleEventSender, GattServiceInfo, LinkState,
};
use crate::infrastructure::bluetooth::protocol::guid;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattSession, GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothAdapter, BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Devices::Radios::RadioState;
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::DataReader;

type CharacteristicCache = Arc<Mutex<HashMap<(u16, u16), GattCharacteristic>>>;

#[derive(Default)]
struct Link {
    device: Option<BluetoothLEDevice>,
    session: Option<GattSession>,
    status_token: Option<i64>,
    value_tokens: Vec<(GattCharacteristic, i64)>,
}

pub struct WinRtCentral {
    events: BleEventSender,
    available: bool,
    watcher: Option<BluetoothLEAdvertisementWatcher>,
    link: Arc<Mutex<Link>>,
    characteristics: CharacteristicCache,
}

impl WinRtCentral {
    /// Check the default adapter and its radio
    pub async fn new(events: BleEventSender) -> Self {
        let available = match Self::check_adapter().await {
            Ok(available) => available,
            Err(e) => {
                warn!("Bluetooth adapter check failed: {}", e);
                false
            }
        };
        info!("Bluetooth LE adapter available: {}", available);

        Self {
            events,
            available,
            watcher: None,
            link: Arc::new(Mutex::new(Link::default())),
            characteristics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn check_adapter() -> windows::core::Result<bool> {
        let adapter = BluetoothAdapter::GetDefaultAsync()?.await?;
        if !adapter.IsLowEnergySupported()? {
            return Ok(false);
        }
        let radio = adapter.GetRadioAsync()?.await?;
        Ok(radio.State()? == RadioState::On)
    }

    fn backend(e: windows::core::Error) -> BleError {
        BleError::Backend(e.message().to_string())
    }

    fn current_device(&self) -> Option<BluetoothLEDevice> {
        self.link.lock().ok().and_then(|l| l.device.clone())
    }
}

impl BleCentral for WinRtCentral {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start_scan(&mut self) -> Result<(), BleError> {
        if !self.available {
            return Err(BleError::AdapterUnavailable);
        }
        self.stop_scan()?;

        let watcher = BluetoothLEAdvertisementWatcher::new().map_err(Self::backend)?;
        watcher
            .SetScanningMode(BluetoothLEScanningMode::Active)
            .map_err(Self::backend)?;

        let sender = self.events.clone();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let name = args.Advertisement()?.LocalName()?.to_string();
                    // Scan responses without a name cannot match the target
                    if !name.is_empty() {
                        let address = args.BluetoothAddress()?;
                        let _ = sender.send(BleEvent::DeviceFound { name, address });
                    }
                }
                Ok(())
            },
        );

        watcher.Received(&handler).map_err(Self::backend)?;
        watcher.Start().map_err(Self::backend)?;
        info!("BLE advertisement watcher started");
        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        if let Some(watcher) = self.watcher.take() {
            info!("Stopping BLE scan...");
            watcher.Stop().map_err(Self::backend)?;
        }
        Ok(())
    }

    fn connect(&mut self, address: u64) -> Result<(), BleError> {
        let events = self.events.clone();
        let link = self.link.clone();

        tokio::task::spawn_local(async move {
            info!("Connecting to Bluetooth device: {:#X}", address);
            let device = match BluetoothLEDevice::FromBluetoothAddressAsync(address) {
                Ok(op) => match op.await {
                    Ok(device) => device,
                    Err(e) => {
                        error!("Device lookup failed: {}", e);
                        let _ = events.send(BleEvent::ConnectionChanged(LinkState::Disconnected));
                        return;
                    }
                },
                Err(e) => {
                    error!("Device lookup failed: {}", e);
                    let _ = events.send(BleEvent::ConnectionChanged(LinkState::Disconnected));
                    return;
                }
            };

            let sender = events.clone();
            let status_handler =
                TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                    if let Some(dev) = dev.as_ref() {
                        let state = match dev.ConnectionStatus()? {
                            BluetoothConnectionStatus::Connected => LinkState::Connected,
                            _ => LinkState::Disconnected,
                        };
                        let _ = sender.send(BleEvent::ConnectionChanged(state));
                    }
                    Ok(())
                });
            let status_token = device.ConnectionStatusChanged(&status_handler).ok();

            // A GattSession with MaintainConnection makes Windows open the link
            let session = match device.BluetoothDeviceId() {
                Ok(id) => match GattSession::FromDeviceIdAsync(&id) {
                    Ok(op) => op.await.ok(),
                    Err(_) => None,
                },
                Err(_) => None,
            };
            match &session {
                Some(session) => {
                    let _ = session.SetMaintainConnection(true);
                }
                None => warn!("Failed to create GattSession, continuing anyway..."),
            }

            let connected = device
                .ConnectionStatus()
                .map(|s| s == BluetoothConnectionStatus::Connected)
                .unwrap_or(false);

            if let Ok(mut guard) = link.lock() {
                guard.device = Some(device);
                guard.session = session;
                guard.status_token = status_token;
            }

            if connected {
                let _ = events.send(BleEvent::ConnectionChanged(LinkState::Connected));
            } else {
                debug!("Waiting for Windows to report the link as connected");
            }
        });
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), BleError> {
        let device = self.current_device().ok_or(BleError::NotConnected)?;
        let connected = device
            .ConnectionStatus()
            .map(|s| s == BluetoothConnectionStatus::Connected)
            .unwrap_or(false);
        if !connected {
            return Err(BleError::LinkNotReady);
        }

        let events = self.events.clone();
        let cache = self.characteristics.clone();
        tokio::task::spawn_local(async move {
            match discover(&device, &cache).await {
                Ok(services) => {
                    info!("Discovered {} GATT services", services.len());
                    let _ = events.send(BleEvent::ServicesReady(services));
                }
                Err(e) => error!("Failed to get GATT services: {}", e),
            }
        });
        Ok(())
    }

    fn enable_notifications(&mut self, service: u16, characteristic: u16) -> Result<(), BleError> {
        let target = self
            .characteristics
            .lock()
            .map_err(|_| BleError::Backend("characteristic cache poisoned".into()))?
            .get(&(service, characteristic))
            .cloned()
            .ok_or(BleError::CharacteristicNotFound {
                service,
                characteristic,
            })?;

        let sender = self.events.clone();
        let value_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let buffer = args.CharacteristicValue()?;
                    let reader = DataReader::FromBuffer(&buffer)?;
                    let mut value = vec![0u8; reader.UnconsumedBufferLength()? as usize];
                    reader.ReadBytes(&mut value)?;
                    let _ = sender.send(BleEvent::CharacteristicValue {
                        characteristic,
                        value,
                    });
                }
                Ok(())
            },
        );
        let token = target.ValueChanged(&value_handler).map_err(Self::backend)?;
        if let Ok(mut guard) = self.link.lock() {
            guard.value_tokens.push((target.clone(), token));
        }

        let events = self.events.clone();
        tokio::task::spawn_local(async move {
            info!("Enabling notifications...");
            let status = match target.WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            ) {
                Ok(op) => op.await,
                Err(e) => Err(e),
            };
            match status {
                Ok(GattCommunicationStatus::Success) => {
                    let _ = events.send(BleEvent::NotificationsEnabled { characteristic });
                }
                Ok(status) => warn!("Notification subscription returned status: {:?}", status),
                Err(e) => error!("Notification subscription failed: {}", e),
            }
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let link = match self.link.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for (characteristic, token) in link.value_tokens {
            let _ = characteristic.RemoveValueChanged(token);
        }
        if let Some(session) = link.session {
            let _ = session.Close();
        }
        if let Some(device) = link.device {
            if let Some(token) = link.status_token {
                let _ = device.RemoveConnectionStatusChanged(token);
            }
            let _ = device.Close();
            info!("Disconnected from device");
            let _ = self
                .events
                .send(BleEvent::ConnectionChanged(LinkState::Disconnected));
        }
        if let Ok(mut cache) = self.characteristics.lock() {
            cache.clear();
        }
    }
}

impl Drop for WinRtCentral {
    fn drop(&mut self) {
        let _ = self.stop_scan();
        self.disconnect();
    }
}

async fn discover(
    device: &BluetoothLEDevice,
    cache: &CharacteristicCache,
) -> windows::core::Result<Vec<GattServiceInfo>> {
    let result = device.GetGattServicesAsync()?.await?;
    if result.Status()? != GattCommunicationStatus::Success {
        warn!("GATT service query returned {:?}", result.Status()?);
        return Ok(Vec::new());
    }

    let mut services = Vec::new();
    let list = result.Services()?;
    for i in 0..list.Size()? {
        let service = list.GetAt(i)?;
        let Some(service_uuid) = guid::to_uuid16(&service.Uuid()?) else {
            continue;
        };

        let chars = service.GetCharacteristicsAsync()?.await?;
        let mut info = GattServiceInfo {
            uuid: service_uuid,
            characteristics: Vec::new(),
        };
        if chars.Status()? == GattCommunicationStatus::Success {
            let list = chars.Characteristics()?;
            for j in 0..list.Size()? {
                let characteristic = list.GetAt(j)?;
                if let Some(uuid) = guid::to_uuid16(&characteristic.Uuid()?) {
                    info.characteristics.push(uuid);
                    if let Ok(mut cache) = cache.lock() {
                        cache.insert((service_uuid, uuid), characteristic);
                    }
                }
            }
        }
        services.push(info);
    }
    Ok(services)
}
