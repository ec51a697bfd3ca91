use crate::domain::heading::{HeadingCoordinator, HeadingReading, HeadingSlot};
use crate::domain::models::{
    AppEvent, BluetoothCommand, ConnectionState, MessageSeverity, StatusLog, StatusMessage,
};
use crate::domain::navigation::{transition, Effect, Screen, UiEvent, UiState};
use crate::domain::orientation::SensorFallbackReader;
use crate::domain::photos::{self, Photo, PhotoStore};
use crate::domain::settings::{Settings, SettingsService, TOGGLE_ARDUINO, TOGGLE_AUTO};
use crate::infrastructure::bluetooth::heading_source::HeadingSourceConfig;
use crate::infrastructure::bluetooth::{BackendKind, BluetoothService};
use crate::infrastructure::logging::LoggingGuard;
use crate::infrastructure::sensor::{RotationSensor, SensorRegistration, SimulatedRotationSensor};
use crate::presentation::theme::{self, BrutalistPalette};
use eframe::egui;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Display coordinator cadence
const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// How often the event channel is drained while idle
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CAPTURE_SIZE: (u32, u32) = (320, 240);

pub struct ScannerApp {
    // Services
    pub(crate) settings: Arc<Mutex<SettingsService>>,
    pub(crate) bluetooth: Option<BluetoothService>,
    pub(crate) event_rx: mpsc::UnboundedReceiver<AppEvent>,
    sensor_registration: Option<SensorRegistration>,
    sensor_slot: Arc<HeadingSlot>,
    pub(crate) photos: Option<PhotoStore>,

    // Heading
    pub(crate) coordinator: HeadingCoordinator,
    pub(crate) reading: HeadingReading,
    /// Raw angle last sent by the peripheral, before wrapping
    pub(crate) last_ble_angle: Option<i16>,
    pub(crate) connection_state: ConnectionState,
    next_tick: Instant,

    // UI State
    pub(crate) ui_state: UiState,
    pub(crate) status_log: StatusLog,
    pub(crate) gallery: Vec<Photo>,
    pub(crate) rename_input: String,
    frames: FrameCache,
    pub(crate) is_dark_mode: bool,

    // Logging guard
    _logging_guard: Option<LoggingGuard>,
}

impl ScannerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings_service: SettingsService,
        logging_guard: Option<LoggingGuard>,
    ) -> Self {
        theme::configure_neubrutalism(&cc.egui_ctx, false);

        let settings: Settings = settings_service.get().clone();
        let prefer_ble = settings_service.get_toggle(TOGGLE_ARDUINO).unwrap_or(true);
        let auto_scan = settings_service.get_toggle(TOGGLE_AUTO).unwrap_or(false);

        let ble_slot = Arc::new(HeadingSlot::new());
        let sensor_slot = Arc::new(HeadingSlot::new());
        let mut coordinator =
            HeadingCoordinator::new(ble_slot.clone(), sensor_slot.clone(), settings.heading_policy);
        coordinator.set_prefer_ble(prefer_ble);
        coordinator.set_fixed_fallback(settings.fallback_heading_degrees);

        let mut status_log = StatusLog::default();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let bluetooth = match BluetoothService::spawn(
            event_tx,
            ble_slot,
            HeadingSourceConfig::from_settings(&settings),
            BackendKind::from_settings(settings.use_simulated_ble),
        ) {
            Ok(service) => Some(service),
            Err(e) => {
                error!("Failed to start Bluetooth worker: {:?}", e);
                status_log.push(StatusMessage::new(
                    format!("Bluetooth unavailable: {}", e),
                    MessageSeverity::Error,
                ));
                None
            }
        };

        let photos = match PhotoStore::open(&settings.photo_dir) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Photo storage unavailable: {}", e);
                status_log.push(StatusMessage::new(
                    format!("Photo storage unavailable: {}", e),
                    MessageSeverity::Warning,
                ));
                None
            }
        };

        let reading = coordinator.tick();
        let settings = Arc::new(Mutex::new(settings_service));

        let mut app = Self {
            settings,
            bluetooth,
            event_rx,
            sensor_registration: None,
            sensor_slot,
            photos,
            coordinator,
            reading,
            last_ble_angle: None,
            connection_state: ConnectionState::Disconnected,
            next_tick: Instant::now() + TICK_INTERVAL,
            ui_state: UiState::new(Screen::Compass, auto_scan),
            status_log,
            gallery: Vec::new(),
            rename_input: String::new(),
            frames: FrameCache::default(),
            is_dark_mode: false,
            _logging_guard: logging_guard,
        };

        app.register_sensor();
        if auto_scan {
            app.dispatch(UiEvent::StartScan);
        }
        info!("Scan Compass ready");
        app
    }

    pub(crate) fn palette(&self) -> BrutalistPalette {
        BrutalistPalette::new(self.is_dark_mode)
    }

    pub(crate) fn log(&mut self, message: impl Into<String>, severity: MessageSeverity) {
        let message = message.into();
        match severity {
            MessageSeverity::Error => error!("{}", message),
            MessageSeverity::Warning => warn!("{}", message),
            _ => info!("{}", message),
        }
        self.status_log.push(StatusMessage::new(message, severity));
    }

    /// Run a UI event through the screen state machine and carry out its effects
    pub(crate) fn dispatch(&mut self, event: UiEvent) {
        let (next, effects) = transition(&self.ui_state, event);
        if next.screen != self.ui_state.screen {
            self.rename_input.clear();
        }
        self.ui_state = next;
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::StartBleScan => self.send_bluetooth(BluetoothCommand::StartScan),
            Effect::StopBle => self.send_bluetooth(BluetoothCommand::Cancel),
            Effect::SetBlePreference(prefer_ble) => {
                self.coordinator.set_prefer_ble(prefer_ble);
                self.refresh_reading();
            }
            Effect::SavePhoto => self.capture_frame(),
            Effect::RenamePhoto { path, new_name } => {
                self.frames.forget(&path);
                let result = match &self.photos {
                    Some(store) => store.rename(&path, &new_name).map(|_| ()),
                    None => return self.log("Photo storage unavailable", MessageSeverity::Error),
                };
                match result {
                    Ok(()) => self.log(format!("Renamed to {}", new_name.trim()), MessageSeverity::Success),
                    Err(e) => self.log(format!("Rename failed: {}", e), MessageSeverity::Error),
                }
            }
            Effect::DeletePhoto(path) => {
                self.frames.forget(&path);
                let result = match &self.photos {
                    Some(store) => store.delete(&path),
                    None => return self.log("Photo storage unavailable", MessageSeverity::Error),
                };
                match result {
                    Ok(()) => self.log(format!("Deleted {}", path.display()), MessageSeverity::Info),
                    Err(e) => self.log(format!("Delete failed: {}", e), MessageSeverity::Error),
                }
            }
            Effect::RefreshGallery => self.refresh_gallery(),
            Effect::PersistToggle { key, value } => {
                let result = match self.settings.lock() {
                    Ok(mut settings) => settings.put_toggle(&key, value),
                    Err(_) => Err(anyhow::anyhow!("settings lock poisoned")),
                };
                if let Err(e) = result {
                    self.log(format!("Could not save '{}': {}", key, e), MessageSeverity::Error);
                }
            }
            Effect::Log(message) => self.log(message, MessageSeverity::Info),
        }
    }

    fn send_bluetooth(&mut self, command: BluetoothCommand) {
        match &self.bluetooth {
            Some(service) => service.send(command),
            None => self.log("Bluetooth worker is not running", MessageSeverity::Warning),
        }
    }

    fn capture_frame(&mut self) {
        let (width, height) = CAPTURE_SIZE;
        let frame = photos::placeholder_frame(width, height, self.reading.sample.angle_degrees);
        let result = match &self.photos {
            Some(store) => store.save_capture(&frame, "ppm"),
            None => {
                return self.dispatch(UiEvent::PermissionDenied(
                    "Photos cannot be saved: the photo folder is not writable".into(),
                ))
            }
        };
        match result {
            Ok(path) => {
                self.frames.forget(&path);
                self.dispatch(UiEvent::Captured(path));
            }
            Err(e) => self.log(format!("Capture failed: {}", e), MessageSeverity::Error),
        }
    }

    pub(crate) fn refresh_gallery(&mut self) {
        let result = match &self.photos {
            Some(store) => store.list(),
            None => return self.gallery.clear(),
        };
        match result {
            Ok(photos) => self.gallery = photos,
            Err(e) => {
                self.gallery.clear();
                self.log(format!("Could not list photos: {}", e), MessageSeverity::Error);
            }
        }
    }

    /// Start the rotation sensor with the current smoothing setting, replacing
    /// any earlier registration
    pub(crate) fn register_sensor(&mut self) {
        self.sensor_registration = None;
        self.sensor_slot.clear();

        let (enabled, smoothing) = match self.settings.lock() {
            Ok(settings) => (
                settings.get().use_simulated_sensor,
                settings.get().sensor_smoothing,
            ),
            Err(_) => (false, None),
        };
        if !enabled {
            self.log(
                "No rotation sensor; showing a fixed heading until BLE connects",
                MessageSeverity::Warning,
            );
            self.refresh_reading();
            return;
        }

        let mut reader = SensorFallbackReader::new(self.sensor_slot.clone(), smoothing);
        let sensor = SimulatedRotationSensor::default();
        match sensor.register(Box::new(move |vector| {
            reader.on_rotation_vector(&vector);
        })) {
            Ok(registration) => self.sensor_registration = Some(registration),
            Err(e) => self.log(
                format!("Rotation sensor unavailable: {}", e),
                MessageSeverity::Warning,
            ),
        }
    }

    pub(crate) fn refresh_reading(&mut self) {
        self.reading = self.coordinator.tick();
    }

    fn handle_app_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::ConnectionState(state) => {
                self.connection_state = state;
                self.coordinator.on_connection_state(state);
                self.refresh_reading();
            }
            AppEvent::LogMessage(message) => self.status_log.push(message),
            AppEvent::BleAngle(angle) => {
                // The source already stored the angle; show it right away
                self.last_ble_angle = Some(angle);
                self.refresh_reading();
                ctx.request_repaint();
            }
        }
    }

    pub(crate) fn frame_texture(
        &mut self,
        ctx: &egui::Context,
        path: &Path,
    ) -> Option<egui::TextureHandle> {
        self.frames.get_or_load(ctx, path)
    }

    pub(crate) fn set_fallback_heading(&mut self, angle_degrees: f64) {
        self.coordinator.set_fixed_fallback(angle_degrees);
        self.refresh_reading();
    }

    /// Close the BLE link and stop the sensor; later calls do nothing
    fn shutdown(&mut self) {
        if let Some(mut bluetooth) = self.bluetooth.take() {
            bluetooth.shutdown();
            info!("Bluetooth worker stopped");
        }
        if let Some(registration) = self.sensor_registration.take() {
            registration.unregister();
        }
    }
}

/// Texture of the most recently shown frame, keyed by path
#[derive(Default)]
struct FrameCache {
    entry: Option<(PathBuf, egui::TextureHandle)>,
}

impl FrameCache {
    fn get_or_load(&mut self, ctx: &egui::Context, path: &Path) -> Option<egui::TextureHandle> {
        if let Some((cached, texture)) = &self.entry {
            if cached == path {
                return Some(texture.clone());
            }
        }

        let bytes = std::fs::read(path).ok()?;
        let frame = photos::decode_ppm(&bytes)?;
        let image = egui::ColorImage::from_rgb([frame.width, frame.height], &frame.rgb);
        let texture = ctx.load_texture(
            path.to_string_lossy(),
            image,
            egui::TextureOptions::default(),
        );
        self.entry = Some((path.to_path_buf(), texture.clone()));
        Some(texture)
    }

    /// Drop the cached texture when `path` is about to change on disk
    fn forget(&mut self, path: &Path) {
        if self.entry.as_ref().is_some_and(|(cached, _)| cached == path) {
            self.entry = None;
        }
    }
}

impl eframe::App for ScannerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_app_event(event, ctx);
        }

        let now = Instant::now();
        if now >= self.next_tick {
            self.refresh_reading();
            self.next_tick = now + TICK_INTERVAL;
        }
        ctx.request_repaint_after(EVENT_POLL_INTERVAL);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                if matches!(
                    self.ui_state.screen,
                    Screen::Help | Screen::Detail | Screen::Preview
                ) && ui.button("⬅ Back").clicked()
                {
                    self.dispatch(UiEvent::Back);
                }

                for screen in Screen::TOP_LEVEL {
                    let selected = self.ui_state.screen == screen;
                    if ui.selectable_label(selected, screen.title()).clicked() && !selected {
                        self.dispatch(UiEvent::Show(screen));
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        theme::configure_neubrutalism(ctx, self.is_dark_mode);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.set_max_width(800.0);
                    ui.add_space(20.0);

                    use crate::presentation::components::Components;
                    use crate::presentation::tabs;
                    if let Some(notice) = self.ui_state.notice.clone() {
                        Components::heading(ui, self.ui_state.screen.title());
                        ui.add_space(20.0);
                        Components::notice(ui, &self.palette(), &notice);
                    } else {
                        match self.ui_state.screen {
                            Screen::Compass => tabs::compass::render(self, ui),
                            Screen::Camera => tabs::camera::render(self, ui),
                            Screen::Preview => tabs::camera::render_preview(self, ui),
                            Screen::Gallery => tabs::gallery::render(self, ui),
                            Screen::Detail => tabs::gallery::render_detail(self, ui),
                            Screen::Settings => tabs::settings::render(self, ui),
                            Screen::Help => tabs::help::render(self, ui),
                        }
                    }

                    ui.add_space(50.0);
                });
            });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
    }
}

impl Drop for ScannerApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_cache_reloads_after_forget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan_1.ppm");
        let ctx = egui::Context::default();
        let mut cache = FrameCache::default();

        std::fs::write(&path, photos::placeholder_frame(4, 2, 0.0)).unwrap();
        assert_eq!(cache.get_or_load(&ctx, &path).unwrap().size(), [4, 2]);

        // Same name reused by a new capture after a delete
        std::fs::write(&path, photos::placeholder_frame(8, 6, 0.0)).unwrap();
        assert_eq!(cache.get_or_load(&ctx, &path).unwrap().size(), [4, 2]);

        cache.forget(&dir.path().join("scan_2.ppm"));
        assert_eq!(cache.get_or_load(&ctx, &path).unwrap().size(), [4, 2]);

        cache.forget(&path);
        assert_eq!(cache.get_or_load(&ctx, &path).unwrap().size(), [8, 6]);
    }

    #[test]
    fn test_frame_cache_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = egui::Context::default();
        let mut cache = FrameCache::default();

        let jpeg = dir.path().join("scan_1.jpg");
        std::fs::write(&jpeg, b"not a ppm").unwrap();
        assert!(cache.get_or_load(&ctx, &jpeg).is_none());
        assert!(cache.get_or_load(&ctx, &dir.path().join("missing.ppm")).is_none());
    }
}
