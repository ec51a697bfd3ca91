use crate::domain::heading::HeadingPolicy;
use crate::domain::models::MessageSeverity;
use crate::domain::navigation::UiEvent;
use crate::domain::settings::{TOGGLE_ARDUINO, TOGGLE_AUTO};
use crate::infrastructure::bluetooth::protocol;
use crate::presentation::app::ScannerApp;
use crate::presentation::components::Components;
use eframe::egui;

/// Work collected while the settings lock is held
#[derive(Default)]
struct Pending {
    events: Vec<UiEvent>,
    policy: Option<HeadingPolicy>,
    fallback_heading: Option<f64>,
    restart_sensor: bool,
    save: bool,
}

pub fn render(app: &mut ScannerApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Settings");
    ui.add_space(20.0);

    let mut pending = Pending::default();
    let settings = app.settings.clone();
    let Ok(mut settings) = settings.lock() else {
        ui.label("Settings are unavailable.");
        return;
    };

    Components::brutalist_card(ui, "Heading Sources", |ui| {
        for (key, label) in [
            (TOGGLE_ARDUINO, "Use the Arduino compass when connected"),
            (TOGGLE_AUTO, "Scan automatically when the compass opens"),
        ] {
            let mut value = settings.get_toggle(key).unwrap_or(false);
            if ui.checkbox(&mut value, label).changed() {
                pending.events.push(UiEvent::ToggleChanged {
                    key: key.to_string(),
                    value,
                });
            }
        }

        ui.separator();
        Components::sub_heading(ui, "When the Arduino disconnects");
        let settings_mut = settings.get_mut();
        for policy in [HeadingPolicy::BlePermanent, HeadingPolicy::FallbackOnDisconnect] {
            if ui
                .radio_value(&mut settings_mut.heading_policy, policy, policy.label())
                .changed()
            {
                pending.policy = Some(policy);
                pending.save = true;
            }
        }

        ui.separator();
        Components::sub_heading(ui, "Device Sensor");
        let mut smoothing_enabled = settings_mut.sensor_smoothing.is_some();
        if ui
            .checkbox(&mut smoothing_enabled, "Smooth sensor heading")
            .changed()
        {
            settings_mut.sensor_smoothing = smoothing_enabled.then_some(0.3);
            pending.restart_sensor = true;
            pending.save = true;
        }
        if let Some(factor) = settings_mut.sensor_smoothing.as_mut() {
            ui.indent("smoothing_indent", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Factor:");
                    let slider = ui.add(egui::Slider::new(factor, 0.05..=0.95));
                    if slider.drag_stopped() || (slider.changed() && !slider.dragged()) {
                        pending.restart_sensor = true;
                        pending.save = true;
                    }
                });
            });
        }
        if ui
            .checkbox(&mut settings_mut.use_simulated_sensor, "Simulated rotation sensor")
            .changed()
        {
            pending.restart_sensor = true;
            pending.save = true;
        }
        ui.horizontal(|ui| {
            ui.label("Heading without any source:");
            let slider = ui.add(
                egui::Slider::new(&mut settings_mut.fallback_heading_degrees, 0.0..=359.0)
                    .suffix("°"),
            );
            if slider.changed() {
                pending.fallback_heading = Some(settings_mut.fallback_heading_degrees);
                pending.save = true;
            }
        });
    });

    ui.add_space(10.0);

    Components::brutalist_card(ui, "Bluetooth", |ui| {
        let settings_mut = settings.get_mut();
        egui::Grid::new("ble_settings")
            .spacing([10.0, 10.0])
            .show(ui, |ui| {
                ui.label("Device name:");
                ui.text_edit_singleline(&mut settings_mut.ble_target_name);
                ui.end_row();

                ui.label("Discovery retries:");
                ui.add(egui::Slider::new(&mut settings_mut.discovery_max_retries, 0..=10));
                ui.end_row();

                ui.label("First retry after:");
                ui.add(
                    egui::Slider::new(&mut settings_mut.discovery_initial_backoff_ms, 50..=2000)
                        .suffix(" ms"),
                );
                ui.end_row();
            });
        ui.checkbox(
            &mut settings_mut.use_simulated_ble,
            "Use the built-in simulated peripheral",
        );

        ui.collapsing("GATT layout", |ui| {
            ui.label(format!(
                "Service:        {}",
                protocol::uuid16_to_string(settings_mut.ble_service_uuid16)
            ));
            ui.label(format!(
                "Characteristic: {}",
                protocol::uuid16_to_string(settings_mut.ble_characteristic_uuid16)
            ));
        });
        ui.label(
            egui::RichText::new("Restart required for Bluetooth changes.")
                .italics()
                .size(12.0),
        );
    });

    ui.add_space(10.0);

    Components::brutalist_card(ui, "Logging & Debug", |ui| {
        let log_settings = &mut settings.get_mut().log_settings;
        ui.horizontal(|ui| {
            ui.label("Verbosity Level:");
            egui::ComboBox::from_id_salt("log_level")
                .selected_text(&log_settings.level)
                .show_ui(ui, |ui| {
                    for level in ["trace", "debug", "info", "warn", "error"] {
                        ui.selectable_value(&mut log_settings.level, level.to_string(), level);
                    }
                });
        });

        ui.checkbox(&mut log_settings.console_logging_enabled, "Console Logs");
        ui.checkbox(&mut log_settings.file_logging_enabled, "File Logs");

        if log_settings.file_logging_enabled {
            ui.indent("file_logs", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Save Path:");
                    ui.text_edit_singleline(&mut log_settings.log_dir);
                });
                ui.horizontal(|ui| {
                    ui.label("Rotation:");
                    egui::ComboBox::from_id_salt("log_rot")
                        .selected_text(&log_settings.rotation)
                        .show_ui(ui, |ui| {
                            for rotation in ["daily", "hourly", "never"] {
                                ui.selectable_value(
                                    &mut log_settings.rotation,
                                    rotation.to_string(),
                                    rotation,
                                );
                            }
                        });
                });
            });
        }
        ui.label(
            egui::RichText::new("Restart required for log changes.")
                .italics()
                .size(12.0),
        );
    });

    ui.add_space(10.0);

    ui.horizontal(|ui| {
        ui.label(format!("Photos: {}", settings.get().photo_dir));
        if ui.button("💾 Save").clicked() {
            pending.save = true;
        }
    });

    let save_result = if pending.save {
        Some(settings.save())
    } else {
        None
    };
    drop(settings);

    match save_result {
        Some(Ok(())) => app.log("Settings saved", MessageSeverity::Success),
        Some(Err(e)) => app.log(format!("Could not save settings: {}", e), MessageSeverity::Error),
        None => {}
    }
    if let Some(policy) = pending.policy {
        app.coordinator.set_policy(policy);
    }
    if let Some(angle) = pending.fallback_heading {
        app.set_fallback_heading(angle);
    }
    if pending.restart_sensor {
        app.register_sensor();
    }
    for event in pending.events {
        app.dispatch(event);
    }
}
