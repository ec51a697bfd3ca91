use crate::domain::models::{ConnectionState, HeadingOrigin};
use crate::domain::navigation::UiEvent;
use crate::presentation::app::ScannerApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut ScannerApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Compass");
    ui.add_space(20.0);

    ui_heading_panel(app, ui);
    ui.add_space(15.0);

    ui_connection_panel(app, ui);
    ui.add_space(15.0);

    ui_log_panel(app, ui);
}

fn ui_heading_panel(app: &mut ScannerApp, ui: &mut egui::Ui) {
    let palette = app.palette();
    let reading = app.reading;

    Components::brutalist_card(ui, "Heading", |ui| {
        ui.horizontal(|ui| {
            Components::compass_dial(ui, &palette, &reading, 220.0);

            ui.vertical(|ui| {
                ui.label(
                    egui::RichText::new(reading.octant.abbreviation())
                        .size(56.0)
                        .strong(),
                );
                ui.label(egui::RichText::new(reading.octant.name()).size(18.0));
                ui.label(
                    egui::RichText::new(format!("{:.0}°", reading.sample.angle_degrees))
                        .size(28.0)
                        .monospace(),
                );

                let source = match reading.sample.source {
                    HeadingOrigin::Ble => "Arduino (BLE)",
                    HeadingOrigin::Sensor => "Device sensor",
                    HeadingOrigin::None => "No source",
                };
                ui.label(
                    egui::RichText::new(source)
                        .color(palette.origin(reading.sample.source))
                        .strong(),
                );
                if let (HeadingOrigin::Ble, Some(raw)) = (reading.sample.source, app.last_ble_angle) {
                    ui.label(
                        egui::RichText::new(format!("Peripheral value: {}°", raw))
                            .monospace()
                            .size(12.0),
                    );
                }
                ui.label(
                    egui::RichText::new(format!("Policy: {}", app.coordinator.policy().label()))
                        .italics()
                        .size(12.0),
                );
            });
        });
    });
}

fn ui_connection_panel(app: &mut ScannerApp, ui: &mut egui::Ui) {
    let palette = app.palette();

    Components::brutalist_card(ui, "Arduino Link", |ui| {
        let (bg, fg) = palette.connection(app.connection_state);
        Components::status_banner(ui, app.connection_state.label(), bg, fg);
        ui.add_space(10.0);

        ui.horizontal(|ui| match app.connection_state {
            ConnectionState::Disconnected => {
                if ui.button("Scan for Arduino").clicked() {
                    app.dispatch(UiEvent::StartScan);
                }
            }
            ConnectionState::Scanning | ConnectionState::Connecting => {
                if ui.button("Cancel").clicked() {
                    app.dispatch(UiEvent::CancelScan);
                }
                ui.spinner();
            }
            ConnectionState::Connected => {
                if ui.button("Disconnect").clicked() {
                    app.dispatch(UiEvent::CancelScan);
                }
            }
        });
    });
}

fn ui_log_panel(app: &mut ScannerApp, ui: &mut egui::Ui) {
    let palette = app.palette();

    Components::brutalist_card(ui, "Log", |ui| {
        if app.status_log.is_empty() {
            ui.label(egui::RichText::new("Nothing yet.").italics());
            return;
        }

        egui::ScrollArea::vertical()
            .max_height(180.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in app.status_log.iter() {
                    ui.label(
                        egui::RichText::new(&entry.message)
                            .color(palette.severity(entry.severity))
                            .monospace(),
                    );
                }
            });
    });
}
