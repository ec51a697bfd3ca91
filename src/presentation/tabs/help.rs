use crate::domain::direction::Octant;
use crate::infrastructure::bluetooth::protocol;
use crate::presentation::app::ScannerApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut ScannerApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Help");
    ui.add_space(20.0);

    Components::brutalist_card(ui, "Compass", |ui| {
        ui.label(format!(
            "Power on the Arduino and press \"Scan for Arduino\". The app connects to the \
             first device advertising as \"{}\" and follows its heading.",
            protocol::TARGET_DEVICE_NAME
        ));
        ui.label(
            "Until a heading arrives from the Arduino, the device's own rotation sensor \
             is shown. Settings decide whether the sensor comes back when the link drops.",
        );
    });

    ui.add_space(10.0);

    Components::brutalist_card(ui, "Directions", |ui| {
        egui::Grid::new("octants")
            .striped(true)
            .spacing([20.0, 6.0])
            .show(ui, |ui| {
                for octant in Octant::ALL {
                    let from = (octant.center() - Octant::WIDTH / 2.0).rem_euclid(360.0);
                    let to = octant.center() + Octant::WIDTH / 2.0;
                    ui.label(egui::RichText::new(octant.abbreviation()).strong());
                    ui.label(octant.name());
                    ui.label(format!("{:.1}° – {:.1}°", from, to));
                    ui.end_row();
                }
            });
    });

    ui.add_space(10.0);

    Components::brutalist_card(ui, "Photos", |ui| {
        ui.label(
            "Captures are numbered scan_1, scan_2, … Open a photo from the gallery to \
             rename or delete it.",
        );
    });

    if let Some(latest) = app.status_log.latest() {
        ui.add_space(10.0);
        ui.label(
            egui::RichText::new(format!("Last status: {}", latest.message))
                .italics()
                .size(12.0),
        );
    }
}
