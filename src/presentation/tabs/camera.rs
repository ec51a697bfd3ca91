use crate::domain::navigation::{Screen, UiEvent};
use crate::presentation::app::ScannerApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut ScannerApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Camera");
    ui.add_space(20.0);

    let palette = app.palette();
    Components::brutalist_card(ui, "Viewfinder", |ui| {
        ui.label(
            egui::RichText::new("No camera is available on this machine.")
                .color(palette.accent_red)
                .strong(),
        );
        ui.label(
            "A test frame can still be captured. It records the current heading \
             as a marker column and is stored with the other photos.",
        );
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            if ui.button("📷 Capture test frame").clicked() {
                app.dispatch(UiEvent::Capture);
            }
            if ui.button("Open gallery").clicked() {
                app.dispatch(UiEvent::Show(Screen::Gallery));
            }
        });
    });

    if let Some(store) = &app.photos {
        ui.add_space(10.0);
        ui.label(
            egui::RichText::new(format!("Saving to {}", store.dir().display()))
                .italics()
                .size(12.0),
        );
    }
}

pub fn render_preview(app: &mut ScannerApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Preview");
    ui.add_space(20.0);

    let Some(path) = app.ui_state.selected_photo.clone() else {
        ui.label("Nothing captured yet.");
        return;
    };

    let texture = app.frame_texture(ui.ctx(), &path);
    Components::brutalist_card(ui, "Captured", |ui| {
        match &texture {
            Some(texture) => {
                ui.image((texture.id(), texture.size_vec2()));
            }
            None => {
                ui.label("Preview not available for this file.");
            }
        }
        ui.label(egui::RichText::new(path.display().to_string()).monospace());
    });

    ui.add_space(10.0);
    ui.horizontal(|ui| {
        if ui.button("Retake").clicked() {
            app.dispatch(UiEvent::Back);
        }
        if ui.button("Keep and view gallery").clicked() {
            app.dispatch(UiEvent::Show(Screen::Gallery));
        }
    });
}
