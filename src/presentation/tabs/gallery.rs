use crate::domain::navigation::{Screen, UiEvent};
use crate::presentation::app::ScannerApp;
use crate::presentation::components::Components;
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

pub fn render(app: &mut ScannerApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Gallery");
    ui.add_space(20.0);

    let mut event = None;

    Components::brutalist_card(ui, &format!("Photos ({})", app.gallery.len()), |ui| {
        ui.horizontal(|ui| {
            if ui.button("⟳ Refresh").clicked() {
                event = Some(UiEvent::Show(Screen::Gallery));
            }
            if ui.button("📷 Camera").clicked() {
                event = Some(UiEvent::Show(Screen::Camera));
            }
        });

        if app.gallery.is_empty() {
            ui.label(egui::RichText::new("No photos yet.").italics());
            return;
        }

        let now = SystemTime::now();
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::remainder().at_least(160.0))
            .column(Column::auto().at_least(80.0))
            .column(Column::auto().at_least(100.0))
            .column(Column::auto())
            .header(24.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Name");
                });
                header.col(|ui| {
                    ui.strong("Size");
                });
                header.col(|ui| {
                    ui.strong("Taken");
                });
                header.col(|_| {});
            })
            .body(|mut body| {
                for photo in &app.gallery {
                    body.row(28.0, |mut row| {
                        row.col(|ui| {
                            ui.label(&photo.name);
                        });
                        row.col(|ui| {
                            ui.label(format_size(photo.size_bytes));
                        });
                        row.col(|ui| {
                            ui.label(format_age(now, photo.modified));
                        });
                        row.col(|ui| {
                            if ui.button("Open").clicked() {
                                event = Some(UiEvent::OpenPhoto(photo.path.clone()));
                            }
                        });
                    });
                }
            });
    });

    if let Some(event) = event {
        app.dispatch(event);
    }
}

pub fn render_detail(app: &mut ScannerApp, ui: &mut egui::Ui) {
    let Some(path) = app.ui_state.selected_photo.clone() else {
        app.dispatch(UiEvent::Back);
        return;
    };
    if !path.is_file() {
        app.dispatch(UiEvent::PhotoFailed(format!(
            "{} is no longer available",
            path.display()
        )));
        return;
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Components::heading(ui, &name);
    ui.add_space(20.0);

    if let Some(texture) = app.frame_texture(ui.ctx(), &path) {
        ui.image((texture.id(), texture.size_vec2()));
        ui.add_space(10.0);
    }

    let palette = app.palette();
    let mut event = None;

    Components::brutalist_card(ui, "Rename", |ui| {
        ui.horizontal(|ui| {
            ui.label("New name:");
            let response = ui.text_edit_singleline(&mut app.rename_input);
            let submitted =
                response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if (ui.button("Rename").clicked() || submitted) && !app.rename_input.trim().is_empty()
            {
                event = Some(rename_event(path.clone(), &app.rename_input));
            }
        });
        ui.label(
            egui::RichText::new("The file extension is kept.")
                .italics()
                .size(12.0),
        );
    });

    ui.add_space(10.0);

    Components::brutalist_card(ui, "Delete", |ui| {
        ui.label(egui::RichText::new(path.display().to_string()).monospace());
        let delete = egui::Button::new(egui::RichText::new("🗑 Delete photo").color(egui::Color32::WHITE))
            .fill(palette.accent_red);
        if ui.add(delete).clicked() {
            event = Some(UiEvent::DeletePhoto(path.clone()));
        }
    });

    if let Some(event) = event {
        app.dispatch(event);
    }
}

fn rename_event(path: PathBuf, input: &str) -> UiEvent {
    UiEvent::RenamePhoto {
        path,
        new_name: input.trim().to_string(),
    }
}

fn format_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{} B", b),
    }
}

fn format_age(now: SystemTime, then: SystemTime) -> String {
    let age = now.duration_since(then).unwrap_or(Duration::ZERO).as_secs();
    match age {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{} min ago", age / 60),
        3600..=86_399 => format!("{} h ago", age / 3600),
        _ => format!("{} d ago", age / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_age() {
        let then = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        assert_eq!(format_age(then, then), "just now");
        assert_eq!(format_age(then + Duration::from_secs(125), then), "2 min ago");
        assert_eq!(format_age(then + Duration::from_secs(7200), then), "2 h ago");
        assert_eq!(format_age(then + Duration::from_secs(3 * 86_400), then), "3 d ago");
        // Clock skew never yields a negative age
        assert_eq!(format_age(then, then + Duration::from_secs(60)), "just now");
    }

    #[test]
    fn test_rename_event_trims_input() {
        let event = rename_event(PathBuf::from("scan_1.ppm"), "  pier ");
        assert_eq!(
            event,
            UiEvent::RenamePhoto {
                path: PathBuf::from("scan_1.ppm"),
                new_name: "pier".into()
            }
        );
    }
}
