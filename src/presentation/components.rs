use crate::domain::direction::Octant;
use crate::domain::heading::HeadingReading;
use crate::presentation::theme::BrutalistPalette;
use eframe::egui;

pub struct Components;

impl Components {
    pub fn heading(ui: &mut egui::Ui, text: &str) {
        ui.label(egui::RichText::new(text.to_uppercase()).heading().strong());
    }

    pub fn sub_heading(ui: &mut egui::Ui, text: &str) {
        ui.label(egui::RichText::new(text).strong().size(16.0));
    }

    pub fn brutalist_card<R>(
        ui: &mut egui::Ui,
        title: &str,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> R {
        let stroke = ui.style().visuals.widgets.noninteractive.bg_stroke;
        let bg = ui.style().visuals.widgets.noninteractive.bg_fill;

        egui::Frame::none()
            .inner_margin(egui::Margin::same(15.0))
            .stroke(stroke)
            .fill(bg)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new(title).strong().size(18.0));
                    ui.add_space(8.0);
                    add_contents(ui)
                })
                .inner
            })
            .inner
    }

    pub fn status_banner(
        ui: &mut egui::Ui,
        text: &str,
        bg_color: egui::Color32,
        text_color: egui::Color32,
    ) {
        ui.add_sized(
            [ui.available_width(), 35.0],
            egui::Label::new(
                egui::RichText::new(text)
                    .color(text_color)
                    .background_color(bg_color)
                    .size(16.0)
                    .strong(),
            )
            .wrap_mode(egui::TextWrapMode::Extend),
        );
    }

    /// Inline message drawn in place of a screen body
    pub fn notice(ui: &mut egui::Ui, palette: &BrutalistPalette, text: &str) {
        Self::brutalist_card(ui, "Unavailable", |ui| {
            ui.label(egui::RichText::new(text).color(palette.accent_red).strong());
        });
    }

    /// Round dial with the eight octant labels and a needle at the heading
    pub fn compass_dial(
        ui: &mut egui::Ui,
        palette: &BrutalistPalette,
        reading: &HeadingReading,
        diameter: f32,
    ) {
        let (response, painter) =
            ui.allocate_painter(egui::vec2(diameter, diameter), egui::Sense::hover());
        let center = response.rect.center();
        let radius = diameter * 0.5 - 4.0;
        let stroke = egui::Stroke::new(3.0, palette.stroke);

        painter.circle_filled(center, radius, palette.surface);
        painter.circle_stroke(center, radius, stroke);

        for octant in Octant::ALL {
            let dir = dial_direction(octant.center());
            let highlighted = octant == reading.octant;
            painter.line_segment(
                [center + dir * (radius - 12.0), center + dir * radius],
                stroke,
            );
            painter.text(
                center + dir * (radius - 28.0),
                egui::Align2::CENTER_CENTER,
                octant.abbreviation(),
                egui::FontId::proportional(if highlighted { 18.0 } else { 14.0 }),
                if highlighted {
                    palette.accent_red
                } else {
                    palette.fg
                },
            );
        }

        let needle = dial_direction(reading.sample.angle_degrees);
        painter.line_segment(
            [center, center + needle * (radius - 44.0)],
            egui::Stroke::new(5.0, palette.origin(reading.sample.source)),
        );
        painter.circle_filled(center, 6.0, palette.stroke);
    }
}

/// Screen-space unit vector for a compass bearing (0 = up, clockwise)
fn dial_direction(bearing_degrees: f64) -> egui::Vec2 {
    let radians = bearing_degrees.to_radians() as f32;
    egui::vec2(radians.sin(), -radians.cos())
}
