use crate::domain::models::{ConnectionState, HeadingOrigin, MessageSeverity};
use eframe::egui::{self, Color32, Rounding, Stroke};

pub struct BrutalistPalette {
    pub bg: Color32,
    pub fg: Color32,
    pub stroke: Color32,
    pub surface: Color32,
    pub accent_yellow: Color32,
    pub accent_green: Color32,
    pub accent_cyan: Color32,
    pub accent_red: Color32,
    pub accent_blue: Color32,
}

impl BrutalistPalette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: Color32::from_rgb(25, 25, 25),
                fg: Color32::WHITE,
                stroke: Color32::WHITE,
                surface: Color32::from_gray(30),
                accent_yellow: Color32::from_rgb(255, 200, 0),
                accent_green: Color32::from_rgb(0, 255, 127),
                accent_cyan: Color32::from_rgb(0, 255, 255),
                accent_red: Color32::from_rgb(255, 80, 80),
                accent_blue: Color32::from_rgb(80, 80, 255),
            }
        } else {
            Self {
                bg: Color32::from_rgb(245, 245, 245),
                fg: Color32::BLACK,
                stroke: Color32::BLACK,
                surface: Color32::WHITE,
                accent_yellow: Color32::from_rgb(255, 220, 0),
                accent_green: Color32::from_rgb(0, 255, 100),
                accent_cyan: Color32::from_rgb(0, 200, 255),
                accent_red: Color32::from_rgb(255, 50, 50),
                accent_blue: Color32::from_rgb(50, 50, 255),
            }
        }
    }

    /// Banner (background, text) colours for a link state
    pub fn connection(&self, state: ConnectionState) -> (Color32, Color32) {
        match state {
            ConnectionState::Connected => (Color32::from_rgb(0, 200, 0), Color32::BLACK),
            ConnectionState::Connecting => (self.accent_yellow, Color32::BLACK),
            ConnectionState::Scanning => (self.accent_cyan, Color32::BLACK),
            ConnectionState::Disconnected => (Color32::from_gray(100), Color32::WHITE),
        }
    }

    pub fn origin(&self, origin: HeadingOrigin) -> Color32 {
        match origin {
            HeadingOrigin::Ble => self.accent_blue,
            HeadingOrigin::Sensor => self.accent_green,
            HeadingOrigin::None => Color32::from_gray(140),
        }
    }

    pub fn severity(&self, severity: MessageSeverity) -> Color32 {
        match severity {
            MessageSeverity::Info => self.fg,
            MessageSeverity::Success => Color32::from_rgb(0, 160, 60),
            MessageSeverity::Warning => Color32::from_rgb(220, 140, 0),
            MessageSeverity::Error => self.accent_red,
        }
    }
}

fn flat_widget(visuals: &mut egui::style::WidgetVisuals, stroke: Stroke, fill: Color32, fg: Color32) {
    visuals.bg_stroke = stroke;
    visuals.rounding = Rounding::ZERO;
    visuals.bg_fill = fill;
    visuals.weak_bg_fill = fill;
    visuals.fg_stroke = Stroke::new(1.0, fg);
}

pub fn configure_neubrutalism(ctx: &egui::Context, is_dark: bool) {
    let mut style = (*ctx.style()).clone();
    let palette = BrutalistPalette::new(is_dark);

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 28.0,
                egui::TextStyle::Body | egui::TextStyle::Button => 15.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(12.0, 12.0);
    style.spacing.button_padding = egui::vec2(16.0, 10.0);

    let widgets = &mut style.visuals.widgets;
    flat_widget(
        &mut widgets.noninteractive,
        Stroke::new(2.0, palette.stroke),
        palette.bg,
        palette.fg,
    );
    flat_widget(
        &mut widgets.inactive,
        Stroke::new(2.0, palette.stroke),
        palette.surface,
        palette.fg,
    );
    flat_widget(
        &mut widgets.hovered,
        Stroke::new(2.5, palette.stroke),
        palette.accent_yellow,
        Color32::BLACK,
    );
    widgets.hovered.expansion = 2.0;
    flat_widget(
        &mut widgets.active,
        Stroke::new(3.0, palette.stroke),
        palette.accent_green,
        Color32::BLACK,
    );

    style.visuals.selection.stroke = Stroke::new(1.0, palette.stroke);
    style.visuals.selection.bg_fill = palette.accent_cyan;

    style.visuals.window_rounding = Rounding::ZERO;
    style.visuals.window_stroke = Stroke::new(2.0, palette.stroke);
    style.visuals.window_shadow = egui::Shadow {
        offset: egui::vec2(8.0, 8.0),
        blur: 0.0,
        spread: 0.0,
        color: palette.stroke,
    };
    style.visuals.window_fill = palette.bg;
    style.visuals.panel_fill = palette.bg;
    style.visuals.override_text_color = Some(palette.fg);

    ctx.set_style(style);
}
