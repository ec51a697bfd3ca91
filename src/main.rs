mod domain;
mod infrastructure;
mod presentation;

use domain::settings::SettingsService;
use eframe::egui;
use presentation::app::ScannerApp;
use std::process::ExitCode;

fn run() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;

    let logging_guard = infrastructure::logging::init_logger(&settings.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    tracing::info!("Starting Scan Compass");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([820.0, 720.0])
            .with_title("Scan Compass"),
        ..Default::default()
    };

    eframe::run_native(
        "Scan Compass",
        options,
        Box::new(|cc| Ok(Box::new(ScannerApp::new(cc, settings, logging_guard)))),
    )
    .map_err(|e| anyhow::anyhow!("window closed with an error: {}", e))
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
