//! Trail Overlay Viewer - Application Library
//!
//! Desktop map application that loads trail records from a JSON file, normalizes them
//! and shows them as an interactive overlay (hover highlight, info popups) on a
//! walkers tile map.

mod app;

pub use app::TrailOverlayApp;
pub use app::loader::{LoadError, LoadedRecords, load_file};
pub use app::settings::{Settings, TilesProvider};

use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "Trail Overlay Viewer";

/// Initialize the tracing subscriber, honouring `RUST_LOG` when set
pub fn setup_logging() {
    let default_filter = if cfg!(debug_assertions) {
        "debug,eframe::native=warn,hyper_util=info,walkers=info,egui::context=warn,reqwest::connect=info"
    } else {
        "info,eframe::native=warn,egui::context=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
}

/// Open the main window and run until it is closed
pub fn run_native(settings: Settings) -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(move |cc| Ok(Box::new(TrailOverlayApp::new(cc, settings)))),
    )
}
