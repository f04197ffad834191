#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use trail_overlay_viewer::Settings;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_cli();
    trail_overlay_viewer::setup_logging();

    // Records load on blocking tasks of this runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async { trail_overlay_viewer::run_native(settings) })?;
    Ok(())
}
