//! Application module
//!
//! Full-screen walkers map with the trail overlay, plus a toggleable sidebar to open,
//! refresh and clear the records file. Every frame the app:
//! - adopts finished background loads and presents them on the overlay
//! - draws the map (the plugin paints the overlay and captures pointer input)
//! - feeds the frame's surface events to the overlay and applies viewport fits

pub(crate) mod loader;
mod plugin;
pub(crate) mod settings;
mod state;
mod surface;
mod ui_panels;

use crate::app::loader::RecordsLoader;
use crate::app::plugin::OverlayPlugin;
use crate::app::settings::{Settings, TilesProvider};
use crate::app::state::{AppState, UiAction, UiSettings};
use crate::app::surface::WalkersSurface;
use eframe::egui;
use std::path::PathBuf;
use trail_overlay_lib::{Cursor, MapSurface, OverlayConfig, OverlaySynchronizer};
use walkers::{
    HttpTiles, Map, MapMemory, TileId,
    sources::{Attribution, OpenStreetMap, TileSource},
};

/// Lagos, Portugal
const INITIAL_LAT: f64 = 37.1028;
const INITIAL_LON: f64 = -8.6730;
const INITIAL_ZOOM: f64 = 10.0;

/// Custom OpenTopoMap tile source
pub struct OpenTopoMap;

impl TileSource for OpenTopoMap {
    fn tile_url(&self, tile_id: TileId) -> String {
        format!(
            "https://tile.opentopomap.org/{}/{}/{}.png",
            tile_id.zoom, tile_id.x, tile_id.y
        )
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "© OpenTopoMap (CC-BY-SA)",
            url: "https://opentopomap.org/",
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        17
    }
}

/// Persisted settings (lightweight, no record data)
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
struct PersistedSettings {
    tiles_provider: TilesProvider,
    sidebar_open: bool,
    /// Records file that was shown (reloaded on start)
    records_path: Option<String>,
}

const PERSISTED_SETTINGS_KEY: &str = "persisted_settings";

/// Main application structure
pub struct TrailOverlayApp {
    state: AppState,

    /// Map tiles provider (OpenStreetMap)
    tiles_osm: HttpTiles,

    /// Map tiles provider (OpenTopoMap)
    tiles_otm: HttpTiles,

    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,

    /// Map surface the overlay draws on
    surface: WalkersSurface,

    overlay: OverlaySynchronizer,

    loader: RecordsLoader,
}

impl TrailOverlayApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        let persisted = if settings.ignore_persisted {
            tracing::info!("Ignoring persisted state (--ignore-persisted flag)");
            None
        } else {
            cc.storage.and_then(load_persisted_settings)
        };
        let state = initial_state(persisted, &settings);

        let mut config = OverlayConfig::default();
        if let Some(max_zoom) = settings.max_zoom_on_fit {
            config.fit.line_max_zoom = Some(max_zoom);
        }

        let tiles_osm = HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone());
        let tiles_otm = HttpTiles::new(OpenTopoMap, cc.egui_ctx.clone());

        let mut map_memory = MapMemory::default();
        let _ = map_memory.set_zoom(INITIAL_ZOOM);

        let mut loader = RecordsLoader::new();
        if let Some(path) = &state.records.path {
            tracing::info!("Loading records from {}", path.display());
            loader.load(path.clone());
        }

        Self {
            state,
            tiles_osm,
            tiles_otm,
            map_memory,
            surface: WalkersSurface::new(),
            overlay: OverlaySynchronizer::new(config),
            loader,
        }
    }

    /// Adopt the latest finished load and present it
    fn process_loads(&mut self) {
        let Some(result) = self.loader.poll() else {
            return;
        };
        match result {
            Ok(loaded) => {
                let collection = self.state.apply_loaded(loaded);
                self.overlay.present(&mut self.surface, collection);
            }
            Err(e) => {
                tracing::warn!("Failed to load records: {}", e);
                self.state.apply_error(e.to_string());
            }
        }
    }

    fn handle_action(&mut self, action: UiAction) {
        match action {
            UiAction::Open => {
                if let Some(path) = ui_panels::pick_records_file() {
                    self.loader.load(path);
                }
            }
            UiAction::Refresh => {
                if let Some(path) = self.state.records.path.clone() {
                    self.loader.load(path);
                }
            }
            UiAction::Clear => {
                self.loader.cancel();
                self.overlay.teardown(&mut self.surface);
                self.state.clear();
                tracing::debug!("Cleared trail overlay");
            }
        }
    }

    /// Move the camera for a fit requested by the overlay
    fn apply_pending_fit(&mut self) {
        let Some(fit) = self.surface.take_pending_fit() else {
            return;
        };
        let Some(viewport) = self.surface.viewport() else {
            return;
        };

        let camera = fit.camera(viewport.width() as f64, viewport.height() as f64);
        let zoom = camera
            .zoom
            .min(self.state.ui_settings.tiles_provider.max_zoom());
        self.map_memory
            .center_at(walkers::lat_lon(camera.center.y(), camera.center.x()));
        let _ = self.map_memory.set_zoom(zoom);

        tracing::debug!(
            "Fitted viewport: centre ({:.4}, {:.4}), zoom {:.1}",
            camera.center.y(),
            camera.center.x(),
            zoom
        );
    }
}

fn load_persisted_settings(storage: &dyn eframe::Storage) -> Option<PersistedSettings> {
    let json = storage.get_string(PERSISTED_SETTINGS_KEY)?;
    match serde_json::from_str::<PersistedSettings>(&json) {
        Ok(settings) => {
            tracing::info!("Restored settings");
            Some(settings)
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable persisted settings: {}", e);
            None
        }
    }
}

/// Combine persisted settings with the command line (which wins)
fn initial_state(persisted: Option<PersistedSettings>, settings: &Settings) -> AppState {
    let mut ui_settings = UiSettings::default();
    let mut records_path = None;

    if let Some(persisted) = persisted {
        ui_settings.tiles_provider = persisted.tiles_provider;
        ui_settings.sidebar_open = persisted.sidebar_open;
        records_path = persisted
            .records_path
            .map(PathBuf::from)
            .filter(|path| path.exists());
    }
    if let Some(tiles) = settings.tiles {
        ui_settings.tiles_provider = tiles;
    }
    if let Some(path) = &settings.records {
        records_path = Some(path.clone());
    }

    AppState::new(ui_settings, records_path)
}

/// Hint drawn over the map, if any
fn map_hint_text(surface: &WalkersSurface, has_records: bool, loading: bool) -> Option<&'static str> {
    if !surface.is_style_ready() {
        Some("Loading map...")
    } else if !has_records && !loading {
        Some("Load trail records from a file")
    } else {
        None
    }
}

#[profiling::all_functions]
impl eframe::App for TrailOverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_loads();

        let loading = self.loader.is_loading();
        if let Some(action) = ui_panels::render_sidebar(ctx, &mut self.state, loading) {
            self.handle_action(action);
        }

        let scene = self.surface.scene();
        let tiles_provider = self.state.ui_settings.tiles_provider;

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let tiles: &mut HttpTiles = match tiles_provider {
                    TilesProvider::OpenStreetMap => &mut self.tiles_osm,
                    TilesProvider::OpenTopoMap => &mut self.tiles_otm,
                };

                let map = Map::new(
                    Some(tiles),
                    &mut self.map_memory,
                    walkers::lat_lon(INITIAL_LAT, INITIAL_LON),
                )
                .with_plugin(OverlayPlugin::new(scene));

                ui.add(map);

                // Surface events of this frame go to the overlay
                self.surface.end_frame();
                self.overlay.pump(&mut self.surface);
                self.apply_pending_fit();

                if self.surface.cursor() == Cursor::Pointer {
                    ctx.set_cursor_icon(egui::CursorIcon::PointingHand);
                }

                if let Some(hint) = map_hint_text(&self.surface, self.state.has_records(), loading) {
                    ui_panels::map_hint(ui, hint);
                }

                ui_panels::sidebar_toggle_button(ui, &mut self.state);

                let painter = ui.painter();
                let screen_rect = ui.max_rect();
                painter.text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    tiles_provider.attribution(),
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });

        if loading || !self.surface.is_style_ready() {
            ctx.request_repaint();
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            tiles_provider: self.state.ui_settings.tiles_provider,
            sidebar_open: self.state.ui_settings.sidebar_open,
            records_path: self
                .state
                .records
                .path
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        };

        if let Ok(json) = serde_json::to_string(&settings) {
            storage.set_string(PERSISTED_SETTINGS_KEY, json);
            tracing::debug!("Saved settings on exit");
        }
    }
}
