//! Application state management
//!
//! UI settings and the currently presented records, independent of the map surface.

use crate::app::loader::LoadedRecords;
use crate::app::settings::TilesProvider;
use std::path::PathBuf;
use std::sync::Arc;
use trail_overlay_lib::{CanonicalCollection, DropReason, GeometryKind, NormalizeReport};

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone, Debug, PartialEq)]
pub struct UiSettings {
    /// Map tiles provider
    pub tiles_provider: TilesProvider,

    /// Whether sidebar is open
    pub sidebar_open: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            tiles_provider: TilesProvider::default(),
            sidebar_open: true,
        }
    }
}

/// Records file currently shown on the map
#[derive(Default)]
pub struct RecordsState {
    /// File the records come from (also the target of a refresh)
    pub path: Option<PathBuf>,
    pub collection: Option<Arc<CanonicalCollection>>,
    pub report: Option<NormalizeReport>,
    /// Last load error, cleared by the next successful load
    pub error: Option<String>,
}

/// Statistics about the presented collection
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stats {
    pub records: usize,
    pub features: usize,
    pub lines: usize,
    pub points: usize,
    pub polygons: usize,
    /// Dropped records per reason, only reasons that occurred
    pub dropped: Vec<(DropReason, usize)>,
}

/// Requests raised by the sidebar, handled by the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Open,
    Refresh,
    Clear,
}

/// Main application state
#[derive(Default)]
pub struct AppState {
    pub ui_settings: UiSettings,
    pub records: RecordsState,
}

impl AppState {
    pub fn new(ui_settings: UiSettings, path: Option<PathBuf>) -> Self {
        Self {
            ui_settings,
            records: RecordsState {
                path,
                ..Default::default()
            },
        }
    }

    /// Adopt a successful load
    pub fn apply_loaded(&mut self, loaded: LoadedRecords) -> Arc<CanonicalCollection> {
        self.records.path = Some(loaded.path);
        self.records.collection = Some(loaded.collection.clone());
        self.records.report = Some(loaded.report);
        self.records.error = None;
        loaded.collection
    }

    pub fn apply_error(&mut self, error: String) {
        self.records.error = Some(error);
    }

    /// Forget the presented records (the file path is kept for a refresh)
    pub fn clear(&mut self) {
        self.records.collection = None;
        self.records.report = None;
        self.records.error = None;
    }

    pub fn has_records(&self) -> bool {
        self.records.collection.is_some()
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        if let Some(collection) = &self.records.collection {
            stats.features = collection.len();
            for feature in collection.iter() {
                match feature.geometry.kind() {
                    GeometryKind::LineString | GeometryKind::MultiLineString => stats.lines += 1,
                    GeometryKind::Point => stats.points += 1,
                    GeometryKind::Polygon => stats.polygons += 1,
                }
            }
        }
        if let Some(report) = &self.records.report {
            stats.records = report.records_seen;
            stats.dropped = [
                DropReason::NoGeometry,
                DropReason::EmptyFeatureCollection,
                DropReason::UnsupportedGeometry,
                DropReason::DuplicateId,
            ]
            .into_iter()
            .map(|reason| (reason, report.dropped_for(reason)))
            .filter(|(_, count)| *count > 0)
            .collect();
        }
        stats
    }
}
