use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
/// Trail Overlay Viewer - Interactive map of trail records
pub struct Settings {
    /// Trail records (JSON array or `{"data": [...]}`) to load on startup
    #[clap(short, long, value_name = "FILE")]
    pub records: Option<PathBuf>,

    /// Map tiles provider
    #[clap(short, long, value_enum)]
    pub tiles: Option<TilesProvider>,

    /// Zoom ceiling when framing the first trail
    #[clap(long, value_name = "ZOOM")]
    pub max_zoom_on_fit: Option<f64>,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

impl Settings {
    /// Parse the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}

/// Available map tile providers
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, serde::Serialize, serde::Deserialize,
)]
pub enum TilesProvider {
    #[default]
    #[value(name = "osm")]
    OpenStreetMap,
    #[value(name = "topo")]
    OpenTopoMap,
}

impl TilesProvider {
    pub fn attribution(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "© OpenStreetMap contributors",
            Self::OpenTopoMap => "© OpenTopoMap (CC-BY-SA)",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "OpenStreetMap",
            Self::OpenTopoMap => "OpenTopoMap",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::OpenStreetMap, Self::OpenTopoMap]
    }

    /// Deepest zoom level the provider serves tiles for
    pub fn max_zoom(&self) -> f64 {
        match self {
            Self::OpenStreetMap => 19.0,
            Self::OpenTopoMap => 17.0,
        }
    }
}
