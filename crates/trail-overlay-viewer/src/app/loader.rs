//! Background loading of trail record files
//!
//! Reading, parsing and normalizing run on a tokio blocking task. Results come back
//! through a channel that the UI polls once per frame. Every request gets a sequence
//! number and only the latest one is ever handed to the UI, so a refresh supersedes
//! whatever was still in flight.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use trail_overlay_lib::{CanonicalCollection, NormalizeReport, normalize_with_report};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse records: {0}")]
    Parse(#[from] trail_overlay_lib::OverlayError),

    #[error("Loading task failed: {0}")]
    Task(String),
}

/// Normalized content of one records file
#[derive(Debug)]
pub struct LoadedRecords {
    pub path: PathBuf,
    pub collection: Arc<CanonicalCollection>,
    pub report: NormalizeReport,
}

/// Read, parse and normalize a records file
pub fn load_file(path: &Path) -> Result<LoadedRecords, LoadError> {
    profiling::scope!("load_file");

    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let records = trail_overlay_lib::load_records(BufReader::new(file))?;
    let (collection, report) = normalize_with_report(&records);

    tracing::info!(
        "Loaded {} records from {} ({} features, {} dropped)",
        report.records_seen,
        path.display(),
        report.features_produced,
        report.dropped.len()
    );

    Ok(LoadedRecords {
        path: path.to_path_buf(),
        collection: Arc::new(collection),
        report,
    })
}

struct LoadOutcome {
    request: u64,
    result: Result<LoadedRecords, LoadError>,
}

/// Runs file loads off the UI thread
pub struct RecordsLoader {
    runtime: Option<tokio::runtime::Handle>,
    tx: mpsc::UnboundedSender<LoadOutcome>,
    rx: mpsc::UnboundedReceiver<LoadOutcome>,
    /// Sequence number of the latest request
    latest: u64,
    /// Sequence number of the latest request that has not reported back yet
    in_flight: Option<u64>,
}

impl RecordsLoader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = tokio::runtime::Handle::try_current().ok();
        if runtime.is_none() {
            tracing::warn!("No tokio runtime available, records will load on the UI thread");
        }
        Self {
            runtime,
            tx,
            rx,
            latest: 0,
            in_flight: None,
        }
    }

    /// Whether the latest request is still running
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start loading `path`, superseding any request still in flight
    pub fn load(&mut self, path: PathBuf) {
        self.latest += 1;
        let request = self.latest;
        self.in_flight = Some(request);
        tracing::debug!("Loading {} (request {})", path.display(), request);

        let tx = self.tx.clone();
        let task = move || {
            let result = load_file(&path);
            // The receiver only goes away with the app
            let _ = tx.send(LoadOutcome { request, result });
        };

        match &self.runtime {
            Some(runtime) => {
                let tx = self.tx.clone();
                let handle = runtime.spawn_blocking(task);
                runtime.spawn(async move {
                    if let Err(e) = handle.await {
                        let _ = tx.send(LoadOutcome {
                            request,
                            result: Err(LoadError::Task(e.to_string())),
                        });
                    }
                });
            }
            None => task(),
        }
    }

    /// Forget any request in flight; its result will be discarded
    pub fn cancel(&mut self) {
        self.latest += 1;
        self.in_flight = None;
    }

    /// Result of the latest request, once it is available
    pub fn poll(&mut self) -> Option<Result<LoadedRecords, LoadError>> {
        let mut latest_result = None;
        while let Ok(outcome) = self.rx.try_recv() {
            if outcome.request != self.latest {
                tracing::debug!("Discarding superseded load (request {})", outcome.request);
                continue;
            }
            self.in_flight = None;
            latest_result = Some(outcome.result);
        }
        latest_result
    }
}
