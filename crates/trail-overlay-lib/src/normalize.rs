//! Geometry normalization
//!
//! Converts heterogeneous trail records into a [`CanonicalCollection`]. Each record is
//! resolved in a fixed order and the first matching rule wins:
//!
//! 1. `geometry` is a FeatureCollection: its first feature, with the record's
//!    identifier/name/distance/duration merged over the feature's properties
//! 2. `geometry` is a single Feature (or a bare geometry object): same merge
//! 3. `path` is a non-empty list of `[lon, lat]` pairs: a LineString built verbatim
//! 4. otherwise the record contributes nothing
//!
//! Normalization is pure and total: dropped records are reported, never raised.

use crate::feature::{
    AttributePatch, CanonicalCollection, CanonicalFeature, DisplayValue, TrailAttributes,
    TrailGeometry,
};
use crate::record::RawTrailRecord;
use geo::{Coord, LineString};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Why a record produced no feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Neither a usable `geometry` nor a non-empty `path`
    NoGeometry,
    /// `geometry` is a FeatureCollection without features
    EmptyFeatureCollection,
    /// `geometry` is a feature whose geometry is missing, malformed or of an unsupported type
    UnsupportedGeometry,
    /// Another record earlier in the batch already used the same identifier
    DuplicateId,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoGeometry => "no geometry",
            Self::EmptyFeatureCollection => "empty feature collection",
            Self::UnsupportedGeometry => "unsupported geometry",
            Self::DuplicateId => "duplicate id",
        })
    }
}

/// Summary of a normalization pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    /// Number of input records
    pub records_seen: usize,
    /// Number of features in the output collection
    pub features_produced: usize,
    /// Input index and reason of every dropped record
    pub dropped: Vec<(usize, DropReason)>,
}

impl NormalizeReport {
    /// Count dropped records for one reason
    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|(_, r)| *r == reason).count()
    }
}

/// Normalize records into a canonical collection
pub fn normalize(records: &[RawTrailRecord]) -> CanonicalCollection {
    normalize_with_report(records).0
}

/// Normalize records, also returning what was dropped and why
pub fn normalize_with_report(records: &[RawTrailRecord]) -> (CanonicalCollection, NormalizeReport) {
    profiling::scope!("normalize");

    let mut features = Vec::with_capacity(records.len());
    let mut seen_ids = HashSet::with_capacity(records.len());
    let mut report = NormalizeReport {
        records_seen: records.len(),
        ..Default::default()
    };

    for (index, record) in records.iter().enumerate() {
        let result = normalize_record(index, record).and_then(|feature| {
            if seen_ids.insert(feature.id().to_string()) {
                Ok(feature)
            } else {
                Err(DropReason::DuplicateId)
            }
        });

        match result {
            Ok(feature) => features.push(feature),
            Err(reason) => {
                if reason == DropReason::DuplicateId {
                    tracing::warn!("Dropping record #{}: identifier already in use", index);
                } else {
                    tracing::trace!("Dropping record #{}: {}", index, reason);
                }
                report.dropped.push((index, reason));
            }
        }
    }

    report.features_produced = features.len();
    tracing::debug!(
        "Normalized {} records into {} features ({} dropped)",
        report.records_seen,
        report.features_produced,
        report.dropped.len()
    );

    (CanonicalCollection::new(features), report)
}

/// Shape of a record's `geometry` field
enum GeometrySource<'a> {
    /// A feature-like object (Feature, or the first feature of a FeatureCollection)
    Feature(&'a Value),
    /// A bare geometry object with no properties
    Bare(&'a Value),
    EmptyCollection,
}

fn classify_geometry(value: &Value) -> Option<GeometrySource<'_>> {
    match value.get("type")?.as_str()? {
        "FeatureCollection" => Some(
            value
                .get("features")
                .and_then(Value::as_array)
                .and_then(|features| features.first())
                .map_or(GeometrySource::EmptyCollection, GeometrySource::Feature),
        ),
        "Feature" => Some(GeometrySource::Feature(value)),
        _ if value.get("coordinates").is_some() => Some(GeometrySource::Bare(value)),
        _ => None,
    }
}

fn normalize_record(
    index: usize,
    record: &RawTrailRecord,
) -> Result<CanonicalFeature, DropReason> {
    if let Some(source) = record.geometry().and_then(classify_geometry) {
        return from_geometry(index, record, source);
    }

    match record.path() {
        Some(path) if !path.is_empty() => from_path(index, record, path),
        _ => Err(DropReason::NoGeometry),
    }
}

/// Cases 1 and 2: merge the record's display attributes over a pre-built feature
fn from_geometry(
    index: usize,
    record: &RawTrailRecord,
    source: GeometrySource<'_>,
) -> Result<CanonicalFeature, DropReason> {
    let (geometry_value, base) = match source {
        GeometrySource::EmptyCollection => return Err(DropReason::EmptyFeatureCollection),
        GeometrySource::Bare(geometry) => (Some(geometry), AttributePatch::default()),
        GeometrySource::Feature(feature) => (
            feature.get("geometry"),
            feature
                .get("properties")
                .and_then(Value::as_object)
                .map(AttributePatch::from_properties)
                .unwrap_or_default(),
        ),
    };

    let geometry = geometry_value
        .and_then(TrailGeometry::from_geojson)
        .ok_or(DropReason::UnsupportedGeometry)?;

    let overlay = AttributePatch {
        id: record.id(),
        name: record.name(),
        distance: record.distance().and_then(DisplayValue::from_json),
        duration: record.duration().and_then(DisplayValue::from_json),
        ..Default::default()
    };

    Ok(CanonicalFeature {
        geometry,
        attributes: TrailAttributes::from_patch(base.merge(overlay), || positional_id(index)),
    })
}

/// Case 3: build a LineString from the record's coordinate path
fn from_path(
    index: usize,
    record: &RawTrailRecord,
    path: &[Value],
) -> Result<CanonicalFeature, DropReason> {
    let coords: Vec<Coord<f64>> = path
        .iter()
        .filter_map(|pair| {
            let pair = pair.as_array()?;
            Some(Coord {
                x: pair.first()?.as_f64()?,
                y: pair.get(1)?.as_f64()?,
            })
        })
        .collect();

    if coords.len() < path.len() {
        tracing::debug!(
            "Record #{}: skipped {} malformed path entries",
            index,
            path.len() - coords.len()
        );
    }
    if coords.is_empty() {
        return Err(DropReason::NoGeometry);
    }

    let patch = AttributePatch {
        id: record.id(),
        name: record.name(),
        distance: record.distance().and_then(DisplayValue::from_json),
        duration: record.duration().and_then(DisplayValue::from_json),
        pace: record.pace().and_then(DisplayValue::from_json),
        description: record.description(),
        start_latitude: record.start_latitude(),
        start_longitude: record.start_longitude(),
        ..Default::default()
    };

    Ok(CanonicalFeature {
        geometry: TrailGeometry::LineString(LineString::new(coords)),
        attributes: TrailAttributes::from_patch(patch, || positional_id(index)),
    })
}

fn positional_id(index: usize) -> String {
    format!("record-{}", index)
}
