//! Walkers plugin that paints the overlay scene and captures pointer input
//!
//! Layers are painted bottom first, each drawing the features its paint and filter
//! accept. The screen geometry of everything drawn is written back into the scene for
//! hit testing, together with the frame's hover and click input.

use crate::app::surface::{DrawnFeature, DrawnShape, SharedScene};
use egui::{Color32, Pos2, Stroke};
use geo::LineString;
use std::sync::PoisonError;
use trail_overlay_lib::{
    CanonicalFeature, Color, LngLat, Paint, PopupContent, ScreenPoint, SurfaceEvent,
    TrailGeometry,
};
use walkers::{Plugin, Projector};

fn color32(color: Color) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

/// Plugin for rendering the trail overlay on the map
pub struct OverlayPlugin {
    scene: SharedScene,
}

impl OverlayPlugin {
    pub fn new(scene: SharedScene) -> Self {
        Self { scene }
    }
}

/// Screen position of a lon/lat coordinate
fn project(projector: &Projector, lon: f64, lat: f64) -> Pos2 {
    let screen = projector.project(walkers::lat_lon(lat, lon));
    Pos2::new(screen.x, screen.y)
}

fn line_parts(geometry: &TrailGeometry, projector: &Projector) -> Vec<Vec<Pos2>> {
    let project_line = |line: &LineString<f64>| -> Vec<Pos2> {
        line.coords().map(|c| project(projector, c.x, c.y)).collect()
    };
    match geometry {
        TrailGeometry::LineString(line) => vec![project_line(line)],
        TrailGeometry::MultiLineString(lines) => lines.iter().map(project_line).collect(),
        TrailGeometry::Polygon(polygon) => vec![project_line(polygon.exterior())],
        TrailGeometry::Point(_) => Vec::new(),
    }
}

/// Project and paint one feature, returning what was drawn
fn paint_feature(
    feature: &CanonicalFeature,
    paint: &Paint,
    projector: &Projector,
    painter: &egui::Painter,
) -> Option<DrawnShape> {
    match (paint, &feature.geometry) {
        (Paint::Line { color, width, opacity }, geometry) => {
            let parts = line_parts(geometry, projector);
            let stroke = Stroke::new(*width, color32(color.with_opacity(*opacity)));
            for part in parts.iter().filter(|p| p.len() >= 2) {
                painter.add(egui::Shape::line(part.clone(), stroke));
            }
            Some(DrawnShape::Lines {
                parts,
                width: *width,
            })
        }
        (
            Paint::Circle {
                radius,
                color,
                stroke_color,
                stroke_width,
            },
            TrailGeometry::Point(point),
        ) => {
            let center = project(projector, point.x(), point.y());
            painter.circle(
                center,
                *radius,
                color32(*color),
                Stroke::new(*stroke_width, color32(*stroke_color)),
            );
            Some(DrawnShape::Circle {
                center,
                radius: radius + stroke_width,
            })
        }
        (Paint::Circle { .. }, _) => None,
    }
}

fn paint_popup(
    at: LngLat,
    content: &PopupContent,
    projector: &Projector,
    ui: &egui::Ui,
    painter: &egui::Painter,
) {
    let anchor = project(projector, at.lng, at.lat);

    let visuals = ui.visuals();
    let galley = painter.layout_no_wrap(
        content.to_text(),
        egui::FontId::proportional(13.0),
        visuals.text_color(),
    );

    let margin = egui::vec2(8.0, 6.0);
    let size = galley.size() + 2.0 * margin;
    let rect = egui::Rect::from_min_size(
        anchor + egui::vec2(-size.x / 2.0, -size.y - 12.0),
        size,
    );

    painter.circle_filled(anchor, 3.0, visuals.text_color());
    painter.rect_filled(rect, 5.0, visuals.window_fill);
    painter.galley(rect.min + margin, galley, visuals.text_color());
}

impl Plugin for OverlayPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("OverlayPlugin::run");

        let painter = ui.painter();
        let mut scene = self.scene.write().unwrap_or_else(PoisonError::into_inner);

        // Layers, bottom first
        let mut drawn = Vec::new();
        {
            profiling::scope!("paint_layers");
            for layer in &scene.layers {
                let Some(source) = scene.sources.get(&layer.source) else {
                    continue;
                };
                for (index, feature) in source.iter().enumerate() {
                    if !layer.renders(feature) {
                        continue;
                    }
                    if let Some(shape) = paint_feature(feature, &layer.paint, projector, painter) {
                        drawn.push(DrawnFeature {
                            layer: layer.id.clone(),
                            source: layer.source.clone(),
                            feature: index,
                            shape,
                        });
                    }
                }
            }
        }
        scene.drawn = drawn;

        for (at, content) in scene.popups.values() {
            paint_popup(*at, content, projector, ui, painter);
        }

        // Pointer input
        let to_event_point = |pos: Pos2| {
            let lng_lat = projector.unproject(pos.to_vec2());
            (
                ScreenPoint::new(pos.x, pos.y),
                LngLat::new(lng_lat.x(), lng_lat.y()),
            )
        };

        let hover = response.hover_pos();
        if hover != scene.last_hover {
            match hover {
                Some(pos) => {
                    let (point, lng_lat) = to_event_point(pos);
                    scene.input.push(SurfaceEvent::PointerMove { point, lng_lat });
                }
                None => {
                    // Pointer left the map: a move outside the viewport hits nothing
                    let outside = response.rect.min - egui::vec2(1.0, 1.0);
                    let (point, lng_lat) = to_event_point(outside);
                    scene.input.push(SurfaceEvent::PointerMove { point, lng_lat });
                }
            }
            scene.last_hover = hover;
        }

        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            let (point, lng_lat) = to_event_point(pos);
            scene.input.push(SurfaceEvent::Click { point, lng_lat });
        }

        scene.viewport = Some(response.rect);
        scene.frames_drawn += 1;
    }
}
