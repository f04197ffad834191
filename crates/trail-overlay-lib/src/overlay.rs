//! Overlay synchronization
//!
//! [`OverlaySynchronizer`] keeps one surface's overlay consistent with the latest
//! canonical collection. Every [`present`](OverlaySynchronizer::present) fully tears
//! down the previous [`OverlayState`] (handlers, popup, layers, then source) before
//! installing the new one, so no listener or layer outlives the data it was built for.
//!
//! When the surface style is still loading, installation is deferred behind a one-shot
//! style-ready subscription. Each present bumps a generation counter; a ready
//! notification only installs if it belongs to the current generation's subscription.

use crate::feature::CanonicalCollection;
use crate::style::{
    Filter, HIGHLIGHT_LAYER_ID, LINE_LAYER_ID, OverlayConfig, POINT_LAYER_ID, SOURCE_ID,
};
use crate::surface::{
    Cursor, Delivery, EventKind, LngLat, MapSurface, PopupContent, PopupId, ScreenPoint,
    SubscriptionId, SurfaceEvent,
};
use crate::viewport::compute_fit;
use std::sync::Arc;

/// Teardown order: every layer before the source they draw from
const TEARDOWN_LAYERS: [&str; 3] = [HIGHLIGHT_LAYER_ID, POINT_LAYER_ID, LINE_LAYER_ID];

/// Where an overlay is in its lifecycle
#[derive(Debug, Clone, PartialEq)]
enum Phase {
    /// Waiting for the surface's one-shot style-ready notification
    AwaitingStyle { ready: SubscriptionId },
    /// Source and layers are on the surface, interaction handlers attached
    Installed {
        layers: Vec<&'static str>,
        hover: SubscriptionId,
        click: SubscriptionId,
    },
}

/// Everything one presented collection owns on a surface
///
/// Released only through [`OverlayState::teardown`], which consumes the state.
#[derive(Debug)]
pub struct OverlayState {
    generation: u64,
    collection: Arc<CanonicalCollection>,
    phase: Phase,
    highlighted: Option<String>,
    popup: Option<PopupId>,
}

impl OverlayState {
    fn new(generation: u64, collection: Arc<CanonicalCollection>) -> Self {
        Self {
            generation,
            collection,
            phase: Phase::AwaitingStyle {
                ready: SubscriptionId(0),
            },
            highlighted: None,
            popup: None,
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn collection(&self) -> &Arc<CanonicalCollection> {
        &self.collection
    }

    pub fn is_installed(&self) -> bool {
        matches!(self.phase, Phase::Installed { .. })
    }

    /// Layers this state added, in stacking order
    pub fn installed_layers(&self) -> &[&'static str] {
        match &self.phase {
            Phase::Installed { layers, .. } => layers,
            Phase::AwaitingStyle { .. } => &[],
        }
    }

    /// Identifier of the highlighted feature, if any
    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    pub fn popup(&self) -> Option<PopupId> {
        self.popup
    }

    /// Install source, layers, viewport fit and interaction handlers
    fn install<S: MapSurface + ?Sized>(&mut self, surface: &mut S, config: &OverlayConfig) {
        profiling::scope!("overlay::install");

        if let Err(e) = surface.add_source(SOURCE_ID, self.collection.clone()) {
            tracing::warn!("Failed to add overlay source: {}", e);
        }

        let mut layers = Vec::with_capacity(3);
        for (layer, id) in config
            .layers()
            .into_iter()
            .zip([LINE_LAYER_ID, HIGHLIGHT_LAYER_ID, POINT_LAYER_ID])
        {
            match surface.add_layer(layer) {
                Ok(()) => layers.push(id),
                Err(e) => tracing::warn!("Failed to add overlay layer {}: {}", id, e),
            }
        }

        if let Some(fit) = compute_fit(&self.collection, &config.fit) {
            tracing::debug!(
                "Fitting viewport to {:?} (padding {}, max zoom {:?})",
                fit.bounds,
                fit.padding,
                fit.max_zoom
            );
            surface.fit_bounds(fit);
        }

        let hover = surface.subscribe(EventKind::PointerMove);
        let click = surface.subscribe(EventKind::Click);
        self.phase = Phase::Installed {
            layers,
            hover,
            click,
        };

        tracing::debug!(
            "Installed overlay generation {} ({} features)",
            self.generation,
            self.collection.len()
        );
    }

    /// Remove everything this state put on the surface
    ///
    /// Safe when installation never completed or when targets are already gone.
    pub fn teardown<S: MapSurface + ?Sized>(self, surface: &mut S) {
        match self.phase {
            Phase::AwaitingStyle { ready } => surface.unsubscribe(ready),
            Phase::Installed { hover, click, .. } => {
                surface.unsubscribe(hover);
                surface.unsubscribe(click);
            }
        }

        if let Some(popup) = self.popup {
            surface.close_popup(popup);
        }
        if self.highlighted.is_some() {
            surface.set_cursor(Cursor::Default);
        }

        for layer in TEARDOWN_LAYERS {
            if surface.has_layer(layer)
                && let Err(e) = surface.remove_layer(layer)
            {
                tracing::debug!("Ignoring failure to remove layer {}: {}", layer, e);
            }
        }
        if surface.has_source(SOURCE_ID)
            && let Err(e) = surface.remove_source(SOURCE_ID)
        {
            tracing::debug!("Ignoring failure to remove source {}: {}", SOURCE_ID, e);
        }

        tracing::debug!("Tore down overlay generation {}", self.generation);
    }

    fn on_pointer_move<S: MapSurface + ?Sized>(&mut self, surface: &mut S, point: ScreenPoint) {
        let hits = surface.query_rendered_features(point, &[LINE_LAYER_ID]);
        match hits.first() {
            Some(hit) => {
                if self.highlighted.as_deref() == Some(hit.id()) {
                    return;
                }
                surface.set_cursor(Cursor::Pointer);
                self.set_highlight(surface, Filter::IdEquals(hit.id().to_string()));
                self.highlighted = Some(hit.id().to_string());
            }
            None => {
                if self.highlighted.take().is_none() {
                    return;
                }
                surface.set_cursor(Cursor::Default);
                self.set_highlight(surface, Filter::no_match());
            }
        }
    }

    fn set_highlight<S: MapSurface + ?Sized>(&self, surface: &mut S, filter: Filter) {
        if let Err(e) = surface.set_filter(HIGHLIGHT_LAYER_ID, filter) {
            tracing::warn!("Failed to update highlight filter: {}", e);
        }
    }

    fn on_click<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        point: ScreenPoint,
        lng_lat: LngLat,
        close_on_empty: bool,
    ) {
        let hits = surface.query_rendered_features(point, &[LINE_LAYER_ID]);
        let Some(hit) = hits.first() else {
            if close_on_empty && let Some(popup) = self.popup.take() {
                surface.close_popup(popup);
            }
            return;
        };

        if let Some(popup) = self.popup.take() {
            surface.close_popup(popup);
        }
        tracing::debug!("Opening popup for trail {}", hit.id());
        self.popup = Some(surface.open_popup(lng_lat, PopupContent::for_trail(&hit.attributes)));
    }
}

/// Keeps a surface's overlay in sync with the latest canonical collection
#[derive(Debug)]
pub struct OverlaySynchronizer {
    config: OverlayConfig,
    /// Incremented by every present; identifies the current request
    generation: u64,
    state: Option<OverlayState>,
}

impl Default for OverlaySynchronizer {
    fn default() -> Self {
        Self::new(OverlayConfig::default())
    }
}

impl OverlaySynchronizer {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            generation: 0,
            state: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn state(&self) -> Option<&OverlayState> {
        self.state.as_ref()
    }

    /// Identifier of the highlighted feature, if any
    pub fn highlighted(&self) -> Option<&str> {
        self.state.as_ref().and_then(OverlayState::highlighted)
    }

    /// Present a collection, replacing whatever was presented before
    ///
    /// Installs immediately when the style is ready, otherwise defers installation to
    /// the surface's style-ready notification. A previous deferred install is cancelled.
    pub fn present<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        collection: Arc<CanonicalCollection>,
    ) -> &OverlayState {
        if let Some(previous) = self.state.take() {
            previous.teardown(surface);
        }

        self.generation += 1;
        let mut state = OverlayState::new(self.generation, collection);

        if surface.is_style_ready() {
            state.install(surface, &self.config);
        } else {
            let ready = surface.subscribe_once(EventKind::StyleReady);
            state.phase = Phase::AwaitingStyle { ready };
            tracing::debug!(
                "Style not ready, deferring overlay generation {}",
                self.generation
            );
        }

        self.state.insert(state)
    }

    /// Tear down the current overlay (surface destroyed or data cleared)
    pub fn teardown<S: MapSurface + ?Sized>(&mut self, surface: &mut S) {
        if let Some(state) = self.state.take() {
            state.teardown(surface);
        }
    }

    /// Route one delivered event to the current overlay
    ///
    /// Deliveries addressed to subscriptions the current state does not own (stale
    /// ready notifications, handlers of a torn-down overlay) are ignored.
    pub fn dispatch<S: MapSurface + ?Sized>(&mut self, surface: &mut S, delivery: Delivery) {
        let Some(state) = self.state.as_mut() else {
            tracing::trace!("Ignoring {:?}: no overlay presented", delivery.event.kind());
            return;
        };

        // Only the subscriptions of the current generation's state are live
        let expected = match (&state.phase, delivery.event.kind()) {
            (Phase::AwaitingStyle { ready }, EventKind::StyleReady) => Some(*ready),
            (Phase::Installed { hover, .. }, EventKind::PointerMove) => Some(*hover),
            (Phase::Installed { click, .. }, EventKind::Click) => Some(*click),
            _ => None,
        };
        if expected != Some(delivery.subscription) {
            tracing::trace!(
                "Ignoring stale {:?} delivery for {:?} (generation {})",
                delivery.event.kind(),
                delivery.subscription,
                self.generation
            );
            return;
        }

        match delivery.event {
            SurfaceEvent::StyleReady => state.install(surface, &self.config),
            SurfaceEvent::PointerMove { point, .. } => state.on_pointer_move(surface, point),
            SurfaceEvent::Click { point, lng_lat } => state.on_click(
                surface,
                point,
                lng_lat,
                self.config.close_popup_on_empty_click,
            ),
        }
    }

    /// Drain the surface's queued events and dispatch them in order
    pub fn pump<S: MapSurface + ?Sized>(&mut self, surface: &mut S) {
        for delivery in surface.take_events() {
            self.dispatch(surface, delivery);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{
        AttributePatch, CanonicalFeature, DisplayValue, TrailAttributes, TrailGeometry,
    };
    use crate::style::NO_MATCH_ID;
    use crate::test_surface::RecordingSurface;
    use geo::{LineString, Point};

    fn trail(id: &str, coords: Vec<(f64, f64)>) -> CanonicalFeature {
        CanonicalFeature {
            geometry: TrailGeometry::LineString(LineString::from(coords)),
            attributes: TrailAttributes::from_patch(
                AttributePatch {
                    name: Some(format!("Trail {}", id)),
                    distance: Some(DisplayValue::Number(1000.0)),
                    ..Default::default()
                },
                || id.to_string(),
            ),
        }
    }

    fn poi(id: &str, x: f64, y: f64) -> CanonicalFeature {
        CanonicalFeature {
            geometry: TrailGeometry::Point(Point::new(x, y)),
            attributes: TrailAttributes::from_patch(AttributePatch::default(), || id.to_string()),
        }
    }

    fn collection(features: Vec<CanonicalFeature>) -> Arc<CanonicalCollection> {
        Arc::new(CanonicalCollection::new(features))
    }

    fn sample() -> Arc<CanonicalCollection> {
        collection(vec![
            trail("t1", vec![(-8.70, 37.10), (-8.65, 37.12)]),
            poi("p1", 20.0, 50.0),
        ])
    }

    #[test]
    fn test_present_installs_source_and_layers_in_order() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();

        let state = sync.present(&mut surface, sample());
        assert!(state.is_installed());
        assert_eq!(
            state.installed_layers(),
            &[LINE_LAYER_ID, HIGHLIGHT_LAYER_ID, POINT_LAYER_ID]
        );
        assert!(surface.has_source(SOURCE_ID));
        assert_eq!(
            surface.layer_ids(),
            vec![LINE_LAYER_ID, HIGHLIGHT_LAYER_ID, POINT_LAYER_ID]
        );
        assert_eq!(
            surface.filter_of(HIGHLIGHT_LAYER_ID),
            Some(&Filter::IdEquals(NO_MATCH_ID.to_string()))
        );
        assert_eq!(surface.active_subscriptions(), 2);
    }

    #[test]
    fn test_present_fits_to_line_not_far_point() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());

        assert_eq!(surface.fits.len(), 1);
        let fit = surface.fits[0];
        assert_eq!(fit.bounds.max().x, -8.65);
        assert_eq!(fit.max_zoom, Some(15.0));
    }

    #[test]
    fn test_empty_collection_installs_without_viewport_change() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        let state = sync.present(&mut surface, collection(vec![]));

        assert!(state.is_installed());
        assert!(surface.has_source(SOURCE_ID));
        assert!(surface.fits.is_empty());
    }

    #[test]
    fn test_second_present_replaces_first_without_leaks() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();

        let first = sample();
        let second = collection(vec![trail("t2", vec![(0.0, 0.0), (1.0, 1.0)])]);
        sync.present(&mut surface, first);
        sync.present(&mut surface, second.clone());

        assert!(Arc::ptr_eq(&surface.sources[SOURCE_ID], &second));
        assert_eq!(surface.layers.len(), 3);
        assert_eq!(surface.active_subscriptions(), 2);

        sync.teardown(&mut surface);
        assert_eq!(surface.subscribe_calls, surface.unsubscribe_calls);
        assert_eq!(surface.active_subscriptions(), 0);
        assert!(surface.layers.is_empty());
        assert!(surface.sources.is_empty());
    }

    #[test]
    fn test_teardown_removes_layers_before_source() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());
        surface.log.clear();

        sync.teardown(&mut surface);
        let source_at = surface
            .log
            .iter()
            .position(|op| op == &format!("remove_source {}", SOURCE_ID))
            .unwrap();
        let last_layer_at = surface
            .log
            .iter()
            .rposition(|op| op.starts_with("remove_layer"))
            .unwrap();
        assert!(last_layer_at < source_at);
        assert!(sync.state().is_none());
    }

    #[test]
    fn test_teardown_tolerates_missing_targets() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());

        // Someone else already removed part of the overlay
        surface.remove_layer(POINT_LAYER_ID).unwrap();
        surface.remove_layer(HIGHLIGHT_LAYER_ID).unwrap();

        sync.teardown(&mut surface);
        assert!(surface.layers.is_empty());
        assert!(surface.sources.is_empty());

        // Tearing down twice is a no-op
        sync.teardown(&mut surface);
        assert!(sync.state().is_none());
    }

    #[test]
    fn test_hover_sets_and_resets_highlight() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());
        surface.place(10.0, 10.0, &["t1"]);

        surface.hover(10.0, 10.0);
        sync.pump(&mut surface);
        assert_eq!(
            surface.filter_of(HIGHLIGHT_LAYER_ID),
            Some(&Filter::IdEquals("t1".to_string()))
        );
        assert_eq!(surface.cursor, Cursor::Pointer);
        assert_eq!(sync.highlighted(), Some("t1"));

        surface.hover(300.0, 300.0);
        sync.pump(&mut surface);
        assert_eq!(
            surface.filter_of(HIGHLIGHT_LAYER_ID),
            Some(&Filter::IdEquals(NO_MATCH_ID.to_string()))
        );
        assert_eq!(surface.cursor, Cursor::Default);
        assert_eq!(sync.highlighted(), None);
    }

    #[test]
    fn test_hover_moves_highlight_between_features() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(
            &mut surface,
            collection(vec![
                trail("t1", vec![(0.0, 0.0), (1.0, 1.0)]),
                trail("t2", vec![(2.0, 2.0), (3.0, 3.0)]),
            ]),
        );
        surface.place(10.0, 10.0, &["t1"]);
        surface.place(20.0, 20.0, &["t2"]);

        surface.hover(10.0, 10.0);
        surface.hover(20.0, 20.0);
        sync.pump(&mut surface);
        assert_eq!(
            surface.filter_of(HIGHLIGHT_LAYER_ID),
            Some(&Filter::IdEquals("t2".to_string()))
        );
        assert_eq!(surface.cursor, Cursor::Pointer);
        assert_eq!(sync.highlighted(), Some("t2"));
    }

    #[test]
    fn test_hover_ignores_points_on_other_layers() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());
        surface.place(5.0, 5.0, &["p1"]);

        surface.hover(5.0, 5.0);
        sync.pump(&mut surface);
        assert_eq!(sync.highlighted(), None);
        assert_eq!(surface.cursor, Cursor::Default);
    }

    #[test]
    fn test_click_empty_space_opens_no_popup() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());

        surface.click(1.0, 1.0);
        sync.pump(&mut surface);
        assert_eq!(surface.popups_opened, 0);
        assert!(surface.popups.is_empty());
    }

    #[test]
    fn test_click_opens_single_popup_and_replaces_it() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(
            &mut surface,
            collection(vec![
                trail("t1", vec![(0.0, 0.0), (1.0, 1.0)]),
                trail("t2", vec![(2.0, 2.0), (3.0, 3.0)]),
            ]),
        );
        surface.place(10.0, 10.0, &["t1"]);
        surface.place(20.0, 20.0, &["t2"]);

        surface.click(10.0, 10.0);
        sync.pump(&mut surface);
        assert_eq!(surface.popups.len(), 1);
        let (at, content) = surface.popups.values().next().unwrap();
        assert_eq!(*at, LngLat::new(10.0, 10.0));
        assert_eq!(content.title, "Trail t1");
        assert_eq!(content.rows[0].1, "1000 m");

        surface.click(20.0, 20.0);
        sync.pump(&mut surface);
        assert_eq!(surface.popups.len(), 1);
        assert_eq!(surface.popups_opened, 2);
        let (_, content) = surface.popups.values().next().unwrap();
        assert_eq!(content.title, "Trail t2");
    }

    #[test]
    fn test_click_takes_topmost_feature() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(
            &mut surface,
            collection(vec![
                trail("below", vec![(0.0, 0.0), (1.0, 1.0)]),
                trail("above", vec![(0.0, 1.0), (1.0, 0.0)]),
            ]),
        );
        surface.place(10.0, 10.0, &["below", "above"]);

        surface.click(10.0, 10.0);
        sync.pump(&mut surface);
        let (_, content) = surface.popups.values().next().unwrap();
        assert_eq!(content.title, "Trail above");
    }

    #[test]
    fn test_click_elsewhere_closes_popup() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());
        surface.place(10.0, 10.0, &["t1"]);

        surface.click(10.0, 10.0);
        surface.click(400.0, 400.0);
        sync.pump(&mut surface);
        assert!(surface.popups.is_empty());
        assert_eq!(surface.popups_opened, 1);
    }

    #[test]
    fn test_click_elsewhere_keeps_popup_when_configured() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::new(OverlayConfig {
            close_popup_on_empty_click: false,
            ..Default::default()
        });
        sync.present(&mut surface, sample());
        surface.place(10.0, 10.0, &["t1"]);

        surface.click(10.0, 10.0);
        surface.click(400.0, 400.0);
        sync.pump(&mut surface);
        assert_eq!(surface.popups.len(), 1);
    }

    #[test]
    fn test_present_closes_open_popup() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());
        surface.place(10.0, 10.0, &["t1"]);
        surface.click(10.0, 10.0);
        sync.pump(&mut surface);
        assert_eq!(surface.popups.len(), 1);

        sync.present(&mut surface, sample());
        assert!(surface.popups.is_empty());
    }

    #[test]
    fn test_deferred_install_waits_for_style() {
        let mut surface = RecordingSurface::loading();
        let mut sync = OverlaySynchronizer::default();

        let state = sync.present(&mut surface, sample());
        assert!(!state.is_installed());
        assert!(surface.sources.is_empty());
        assert!(surface.layers.is_empty());

        surface.finish_loading();
        sync.pump(&mut surface);
        assert!(sync.state().unwrap().is_installed());
        assert_eq!(surface.layers.len(), 3);
        assert_eq!(surface.fits.len(), 1);
    }

    #[test]
    fn test_repeated_ready_does_not_double_install() {
        let mut surface = RecordingSurface::loading();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());

        surface.finish_loading();
        sync.pump(&mut surface);
        let ready = SubscriptionId(1);
        sync.dispatch(
            &mut surface,
            Delivery {
                subscription: ready,
                event: SurfaceEvent::StyleReady,
            },
        );
        assert_eq!(surface.layers.len(), 3);
        assert_eq!(surface.fits.len(), 1);
        assert_eq!(
            surface.log.iter().filter(|op| op.starts_with("add_source")).count(),
            1
        );
    }

    #[test]
    fn test_superseded_deferred_install_is_cancelled() {
        let mut surface = RecordingSurface::loading();
        let mut sync = OverlaySynchronizer::default();

        let first = sample();
        let second = collection(vec![trail("t2", vec![(0.0, 0.0), (1.0, 1.0)])]);
        sync.present(&mut surface, first);
        let stale_ready = SubscriptionId(1);
        sync.present(&mut surface, second.clone());
        assert_eq!(sync.generation(), 2);

        // A late ready for the first request is a no-op
        sync.dispatch(
            &mut surface,
            Delivery {
                subscription: stale_ready,
                event: SurfaceEvent::StyleReady,
            },
        );
        assert!(surface.sources.is_empty());

        surface.finish_loading();
        sync.pump(&mut surface);
        assert!(Arc::ptr_eq(&surface.sources[SOURCE_ID], &second));
        assert_eq!(surface.layers.len(), 3);
        assert_eq!(
            surface.log.iter().filter(|op| op.starts_with("add_source")).count(),
            1
        );
    }

    #[test]
    fn test_teardown_before_ready_cancels_install() {
        let mut surface = RecordingSurface::loading();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());

        sync.teardown(&mut surface);
        assert_eq!(surface.active_subscriptions(), 0);

        surface.finish_loading();
        sync.pump(&mut surface);
        assert!(surface.sources.is_empty());
        assert!(surface.layers.is_empty());
    }

    #[test]
    fn test_deferred_teardown_leaves_only_consumed_ready_subscriptions() {
        let mut surface = RecordingSurface::loading();
        let mut sync = OverlaySynchronizer::default();

        // The first ready subscription is superseded and detached by the second present
        sync.present(&mut surface, sample());
        sync.present(&mut surface, sample());
        surface.finish_loading();
        sync.pump(&mut surface);
        assert!(sync.state().unwrap().is_installed());

        sync.teardown(&mut surface);
        assert_eq!(surface.active_subscriptions(), 0);

        let ready_subscribed = surface
            .log
            .iter()
            .filter(|op| op.as_str() == "subscribe_once StyleReady")
            .count();
        let ready_unsubscribed = surface
            .log
            .iter()
            .filter(|op| op.as_str() == "unsubscribe StyleReady")
            .count();
        assert_eq!(ready_subscribed, 2);
        assert_eq!(ready_unsubscribed, 1);
        // The one consumed ready notification is the only unbalanced subscribe
        assert_eq!(surface.subscribe_calls - surface.unsubscribe_calls, 1);
    }

    #[test]
    fn test_stale_handlers_are_ignored_after_reinstall() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.present(&mut surface, sample());
        surface.place(10.0, 10.0, &["t1"]);

        // Queued against the first install's handlers
        surface.click(10.0, 10.0);
        let stale = surface.take_events();
        sync.present(&mut surface, sample());

        for delivery in stale {
            sync.dispatch(&mut surface, delivery);
        }
        assert!(surface.popups.is_empty());
    }

    #[test]
    fn test_dispatch_without_state_is_noop() {
        let mut surface = RecordingSurface::ready();
        let mut sync = OverlaySynchronizer::default();
        sync.dispatch(
            &mut surface,
            Delivery {
                subscription: SubscriptionId(7),
                event: SurfaceEvent::StyleReady,
            },
        );
        assert!(sync.state().is_none());
        assert!(surface.log.is_empty());
    }
}
