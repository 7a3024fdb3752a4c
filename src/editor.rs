//! One poster editing session.
//!
//! `Editor` owns the layout and drives it from uploads, pointer gestures, and
//! map notifications. Every mutation is followed by a line reconcile, so the
//! map's line layers always match the marker/anchor pairs. Without a map,
//! placement, reconciliation, and re-projection do nothing.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::EditorConfig;
use crate::coords::{LngLat, ScreenPoint, Size};
use crate::drag::{DragTarget, DragTracker, Gesture};
use crate::export::{ExportError, Rasterizer, UiVisibility, export_image};
use crate::geotag::{ExifOracle, GeoTagger, PendingLocations, PlaceSelection, partition_located};
use crate::layout::{
    AnchorColor, AnchorIcon, DistributionEngine, ImageDecoder, ItemId, LayoutError, LayoutGraph, MapEvent,
    Photo, PhotoId, PlacementRequest, ReconcileReport, ScreenFrame, SizeResolver, ViewportSync, slider_position,
    slider_scale_factor,
};
use crate::map::MapService;
use crate::text::{PlaceName, ReverseGeocoder, TextBlock, lookup_place};
use crate::transmit::{ImageStore, MapState, Notice, ProjectPayload, Transmitter, transmit};
use crate::viewport::{ViewportPlan, ViewportPlanner};

/// Result of handing a batch of photos to the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub placed: Vec<ItemId>,
    /// Photos without coordinates, now waiting for manual entry
    pub awaiting_location: Vec<PhotoId>,
    /// Camera framing applied for an initial batch
    pub plan: Option<ViewportPlan>,
}

pub struct Editor<M> {
    config: EditorConfig,
    map: Option<M>,
    graph: LayoutGraph,
    pending: PendingLocations,
    text: TextBlock,
    /// Where the text block should be reverse geocoded from, once
    text_source: Option<LngLat>,
    /// The session's first batch has been placed; later batches are incremental
    placed_initial: bool,
    ui: UiVisibility,
    drag: DragTracker,
    sync: ViewportSync,
    sizing: SizeResolver,
    distribution: DistributionEngine,
    planner: ViewportPlanner,
    last_photo_id: u64,
}

impl<M: MapService> Editor<M> {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            map: None,
            graph: config.layout_graph(),
            pending: PendingLocations::default(),
            text: config.text.clone(),
            text_source: None,
            placed_initial: false,
            ui: UiVisibility::default(),
            drag: DragTracker::new(config.click_threshold),
            sync: ViewportSync::default(),
            sizing: config.size_resolver(),
            distribution: config.distribution(),
            planner: config.viewport_planner(),
            last_photo_id: 0,
            config,
        }
    }

    pub fn with_map(config: EditorConfig, map: M) -> Self {
        let mut editor = Self::new(config);
        editor.attach_map(map);
        editor
    }

    /// Install the map and draw every connecting line on it.
    pub fn attach_map(&mut self, map: M) {
        self.map = Some(map);
        self.graph.forget_lines();
        self.reconcile();
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut M> {
        self.map.as_mut()
    }

    pub fn graph(&self) -> &LayoutGraph {
        &self.graph
    }

    pub fn pending(&self) -> &PendingLocations {
        &self.pending
    }

    pub fn text(&self) -> &TextBlock {
        &self.text
    }

    pub fn set_text(&mut self, text: TextBlock) {
        self.text = text;
    }

    pub fn ui(&self) -> UiVisibility {
        self.ui
    }

    pub fn toggle_ui(&mut self) -> UiVisibility {
        self.ui.toggle()
    }

    pub fn new_photo(&mut self, image_ref: impl Into<String>, data: Vec<u8>) -> Photo {
        self.last_photo_id += 1;
        Photo::new(PhotoId(self.last_photo_id), image_ref, data)
    }

    /// Geotag and measure a batch. Nothing in the layout changes.
    pub async fn prepare<O: ExifOracle, D: ImageDecoder>(
        &self,
        oracle: &O,
        decoder: &D,
        photos: Vec<Photo>,
    ) -> Vec<Photo> {
        let mut photos = GeoTagger::new(oracle).tag(photos).await;
        self.sizing.measure(decoder, &mut photos).await;
        photos
    }

    /// The full upload pipeline for one batch.
    pub async fn ingest<O: ExifOracle, D: ImageDecoder>(
        &mut self,
        oracle: &O,
        decoder: &D,
        photos: Vec<Photo>,
    ) -> Admission {
        let photos = self.prepare(oracle, decoder, photos).await;
        self.admit(photos)
    }

    /// Place located photos; queue the rest for manual entry.
    pub fn admit(&mut self, photos: Vec<Photo>) -> Admission {
        let (located, unlocated) = partition_located(photos);
        let awaiting_location: Vec<PhotoId> = unlocated.iter().map(|p| p.id).collect();
        if !awaiting_location.is_empty() {
            info!(count = awaiting_location.len(), "photos need a manual location");
        }
        self.pending.push(unlocated);

        let (placed, plan) = self.place(located);
        Admission {
            placed,
            awaiting_location,
            plan,
        }
    }

    fn place(&mut self, photos: Vec<Photo>) -> (Vec<ItemId>, Option<ViewportPlan>) {
        if photos.is_empty() {
            return (Vec::new(), None);
        }
        let Some(map) = self.map.as_mut() else {
            warn!(count = photos.len(), "map not ready, photos not placed");
            return (Vec::new(), None);
        };

        let initial = !self.placed_initial;
        let mut plan = None;
        if initial {
            let framed = self.planner.plan(photos.iter().map(Photo::coordinates));
            map.jump_to(framed.center, framed.zoom);
            plan = Some(framed);
        }

        let container = map.container_size();
        let sizes = self
            .sizing
            .resolve(&photos, container.height, self.graph.marker_count());
        let requests: Vec<PlacementRequest> = photos
            .iter()
            .zip(sizes)
            .filter_map(|(photo, size)| {
                Some(PlacementRequest {
                    photo_id: photo.id,
                    image_ref: photo.image_ref.clone(),
                    anchor: photo.coordinates()?,
                    size,
                })
            })
            .collect();

        let placements = self.distribution.distribute(&*map, requests, initial);
        if initial {
            self.text_source = placements.first().map(|p| p.anchor);
            self.placed_initial = true;
        }
        let ids = self.graph.commit_placement(placements);
        self.graph.reconcile_lines(map);

        info!(count = ids.len(), initial, "committed placements");
        (ids, plan)
    }

    /// Give a queued photo its location and place it.
    pub fn resolve_location(&mut self, id: PhotoId, place: &PlaceSelection) -> Result<Admission, LayoutError> {
        let photo = self.pending.submit(id, place)?;
        Ok(self.admit(vec![photo]))
    }

    /// Close the manual-location form. Queued photos are dropped.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.discard();
        if dropped > 0 {
            info!(count = dropped, "discarded photos awaiting a location");
        }
        dropped
    }

    pub fn text_source(&self) -> Option<LngLat> {
        self.text_source
    }

    /// Claim the pending reverse-geocode point, if any.
    pub fn take_text_source(&mut self) -> Option<LngLat> {
        self.text_source.take()
    }

    /// Fill the text block from the first placed photo. Runs at most once per initial placement.
    pub async fn refresh_text<G: ReverseGeocoder>(&mut self, geocoder: &G) -> bool {
        let Some(at) = self.take_text_source() else {
            return false;
        };
        match lookup_place(geocoder, at).await {
            Some(place) => {
                self.apply_place(&place, at);
                true
            }
            None => false,
        }
    }

    /// Fill the text block from a looked-up place.
    pub fn apply_place(&mut self, place: &PlaceName, at: LngLat) {
        self.text.apply_place(place, at);
    }

    pub fn pointer_down(&mut self, target: DragTarget, at: ScreenPoint) -> Result<(), LayoutError> {
        let Some(map) = self.map.as_ref() else {
            return Ok(());
        };
        let coordinates = match target {
            DragTarget::Marker(id) => self.graph.marker(id).ok_or(LayoutError::UnknownMarker(id))?.coordinates,
            DragTarget::Anchor(id) => self.graph.anchor(id).ok_or(LayoutError::UnknownAnchor(id))?.coordinates,
        };
        self.drag.begin(target, at, map.project(coordinates));
        Ok(())
    }

    pub fn pointer_move(&mut self, at: ScreenPoint) -> Option<(DragTarget, ScreenPoint)> {
        self.drag.update(at)
    }

    pub fn drag_preview(&self) -> Option<(DragTarget, ScreenPoint)> {
        self.drag.preview()
    }

    /// Complete a gesture: a click selects, a drag moves.
    pub fn pointer_up(&mut self, at: ScreenPoint) -> Result<Option<Gesture>, LayoutError> {
        let Some(map) = self.map.as_ref() else {
            self.drag.cancel();
            return Ok(None);
        };
        let Some(gesture) = self.drag.finish(at, map) else {
            return Ok(None);
        };

        match gesture {
            Gesture::Click(DragTarget::Marker(id)) => self.graph.select_marker(id)?,
            Gesture::Click(DragTarget::Anchor(id)) => self.graph.select_anchor(id)?,
            Gesture::Drag {
                target: DragTarget::Marker(id),
                to,
            } => self.move_marker(id, to)?,
            Gesture::Drag {
                target: DragTarget::Anchor(id),
                to,
            } => self.move_anchor(id, to)?,
        }
        Ok(Some(gesture))
    }

    pub fn move_marker(&mut self, id: ItemId, to: LngLat) -> Result<(), LayoutError> {
        self.graph.move_marker(id, to)?;
        self.reconcile();
        Ok(())
    }

    pub fn move_anchor(&mut self, id: ItemId, to: LngLat) -> Result<(), LayoutError> {
        self.graph.move_anchor(id, to)?;
        self.reconcile();
        Ok(())
    }

    pub fn resize_marker(&mut self, id: ItemId, size: Size) -> Result<Size, LayoutError> {
        let size = self.graph.resize_marker(id, size)?;
        self.reconcile();
        Ok(size)
    }

    pub fn scale_marker(&mut self, id: ItemId, factor: f64) -> Result<Size, LayoutError> {
        let size = self.graph.scale_marker(id, factor)?;
        self.reconcile();
        Ok(size)
    }

    /// Apply a size-slider position in `[0, 100]`.
    pub fn set_marker_slider(&mut self, id: ItemId, position: f64) -> Result<Size, LayoutError> {
        self.scale_marker(id, slider_scale_factor(position))
    }

    /// Slider position matching the marker's current size.
    pub fn marker_slider(&self, id: ItemId) -> Option<f64> {
        let marker = self.graph.marker(id)?;
        Some(slider_position(marker.size.width / marker.base_size.width))
    }

    pub fn replace_marker_image(&mut self, id: ItemId, image_ref: impl Into<String>) -> Result<(), LayoutError> {
        self.graph.replace_marker_image(id, image_ref)
    }

    pub fn select_marker(&mut self, id: ItemId) -> Result<(), LayoutError> {
        self.graph.select_marker(id)
    }

    pub fn deselect_all(&mut self) {
        self.graph.deselect_all();
    }

    pub fn select_anchor(&mut self, id: ItemId) -> Result<(), LayoutError> {
        self.graph.select_anchor(id)
    }

    pub fn deselect_anchors(&mut self) {
        self.graph.deselect_anchors();
    }

    pub fn restyle_anchor(&mut self, id: ItemId, icon: AnchorIcon, color: AnchorColor) -> Result<(), LayoutError> {
        self.graph.restyle_anchor(id, icon, color)
    }

    pub fn remove_marker(&mut self, id: ItemId) -> Result<(), LayoutError> {
        self.graph.remove_marker(id)?;
        self.reconcile();
        Ok(())
    }

    pub fn remove_anchor(&mut self, id: ItemId) -> Result<(), LayoutError> {
        self.graph.remove_anchor(id)?;
        self.reconcile();
        Ok(())
    }

    pub fn remove_pair(&mut self, id: ItemId) -> Result<(), LayoutError> {
        self.graph.remove_pair(id)?;
        self.reconcile();
        Ok(())
    }

    fn reconcile(&mut self) -> ReconcileReport {
        match self.map.as_mut() {
            Some(map) => self.graph.reconcile_lines(map),
            None => ReconcileReport::default(),
        }
    }

    /// Map moved, zoomed, or resized.
    pub fn handle_map_event(&mut self, event: MapEvent) -> Option<ScreenFrame> {
        let map = self.map.as_mut()?;
        let (frame, _) = self.sync.on_event(event, &mut self.graph, map);
        Some(frame)
    }

    pub fn frame(&self) -> Option<ScreenFrame> {
        self.map.as_ref().map(|map| ScreenFrame::project(&self.graph, map))
    }

    pub fn map_state(&self) -> Option<MapState> {
        let map = self.map.as_ref()?;
        Some(MapState {
            center: map.center(),
            zoom: map.zoom(),
            style_name: self.config.style_name.clone(),
        })
    }

    pub fn project_payload(&self) -> Option<ProjectPayload> {
        Some(ProjectPayload::from_graph(&self.graph, self.map_state()?, &self.text))
    }

    pub async fn export<R: Rasterizer>(&mut self, rasterizer: &R) -> Result<Vec<u8>, ExportError> {
        if self.map.is_none() {
            return Err(ExportError::Empty);
        }
        export_image(&mut self.ui, rasterizer).await
    }

    /// Hide the overlays ahead of an externally driven capture.
    pub fn begin_export(&mut self) -> UiVisibility {
        self.ui.hide_for_capture()
    }

    pub fn finish_export(&mut self, previous: UiVisibility) {
        self.ui = previous;
    }

    /// Upload images and post the layout. The layout is never modified.
    pub async fn transmit<S: ImageStore, T: Transmitter>(&self, store: &S, transmitter: &T) -> Notice {
        match self.project_payload() {
            Some(payload) => transmit(store, transmitter, payload).await,
            None => Notice::Error("The map is not ready yet.".to_string()),
        }
    }
}
