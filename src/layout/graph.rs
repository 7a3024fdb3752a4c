//! Live marker/anchor/line state.
//!
//! Markers and anchors are keyed by a shared `ItemId`; a line exists for an
//! id exactly when both a marker and an anchor with that id exist. Removals
//! drop the graph's line at once; only `reconcile_lines` writes map layers.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::coords::{LngLat, Size};
use crate::map::LineLayers;

use super::types::{
    AnchorColor, AnchorIcon, AnchorMarker, ConnectingLine, ImageMarker, ItemId, PhotoId, Placement,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LayoutError {
    #[error("No image marker with id {0}")]
    UnknownMarker(ItemId),
    #[error("No anchor with id {0}")]
    UnknownAnchor(ItemId),
    #[error("No photo awaiting a location with id {0}")]
    UnknownPendingPhoto(PhotoId),
}

/// What a reconcile pass changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub upserted: Vec<ItemId>,
    pub removed: Vec<ItemId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.removed.is_empty()
    }
}

pub struct LayoutGraph {
    markers: BTreeMap<ItemId, ImageMarker>,
    anchors: BTreeMap<ItemId, AnchorMarker>,
    lines: BTreeMap<ItemId, ConnectingLine>,
    /// Lines dropped from the graph whose map layer is still drawn
    stale: BTreeSet<ItemId>,
    /// Last id handed out; never decreases
    last_id: u64,
    min_marker_size: f64,
    default_icon: AnchorIcon,
    default_color: AnchorColor,
}

impl Default for LayoutGraph {
    fn default() -> Self {
        Self::new(50.0, AnchorIcon::default(), AnchorColor::default())
    }
}

impl LayoutGraph {
    pub fn new(min_marker_size: f64, default_icon: AnchorIcon, default_color: AnchorColor) -> Self {
        Self {
            markers: BTreeMap::new(),
            anchors: BTreeMap::new(),
            lines: BTreeMap::new(),
            stale: BTreeSet::new(),
            last_id: 0,
            min_marker_size,
            default_icon,
            default_color,
        }
    }

    pub fn markers(&self) -> impl Iterator<Item = &ImageMarker> {
        self.markers.values()
    }

    pub fn anchors(&self) -> impl Iterator<Item = &AnchorMarker> {
        self.anchors.values()
    }

    pub fn lines(&self) -> impl Iterator<Item = &ConnectingLine> {
        self.lines.values()
    }

    pub fn marker(&self, id: ItemId) -> Option<&ImageMarker> {
        self.markers.get(&id)
    }

    pub fn anchor(&self, id: ItemId) -> Option<&AnchorMarker> {
        self.anchors.get(&id)
    }

    pub fn line(&self, id: ItemId) -> Option<&ConnectingLine> {
        self.lines.get(&id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.anchors.is_empty()
    }

    pub fn active_marker(&self) -> Option<ItemId> {
        self.markers.values().find(|m| m.active).map(|m| m.id)
    }

    pub fn selected_anchor(&self) -> Option<ItemId> {
        self.anchors.values().find(|a| a.selected).map(|a| a.id)
    }

    /// Create one marker/anchor pair per placement. Existing entries are untouched.
    pub fn commit_placement(&mut self, placements: Vec<Placement>) -> Vec<ItemId> {
        let mut ids = Vec::with_capacity(placements.len());

        for placement in placements {
            self.last_id += 1;
            let id = ItemId(self.last_id);

            self.markers.insert(
                id,
                ImageMarker {
                    id,
                    photo_id: placement.photo_id,
                    coordinates: placement.adjusted,
                    size: placement.size,
                    base_size: placement.size,
                    active: false,
                    image_ref: placement.image_ref,
                },
            );
            self.anchors.insert(
                id,
                AnchorMarker {
                    id,
                    coordinates: placement.anchor,
                    icon: self.default_icon,
                    color: self.default_color,
                    filled: self.default_icon.filled(),
                    selected: false,
                },
            );
            ids.push(id);
        }

        ids
    }

    pub fn move_marker(&mut self, id: ItemId, to: LngLat) -> Result<(), LayoutError> {
        self.marker_mut(id)?.coordinates = to;
        Ok(())
    }

    pub fn move_anchor(&mut self, id: ItemId, to: LngLat) -> Result<(), LayoutError> {
        self.anchor_mut(id)?.coordinates = to;
        Ok(())
    }

    /// Set the display size, floored at the minimum marker size.
    pub fn resize_marker(&mut self, id: ItemId, size: Size) -> Result<Size, LayoutError> {
        let floor = self.min_marker_size;
        let marker = self.marker_mut(id)?;
        marker.size = size.at_least(floor);
        Ok(marker.size)
    }

    /// Resize relative to the size the marker was placed with.
    pub fn scale_marker(&mut self, id: ItemId, factor: f64) -> Result<Size, LayoutError> {
        let base = self.marker(id).ok_or(LayoutError::UnknownMarker(id))?.base_size;
        self.resize_marker(id, base.scaled(factor))
    }

    /// Swap the image data reference in place (after a crop or edit).
    pub fn replace_marker_image(&mut self, id: ItemId, image_ref: impl Into<String>) -> Result<(), LayoutError> {
        self.marker_mut(id)?.image_ref = image_ref.into();
        Ok(())
    }

    pub fn select_marker(&mut self, id: ItemId) -> Result<(), LayoutError> {
        if !self.markers.contains_key(&id) {
            return Err(LayoutError::UnknownMarker(id));
        }
        for marker in self.markers.values_mut() {
            marker.active = marker.id == id;
        }
        Ok(())
    }

    pub fn deselect_all(&mut self) {
        for marker in self.markers.values_mut() {
            marker.active = false;
        }
    }

    pub fn select_anchor(&mut self, id: ItemId) -> Result<(), LayoutError> {
        if !self.anchors.contains_key(&id) {
            return Err(LayoutError::UnknownAnchor(id));
        }
        for anchor in self.anchors.values_mut() {
            anchor.selected = anchor.id == id;
        }
        Ok(())
    }

    pub fn deselect_anchors(&mut self) {
        for anchor in self.anchors.values_mut() {
            anchor.selected = false;
        }
    }

    /// Change the glyph and color; the filled flag follows the glyph.
    pub fn restyle_anchor(&mut self, id: ItemId, icon: AnchorIcon, color: AnchorColor) -> Result<(), LayoutError> {
        let anchor = self.anchor_mut(id)?;
        anchor.icon = icon;
        anchor.color = color;
        anchor.filled = icon.filled();
        Ok(())
    }

    /// Remove a marker and its line. The anchor stays; the map layer goes on the next reconcile.
    pub fn remove_marker(&mut self, id: ItemId) -> Result<ImageMarker, LayoutError> {
        let marker = self.markers.remove(&id).ok_or(LayoutError::UnknownMarker(id))?;
        self.drop_line(id);
        Ok(marker)
    }

    /// Remove an anchor and its line. The marker stays; the map layer goes on the next reconcile.
    pub fn remove_anchor(&mut self, id: ItemId) -> Result<AnchorMarker, LayoutError> {
        let anchor = self.anchors.remove(&id).ok_or(LayoutError::UnknownAnchor(id))?;
        self.drop_line(id);
        Ok(anchor)
    }

    /// Remove a marker and its anchor together. Either half may already be gone.
    pub fn remove_pair(&mut self, id: ItemId) -> Result<(), LayoutError> {
        let marker = self.markers.remove(&id);
        let anchor = self.anchors.remove(&id);
        if marker.is_none() && anchor.is_none() {
            return Err(LayoutError::UnknownMarker(id));
        }
        self.drop_line(id);
        Ok(())
    }

    fn drop_line(&mut self, id: ItemId) {
        if self.lines.remove(&id).is_some() {
            self.stale.insert(id);
        }
    }

    /// Forget which lines have been drawn, so the next reconcile draws every
    /// pair again. Used when a fresh map replaces the old one.
    pub fn forget_lines(&mut self) {
        self.lines.clear();
        self.stale.clear();
    }

    /// Bring map line layers in line with the current marker/anchor pairs.
    ///
    /// Deletes layers for removed lines, and upserts a line only when it is
    /// missing or its geometry changed. A line is recorded only once its layer
    /// write succeeds; failed writes are retried on the next pass. A second
    /// call with unchanged state touches nothing.
    pub fn reconcile_lines<L: LineLayers + ?Sized>(&mut self, layers: &mut L) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let orphans: Vec<ItemId> = self
            .lines
            .keys()
            .filter(|id| !(self.markers.contains_key(id) && self.anchors.contains_key(id)))
            .copied()
            .collect();
        for id in orphans {
            self.drop_line(id);
        }

        let stale: Vec<ItemId> = self.stale.iter().copied().collect();
        for id in stale {
            match layers.remove_line(&id.line_key()) {
                Ok(()) => {
                    self.stale.remove(&id);
                    report.removed.push(id);
                }
                Err(e) => warn!("{}", e),
            }
        }

        for (id, marker) in &self.markers {
            let Some(anchor) = self.anchors.get(id) else {
                continue;
            };
            let geometry = [marker.coordinates, anchor.coordinates];
            if self.lines.get(id).is_some_and(|line| line.geometry == geometry) {
                continue;
            }
            match layers.upsert_line(&id.line_key(), geometry) {
                Ok(()) => {
                    self.lines.insert(*id, ConnectingLine { id: *id, geometry });
                    report.upserted.push(*id);
                }
                Err(e) => warn!("{}", e),
            }
        }

        if !report.is_empty() {
            debug!(
                upserted = report.upserted.len(),
                removed = report.removed.len(),
                "reconciled connecting lines"
            );
        }
        report
    }

    fn marker_mut(&mut self, id: ItemId) -> Result<&mut ImageMarker, LayoutError> {
        self.markers.get_mut(&id).ok_or(LayoutError::UnknownMarker(id))
    }

    fn anchor_mut(&mut self, id: ItemId) -> Result<&mut AnchorMarker, LayoutError> {
        self.anchors.get_mut(&id).ok_or(LayoutError::UnknownAnchor(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{LineLayerStore, MapError};

    /// Layer store that rejects a set number of writes before accepting any.
    #[derive(Default)]
    struct FlakyLayers {
        failures_left: usize,
        store: LineLayerStore,
    }

    impl FlakyLayers {
        fn write(&mut self, key: &str) -> Result<(), MapError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(MapError::Layer {
                    key: key.to_string(),
                    reason: "style is reloading".to_string(),
                });
            }
            Ok(())
        }
    }

    impl LineLayers for FlakyLayers {
        fn upsert_line(&mut self, key: &str, geometry: [LngLat; 2]) -> Result<(), MapError> {
            self.write(key)?;
            self.store.upsert_line(key, geometry)
        }

        fn remove_line(&mut self, key: &str) -> Result<(), MapError> {
            self.write(key)?;
            self.store.remove_line(key)
        }
    }

    fn placement(n: u64) -> Placement {
        Placement {
            photo_id: PhotoId(n),
            image_ref: format!("blob:{}", n),
            anchor: LngLat::new(n as f64, n as f64),
            adjusted: LngLat::new(n as f64 + 0.01, n as f64 + 0.01),
            size: Size::new(120.0, 90.0),
        }
    }

    fn graph_with(n: u64) -> (LayoutGraph, LineLayerStore) {
        let mut graph = LayoutGraph::default();
        let mut layers = LineLayerStore::default();
        graph.commit_placement((1..=n).map(placement).collect());
        graph.reconcile_lines(&mut layers);
        (graph, layers)
    }

    fn line_ids(graph: &LayoutGraph) -> BTreeSet<ItemId> {
        graph.lines().map(|l| l.id).collect()
    }

    fn paired_ids(graph: &LayoutGraph) -> BTreeSet<ItemId> {
        let anchors: BTreeSet<ItemId> = graph.anchors().map(|a| a.id).collect();
        graph.markers().map(|m| m.id).filter(|id| anchors.contains(id)).collect()
    }

    #[test]
    fn test_commit_creates_pairs() {
        let (graph, layers) = graph_with(1);
        let marker = graph.marker(ItemId(1)).unwrap();
        let anchor = graph.anchor(ItemId(1)).unwrap();
        assert_eq!(marker.coordinates, LngLat::new(1.01, 1.01));
        assert_eq!(anchor.coordinates, LngLat::new(1.0, 1.0));
        assert_eq!(anchor.icon, AnchorIcon::Heart);
        assert!(anchor.filled);
        assert_eq!(layers.get("line-1"), Some(&[marker.coordinates, anchor.coordinates]));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (mut graph, mut layers) = graph_with(3);
        let writes = layers.writes();
        let report = graph.reconcile_lines(&mut layers);
        assert!(report.is_empty());
        assert_eq!(layers.writes(), writes);
    }

    #[test]
    fn test_move_updates_only_that_line() {
        let (mut graph, mut layers) = graph_with(3);
        graph.move_marker(ItemId(2), LngLat::new(9.0, 9.0)).unwrap();
        let report = graph.reconcile_lines(&mut layers);
        assert_eq!(report.upserted, vec![ItemId(2)]);
        assert_eq!(layers.get("line-2").unwrap()[0], LngLat::new(9.0, 9.0));

        graph.move_anchor(ItemId(3), LngLat::new(-1.0, -1.0)).unwrap();
        let report = graph.reconcile_lines(&mut layers);
        assert_eq!(report.upserted, vec![ItemId(3)]);
        assert_eq!(layers.get("line-3").unwrap()[1], LngLat::new(-1.0, -1.0));
    }

    #[test]
    fn test_remove_anchor_drops_line_keeps_marker() {
        let (mut graph, mut layers) = graph_with(1);
        graph.remove_anchor(ItemId(1)).unwrap();
        let report = graph.reconcile_lines(&mut layers);

        assert_eq!(report.removed, vec![ItemId(1)]);
        assert!(layers.get("line-1").is_none());
        assert!(graph.marker(ItemId(1)).is_some());
        assert!(graph.line(ItemId(1)).is_none());

        graph.move_marker(ItemId(1), LngLat::new(3.0, 3.0)).unwrap();
        assert!(graph.reconcile_lines(&mut layers).is_empty());
    }

    #[test]
    fn test_removal_drops_line_before_reconcile() {
        let (mut graph, layers) = graph_with(2);
        graph.remove_anchor(ItemId(1)).unwrap();
        graph.remove_marker(ItemId(2)).unwrap();

        assert!(graph.line(ItemId(1)).is_none());
        assert!(graph.line(ItemId(2)).is_none());
        assert_eq!(graph.lines().count(), 0);
        assert_eq!(layers.len(), 2);
    }

    #[test]
    fn test_failed_upsert_is_retried() {
        let mut graph = LayoutGraph::default();
        graph.commit_placement(vec![placement(1)]);
        let mut layers = FlakyLayers {
            failures_left: 1,
            ..FlakyLayers::default()
        };

        assert!(graph.reconcile_lines(&mut layers).is_empty());
        assert!(graph.line(ItemId(1)).is_none());

        let report = graph.reconcile_lines(&mut layers);
        assert_eq!(report.upserted, vec![ItemId(1)]);
        assert!(layers.store.get("line-1").is_some());
    }

    #[test]
    fn test_failed_remove_is_retried() {
        let mut graph = LayoutGraph::default();
        let mut layers = FlakyLayers::default();
        graph.commit_placement(vec![placement(1)]);
        graph.reconcile_lines(&mut layers);

        graph.remove_anchor(ItemId(1)).unwrap();
        layers.failures_left = 1;
        assert!(graph.reconcile_lines(&mut layers).removed.is_empty());
        assert!(layers.store.get("line-1").is_some());

        assert_eq!(graph.reconcile_lines(&mut layers).removed, vec![ItemId(1)]);
        assert!(layers.store.is_empty());
    }

    #[test]
    fn test_forget_lines_redraws_on_new_layers() {
        let (mut graph, _) = graph_with(2);
        graph.remove_anchor(ItemId(2)).unwrap();
        graph.forget_lines();

        let mut fresh = LineLayerStore::default();
        let report = graph.reconcile_lines(&mut fresh);
        assert_eq!(report.upserted, vec![ItemId(1)]);
        assert!(report.removed.is_empty());
        assert_eq!(fresh.keys().collect::<Vec<_>>(), vec!["line-1"]);
    }

    #[test]
    fn test_remove_marker_keeps_anchor() {
        let (mut graph, mut layers) = graph_with(2);
        graph.remove_marker(ItemId(2)).unwrap();
        graph.reconcile_lines(&mut layers);
        assert!(graph.anchor(ItemId(2)).is_some());
        assert_eq!(layers.keys().collect::<Vec<_>>(), vec!["line-1"]);
    }

    #[test]
    fn test_lines_match_pairs_after_mixed_operations() {
        let (mut graph, mut layers) = graph_with(4);
        graph.remove_marker(ItemId(1)).unwrap();
        graph.remove_anchor(ItemId(3)).unwrap();
        graph.commit_placement(vec![placement(5), placement(6)]);
        graph.remove_anchor(ItemId(6)).unwrap();
        graph.reconcile_lines(&mut layers);

        assert_eq!(line_ids(&graph), paired_ids(&graph));
        let keys: BTreeSet<String> = layers.keys().map(str::to_string).collect();
        let expected: BTreeSet<String> = paired_ids(&graph).iter().map(|id| id.line_key()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_remove_pair() {
        let (mut graph, mut layers) = graph_with(2);
        graph.remove_pair(ItemId(1)).unwrap();
        graph.reconcile_lines(&mut layers);
        assert!(graph.marker(ItemId(1)).is_none() && graph.anchor(ItemId(1)).is_none());
        assert_eq!(layers.keys().collect::<Vec<_>>(), vec!["line-2"]);

        graph.remove_anchor(ItemId(2)).unwrap();
        assert!(graph.remove_pair(ItemId(2)).is_ok());
        assert_eq!(graph.remove_pair(ItemId(2)), Err(LayoutError::UnknownMarker(ItemId(2))));
    }

    #[test]
    fn test_ids_never_reused() {
        let (mut graph, _) = graph_with(3);
        graph.remove_marker(ItemId(3)).unwrap();
        graph.remove_anchor(ItemId(3)).unwrap();
        let ids = graph.commit_placement(vec![placement(7), placement(8)]);
        assert_eq!(ids, vec![ItemId(4), ItemId(5)]);
    }

    #[test]
    fn test_single_active_marker() {
        let (mut graph, _) = graph_with(3);
        graph.select_marker(ItemId(1)).unwrap();
        graph.select_marker(ItemId(3)).unwrap();
        assert_eq!(graph.markers().filter(|m| m.active).count(), 1);
        assert_eq!(graph.active_marker(), Some(ItemId(3)));

        graph.deselect_all();
        assert_eq!(graph.active_marker(), None);
    }

    #[test]
    fn test_select_unknown_keeps_selection() {
        let (mut graph, _) = graph_with(2);
        graph.select_marker(ItemId(2)).unwrap();
        assert_eq!(graph.select_marker(ItemId(9)), Err(LayoutError::UnknownMarker(ItemId(9))));
        assert_eq!(graph.active_marker(), Some(ItemId(2)));
    }

    #[test]
    fn test_anchor_selection_independent() {
        let (mut graph, _) = graph_with(2);
        graph.select_marker(ItemId(1)).unwrap();
        graph.select_anchor(ItemId(2)).unwrap();
        assert_eq!(graph.active_marker(), Some(ItemId(1)));
        assert_eq!(graph.selected_anchor(), Some(ItemId(2)));
        graph.deselect_anchors();
        assert_eq!(graph.selected_anchor(), None);
        assert_eq!(graph.active_marker(), Some(ItemId(1)));
    }

    #[test]
    fn test_resize_floor() {
        let (mut graph, _) = graph_with(1);
        let size = graph.resize_marker(ItemId(1), Size::new(10.0, 300.0)).unwrap();
        assert_eq!(size, Size::new(50.0, 300.0));
    }

    #[test]
    fn test_scale_relative_to_base() {
        let (mut graph, _) = graph_with(1);
        graph.scale_marker(ItemId(1), 2.0).unwrap();
        let size = graph.scale_marker(ItemId(1), 2.0).unwrap();
        assert_eq!(size, Size::new(240.0, 180.0));
        let tiny = graph.scale_marker(ItemId(1), 0.01).unwrap();
        assert_eq!(tiny, Size::new(50.0, 50.0));
    }

    #[test]
    fn test_replace_image_keeps_identity() {
        let (mut graph, _) = graph_with(1);
        let before = graph.marker(ItemId(1)).unwrap().clone();
        graph.replace_marker_image(ItemId(1), "blob:cropped").unwrap();
        let after = graph.marker(ItemId(1)).unwrap();
        assert_eq!(after.image_ref, "blob:cropped");
        assert_eq!(after.coordinates, before.coordinates);
        assert_eq!(after.size, before.size);
    }

    #[test]
    fn test_restyle_anchor() {
        let (mut graph, _) = graph_with(1);
        graph.restyle_anchor(ItemId(1), AnchorIcon::Camera, AnchorColor::Blue).unwrap();
        let anchor = graph.anchor(ItemId(1)).unwrap();
        assert_eq!(anchor.color, AnchorColor::Blue);
        assert!(!anchor.filled);
    }

    #[test]
    fn test_unknown_ids() {
        let (mut graph, _) = graph_with(1);
        assert!(graph.move_marker(ItemId(5), LngLat::new(0.0, 0.0)).is_err());
        assert!(graph.remove_anchor(ItemId(5)).is_err());
        assert_eq!(graph.remove_marker(ItemId(5)).unwrap_err(), LayoutError::UnknownMarker(ItemId(5)));
    }
}
