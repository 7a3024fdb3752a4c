//! Re-projection of the layout on map pan/zoom.

use serde::Serialize;
use tracing::debug;

use crate::coords::{ScreenPoint, Size};
use crate::map::{MapService, Projection};

use super::graph::{LayoutGraph, ReconcileReport};
use super::types::{AnchorColor, AnchorIcon, ItemId};

/// Map notifications that invalidate pixel positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    Move,
    Zoom,
    Resize,
}

impl MapEvent {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "move" => Some(Self::Move),
            "zoom" => Some(Self::Zoom),
            "resize" => Some(Self::Resize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerView {
    pub id: ItemId,
    /// Pixel center of the marker box
    pub center: ScreenPoint,
    pub size: Size,
    pub active: bool,
    pub image_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorView {
    pub id: ItemId,
    pub position: ScreenPoint,
    pub icon: AnchorIcon,
    pub color: AnchorColor,
    pub filled: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineView {
    pub id: ItemId,
    pub from: ScreenPoint,
    pub to: ScreenPoint,
}

/// Pixel-space view of the whole layout for one camera position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenFrame {
    pub container: Size,
    pub markers: Vec<MarkerView>,
    pub anchors: Vec<AnchorView>,
    pub lines: Vec<LineView>,
}

impl ScreenFrame {
    /// Project every marker, anchor, and line. Reads geographic state only.
    pub fn project<P: Projection + ?Sized>(graph: &LayoutGraph, map: &P) -> Self {
        let markers = graph
            .markers()
            .map(|m| MarkerView {
                id: m.id,
                center: map.project(m.coordinates),
                size: m.size,
                active: m.active,
                image_ref: m.image_ref.clone(),
            })
            .collect();

        let anchors = graph
            .anchors()
            .map(|a| AnchorView {
                id: a.id,
                position: map.project(a.coordinates),
                icon: a.icon,
                color: a.color,
                filled: a.filled,
                selected: a.selected,
            })
            .collect();

        let lines = graph
            .lines()
            .map(|l| LineView {
                id: l.id,
                from: map.project(l.geometry[0]),
                to: map.project(l.geometry[1]),
            })
            .collect();

        Self {
            container: map.container_size(),
            markers,
            anchors,
            lines,
        }
    }

    pub fn marker(&self, id: ItemId) -> Option<&MarkerView> {
        self.markers.iter().find(|m| m.id == id)
    }

    pub fn anchor(&self, id: ItemId) -> Option<&AnchorView> {
        self.anchors.iter().find(|a| a.id == id)
    }
}

/// Keeps screen positions attached to geography as the camera changes.
#[derive(Debug, Default)]
pub struct ViewportSync {
    events: u64,
}

impl ViewportSync {
    pub fn events_handled(&self) -> u64 {
        self.events
    }

    /// Handle one pan/zoom notification.
    pub fn on_event<M: MapService + ?Sized>(
        &mut self,
        event: MapEvent,
        graph: &mut LayoutGraph,
        map: &mut M,
    ) -> (ScreenFrame, ReconcileReport) {
        self.events += 1;
        let report = graph.reconcile_lines(map);
        let frame = ScreenFrame::project(graph, map);
        debug!(?event, markers = frame.markers.len(), "re-projected layout");
        (frame, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::LngLat;
    use crate::layout::types::{PhotoId, Placement};
    use crate::map::OfflineMap;

    fn setup() -> (LayoutGraph, OfflineMap) {
        let mut map = OfflineMap::new(Size::new(900.0, 1260.0), 512.0);
        map.jump_to(LngLat::new(2.35, 48.85), 14.0);
        let mut graph = LayoutGraph::default();
        graph.commit_placement(vec![Placement {
            photo_id: PhotoId(1),
            image_ref: "blob:1".into(),
            anchor: LngLat::new(2.35, 48.85),
            adjusted: LngLat::new(2.36, 48.86),
            size: Size::new(200.0, 150.0),
        }]);
        graph.reconcile_lines(&mut map);
        (graph, map)
    }

    #[test]
    fn test_event_names() {
        assert_eq!(MapEvent::from_str("zoom"), Some(MapEvent::Zoom));
        assert_eq!(MapEvent::from_str("click"), None);
    }

    #[test]
    fn test_pan_moves_pixels_not_coordinates() {
        let (mut graph, mut map) = setup();
        let mut sync = ViewportSync::default();
        let before = ScreenFrame::project(&graph, &map);

        map.view.pan_by(40.0, -25.0);
        let (after, report) = sync.on_event(MapEvent::Move, &mut graph, &mut map);

        let (b, a) = (before.marker(ItemId(1)).unwrap(), after.marker(ItemId(1)).unwrap());
        assert!((a.center.x - b.center.x - 40.0).abs() < 1e-6);
        assert!((a.center.y - b.center.y + 25.0).abs() < 1e-6);
        assert_eq!(graph.marker(ItemId(1)).unwrap().coordinates, LngLat::new(2.36, 48.86));
        assert_eq!(graph.anchor(ItemId(1)).unwrap().coordinates, LngLat::new(2.35, 48.85));
        assert!(report.is_empty());
        assert_eq!(sync.events_handled(), 1);
    }

    #[test]
    fn test_line_endpoints_follow_zoom() {
        let (mut graph, mut map) = setup();
        let mut sync = ViewportSync::default();
        map.view.set_zoom(16.0);
        let (frame, _) = sync.on_event(MapEvent::Zoom, &mut graph, &mut map);

        let line = &frame.lines[0];
        assert_eq!(line.from, frame.marker(ItemId(1)).unwrap().center);
        assert_eq!(line.to, frame.anchor(ItemId(1)).unwrap().position);
    }
}
