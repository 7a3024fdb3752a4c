//! Pointer gesture tracking for markers and anchors.

use crate::coords::{LngLat, ScreenPoint};
use crate::layout::ItemId;
use crate::map::Projection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    Marker(ItemId),
    Anchor(ItemId),
}

impl DragTarget {
    pub fn id(self) -> ItemId {
        match self {
            Self::Marker(id) | Self::Anchor(id) => id,
        }
    }
}

/// Outcome of a completed pointer sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Click(DragTarget),
    Drag { target: DragTarget, to: LngLat },
}

#[derive(Debug, Clone, Copy)]
struct PendingDrag {
    target: DragTarget,
    /// Pixel position of the dragged item when the press began
    origin: ScreenPoint,
    start: ScreenPoint,
    last: ScreenPoint,
}

impl PendingDrag {
    fn position(&self) -> ScreenPoint {
        self.origin.offset(self.last.x - self.start.x, self.last.y - self.start.y)
    }
}

#[derive(Debug)]
pub struct DragTracker {
    pending: Option<PendingDrag>,
    click_threshold: f64,
}

impl Default for DragTracker {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl DragTracker {
    pub fn new(click_threshold: f64) -> Self {
        Self {
            pending: None,
            click_threshold,
        }
    }

    pub fn target(&self) -> Option<DragTarget> {
        self.pending.map(|p| p.target)
    }

    /// Start tracking a press at `at` on an item drawn at `origin`.
    /// Any unfinished gesture is dropped.
    pub fn begin(&mut self, target: DragTarget, at: ScreenPoint, origin: ScreenPoint) {
        self.pending = Some(PendingDrag {
            target,
            origin,
            start: at,
            last: at,
        });
    }

    /// Record pointer travel; returns where the item would be dropped now.
    pub fn update(&mut self, at: ScreenPoint) -> Option<(DragTarget, ScreenPoint)> {
        let pending = self.pending.as_mut()?;
        pending.last = at;
        Some((pending.target, pending.position()))
    }

    pub fn preview(&self) -> Option<(DragTarget, ScreenPoint)> {
        self.pending.map(|p| (p.target, p.position()))
    }

    /// Finish the gesture at `at`. A drag keeps the grab offset and is
    /// unprojected through `map`.
    pub fn finish<P: Projection + ?Sized>(&mut self, at: ScreenPoint, map: &P) -> Option<Gesture> {
        let mut pending = self.pending.take()?;
        pending.last = at;

        if pending.start.distance_to(pending.last) < self.click_threshold {
            Some(Gesture::Click(pending.target))
        } else {
            Some(Gesture::Drag {
                target: pending.target,
                to: map.unproject(pending.position()),
            })
        }
    }

    pub fn cancel(&mut self) -> Option<DragTarget> {
        self.pending.take().map(|p| p.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Size;
    use crate::map::WebMercatorView;

    fn view() -> WebMercatorView {
        WebMercatorView::new(LngLat::new(10.0, 50.0), 12.0, Size::new(900.0, 1260.0), 512.0)
    }

    #[test]
    fn test_short_travel_is_click() {
        let mut t = DragTracker::default();
        t.begin(DragTarget::Marker(ItemId(2)), ScreenPoint::new(100.0, 100.0), ScreenPoint::new(90.0, 90.0));
        t.update(ScreenPoint::new(102.0, 101.0));
        let g = t.finish(ScreenPoint::new(103.0, 102.0), &view());
        assert_eq!(g, Some(Gesture::Click(DragTarget::Marker(ItemId(2)))));
        assert_eq!(t.target(), None);
    }

    #[test]
    fn test_long_travel_keeps_grab_offset() {
        let v = view();
        let mut t = DragTracker::default();
        // grabbed 10px right of the item's center
        t.begin(DragTarget::Anchor(ItemId(1)), ScreenPoint::new(460.0, 630.0), ScreenPoint::new(450.0, 630.0));
        assert_eq!(
            t.update(ScreenPoint::new(480.0, 620.0)),
            Some((DragTarget::Anchor(ItemId(1)), ScreenPoint::new(470.0, 620.0)))
        );
        match t.finish(ScreenPoint::new(510.0, 600.0), &v) {
            Some(Gesture::Drag { target, to }) => {
                assert_eq!(target, DragTarget::Anchor(ItemId(1)));
                let px = v.project(to);
                assert!((px.x - 500.0).abs() < 1e-6 && (px.y - 600.0).abs() < 1e-6);
            }
            other => panic!("expected drag, got {:?}", other),
        }
    }

    #[test]
    fn test_new_press_supersedes() {
        let mut t = DragTracker::default();
        t.begin(DragTarget::Marker(ItemId(1)), ScreenPoint::new(0.0, 0.0), ScreenPoint::new(0.0, 0.0));
        t.begin(DragTarget::Anchor(ItemId(3)), ScreenPoint::new(10.0, 10.0), ScreenPoint::new(12.0, 12.0));
        assert_eq!(t.target(), Some(DragTarget::Anchor(ItemId(3))));
        assert_eq!(
            t.finish(ScreenPoint::new(10.0, 10.0), &view()),
            Some(Gesture::Click(DragTarget::Anchor(ItemId(3))))
        );
    }

    #[test]
    fn test_release_without_press() {
        let mut t = DragTracker::default();
        assert_eq!(t.update(ScreenPoint::new(1.0, 1.0)), None);
        assert_eq!(t.preview(), None);
        assert_eq!(t.finish(ScreenPoint::new(1.0, 1.0), &view()), None);
        assert_eq!(t.cancel(), None);
    }
}
