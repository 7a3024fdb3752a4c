//! Screen-space distribution of new markers around their anchors.
//!
//! Offsets are computed in pixels at call time and unprojected back to
//! geographic coordinates, so the same batch distributes differently at a
//! different zoom or container size.

use std::f64::consts::TAU;

use crate::coords::{ScreenPoint, Size};
use crate::map::Projection;

use super::types::{Placement, PlacementRequest};

/// Which offset table applies to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrangement {
    /// Up and to the right of the anchor
    Corner,
    /// First item down-left, second up-right
    Pair,
    /// Top, bottom-left, bottom-right
    Triangle,
    /// Evenly spaced on a circle
    Circle,
}

impl Arrangement {
    pub fn for_batch(count: usize, initial: bool) -> Self {
        match (initial, count) {
            (false, _) | (true, 0..=1) => Self::Corner,
            (true, 2) => Self::Pair,
            (true, 3) => Self::Triangle,
            (true, _) => Self::Circle,
        }
    }
}

pub struct DistributionEngine {
    pub(crate) padding: f64,
}

impl Default for DistributionEngine {
    fn default() -> Self {
        Self { padding: 100.0 }
    }
}

impl DistributionEngine {
    pub fn new(padding: f64) -> Self {
        Self { padding }
    }

    /// Pixel offset of item `index` from its projected anchor.
    pub fn offset(&self, arrangement: Arrangement, index: usize, count: usize, size: Size) -> (f64, f64) {
        let dx = size.width / 2.0 + self.padding;
        let dy = size.height / 2.0 + self.padding;

        match arrangement {
            Arrangement::Corner => (dx, -dy),
            Arrangement::Pair => {
                if index == 0 {
                    (-dx, dy)
                } else {
                    (dx, -dy)
                }
            }
            Arrangement::Triangle => match index % 3 {
                0 => (0.0, -dy),
                1 => (-dx, dy),
                _ => (dx, dy),
            },
            Arrangement::Circle => {
                let angle = index as f64 / count as f64 * TAU;
                let radius = size.width.max(size.height) * 1.5 + self.padding;
                (radius * angle.cos(), radius * angle.sin())
            }
        }
    }

    /// Keep the marker's box, plus padding, inside the container.
    pub fn clamp(&self, point: ScreenPoint, size: Size, container: Size) -> ScreenPoint {
        let (hw, hh) = size.half();
        ScreenPoint::new(
            clamp_axis(point.x, hw + self.padding, container.width - hw - self.padding),
            clamp_axis(point.y, hh + self.padding, container.height - hh - self.padding),
        )
    }

    /// Position every request. `initial` is true when the layout holds no markers yet.
    pub fn distribute<P: Projection + ?Sized>(
        &self,
        map: &P,
        requests: Vec<PlacementRequest>,
        initial: bool,
    ) -> Vec<Placement> {
        let count = requests.len();
        let arrangement = Arrangement::for_batch(count, initial);
        let container = map.container_size();

        requests
            .into_iter()
            .enumerate()
            .map(|(i, req)| {
                let (dx, dy) = self.offset(arrangement, i, count, req.size);
                let anchor_px = map.project(req.anchor);
                let target = self.clamp(anchor_px.offset(dx, dy), req.size, container);
                Placement {
                    photo_id: req.photo_id,
                    image_ref: req.image_ref,
                    anchor: req.anchor,
                    adjusted: map.unproject(target),
                    size: req.size,
                }
            })
            .collect()
    }
}

/// Clamp to `[lo, hi]`; a container too small for the box pins it to the middle.
fn clamp_axis(v: f64, lo: f64, hi: f64) -> f64 {
    if lo > hi {
        (lo + hi) / 2.0
    } else {
        v.clamp(lo, hi)
    }
}
