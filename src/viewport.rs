//! Initial map framing for a set of geotagged photos.

use geo::{BoundingRect, MultiPoint, Point};
use serde::{Deserialize, Serialize};

use crate::coords::{LngLat, haversine_km, lng_lat_object};

/// Map center and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportPlan {
    #[serde(with = "lng_lat_object")]
    pub center: LngLat,
    pub zoom: f64,
}

/// Framing heuristic parameters.
pub struct ViewportPlanner {
    pub(crate) empty_zoom: f64,
    pub(crate) single_point_zoom: f64,
    /// Zoom at which a 1 km diagonal fits
    pub(crate) base_zoom: f64,
    pub(crate) min_zoom: f64,
    pub(crate) max_zoom: f64,
}

impl Default for ViewportPlanner {
    fn default() -> Self {
        Self {
            empty_zoom: 1.0,
            single_point_zoom: 15.0,
            base_zoom: 13.0,
            min_zoom: 1.0,
            max_zoom: 22.0,
        }
    }
}

impl ViewportPlanner {
    /// Frame every present coordinate. `None` entries are skipped.
    pub fn plan<I>(&self, coords: I) -> ViewportPlan
    where
        I: IntoIterator<Item = Option<LngLat>>,
    {
        let points: Vec<LngLat> = coords.into_iter().flatten().collect();

        match points.as_slice() {
            [] => ViewportPlan {
                center: LngLat::new(0.0, 0.0),
                zoom: self.empty_zoom,
            },
            [only] => ViewportPlan {
                center: *only,
                zoom: self.single_point_zoom,
            },
            _ => {
                let n = points.len() as f64;
                let center = LngLat::new(
                    points.iter().map(|p| p.lng).sum::<f64>() / n,
                    points.iter().map(|p| p.lat).sum::<f64>() / n,
                );
                let distance = self.diagonal_km(&points);
                ViewportPlan {
                    center,
                    zoom: self.zoom_for_distance(distance),
                }
            }
        }
    }

    /// Haversine distance between the SW and NE corners of the bounding box.
    fn diagonal_km(&self, points: &[LngLat]) -> f64 {
        let multi: MultiPoint<f64> = points
            .iter()
            .map(|p| Point::from(geo::Coord::from(*p)))
            .collect();
        match multi.bounding_rect() {
            Some(rect) => haversine_km(rect.min().into(), rect.max().into()),
            None => 0.0,
        }
    }

    pub fn zoom_for_distance(&self, distance_km: f64) -> f64 {
        if distance_km > 0.0 {
            (self.base_zoom - distance_km.log2()).clamp(self.min_zoom, self.max_zoom)
        } else {
            self.single_point_zoom
        }
    }
}
