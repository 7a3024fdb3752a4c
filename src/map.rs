//! The map as seen by the layout engine: projection, viewport, and keyed line layers.
//!
//! The browser supplies its own implementation (see `web`); `OfflineMap` is a
//! self-contained Web-Mercator map used by the CLI and tests.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use geo::Rect;

use crate::coords::{LngLat, ScreenPoint, Size};

/// Latitude limit of the Web-Mercator square.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

pub trait Projection {
    fn project(&self, coord: LngLat) -> ScreenPoint;
    fn unproject(&self, point: ScreenPoint) -> LngLat;
    fn container_size(&self) -> Size;

    /// Geographic bounds of the visible container.
    fn viewport_bounds(&self) -> Rect<f64> {
        let size = self.container_size();
        let top_left = self.unproject(ScreenPoint::new(0.0, 0.0));
        let bottom_right = self.unproject(ScreenPoint::new(size.width, size.height));
        Rect::new(geo::Coord::from(top_left), geo::Coord::from(bottom_right))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("Line layer {key} was not written: {reason}")]
    Layer { key: String, reason: String },
}

/// Vector line layers keyed by string. A failed write leaves the layer as it was.
pub trait LineLayers {
    fn upsert_line(&mut self, key: &str, geometry: [LngLat; 2]) -> Result<(), MapError>;
    fn remove_line(&mut self, key: &str) -> Result<(), MapError>;
}

/// Everything the editor needs from a map.
pub trait MapService: Projection + LineLayers {
    fn center(&self) -> LngLat;
    fn zoom(&self) -> f64;
    /// Move the camera.
    fn jump_to(&mut self, center: LngLat, zoom: f64);
}

/// Web-Mercator camera over a fixed-size container.
#[derive(Debug, Clone, PartialEq)]
pub struct WebMercatorView {
    center: LngLat,
    zoom: f64,
    size: Size,
    tile_size: f64,
}

impl WebMercatorView {
    pub const MIN_ZOOM: f64 = 0.0;
    pub const MAX_ZOOM: f64 = 22.0;

    pub fn new(center: LngLat, zoom: f64, size: Size, tile_size: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM),
            size,
            tile_size,
        }
    }

    pub fn center(&self) -> LngLat {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_center(&mut self, center: LngLat) {
        self.center = center;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }

    /// Pan so that the content moves by `(dx, dy)` pixels.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (hw, hh) = self.size.half();
        self.center = self.unproject(ScreenPoint::new(hw - dx, hh - dy));
    }

    fn world_size(&self) -> f64 {
        self.tile_size * 2_f64.powf(self.zoom)
    }

    fn to_world(&self, c: LngLat) -> (f64, f64) {
        let world = self.world_size();
        let lat = c.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (c.lng + 180.0) / 360.0 * world;
        let y = (1.0 - (PI / 4.0 + lat / 2.0).tan().ln() / PI) / 2.0 * world;
        (x, y)
    }

    fn from_world(&self, x: f64, y: f64) -> LngLat {
        let world = self.world_size();
        let lng = x / world * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * y / world);
        let lat = n.sinh().atan().to_degrees();
        LngLat::new(lng, lat)
    }
}

impl Projection for WebMercatorView {
    fn project(&self, coord: LngLat) -> ScreenPoint {
        let (cx, cy) = self.to_world(self.center);
        let (x, y) = self.to_world(coord);
        let (hw, hh) = self.size.half();
        ScreenPoint::new(x - cx + hw, y - cy + hh)
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        let (cx, cy) = self.to_world(self.center);
        let (hw, hh) = self.size.half();
        self.from_world(point.x - hw + cx, point.y - hh + cy)
    }

    fn container_size(&self) -> Size {
        self.size
    }
}

/// In-memory line layers.
#[derive(Debug, Default, Clone)]
pub struct LineLayerStore {
    layers: BTreeMap<String, [LngLat; 2]>,
    writes: usize,
}

impl LineLayerStore {
    pub fn get(&self, key: &str) -> Option<&[LngLat; 2]> {
        self.layers.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of upserts and deletes applied so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl LineLayers for LineLayerStore {
    fn upsert_line(&mut self, key: &str, geometry: [LngLat; 2]) -> Result<(), MapError> {
        self.writes += 1;
        self.layers.insert(key.to_string(), geometry);
        Ok(())
    }

    fn remove_line(&mut self, key: &str) -> Result<(), MapError> {
        self.writes += 1;
        self.layers.remove(key);
        Ok(())
    }
}

/// A map with no renderer behind it.
#[derive(Debug, Clone)]
pub struct OfflineMap {
    pub view: WebMercatorView,
    pub layers: LineLayerStore,
}

impl OfflineMap {
    pub fn new(size: Size, tile_size: f64) -> Self {
        Self {
            view: WebMercatorView::new(LngLat::new(0.0, 0.0), 1.0, size, tile_size),
            layers: LineLayerStore::default(),
        }
    }
}

impl Projection for OfflineMap {
    fn project(&self, coord: LngLat) -> ScreenPoint {
        self.view.project(coord)
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        self.view.unproject(point)
    }

    fn container_size(&self) -> Size {
        self.view.container_size()
    }
}

impl LineLayers for OfflineMap {
    fn upsert_line(&mut self, key: &str, geometry: [LngLat; 2]) -> Result<(), MapError> {
        self.layers.upsert_line(key, geometry)
    }

    fn remove_line(&mut self, key: &str) -> Result<(), MapError> {
        self.layers.remove_line(key)
    }
}

impl MapService for OfflineMap {
    fn center(&self) -> LngLat {
        self.view.center()
    }

    fn zoom(&self) -> f64 {
        self.view.zoom()
    }

    fn jump_to(&mut self, center: LngLat, zoom: f64) {
        self.view.set_center(center);
        self.view.set_zoom(zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> WebMercatorView {
        WebMercatorView::new(LngLat::new(-122.4, 37.8), 15.0, Size::new(900.0, 1260.0), 512.0)
    }

    #[test]
    fn test_center_projects_to_middle() {
        let v = view();
        let p = v.project(LngLat::new(-122.4, 37.8));
        assert!((p.x - 450.0).abs() < 1e-6);
        assert!((p.y - 630.0).abs() < 1e-6);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let v = view();
        let c = LngLat::new(-122.41, 37.79);
        let back = v.unproject(v.project(c));
        assert!((back.lng - c.lng).abs() < 1e-9);
        assert!((back.lat - c.lat).abs() < 1e-9);
    }

    #[test]
    fn test_north_is_up() {
        let v = view();
        let south = v.project(LngLat::new(-122.4, 37.7));
        let north = v.project(LngLat::new(-122.4, 37.9));
        assert!(north.y < south.y);
    }

    #[test]
    fn test_pan_moves_content() {
        let mut v = view();
        let c = LngLat::new(-122.4, 37.8);
        v.pan_by(100.0, 0.0);
        let p = v.project(c);
        assert!((p.x - 550.0).abs() < 1e-6);
    }

    #[test]
    fn test_viewport_bounds_contain_center() {
        let v = view();
        let bounds = v.viewport_bounds();
        let (min, max) = (bounds.min(), bounds.max());
        assert!(min.x < -122.4 && -122.4 < max.x);
        assert!(min.y < 37.8 && 37.8 < max.y);
    }

    #[test]
    fn test_layer_store_counts_writes() {
        let mut store = LineLayerStore::default();
        let g = [LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0)];
        store.upsert_line("line-1", g).unwrap();
        store.remove_line("line-1").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.writes(), 2);
    }
}
