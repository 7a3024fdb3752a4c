pub mod config;
pub mod coords;
pub mod drag;
pub mod editor;
pub mod export;
pub mod geotag;
pub mod layout;
pub mod map;
pub mod net;
pub mod svg;
pub mod text;
pub mod transmit;
pub mod viewport;
pub mod web;

use wasm_bindgen::prelude::*;

use coords::LngLat;
use geotag::KamadakExif;
use viewport::ViewportPlanner;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Frame a JSON array of `[lng, lat]` pairs (or `null`) into `{center, zoom}`.
#[wasm_bindgen(js_name = "planViewport")]
pub fn plan_viewport(coords: &str) -> Result<String, String> {
    let coords: Vec<Option<LngLat>> = serde_json::from_str(coords).map_err(|e| e.to_string())?;
    let plan = ViewportPlanner::default().plan(coords);
    serde_json::to_string(&plan).map_err(|e| e.to_string())
}

/// GPS position embedded in image bytes, as `[lng, lat]`.
#[wasm_bindgen(js_name = "geotagBytes")]
pub fn geotag_bytes(bytes: &[u8]) -> Result<Option<Vec<f64>>, String> {
    let fix = KamadakExif::read(bytes).map_err(|e| e.to_string())?;
    Ok(fix.map(|f| vec![f.longitude, f.latitude]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_viewport_skips_nulls() {
        let json = plan_viewport("[[2.0, 3.0], null]").unwrap();
        assert_eq!(json, r#"{"center":{"lng":2.0,"lat":3.0},"zoom":15.0}"#);
    }

    #[test]
    fn test_plan_viewport_rejects_garbage() {
        assert!(plan_viewport("{").is_err());
    }
}
