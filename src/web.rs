//! Browser bindings around the editor session.
//!
//! The page owns the interactive map and hands us an object with these
//! methods: `project(lng, lat) -> [x, y]`, `unproject(x, y) -> [lng, lat]`,
//! `containerSize() -> [w, h]`, `center() -> [lng, lat]`, `zoom() -> number`,
//! `jumpTo(lng, lat, zoom)`, `upsertLine(key, [[lng, lat], [lng, lat]])`,
//! `removeLine(key)`. Structured data crosses as JSON strings.

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use js_sys::{Array, Function, Promise, Reflect, Uint8Array};
use serde::Serialize;
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};

use crate::config::EditorConfig;
use crate::coords::{LngLat, ScreenPoint, Size};
use crate::drag::{DragTarget, Gesture};
use crate::editor::Editor;
use crate::export::{ExportError, Rasterizer, log_outcome};
use crate::geotag::{KamadakExif, PlaceSelection};
use crate::layout::{AnchorColor, AnchorIcon, ImageCrateDecoder, ItemId, MapEvent, PhotoId};
use crate::map::{LineLayers, MapError, MapService, Projection};
use crate::svg::SvgRenderer;
use crate::text::{NominatimGeocoder, TextBlock, lookup_place};
use crate::transmit::{HttpImageStore, HttpTransmitter, transmit};

/// Map service backed by JavaScript callbacks.
pub struct JsMap {
    target: JsValue,
    project: Function,
    unproject: Function,
    container_size: Function,
    center: Function,
    zoom: Function,
    jump_to: Function,
    upsert_line: Function,
    remove_line: Function,
}

impl JsMap {
    pub fn new(target: JsValue) -> Result<Self, String> {
        Ok(Self {
            project: method(&target, "project")?,
            unproject: method(&target, "unproject")?,
            container_size: method(&target, "containerSize")?,
            center: method(&target, "center")?,
            zoom: method(&target, "zoom")?,
            jump_to: method(&target, "jumpTo")?,
            upsert_line: method(&target, "upsertLine")?,
            remove_line: method(&target, "removeLine")?,
            target,
        })
    }
}

fn method(target: &JsValue, name: &str) -> Result<Function, String> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or_else(|| format!("map object has no `{}` method", name))
}

/// Read a two-number array; anything else becomes NaN.
fn pair(value: Result<JsValue, JsValue>) -> (f64, f64) {
    match value {
        Ok(v) if Array::is_array(&v) => {
            let a = Array::from(&v);
            (
                a.get(0).as_f64().unwrap_or(f64::NAN),
                a.get(1).as_f64().unwrap_or(f64::NAN),
            )
        }
        _ => (f64::NAN, f64::NAN),
    }
}

impl Projection for JsMap {
    fn project(&self, coord: LngLat) -> ScreenPoint {
        let (x, y) = pair(self.project.call2(
            &self.target,
            &JsValue::from_f64(coord.lng),
            &JsValue::from_f64(coord.lat),
        ));
        ScreenPoint::new(x, y)
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        let (lng, lat) = pair(self.unproject.call2(
            &self.target,
            &JsValue::from_f64(point.x),
            &JsValue::from_f64(point.y),
        ));
        LngLat::new(lng, lat)
    }

    fn container_size(&self) -> Size {
        let (w, h) = pair(self.container_size.call0(&self.target));
        Size::new(w, h)
    }
}

fn describe(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

fn layer_error(key: &str, e: JsValue) -> MapError {
    MapError::Layer {
        key: key.to_string(),
        reason: describe(&e),
    }
}

impl LineLayers for JsMap {
    fn upsert_line(&mut self, key: &str, geometry: [LngLat; 2]) -> Result<(), MapError> {
        let coords: Array = geometry
            .iter()
            .map(|c| Array::of2(&JsValue::from_f64(c.lng), &JsValue::from_f64(c.lat)))
            .collect();
        self.upsert_line
            .call2(&self.target, &JsValue::from_str(key), &coords)
            .map(|_| ())
            .map_err(|e| layer_error(key, e))
    }

    fn remove_line(&mut self, key: &str) -> Result<(), MapError> {
        self.remove_line
            .call1(&self.target, &JsValue::from_str(key))
            .map(|_| ())
            .map_err(|e| layer_error(key, e))
    }
}

impl MapService for JsMap {
    fn center(&self) -> LngLat {
        let (lng, lat) = pair(self.center.call0(&self.target));
        LngLat::new(lng, lat)
    }

    fn zoom(&self) -> f64 {
        self.zoom
            .call0(&self.target)
            .ok()
            .and_then(|z| z.as_f64())
            .unwrap_or(f64::NAN)
    }

    fn jump_to(&mut self, center: LngLat, zoom: f64) {
        let args = Array::of3(
            &JsValue::from_f64(center.lng),
            &JsValue::from_f64(center.lat),
            &JsValue::from_f64(zoom),
        );
        if let Err(e) = self.jump_to.apply(&self.target, &args) {
            warn!("camera move failed: {}", describe(&e));
        }
    }
}

/// Capture callback returning a promise of PNG bytes.
struct JsRasterizer(Function);

impl Rasterizer for JsRasterizer {
    async fn capture(&self) -> Result<Vec<u8>, ExportError> {
        let promise = self
            .0
            .call0(&JsValue::NULL)
            .map_err(js_error)?
            .dyn_into::<Promise>()
            .map_err(|_| ExportError::Capture("capture did not return a promise".to_string()))?;
        let value = JsFuture::from(promise).await.map_err(js_error)?;
        Ok(Uint8Array::new(&value).to_vec())
    }
}

fn js_error(e: JsValue) -> ExportError {
    ExportError::Capture(describe(&e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn target(kind: &str, id: u64) -> Result<DragTarget, String> {
    match kind {
        "marker" => Ok(DragTarget::Marker(ItemId(id))),
        "anchor" => Ok(DragTarget::Anchor(ItemId(id))),
        _ => Err(format!("Unknown drag target: {}", kind)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingPhotoView<'a> {
    id: PhotoId,
    image_ref: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GestureView {
    kind: &'static str,
    target: &'static str,
    id: ItemId,
    to: Option<LngLat>,
}

impl From<Gesture> for GestureView {
    fn from(g: Gesture) -> Self {
        let (kind, t, to) = match g {
            Gesture::Click(t) => ("click", t, None),
            Gesture::Drag { target, to } => ("drag", target, Some(to)),
        };
        let target = match t {
            DragTarget::Marker(_) => "marker",
            DragTarget::Anchor(_) => "anchor",
        };
        Self {
            kind,
            target,
            id: t.id(),
            to,
        }
    }
}

#[wasm_bindgen]
pub struct PosterEditor {
    inner: Rc<RefCell<Editor<JsMap>>>,
    staged: Vec<crate::layout::Photo>,
}

#[wasm_bindgen]
impl PosterEditor {
    /// Create a session, optionally from a TOML config.
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<PosterEditor, String> {
        let config = match config_toml {
            Some(s) => EditorConfig::from_toml_str(&s).map_err(|e| e.to_string())?,
            None => EditorConfig::default(),
        };
        Ok(Self {
            inner: Rc::new(RefCell::new(Editor::new(config))),
            staged: Vec::new(),
        })
    }

    #[wasm_bindgen(js_name = "attachMap")]
    pub fn attach_map(&mut self, map: JsValue) -> Result<(), String> {
        let map = JsMap::new(map)?;
        self.inner.borrow_mut().attach_map(map);
        Ok(())
    }

    /// Read GPS and dimensions from one upload and hold it for `placeStaged`.
    /// Returns the photo id.
    #[wasm_bindgen(js_name = "stagePhoto")]
    pub fn stage_photo(&mut self, image_ref: String, bytes: Vec<u8>) -> u64 {
        let photo = self.inner.borrow_mut().new_photo(image_ref, bytes);
        let id = photo.id.0;
        // Both readers are synchronous underneath, so this never parks.
        let prepared = block_on(self.inner.borrow().prepare(&KamadakExif, &ImageCrateDecoder, vec![photo]));
        self.staged.extend(prepared);
        id
    }

    /// Place everything staged as one batch. Returns the admission as JSON.
    #[wasm_bindgen(js_name = "placeStaged")]
    pub fn place_staged(&mut self) -> Result<String, String> {
        let batch = std::mem::take(&mut self.staged);
        let admission = self.inner.borrow_mut().admit(batch);
        to_json(&admission)
    }

    #[wasm_bindgen(js_name = "pendingPhotos")]
    pub fn pending_photos(&self) -> Result<String, String> {
        let editor = self.inner.borrow();
        let views: Vec<PendingPhotoView> = editor
            .pending()
            .iter()
            .map(|p| PendingPhotoView {
                id: p.id,
                image_ref: &p.image_ref,
            })
            .collect();
        to_json(&views)
    }

    /// `place` is `{"lat", "lng", "formattedAddress"}` from the autocomplete.
    #[wasm_bindgen(js_name = "resolveLocation")]
    pub fn resolve_location(&mut self, photo_id: u64, place: &str) -> Result<String, String> {
        let place: PlaceSelection = serde_json::from_str(place).map_err(|e| e.to_string())?;
        let admission = self
            .inner
            .borrow_mut()
            .resolve_location(PhotoId(photo_id), &place)
            .map_err(|e| e.to_string())?;
        to_json(&admission)
    }

    #[wasm_bindgen(js_name = "discardPending")]
    pub fn discard_pending(&mut self) -> usize {
        self.inner.borrow_mut().discard_pending()
    }

    /// Re-project after a `move`, `zoom`, or `resize` notification.
    #[wasm_bindgen(js_name = "onMapEvent")]
    pub fn on_map_event(&mut self, event: &str) -> Result<Option<String>, String> {
        let event = MapEvent::from_str(event).ok_or_else(|| format!("Unknown map event: {}", event))?;
        let frame = self.inner.borrow_mut().handle_map_event(event);
        frame.as_ref().map(to_json).transpose()
    }

    pub fn frame(&self) -> Result<Option<String>, String> {
        self.inner.borrow().frame().as_ref().map(to_json).transpose()
    }

    #[wasm_bindgen(js_name = "pointerDown")]
    pub fn pointer_down(&mut self, kind: &str, id: u64, x: f64, y: f64) -> Result<(), String> {
        let target = target(kind, id)?;
        self.inner
            .borrow_mut()
            .pointer_down(target, ScreenPoint::new(x, y))
            .map_err(|e| e.to_string())
    }

    /// Returns `[x, y]` where the dragged item would land, if a drag is active.
    #[wasm_bindgen(js_name = "pointerMove")]
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<Vec<f64>> {
        let (_, at) = self.inner.borrow_mut().pointer_move(ScreenPoint::new(x, y))?;
        Some(vec![at.x, at.y])
    }

    #[wasm_bindgen(js_name = "pointerUp")]
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<Option<String>, String> {
        let gesture = self
            .inner
            .borrow_mut()
            .pointer_up(ScreenPoint::new(x, y))
            .map_err(|e| e.to_string())?;
        gesture.map(|g| to_json(&GestureView::from(g))).transpose()
    }

    #[wasm_bindgen(js_name = "moveMarker")]
    pub fn move_marker(&mut self, id: u64, lng: f64, lat: f64) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .move_marker(ItemId(id), LngLat::new(lng, lat))
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "moveAnchor")]
    pub fn move_anchor(&mut self, id: u64, lng: f64, lat: f64) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .move_anchor(ItemId(id), LngLat::new(lng, lat))
            .map_err(|e| e.to_string())
    }

    /// Returns the applied `[width, height]` after the size floor.
    #[wasm_bindgen(js_name = "resizeMarker")]
    pub fn resize_marker(&mut self, id: u64, width: f64, height: f64) -> Result<Vec<f64>, String> {
        let size = self
            .inner
            .borrow_mut()
            .resize_marker(ItemId(id), Size::new(width, height))
            .map_err(|e| e.to_string())?;
        Ok(vec![size.width, size.height])
    }

    #[wasm_bindgen(js_name = "setMarkerSlider")]
    pub fn set_marker_slider(&mut self, id: u64, position: f64) -> Result<Vec<f64>, String> {
        let size = self
            .inner
            .borrow_mut()
            .set_marker_slider(ItemId(id), position)
            .map_err(|e| e.to_string())?;
        Ok(vec![size.width, size.height])
    }

    #[wasm_bindgen(js_name = "markerSlider")]
    pub fn marker_slider(&self, id: u64) -> Option<f64> {
        self.inner.borrow().marker_slider(ItemId(id))
    }

    #[wasm_bindgen(js_name = "replaceMarkerImage")]
    pub fn replace_marker_image(&mut self, id: u64, image_ref: String) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .replace_marker_image(ItemId(id), image_ref)
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "selectMarker")]
    pub fn select_marker(&mut self, id: u64) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .select_marker(ItemId(id))
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "deselectAll")]
    pub fn deselect_all(&mut self) {
        self.inner.borrow_mut().deselect_all();
    }

    #[wasm_bindgen(js_name = "selectAnchor")]
    pub fn select_anchor(&mut self, id: u64) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .select_anchor(ItemId(id))
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "deselectAnchors")]
    pub fn deselect_anchors(&mut self) {
        self.inner.borrow_mut().deselect_anchors();
    }

    #[wasm_bindgen(js_name = "restyleAnchor")]
    pub fn restyle_anchor(&mut self, id: u64, icon: &str, color: &str) -> Result<(), String> {
        let icon = AnchorIcon::from_str(icon).ok_or_else(|| format!("Unknown icon: {}", icon))?;
        let color = AnchorColor::from_str(color).ok_or_else(|| format!("Unknown color: {}", color))?;
        self.inner
            .borrow_mut()
            .restyle_anchor(ItemId(id), icon, color)
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "removeMarker")]
    pub fn remove_marker(&mut self, id: u64) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .remove_marker(ItemId(id))
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "removeAnchor")]
    pub fn remove_anchor(&mut self, id: u64) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .remove_anchor(ItemId(id))
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "removePair")]
    pub fn remove_pair(&mut self, id: u64) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .remove_pair(ItemId(id))
            .map_err(|e| e.to_string())
    }

    pub fn text(&self) -> Result<String, String> {
        to_json(self.inner.borrow().text())
    }

    #[wasm_bindgen(js_name = "setText")]
    pub fn set_text(&mut self, text: &str) -> Result<(), String> {
        let text: TextBlock = serde_json::from_str(text).map_err(|e| e.to_string())?;
        self.inner.borrow_mut().set_text(text);
        Ok(())
    }

    /// Reverse geocode the first placed photo. Resolves to the text block JSON,
    /// or `undefined` when there is nothing to look up or the lookup failed.
    /// Edits made while the lookup runs are kept unless it succeeds.
    #[wasm_bindgen(js_name = "refreshText")]
    pub fn refresh_text(&mut self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let Some(at) = inner.borrow_mut().take_text_source() else {
                return Ok(JsValue::UNDEFINED);
            };
            let Some(place) = lookup_place(&NominatimGeocoder::new(), at).await else {
                return Ok(JsValue::UNDEFINED);
            };
            let mut editor = inner.borrow_mut();
            editor.apply_place(&place, at);
            Ok(JsValue::from_str(&to_json(editor.text())?))
        })
    }

    #[wasm_bindgen(js_name = "toggleUi")]
    pub fn toggle_ui(&mut self) -> Result<String, String> {
        let ui = self.inner.borrow_mut().toggle_ui();
        to_json(&ui)
    }

    pub fn ui(&self) -> Result<String, String> {
        to_json(&self.inner.borrow().ui())
    }

    /// Hide overlays, await `capture()`, restore overlays. Resolves to the image bytes.
    pub fn export(&mut self, capture: Function) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let previous = inner.borrow_mut().begin_export();
            let result = JsRasterizer(capture).capture().await;
            inner.borrow_mut().finish_export(previous);
            log_outcome(&result);
            match result {
                Ok(bytes) => Ok(Uint8Array::from(bytes.as_slice()).into()),
                Err(e) => Err(JsValue::from_str(&e.to_string())),
            }
        })
    }

    #[wasm_bindgen(js_name = "projectPayload")]
    pub fn project_payload(&self) -> Result<String, String> {
        let payload = self
            .inner
            .borrow()
            .project_payload()
            .ok_or_else(|| "Map is not ready".to_string())?;
        to_json(&payload)
    }

    /// Upload local images and post the layout. Resolves to a notice JSON.
    pub fn transmit(&self, upload_url: String, endpoint: String) -> Result<Promise, String> {
        let payload = self
            .inner
            .borrow()
            .project_payload()
            .ok_or_else(|| "Map is not ready".to_string())?;
        Ok(future_to_promise(async move {
            let notice = transmit(&HttpImageStore::new(upload_url), &HttpTransmitter::new(endpoint), payload).await;
            Ok(JsValue::from_str(&to_json(&notice)?))
        }))
    }

    /// SVG preview of the current poster.
    pub fn svg(&self) -> Result<String, String> {
        let editor = self.inner.borrow();
        let frame = editor.frame().ok_or_else(|| "Map is not ready".to_string())?;
        Ok(SvgRenderer::default().render(&frame, editor.text()))
    }
}
