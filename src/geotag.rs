//! Photo geotagging: EXIF GPS lookup with a manual-entry fallback.

use std::future::Future;
use std::io::Cursor;

use exif::{Exif, In, Tag, Value};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coords::LngLat;
use crate::layout::{LayoutError, Photo, PhotoId};

#[derive(Debug, thiserror::Error)]
pub enum GeoTagError {
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("GPS lookup failed: {0}")]
    Oracle(String),
}

/// Latitude/longitude pair as read from the photo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsFix {
    pub fn to_lng_lat(self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }
}

/// Reads GPS coordinates out of raw photo bytes.
pub trait ExifOracle {
    fn extract_gps(&self, bytes: &[u8]) -> impl Future<Output = Result<Option<GpsFix>, GeoTagError>>;
}

impl<O: ExifOracle + ?Sized> ExifOracle for &O {
    fn extract_gps(&self, bytes: &[u8]) -> impl Future<Output = Result<Option<GpsFix>, GeoTagError>> {
        (**self).extract_gps(bytes)
    }
}

/// EXIF oracle backed by `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KamadakExif;

impl KamadakExif {
    /// Synchronous lookup. Files with no EXIF block at all yield `Ok(None)`.
    pub fn read(bytes: &[u8]) -> Result<Option<GpsFix>, GeoTagError> {
        match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(exif) => Ok(gps_fix(&exif)),
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ExifOracle for KamadakExif {
    async fn extract_gps(&self, bytes: &[u8]) -> Result<Option<GpsFix>, GeoTagError> {
        Self::read(bytes)
    }
}

/// Extract GPS latitude and longitude, signed by their hemisphere references.
pub fn gps_fix(exif: &Exif) -> Option<GpsFix> {
    let lat = dms_to_degrees(&exif.get_field(Tag::GPSLatitude, In::PRIMARY)?.value)?;
    let lon = dms_to_degrees(&exif.get_field(Tag::GPSLongitude, In::PRIMARY)?.value)?;

    let lat = lat * hemisphere_sign(exif, Tag::GPSLatitudeRef, b'S');
    let lon = lon * hemisphere_sign(exif, Tag::GPSLongitudeRef, b'W');

    Some(GpsFix {
        latitude: lat,
        longitude: lon,
    })
}

/// Degrees/minutes/seconds rationals to a positive decimal magnitude.
pub fn dms_to_degrees(value: &Value) -> Option<f64> {
    let Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() < 3 || parts[..3].iter().any(|r| r.denom == 0) {
        return None;
    }
    Some(parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0)
}

fn hemisphere_sign(exif: &Exif, tag: Tag, negative: u8) -> f64 {
    let reference = exif.get_field(tag, In::PRIMARY).and_then(|f| match &f.value {
        Value::Ascii(parts) => parts.first().and_then(|p| p.first()).copied(),
        _ => None,
    });
    match reference {
        Some(c) if c.eq_ignore_ascii_case(&negative) => -1.0,
        _ => 1.0,
    }
}

pub struct GeoTagger<O> {
    oracle: O,
}

impl<O: ExifOracle> GeoTagger<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Look up every photo concurrently and assign coordinates where found.
    ///
    /// Results are joined back by position, so each photo only ever receives
    /// its own lookup. Oracle errors are logged and leave the photo unlocated.
    pub async fn tag(&self, mut photos: Vec<Photo>) -> Vec<Photo> {
        let fixes = join_all(photos.iter().map(|p| self.oracle.extract_gps(&p.data))).await;

        for (photo, fix) in photos.iter_mut().zip(fixes) {
            match fix {
                Ok(Some(fix)) if fix.latitude.is_finite() && fix.longitude.is_finite() => {
                    photo.locate(fix.to_lng_lat());
                }
                Ok(_) => {}
                Err(e) => warn!(photo = %photo.id, "could not read GPS data: {}", e),
            }
        }

        photos
    }
}

/// Split photos into those with coordinates and those needing manual entry.
pub fn partition_located(photos: Vec<Photo>) -> (Vec<Photo>, Vec<Photo>) {
    photos.into_iter().partition(|p| p.coordinates().is_some())
}

/// A place picked in the manual-location form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSelection {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

/// Photos waiting for the user to supply a location.
#[derive(Debug, Default)]
pub struct PendingLocations {
    photos: Vec<Photo>,
}

impl PendingLocations {
    pub fn push(&mut self, photos: impl IntoIterator<Item = Photo>) {
        self.photos.extend(photos);
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// The photo the form should show next.
    pub fn next(&self) -> Option<&Photo> {
        self.photos.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Photo> {
        self.photos.iter()
    }

    /// Resolve one pending photo, handing it back ready for placement.
    pub fn submit(&mut self, id: PhotoId, place: &PlaceSelection) -> Result<Photo, LayoutError> {
        let index = self
            .photos
            .iter()
            .position(|p| p.id == id)
            .ok_or(LayoutError::UnknownPendingPhoto(id))?;
        let mut photo = self.photos.remove(index);
        photo.locate(LngLat::new(place.lng, place.lat));
        info!(photo = %id, address = %place.formatted_address, "location entered manually");
        Ok(photo)
    }

    /// Close the form: every pending photo is dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.photos.len();
        self.photos.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::Rational;
    use futures::executor::block_on;

    /// Oracle driven by the first byte of the photo data.
    struct ScriptedOracle;

    impl ExifOracle for ScriptedOracle {
        async fn extract_gps(&self, bytes: &[u8]) -> Result<Option<GpsFix>, GeoTagError> {
            match bytes.first() {
                Some(b'g') => Ok(Some(GpsFix {
                    latitude: 37.8,
                    longitude: -122.4,
                })),
                Some(b'e') => Err(GeoTagError::Oracle("corrupt header".into())),
                _ => Ok(None),
            }
        }
    }

    fn photo(id: u64, data: &[u8]) -> Photo {
        Photo::new(PhotoId(id), format!("blob:{}", id), data.to_vec())
    }

    fn r(num: u32, denom: u32) -> Rational {
        Rational { num, denom }
    }

    #[test]
    fn test_dms_conversion() {
        let v = Value::Rational(vec![r(37, 1), r(48, 1), r(0, 1)]);
        assert!((dms_to_degrees(&v).unwrap() - 37.8).abs() < 1e-12);
    }

    #[test]
    fn test_dms_rejects_zero_denominator() {
        let v = Value::Rational(vec![r(37, 1), r(48, 0), r(0, 1)]);
        assert_eq!(dms_to_degrees(&v), None);
        assert_eq!(dms_to_degrees(&Value::Ascii(vec![])), None);
    }

    #[test]
    fn test_tagging_preserves_order_and_pairs() {
        let tagger = GeoTagger::new(ScriptedOracle);
        let photos = vec![photo(1, b"g"), photo(2, b"n"), photo(3, b"g")];
        let tagged = block_on(tagger.tag(photos));

        let ids: Vec<u64> = tagged.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(tagged[0].coordinates(), Some(LngLat::new(-122.4, 37.8)));
        assert_eq!(tagged[1].coordinates(), None);
        assert_eq!(tagged[2].coordinates(), Some(LngLat::new(-122.4, 37.8)));
    }

    #[test]
    fn test_oracle_error_becomes_unlocated() {
        let tagger = GeoTagger::new(ScriptedOracle);
        let tagged = block_on(tagger.tag(vec![photo(1, b"e")]));
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].coordinates(), None);
    }

    #[test]
    fn test_kamadak_without_exif_is_unlocated() {
        let tagger = GeoTagger::new(KamadakExif);
        let tagged = block_on(tagger.tag(vec![photo(1, b"plain bytes, no container")]));
        assert_eq!(tagged[0].coordinates(), None);
    }

    #[test]
    fn test_partition() {
        let photos = vec![
            photo(1, b"").with_coordinates(LngLat::new(1.0, 1.0)),
            photo(2, b""),
        ];
        let (located, unlocated) = partition_located(photos);
        assert_eq!(located.len(), 1);
        assert_eq!(unlocated[0].id, PhotoId(2));
    }

    #[test]
    fn test_pending_submit_and_discard() {
        let mut pending = PendingLocations::default();
        pending.push(vec![photo(4, b""), photo(5, b"")]);
        assert_eq!(pending.next().map(|p| p.id), Some(PhotoId(4)));

        let place = PlaceSelection {
            lat: 48.85,
            lng: 2.35,
            formatted_address: "Paris, France".into(),
        };
        let resolved = pending.submit(PhotoId(5), &place).unwrap();
        assert_eq!(resolved.coordinates(), Some(LngLat::new(2.35, 48.85)));
        assert!(pending.submit(PhotoId(5), &place).is_err());

        assert_eq!(pending.discard(), 1);
        assert!(pending.is_empty());
    }
}
