//! Poster text block and reverse geocoding.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coords::LngLat;
use crate::net::{NetworkError, check_status, identified};

/// Headline, divider, and tagline printed under the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBlock {
    pub headline: String,
    pub divider: String,
    pub tagline: String,
}

impl Default for TextBlock {
    fn default() -> Self {
        Self {
            headline: "Headline".to_string(),
            divider: "Divider".to_string(),
            tagline: "Tagline".to_string(),
        }
    }
}

impl TextBlock {
    pub fn apply_place(&mut self, place: &PlaceName, at: LngLat) {
        self.headline = place.city.clone();
        self.divider = place.country.clone();
        self.tagline = format!("Coordinates: {:.4}, {:.4}", at.lat, at.lng);
    }

    /// Look up `at` and fill the block. A failed lookup leaves the text as it was.
    pub async fn refresh_from_location<G: ReverseGeocoder>(&mut self, geocoder: &G, at: LngLat) -> bool {
        match lookup_place(geocoder, at).await {
            Some(place) => {
                self.apply_place(&place, at);
                true
            }
            None => false,
        }
    }
}

/// Reverse geocode `at`. Failures are logged and yield `None`.
pub async fn lookup_place<G: ReverseGeocoder>(geocoder: &G, at: LngLat) -> Option<PlaceName> {
    match geocoder.reverse(at).await {
        Ok(place) => {
            info!(city = %place.city, country = %place.country, "place found for text block");
            Some(place)
        }
        Err(e) => {
            warn!("reverse geocoding failed: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceName {
    pub city: String,
    pub country: String,
}

pub trait ReverseGeocoder {
    fn reverse(&self, at: LngLat) -> impl Future<Output = Result<PlaceName, NetworkError>>;
}

#[derive(Debug, Default, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

impl From<NominatimAddress> for PlaceName {
    fn from(a: NominatimAddress) -> Self {
        Self {
            city: a
                .city
                .or(a.town)
                .or(a.village)
                .unwrap_or_else(|| "Unknown City".to_string()),
            country: a.country.unwrap_or_else(|| "Unknown Country".to_string()),
        }
    }
}

/// Reverse geocoder backed by the OpenStreetMap Nominatim API.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub const DEFAULT_URL: &'static str = "https://nominatim.openstreetmap.org/reverse";

    pub fn new() -> Self {
        Self::with_url(Self::DEFAULT_URL)
    }

    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, at: LngLat) -> Result<PlaceName, NetworkError> {
        let resp = identified(self.client.get(&self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
            ])
            .send()
            .await?;
        let body: NominatimResponse = check_status(resp)?.json().await?;
        Ok(body.address.into())
    }
}
