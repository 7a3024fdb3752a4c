//! Data structures for the marker layout.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coords::{LngLat, Size};

/// Identifier shared by an image marker, its anchor, and the line between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn marker_key(self) -> String {
        format!("marker-{}", self.0)
    }

    pub fn anchor_key(self) -> String {
        format!("dot-{}", self.0)
    }

    pub fn line_key(self) -> String {
        format!("line-{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub u64);

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An uploaded photo. The coordinate is assigned at most once.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: PhotoId,
    /// Where the image data lives (`blob:` URL, file path, or durable URL)
    pub image_ref: String,
    pub data: Vec<u8>,
    /// Intrinsic pixel dimensions, when decoding succeeded
    pub natural_size: Option<(u32, u32)>,
    coordinates: Option<LngLat>,
}

impl Photo {
    pub fn new(id: PhotoId, image_ref: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id,
            image_ref: image_ref.into(),
            data,
            natural_size: None,
            coordinates: None,
        }
    }

    pub fn coordinates(&self) -> Option<LngLat> {
        self.coordinates
    }

    /// Set the coordinate if none has been assigned yet.
    /// Returns false when the photo was already located.
    pub fn locate(&mut self, at: LngLat) -> bool {
        if self.coordinates.is_some() {
            return false;
        }
        self.coordinates = Some(at);
        true
    }

    pub fn with_coordinates(mut self, at: LngLat) -> Self {
        self.locate(at);
        self
    }

    pub fn with_natural_size(mut self, width: u32, height: u32) -> Self {
        self.natural_size = Some((width, height));
        self
    }
}

/// Glyphs available for anchor markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorIcon {
    #[default]
    Heart,
    Home,
    MapPin,
    Camera,
    Gem,
    Plane,
    Star,
}

impl AnchorIcon {
    pub const ALL: [AnchorIcon; 7] = [
        Self::Heart,
        Self::Home,
        Self::MapPin,
        Self::Camera,
        Self::Gem,
        Self::Plane,
        Self::Star,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|icon| icon.id() == s)
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::Home => "home",
            Self::MapPin => "map-pin",
            Self::Camera => "camera",
            Self::Gem => "gem",
            Self::Plane => "plane",
            Self::Star => "star",
        }
    }

    /// Whether the glyph is drawn solid by default.
    pub fn filled(self) -> bool {
        matches!(self, Self::Heart | Self::Plane | Self::Star)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorColor {
    #[default]
    Red,
    Blue,
    Black,
    Green,
    Yellow,
}

impl AnchorColor {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            "black" => Some(Self::Black),
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            _ => None,
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            Self::Red => "#BD3D2F",
            Self::Blue => "#0306FF",
            Self::Black => "#000000",
            Self::Green => "#003220",
            Self::Yellow => "#FFBF37",
        }
    }
}

/// A placed, displayed photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMarker {
    pub id: ItemId,
    pub photo_id: PhotoId,
    pub coordinates: LngLat,
    pub size: Size,
    /// Size at placement time; slider scaling is relative to this
    pub base_size: Size,
    pub active: bool,
    pub image_ref: String,
}

/// The "red dot" at a photo's capture location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorMarker {
    pub id: ItemId,
    pub coordinates: LngLat,
    pub icon: AnchorIcon,
    pub color: AnchorColor,
    pub filled: bool,
    pub selected: bool,
}

/// Derived edge between a marker and its anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectingLine {
    pub id: ItemId,
    /// `[marker, anchor]`
    pub geometry: [LngLat; 2],
}

/// A located photo with its resolved display size, ready for distribution.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub photo_id: PhotoId,
    pub image_ref: String,
    pub anchor: LngLat,
    pub size: Size,
}

/// Output of distribution: where the marker goes relative to its anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub photo_id: PhotoId,
    pub image_ref: String,
    /// Original geocoded point
    pub anchor: LngLat,
    /// Offset, viewport-clamped marker position
    pub adjusted: LngLat,
    pub size: Size,
}
