//! Marker sizing, distribution, and the live layout graph.

pub mod distribution;
pub mod graph;
pub mod sizing;
pub mod sync;
pub mod types;

pub use distribution::{Arrangement, DistributionEngine};
pub use graph::{LayoutError, LayoutGraph, ReconcileReport};
pub use sizing::{
    DecodeError, ImageCrateDecoder, ImageDecoder, SizeResolver, slider_position, slider_scale_factor,
};
pub use sync::{AnchorView, LineView, MapEvent, MarkerView, ScreenFrame, ViewportSync};
pub use types::{
    AnchorColor, AnchorIcon, AnchorMarker, ConnectingLine, ImageMarker, ItemId, Photo, PhotoId,
    Placement, PlacementRequest,
};
