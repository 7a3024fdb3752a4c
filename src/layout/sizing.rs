//! Marker sizing from natural aspect ratio and a shared row height.

use std::future::Future;
use std::io::Cursor;

use futures::future::join_all;
use tracing::warn;

use crate::coords::Size;

use super::types::Photo;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Image read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Image has a zero dimension")]
    Empty,
}

/// Source of intrinsic pixel dimensions.
pub trait ImageDecoder {
    fn natural_size(&self, photo: &Photo) -> impl Future<Output = Result<(u32, u32), DecodeError>>;
}

/// Reads dimensions from the encoded bytes with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
        let (w, h) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        if w == 0 || h == 0 {
            return Err(DecodeError::Empty);
        }
        Ok((w, h))
    }
}

impl ImageDecoder for ImageCrateDecoder {
    async fn natural_size(&self, photo: &Photo) -> Result<(u32, u32), DecodeError> {
        Self::dimensions(&photo.data)
    }
}

/// Sizing parameters.
pub struct SizeResolver {
    pub(crate) min_row_height: f64,
    /// Added to the placed-marker count before dividing the container height
    pub(crate) row_divisor_offset: f64,
    pub(crate) max_dimension: f64,
    pub(crate) fallback: Size,
}

impl Default for SizeResolver {
    fn default() -> Self {
        Self {
            min_row_height: 180.0,
            row_divisor_offset: 7.0,
            max_dimension: 400.0,
            fallback: Size::new(180.0, 240.0),
        }
    }
}

impl SizeResolver {
    /// Decode natural dimensions for every photo that lacks them.
    /// Failures are logged and leave the photo unsized.
    pub async fn measure<D: ImageDecoder>(&self, decoder: &D, photos: &mut [Photo]) {
        let results = join_all(
            photos
                .iter()
                .map(|p| async move {
                    match p.natural_size {
                        Some(size) => Ok(size),
                        None => decoder.natural_size(p).await,
                    }
                }),
        )
        .await;

        for (photo, result) in photos.iter_mut().zip(results) {
            match result {
                Ok(size) => photo.natural_size = Some(size),
                Err(e) => warn!(photo = %photo.id, "falling back to default size: {}", e),
            }
        }
    }

    pub fn row_height(&self, container_height: f64, placed: usize) -> f64 {
        self.min_row_height
            .max(container_height / (placed as f64 + self.row_divisor_offset))
    }

    /// Fit one image into the row height, capped on both sides.
    pub fn fit(&self, natural: Option<(u32, u32)>, row_height: f64) -> Size {
        let Some((nw, nh)) = natural.filter(|&(w, h)| w > 0 && h > 0) else {
            return self.fallback;
        };

        let mut width = row_height * (nw as f64 / nh as f64);
        let mut height = row_height;

        if width > self.max_dimension {
            height *= self.max_dimension / width;
            width = self.max_dimension;
        }
        if height > self.max_dimension {
            width *= self.max_dimension / height;
            height = self.max_dimension;
        }

        Size::new(width, height)
    }

    /// Sizes for a batch, in input order.
    pub fn resolve(&self, photos: &[Photo], container_height: f64, placed: usize) -> Vec<Size> {
        let row_height = self.row_height(container_height, placed);
        photos
            .iter()
            .map(|p| self.fit(p.natural_size, row_height))
            .collect()
    }
}

/// Marker scale factor for a slider position in `[0, 100]`; 50 is unscaled.
pub fn slider_scale_factor(position: f64) -> f64 {
    let s = position.clamp(0.0, 100.0);
    if s <= 50.0 {
        0.01 + 0.99 * (s / 50.0).powi(2)
    } else {
        1.0 + (s - 50.0) / 25.0
    }
}

/// Inverse of [`slider_scale_factor`].
pub fn slider_position(factor: f64) -> f64 {
    if factor <= 1.0 {
        50.0 * ((factor - 0.01).max(0.0) / 0.99).sqrt()
    } else {
        (50.0 + (factor - 1.0) * 25.0).min(100.0)
    }
}
