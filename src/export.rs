//! Poster capture with editing chrome hidden.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Capture failed: {0}")]
    Capture(String),
    #[error("Nothing to export")]
    Empty,
}

/// Which editing overlays are currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiVisibility {
    pub controls: bool,
    pub handles: bool,
    pub buttons: bool,
}

impl Default for UiVisibility {
    fn default() -> Self {
        Self::shown()
    }
}

impl UiVisibility {
    pub const fn shown() -> Self {
        Self {
            controls: true,
            handles: true,
            buttons: true,
        }
    }

    pub const fn hidden() -> Self {
        Self {
            controls: false,
            handles: false,
            buttons: false,
        }
    }

    pub fn is_hidden(&self) -> bool {
        !(self.controls || self.handles || self.buttons)
    }

    /// Hide every overlay, returning the state to restore after capture.
    pub fn hide_for_capture(&mut self) -> Self {
        let previous = *self;
        *self = Self::hidden();
        previous
    }

    /// Flip every overlay together; returns the new state.
    pub fn toggle(&mut self) -> Self {
        *self = if self.is_hidden() { Self::shown() } else { Self::hidden() };
        *self
    }
}

/// Produces the final poster image from whatever is on screen.
pub trait Rasterizer {
    fn capture(&self) -> impl Future<Output = Result<Vec<u8>, ExportError>>;
}

/// Hide the overlays, capture, then put the overlays back as they were.
pub async fn export_image<R: Rasterizer>(ui: &mut UiVisibility, rasterizer: &R) -> Result<Vec<u8>, ExportError> {
    let previous = ui.hide_for_capture();
    let result = rasterizer.capture().await;
    *ui = previous;
    log_outcome(&result);
    result
}

pub(crate) fn log_outcome(result: &Result<Vec<u8>, ExportError>) {
    match result {
        Ok(bytes) => info!(bytes = bytes.len(), "poster exported"),
        Err(e) => error!("poster export failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    struct StubRasterizer(bool);

    impl Rasterizer for StubRasterizer {
        async fn capture(&self) -> Result<Vec<u8>, ExportError> {
            if self.0 {
                Ok(vec![0x89, b'P', b'N', b'G'])
            } else {
                Err(ExportError::Capture("canvas tainted".into()))
            }
        }
    }

    #[test]
    fn test_toggle() {
        let mut ui = UiVisibility::default();
        assert!(ui.toggle().is_hidden());
        assert_eq!(ui.toggle(), UiVisibility::shown());
    }

    #[test]
    fn test_export_restores_ui() {
        let mut ui = UiVisibility::default();
        let bytes = block_on(export_image(&mut ui, &StubRasterizer(true))).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(ui, UiVisibility::shown());
    }

    #[test]
    fn test_failed_export_restores_ui() {
        let mut ui = UiVisibility {
            controls: false,
            ..UiVisibility::shown()
        };
        assert!(block_on(export_image(&mut ui, &StubRasterizer(false))).is_err());
        assert!(!ui.controls);
        assert!(ui.handles && ui.buttons);
    }
}
