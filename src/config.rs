//! Editor tunables, loadable from TOML.

use serde::{Deserialize, Serialize};

use crate::coords::Size;
use crate::layout::{AnchorColor, AnchorIcon, DistributionEngine, LayoutGraph, SizeResolver};
use crate::text::TextBlock;
use crate::viewport::ViewportPlanner;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config value: {0}")]
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Pixel gap kept between a new marker and its anchor, and from the container edge
    pub padding: f64,
    pub min_row_height: f64,
    pub row_divisor_offset: f64,
    pub max_dimension: f64,
    pub fallback_size: Size,
    pub min_marker_size: f64,
    /// Poster canvas the map is rendered into
    pub container: Size,
    /// Pointer travel below this is a click rather than a drag
    pub click_threshold: f64,
    pub tile_size: f64,
    pub style_name: String,
    pub anchor_icon: AnchorIcon,
    pub anchor_color: AnchorColor,
    pub text: TextBlock,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            padding: 100.0,
            min_row_height: 180.0,
            row_divisor_offset: 7.0,
            max_dimension: 400.0,
            fallback_size: Size::new(180.0, 240.0),
            min_marker_size: 50.0,
            container: Size::new(900.0, 1260.0),
            click_threshold: 5.0,
            tile_size: 512.0,
            style_name: "streets".to_string(),
            anchor_icon: AnchorIcon::default(),
            anchor_color: AnchorColor::default(),
            text: TextBlock::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every tunable. Call again after changing fields by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("min_row_height", self.min_row_height),
            ("row_divisor_offset", self.row_divisor_offset),
            ("max_dimension", self.max_dimension),
            ("fallback_size.width", self.fallback_size.width),
            ("fallback_size.height", self.fallback_size.height),
            ("tile_size", self.tile_size),
            ("container.width", self.container.width),
            ("container.height", self.container.height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Value(format!("{} must be positive, got {}", name, value)));
            }
        }
        let non_negative = [self.padding, self.min_marker_size, self.click_threshold];
        if !non_negative.iter().all(|v| v.is_finite() && *v >= 0.0) {
            return Err(ConfigError::Value(
                "padding, min_marker_size and click_threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn size_resolver(&self) -> SizeResolver {
        SizeResolver {
            min_row_height: self.min_row_height,
            row_divisor_offset: self.row_divisor_offset,
            max_dimension: self.max_dimension,
            fallback: self.fallback_size,
        }
    }

    pub fn distribution(&self) -> DistributionEngine {
        DistributionEngine::new(self.padding)
    }

    pub fn layout_graph(&self) -> LayoutGraph {
        LayoutGraph::new(self.min_marker_size, self.anchor_icon, self.anchor_color)
    }

    pub fn viewport_planner(&self) -> ViewportPlanner {
        ViewportPlanner::default()
    }
}
