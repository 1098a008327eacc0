//! Render-mode and camera policy for the property map.
//!
//! Large result sets render as a density heatmap; zooming in past the overlay
//! threshold adds discrete points on top of the heatmap. Marker mode either
//! flies to a single property or fits the camera to everything displayed.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Bounds, Property};

pub const DEFAULT_HEATMAP_THRESHOLD: usize = 200;
pub const DEFAULT_POINT_OVERLAY_ZOOM: f64 = 14.0;
pub const DEFAULT_SELECTED_ZOOM: f64 = 16.0;
pub const DEFAULT_FIT_MAX_ZOOM: f64 = 15.0;
pub const DEFAULT_FIT_PADDING: f64 = 50.0;
pub const DEFAULT_PANEL_WIDTH: f64 = 400.0;
pub const DEFAULT_FLY_DURATION_MS: u64 = 1500;
pub const DEFAULT_FIT_DURATION_MS: u64 = 1000;

/// Tunables for [`ViewModeSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Above this many displayed properties the map switches to a heatmap.
    pub heatmap_threshold: usize,
    /// Zoom past which heatmap mode also draws individual points.
    pub point_overlay_zoom: f64,
    /// Zoom used when flying to a single property.
    pub selected_zoom: f64,
    /// Fit-bounds never zooms in beyond this.
    pub fit_max_zoom: f64,
    /// Padding in pixels on every side when fitting bounds.
    pub fit_padding: f64,
    /// Width in pixels of the side panel, reserved on the right when open.
    pub panel_width: f64,
    pub fly_duration_ms: u64,
    pub fit_duration_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            heatmap_threshold: DEFAULT_HEATMAP_THRESHOLD,
            point_overlay_zoom: DEFAULT_POINT_OVERLAY_ZOOM,
            selected_zoom: DEFAULT_SELECTED_ZOOM,
            fit_max_zoom: DEFAULT_FIT_MAX_ZOOM,
            fit_padding: DEFAULT_FIT_PADDING,
            panel_width: DEFAULT_PANEL_WIDTH,
            fly_duration_ms: DEFAULT_FLY_DURATION_MS,
            fit_duration_ms: DEFAULT_FIT_DURATION_MS,
        }
    }
}

impl ViewConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.heatmap_threshold == 0 {
            return Err(AppError::InvalidConfig(
                "heatmap threshold must be greater than zero".to_string(),
            ));
        }
        for (name, zoom) in [
            ("point overlay zoom", self.point_overlay_zoom),
            ("selected zoom", self.selected_zoom),
            ("fit max zoom", self.fit_max_zoom),
        ] {
            if !zoom.is_finite() || zoom <= 0.0 {
                return Err(AppError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, zoom
                )));
            }
        }
        for (name, px) in [
            ("fit padding", self.fit_padding),
            ("panel width", self.panel_width),
        ] {
            if !px.is_finite() || px < 0.0 {
                return Err(AppError::InvalidConfig(format!(
                    "{} must not be negative, got {}",
                    name, px
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderMode {
    /// Nothing to draw.
    Empty,
    /// Clusters and individual markers.
    Markers,
    /// Density layer, optionally with discrete points on top.
    Heatmap { point_overlay: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraDirective {
    /// Leave the viewport where it is.
    Keep,
    FlyTo {
        /// `[lng, lat]`.
        center: [f64; 2],
        zoom: f64,
        duration_ms: u64,
        /// Pixel offset keeping the target clear of an open side panel.
        offset: [f64; 2],
    },
    FitBounds {
        bounds: Bounds,
        padding: Padding,
        max_zoom: f64,
        duration_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewModeSelector {
    config: ViewConfig,
}

impl ViewModeSelector {
    pub fn new(config: ViewConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Picks the render mode.
    ///
    /// `displayed_count` is the number of properties left after filtering.
    /// `heatmap_requested` forces heatmap mode regardless of the count.
    pub fn select_mode(
        &self,
        displayed_count: usize,
        zoom: f64,
        heatmap_requested: bool,
    ) -> RenderMode {
        if displayed_count == 0 {
            return RenderMode::Empty;
        }
        if heatmap_requested || displayed_count > self.config.heatmap_threshold {
            return RenderMode::Heatmap {
                point_overlay: zoom > self.config.point_overlay_zoom,
            };
        }
        RenderMode::Markers
    }

    /// Chooses where the camera goes for the displayed set.
    pub fn camera(
        &self,
        displayed: &[Property],
        selected: Option<&Property>,
        show_panel: bool,
        mode: RenderMode,
    ) -> CameraDirective {
        let selected = selected.filter(|p| p.is_locatable());

        match mode {
            RenderMode::Empty => CameraDirective::Keep,
            RenderMode::Heatmap { .. } => match selected {
                Some(p) => self.fly_to(p, show_panel),
                None => CameraDirective::Keep,
            },
            RenderMode::Markers => {
                if let Some(p) = selected {
                    return self.fly_to(p, show_panel);
                }
                if let [only] = displayed {
                    if only.is_locatable() {
                        return self.fly_to(only, show_panel);
                    }
                }
                self.fit(displayed, show_panel)
            }
        }
    }

    fn fly_to(&self, property: &Property, show_panel: bool) -> CameraDirective {
        let Some(coordinate) = property.coordinate() else {
            return CameraDirective::Keep;
        };
        let offset = if show_panel {
            [-self.config.panel_width / 2.0, 0.0]
        } else {
            [0.0, 0.0]
        };
        CameraDirective::FlyTo {
            center: coordinate.to_lng_lat(),
            zoom: self.config.selected_zoom,
            duration_ms: self.config.fly_duration_ms,
            offset,
        }
    }

    fn fit(&self, displayed: &[Property], show_panel: bool) -> CameraDirective {
        let Some(bounds) =
            Bounds::from_coordinates(displayed.iter().filter_map(Property::coordinate))
        else {
            return CameraDirective::Keep;
        };
        let pad = self.config.fit_padding;
        let right = if show_panel {
            pad + self.config.panel_width
        } else {
            pad
        };
        CameraDirective::FitBounds {
            bounds,
            padding: Padding {
                top: pad,
                bottom: pad,
                left: pad,
                right,
            },
            max_zoom: self.config.fit_max_zoom,
            duration_ms: self.config.fit_duration_ms,
        }
    }
}

impl Default for ViewModeSelector {
    fn default() -> Self {
        Self {
            config: ViewConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_degenerate_config() {
        let zero = ViewConfig {
            heatmap_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(
            ViewModeSelector::new(zero),
            Err(AppError::InvalidConfig(_))
        ));

        let bad_zoom = ViewConfig {
            selected_zoom: f64::INFINITY,
            ..Default::default()
        };
        assert!(bad_zoom.validate().is_err());

        let bad_padding = ViewConfig {
            fit_padding: -1.0,
            ..Default::default()
        };
        assert!(bad_padding.validate().is_err());
    }

    #[test]
    fn test_threshold_boundary_stays_in_markers() {
        let selector = ViewModeSelector::default();
        assert_eq!(selector.select_mode(200, 10.0, false), RenderMode::Markers);
        assert_eq!(
            selector.select_mode(201, 10.0, false),
            RenderMode::Heatmap {
                point_overlay: false
            }
        );
    }

    #[test]
    fn test_empty_and_forced_heatmap() {
        let selector = ViewModeSelector::default();
        assert_eq!(selector.select_mode(0, 15.0, true), RenderMode::Empty);
        assert_eq!(
            selector.select_mode(3, 15.0, true),
            RenderMode::Heatmap {
                point_overlay: true
            }
        );
    }

    #[test]
    fn test_overlay_zoom_is_strict() {
        let selector = ViewModeSelector::default();
        assert_eq!(
            selector.select_mode(500, 14.0, false),
            RenderMode::Heatmap {
                point_overlay: false
            }
        );
    }

    #[test]
    fn test_panel_offsets_fly_to() {
        let selector = ViewModeSelector::default();
        let p = Property::new("a").with_location(42.36, -71.06);

        let directive = selector.camera(&[], Some(&p), true, RenderMode::Markers);
        assert_eq!(
            directive,
            CameraDirective::FlyTo {
                center: [-71.06, 42.36],
                zoom: 16.0,
                duration_ms: DEFAULT_FLY_DURATION_MS,
                offset: [-200.0, 0.0],
            }
        );
    }

    #[test]
    fn test_heatmap_keeps_viewport_without_selection() {
        let selector = ViewModeSelector::default();
        let props = vec![
            Property::new("a").with_location(42.36, -71.06),
            Property::new("b").with_location(42.40, -71.00),
        ];
        let mode = RenderMode::Heatmap {
            point_overlay: false,
        };
        assert_eq!(
            selector.camera(&props, None, false, mode),
            CameraDirective::Keep
        );
    }
}
