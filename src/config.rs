use serde::Deserialize;
use std::str::FromStr;

use crate::clustering::DEFAULT_DISTANCE_THRESHOLD;
use crate::compliance::{ComplianceRules, DEFAULT_MIN_SQUARE_FOOTAGE};
use crate::view_mode::{
    ViewConfig, DEFAULT_FIT_DURATION_MS, DEFAULT_FIT_MAX_ZOOM, DEFAULT_FIT_PADDING,
    DEFAULT_FLY_DURATION_MS, DEFAULT_HEATMAP_THRESHOLD, DEFAULT_PANEL_WIDTH,
    DEFAULT_POINT_OVERLAY_ZOOM, DEFAULT_SELECTED_ZOOM,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Seed distance in raw degrees below which properties share a cluster.
    pub cluster_distance_threshold: f64,
    pub view: ViewConfig,
    pub compliance: ComplianceRules,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            cluster_distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            view: ViewConfig::default(),
            compliance: ComplianceRules::default(),
            rate_limit_per_second: 10,
            rate_limit_burst: 20,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Reads `name`, falling back to `default` when unset or blank.
fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", name, raw)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            cluster_distance_threshold: env_or(
                "CLUSTER_DISTANCE_THRESHOLD",
                DEFAULT_DISTANCE_THRESHOLD,
            )?,
            view: ViewConfig {
                heatmap_threshold: env_or("HEATMAP_THRESHOLD", DEFAULT_HEATMAP_THRESHOLD)?,
                point_overlay_zoom: env_or("POINT_OVERLAY_ZOOM", DEFAULT_POINT_OVERLAY_ZOOM)?,
                selected_zoom: env_or("SELECTED_ZOOM", DEFAULT_SELECTED_ZOOM)?,
                fit_max_zoom: env_or("FIT_MAX_ZOOM", DEFAULT_FIT_MAX_ZOOM)?,
                fit_padding: env_or("FIT_PADDING", DEFAULT_FIT_PADDING)?,
                panel_width: env_or("PANEL_WIDTH", DEFAULT_PANEL_WIDTH)?,
                fly_duration_ms: env_or("FLY_DURATION_MS", DEFAULT_FLY_DURATION_MS)?,
                fit_duration_ms: env_or("FIT_DURATION_MS", DEFAULT_FIT_DURATION_MS)?,
            },
            compliance: ComplianceRules {
                min_square_footage: env_or("MIN_SQUARE_FOOTAGE", DEFAULT_MIN_SQUARE_FOOTAGE)?,
            },
            rate_limit_per_second: env_or("RATE_LIMIT_PER_SECOND", 10)?,
            rate_limit_burst: env_or("RATE_LIMIT_BURST", 20)?,
            max_body_bytes: env_or("MAX_BODY_BYTES", 5 * 1024 * 1024)?,
        };

        config.validate()?;

        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Cluster threshold: {}, heatmap threshold: {}, overlay zoom: {}",
            config.cluster_distance_threshold,
            config.view.heatmap_threshold,
            config.view.point_overlay_zoom
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Fails fast on thresholds that would degenerate the map core.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.cluster_distance_threshold.is_finite() || self.cluster_distance_threshold <= 0.0
        {
            anyhow::bail!(
                "CLUSTER_DISTANCE_THRESHOLD must be positive, got {}",
                self.cluster_distance_threshold
            );
        }
        self.view
            .validate()
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        if self.rate_limit_per_second == 0 || self.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_degenerate_thresholds_fail_fast() {
        let zero_distance = Config {
            cluster_distance_threshold: 0.0,
            ..Default::default()
        };
        assert!(zero_distance.validate().is_err());

        let mut zero_heatmap = Config::default();
        zero_heatmap.view.heatmap_threshold = 0;
        let err = zero_heatmap.validate().unwrap_err();
        assert!(err.to_string().contains("heatmap threshold"));
    }

    #[test]
    fn test_env_or_falls_back_and_rejects_garbage() {
        std::env::set_var("SITE_QUALIFY_TEST_BLANK", "  ");
        assert_eq!(env_or("SITE_QUALIFY_TEST_BLANK", 7u32).unwrap(), 7);

        std::env::set_var("SITE_QUALIFY_TEST_NUM", "0.02");
        assert_eq!(env_or("SITE_QUALIFY_TEST_NUM", 0.01f64).unwrap(), 0.02);

        std::env::set_var("SITE_QUALIFY_TEST_BAD", "abc");
        assert!(env_or("SITE_QUALIFY_TEST_BAD", 1usize).is_err());
    }
}
