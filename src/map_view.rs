/// Map view planning
///
/// Pure pipeline from (properties, selection, flags) to everything the map
/// needs for one render:
/// 1. Apply the qualification filter
/// 2. Drop properties without usable coordinates, then repeated ids
/// 3. Pick the render mode and camera directive
/// 4. Build clusters (marker mode) or heat points (heatmap mode)
///
/// Nothing is retained between calls; every plan fully supersedes the last.
use serde::{Deserialize, Serialize};

use crate::clustering::ClusterBuilder;
use crate::compliance::ComplianceRules;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::filters::QualificationFilter;
use crate::models::{Cluster, Coordinate, Property, WorkflowStatus};
use crate::view_mode::{CameraDirective, RenderMode, ViewConfig, ViewModeSelector};

fn default_zoom() -> f64 {
    10.0
}

/// Input for one render of the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRequest {
    pub properties: Vec<Property>,
    #[serde(default)]
    pub selected_property_id: Option<String>,
    #[serde(default)]
    pub filter: QualificationFilter,
    /// Current map zoom level.
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    /// Whether the details side panel is open.
    #[serde(default)]
    pub show_panel: bool,
    /// User toggle forcing heatmap rendering.
    #[serde(default)]
    pub heatmap_requested: bool,
}

impl ViewRequest {
    pub fn new(properties: Vec<Property>) -> Self {
        Self {
            properties,
            selected_property_id: None,
            filter: QualificationFilter::default(),
            zoom: default_zoom(),
            show_panel: false,
            heatmap_requested: false,
        }
    }
}

/// One point of the density layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatPoint {
    pub property_id: String,
    pub coordinate: Coordinate,
    pub weight: f64,
    pub qualified: bool,
}

/// Everything the render adapter needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewPlan {
    pub mode: RenderMode,
    pub camera: CameraDirective,
    /// Marker mode only.
    pub clusters: Vec<Cluster>,
    /// Raw markers used when clustering failed.
    pub fallback_markers: Vec<Property>,
    /// Heatmap mode only.
    pub heat_points: Vec<HeatPoint>,
    pub selected_property_id: Option<String>,
    pub displayed_count: usize,
    /// Removed by the qualification filter.
    pub filtered_out: usize,
    /// Matched the filter but had no usable coordinates.
    pub unlocatable: usize,
    /// Ids that appeared more than once; only the first copy is displayed.
    #[serde(default)]
    pub duplicate_ids: Vec<String>,
    /// Duplicate ids or a clustering failure; marker mode falls back to raw markers.
    pub degraded: bool,
}

impl ViewPlan {
    /// Ids of every property that ends up on the map as a marker or point.
    pub fn rendered_ids(&self) -> Vec<&str> {
        match self.mode {
            RenderMode::Empty => Vec::new(),
            RenderMode::Heatmap { .. } => {
                self.heat_points.iter().map(|h| h.property_id.as_str()).collect()
            }
            RenderMode::Markers if self.degraded => {
                self.fallback_markers.iter().map(|p| p.id.as_str()).collect()
            }
            RenderMode::Markers => self.clusters.iter().flat_map(|c| c.member_ids()).collect(),
        }
    }
}

/// Stateless planner bundling the clustering and view-mode policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapViewPlanner {
    builder: ClusterBuilder,
    selector: ViewModeSelector,
    rules: ComplianceRules,
}

impl MapViewPlanner {
    pub fn new(
        distance_threshold: f64,
        view: ViewConfig,
        rules: ComplianceRules,
    ) -> Result<Self, AppError> {
        let builder = ClusterBuilder::new(distance_threshold)
            .context("invalid clustering settings")?
            .with_rules(rules);
        let selector = ViewModeSelector::new(view).context("invalid view settings")?;
        Ok(Self {
            builder,
            selector,
            rules,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.cluster_distance_threshold,
            config.view,
            config.compliance,
        )
    }

    pub fn rules(&self) -> &ComplianceRules {
        &self.rules
    }

    pub fn builder(&self) -> &ClusterBuilder {
        &self.builder
    }

    /// Clusters the locatable subset of `properties`.
    pub fn clusters(&self, properties: &[Property]) -> Result<Vec<Cluster>, AppError> {
        let located = crate::models::locatable(properties);
        self.builder
            .build(&located)
            .with_context(|| format!("clustering {} properties", located.len()))
    }

    pub fn plan(&self, request: &ViewRequest) -> ViewPlan {
        let matched = request.filter.apply(&request.properties, &self.rules);
        let filtered_out = request.properties.len() - matched.len();

        let located = crate::models::locatable(&matched);
        let unlocatable = matched.len() - located.len();

        let (displayed, duplicate_ids) = crate::models::split_duplicates(located);
        if !duplicate_ids.is_empty() {
            tracing::warn!(
                "Duplicate property ids {:?}, keeping the first copy of each",
                duplicate_ids
            );
        }

        let selected = request
            .selected_property_id
            .as_deref()
            .and_then(|id| displayed.iter().find(|p| p.id == id));

        let mode = self
            .selector
            .select_mode(displayed.len(), request.zoom, request.heatmap_requested);
        let camera = self
            .selector
            .camera(&displayed, selected, request.show_panel, mode);
        let selected_property_id = selected.map(|p| p.id.clone());

        let mut plan = ViewPlan {
            mode,
            camera,
            clusters: Vec::new(),
            fallback_markers: Vec::new(),
            heat_points: Vec::new(),
            selected_property_id,
            displayed_count: displayed.len(),
            filtered_out,
            unlocatable,
            degraded: !duplicate_ids.is_empty(),
            duplicate_ids,
        };

        match mode {
            RenderMode::Empty => {}
            RenderMode::Markers if plan.degraded => plan.fallback_markers = displayed,
            RenderMode::Markers => match self.builder.build(&displayed) {
                Ok(clusters) => plan.clusters = clusters,
                Err(e) => {
                    tracing::warn!("Clustering failed, rendering raw markers: {}", e);
                    plan.degraded = true;
                    plan.fallback_markers = displayed;
                }
            },
            RenderMode::Heatmap { .. } => {
                plan.heat_points = displayed
                    .iter()
                    .filter_map(|p| {
                        Some(HeatPoint {
                            property_id: p.id.clone(),
                            coordinate: p.coordinate()?,
                            weight: 1.0,
                            qualified: p.effective_status(&self.rules)
                                == WorkflowStatus::Qualified,
                        })
                    })
                    .collect();
            }
        }

        tracing::debug!(
            "Planned {:?} for {} displayed properties ({} filtered out, {} unlocatable)",
            plan.mode,
            plan.displayed_count,
            plan.filtered_out,
            plan.unlocatable
        );

        plan
    }
}

impl Default for MapViewPlanner {
    fn default() -> Self {
        Self {
            builder: ClusterBuilder::default(),
            selector: ViewModeSelector::default(),
            rules: ComplianceRules::default(),
        }
    }
}
