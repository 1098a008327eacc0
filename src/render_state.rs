//! Render state owned by the view layer.
//!
//! Map-library side effects go through [`MapSurface`]. [`RenderState`]
//! remembers which markers and layers it created and diffs each new
//! [`ViewPlan`] against them: a change of mode, of the marker set or of any
//! heat point tears everything down before the new objects are added, so no
//! two marker sets are ever alive at once.
//!
//! Clicks come back through [`RenderState::activate_marker`] for markers and
//! [`RenderState::activate_point`] for points of the heatmap overlay.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compliance::ComplianceRules;
use crate::map_view::{HeatPoint, ViewPlan};
use crate::models::{Bounds, Cluster, Coordinate, Property, WorkflowStatus};
use crate::view_mode::{CameraDirective, Padding, RenderMode};

pub type MarkerHandle = u64;
pub type LayerHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Density layer.
    Heatmap,
    /// Discrete points drawn over the heatmap at high zoom.
    PointOverlay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerKind {
    Property { qualified: bool },
    Cluster { total: usize, qualified: usize },
}

/// What the adapter needs to draw a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub id: String,
    pub coordinate: Coordinate,
    pub kind: MarkerKind,
    /// Property handed to `on_select` when the marker is activated.
    pub representative: Property,
}

impl MarkerSpec {
    fn from_cluster(cluster: &Cluster) -> Self {
        let seed = cluster.members[0].clone();
        let kind = if cluster.is_singleton() {
            MarkerKind::Property {
                qualified: cluster.qualified_count == 1,
            }
        } else {
            MarkerKind::Cluster {
                total: cluster.total_count,
                qualified: cluster.qualified_count,
            }
        };
        let id = if cluster.is_singleton() {
            seed.id.clone()
        } else {
            cluster.id.clone()
        };
        Self {
            id,
            coordinate: cluster.coordinate,
            kind,
            representative: seed,
        }
    }

    fn from_property(property: &Property, rules: &ComplianceRules) -> Option<Self> {
        Some(Self {
            id: property.id.clone(),
            coordinate: property.coordinate()?,
            kind: MarkerKind::Property {
                qualified: property.effective_status(rules) == WorkflowStatus::Qualified,
            },
            representative: property.clone(),
        })
    }
}

/// Thin adapter over the actual map library.
pub trait MapSurface {
    fn add_marker(&mut self, marker: &MarkerSpec) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn add_layer(&mut self, kind: LayerKind, points: &[HeatPoint]) -> LayerHandle;
    fn remove_layer(&mut self, handle: LayerHandle);
    fn fly_to(&mut self, center: [f64; 2], zoom: f64, duration_ms: u64, offset: [f64; 2]);
    fn fit_bounds(&mut self, bounds: &Bounds, padding: &Padding, max_zoom: f64, duration_ms: u64);
}

#[derive(Debug, Default)]
pub struct RenderState {
    mode: Option<RenderMode>,
    markers: Vec<(MarkerHandle, MarkerSpec)>,
    layers: Vec<(LayerHandle, LayerKind)>,
    heat_points: Vec<HeatPoint>,
    rules: ComplianceRules,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules used to colour raw markers when a plan fell back to them.
    pub fn with_rules(rules: ComplianceRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Option<RenderMode> {
        self.mode
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn layers(&self) -> Vec<LayerKind> {
        self.layers.iter().map(|(_, kind)| *kind).collect()
    }

    /// Brings the surface in line with `plan`, then moves the camera.
    pub fn apply(&mut self, plan: &ViewPlan, surface: &mut dyn MapSurface) {
        let next_markers = marker_specs(plan, &self.rules);

        match (self.mode, plan.mode) {
            (
                Some(RenderMode::Heatmap { point_overlay: was }),
                RenderMode::Heatmap { point_overlay: now },
            ) if self.heat_points == plan.heat_points => {
                if was != now {
                    self.toggle_overlay(now, &plan.heat_points, surface);
                }
            }
            (Some(RenderMode::Markers), RenderMode::Markers)
                if self.current_specs().eq(next_markers.iter()) => {}
            _ => {
                self.teardown(surface);
                self.build(plan, next_markers, surface);
                self.heat_points = plan.heat_points.clone();
            }
        }
        self.mode = Some(plan.mode);

        apply_camera(&plan.camera, surface);
    }

    /// Removes every marker and layer this state created.
    pub fn teardown(&mut self, surface: &mut dyn MapSurface) {
        if !self.markers.is_empty() || !self.layers.is_empty() {
            tracing::debug!(
                "Tearing down {} markers and {} layers",
                self.markers.len(),
                self.layers.len()
            );
        }
        for (handle, _) in self.markers.drain(..) {
            surface.remove_marker(handle);
        }
        for (handle, _) in self.layers.drain(..) {
            surface.remove_layer(handle);
        }
        self.heat_points.clear();
        self.mode = None;
    }

    /// Routes a marker click to `on_select` with the marker's property.
    ///
    /// Returns `false` for a handle this state does not own.
    pub fn activate_marker<F>(&self, handle: MarkerHandle, mut on_select: F) -> bool
    where
        F: FnMut(&Property),
    {
        match self.markers.iter().find(|(h, _)| *h == handle) {
            Some((_, spec)) => {
                on_select(&spec.representative);
                true
            }
            None => false,
        }
    }

    /// Routes a click on a point of the overlay layer to `on_select` with
    /// the point's property id.
    ///
    /// Returns `false` unless `layer` is the live overlay and `property_id`
    /// is one of its points. The heatmap layer itself is not clickable.
    pub fn activate_point<F>(
        &self,
        layer: LayerHandle,
        property_id: &str,
        mut on_select: F,
    ) -> bool
    where
        F: FnMut(&str),
    {
        let is_overlay = self
            .layers
            .iter()
            .any(|(h, kind)| *h == layer && *kind == LayerKind::PointOverlay);
        let known = self.heat_points.iter().any(|p| p.property_id == property_id);
        if !is_overlay || !known {
            return false;
        }
        on_select(property_id);
        true
    }

    fn current_specs(&self) -> impl Iterator<Item = &MarkerSpec> {
        self.markers.iter().map(|(_, spec)| spec)
    }

    fn build(&mut self, plan: &ViewPlan, specs: Vec<MarkerSpec>, surface: &mut dyn MapSurface) {
        match plan.mode {
            RenderMode::Empty => {}
            RenderMode::Markers => {
                for spec in specs {
                    let handle = surface.add_marker(&spec);
                    self.markers.push((handle, spec));
                }
            }
            RenderMode::Heatmap { point_overlay } => {
                let handle = surface.add_layer(LayerKind::Heatmap, &plan.heat_points);
                self.layers.push((handle, LayerKind::Heatmap));
                if point_overlay {
                    self.toggle_overlay(true, &plan.heat_points, surface);
                }
            }
        }
    }

    fn toggle_overlay(&mut self, on: bool, points: &[HeatPoint], surface: &mut dyn MapSurface) {
        if on {
            let handle = surface.add_layer(LayerKind::PointOverlay, points);
            self.layers.push((handle, LayerKind::PointOverlay));
            return;
        }
        self.layers.retain(|(handle, kind)| {
            if *kind == LayerKind::PointOverlay {
                surface.remove_layer(*handle);
                false
            } else {
                true
            }
        });
    }
}

fn marker_specs(plan: &ViewPlan, rules: &ComplianceRules) -> Vec<MarkerSpec> {
    if plan.mode != RenderMode::Markers {
        return Vec::new();
    }
    if plan.degraded {
        return plan
            .fallback_markers
            .iter()
            .filter_map(|p| MarkerSpec::from_property(p, rules))
            .collect();
    }
    plan.clusters.iter().map(MarkerSpec::from_cluster).collect()
}

fn apply_camera(camera: &CameraDirective, surface: &mut dyn MapSurface) {
    match camera {
        CameraDirective::Keep => {}
        CameraDirective::FlyTo {
            center,
            zoom,
            duration_ms,
            offset,
        } => surface.fly_to(*center, *zoom, *duration_ms, *offset),
        CameraDirective::FitBounds {
            bounds,
            padding,
            max_zoom,
            duration_ms,
        } => surface.fit_bounds(bounds, padding, *max_zoom, *duration_ms),
    }
}

/// Every call a [`RecordingSurface`] received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    AddMarker(String),
    RemoveMarker(MarkerHandle),
    AddLayer(LayerKind),
    RemoveLayer(LayerHandle),
    FlyTo { center: [f64; 2], zoom: f64 },
    FitBounds { bounds: Bounds, max_zoom: f64 },
}

/// In-memory surface tracking which objects are alive.
///
/// Used by the CLI to report what a plan would draw, and by tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_handle: u64,
    pub live_markers: HashMap<MarkerHandle, MarkerSpec>,
    pub live_layers: HashMap<LayerHandle, LayerKind>,
    pub calls: Vec<SurfaceCall>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn live_layer_kinds(&self) -> Vec<LayerKind> {
        let mut kinds: Vec<LayerKind> = self.live_layers.values().copied().collect();
        kinds.sort_by_key(|k| *k as u8);
        kinds
    }
}

impl MapSurface for RecordingSurface {
    fn add_marker(&mut self, marker: &MarkerSpec) -> MarkerHandle {
        let handle = self.handle();
        self.live_markers.insert(handle, marker.clone());
        self.calls.push(SurfaceCall::AddMarker(marker.id.clone()));
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        self.live_markers.remove(&handle);
        self.calls.push(SurfaceCall::RemoveMarker(handle));
    }

    fn add_layer(&mut self, kind: LayerKind, _points: &[HeatPoint]) -> LayerHandle {
        let handle = self.handle();
        self.live_layers.insert(handle, kind);
        self.calls.push(SurfaceCall::AddLayer(kind));
        handle
    }

    fn remove_layer(&mut self, handle: LayerHandle) {
        self.live_layers.remove(&handle);
        self.calls.push(SurfaceCall::RemoveLayer(handle));
    }

    fn fly_to(&mut self, center: [f64; 2], zoom: f64, _duration_ms: u64, _offset: [f64; 2]) {
        self.calls.push(SurfaceCall::FlyTo { center, zoom });
    }

    fn fit_bounds(
        &mut self,
        bounds: &Bounds,
        _padding: &Padding,
        max_zoom: f64,
        _duration_ms: u64,
    ) {
        self.calls.push(SurfaceCall::FitBounds {
            bounds: *bounds,
            max_zoom,
        });
    }
}
