//! Utility to load a property list from JSON and print the map plan for it.
//!
//! Usage: `inspect_clusters <properties.json> [zoom]`
//!
//! The file may hold either a bare array of properties or a full view request.

use site_qualify_api::config::Config;
use site_qualify_api::map_view::{MapViewPlanner, ViewRequest};
use site_qualify_api::models::Property;
use site_qualify_api::render_state::{RecordingSurface, RenderState};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "site_qualify_api=info,inspect_clusters=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: inspect_clusters <properties.json> [zoom]"))?;
    let zoom: Option<f64> = args
        .next()
        .map(|z| z.parse())
        .transpose()
        .map_err(|_| anyhow::anyhow!("zoom must be a number"))?;

    let raw = std::fs::read_to_string(&path)?;
    let mut request = match serde_json::from_str::<Vec<Property>>(&raw) {
        Ok(properties) => ViewRequest::new(properties),
        Err(_) => serde_json::from_str::<ViewRequest>(&raw)?,
    };
    if let Some(zoom) = zoom {
        request.zoom = zoom;
    }

    let config = Config::from_env()?;
    let planner = MapViewPlanner::from_config(&config).map_err(|e| anyhow::anyhow!(e))?;
    let plan = planner.plan(&request);

    println!("Loaded {} properties from {}", request.properties.len(), path);
    println!(
        "Displayed: {} (filtered out {}, unlocatable {})",
        plan.displayed_count, plan.filtered_out, plan.unlocatable
    );
    println!("Mode: {:?}", plan.mode);
    println!("Camera: {:?}", plan.camera);
    if !plan.duplicate_ids.is_empty() {
        println!("Duplicate ids (first copy kept): {:?}", plan.duplicate_ids);
    }
    if plan.degraded && !plan.fallback_markers.is_empty() {
        println!("Degraded to {} raw markers", plan.fallback_markers.len());
    }

    for cluster in &plan.clusters {
        println!(
            "- {} @ ({:.5}, {:.5}): {} members, {} qualified",
            cluster.id,
            cluster.coordinate.lat,
            cluster.coordinate.lng,
            cluster.total_count,
            cluster.qualified_count
        );
    }

    let mut state = RenderState::with_rules(config.compliance);
    let mut surface = RecordingSurface::new();
    state.apply(&plan, &mut surface);
    println!(
        "Surface: {} markers, layers {:?}",
        surface.live_markers.len(),
        surface.live_layer_kinds()
    );

    Ok(())
}
