//! Site Qualification Map Library
//!
//! Turns a caller-held list of commercial properties, evaluated against a
//! school-siting checklist, into what a map view needs: distance clusters,
//! a render mode, a camera directive, and a render state that applies them
//! through a thin map adapter.
//!
//! # Modules
//!
//! - `clustering`: Greedy seed-distance clustering.
//! - `compliance`: Checklist evaluation and derived workflow status.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `filters`: Qualification filter.
//! - `handlers`: HTTP request handlers.
//! - `map_view`: Pure view planning pipeline.
//! - `models`: Core data models.
//! - `render_state`: Render state and map adapter trait.
//! - `view_mode`: Render-mode and camera policy.

pub mod clustering;
pub mod compliance;
pub mod config;
pub mod errors;
pub mod filters;
pub mod handlers;
pub mod map_view;
pub mod models;
pub mod render_state;
pub mod view_mode;
