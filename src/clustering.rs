//! Greedy single-pass distance clustering.
//!
//! Properties are visited in input order. Each unvisited property seeds a
//! cluster and pulls in every later unvisited property lying strictly closer
//! than the threshold to the seed. Distance is measured to the seed only, so
//! there is no transitive merging and membership depends on input order.
//! Cost is O(n²).

use std::collections::HashSet;

use crate::compliance::ComplianceRules;
use crate::errors::AppError;
use crate::models::{Cluster, Coordinate, Property, WorkflowStatus};

/// Roughly 1 km at mid latitudes.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterBuilder {
    distance_threshold: f64,
    rules: ComplianceRules,
}

impl ClusterBuilder {
    /// Creates a builder, rejecting a threshold that is not a positive finite number.
    pub fn new(distance_threshold: f64) -> Result<Self, AppError> {
        if !distance_threshold.is_finite() || distance_threshold <= 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "cluster distance threshold must be positive, got {}",
                distance_threshold
            )));
        }
        Ok(Self {
            distance_threshold,
            rules: ComplianceRules::default(),
        })
    }

    /// Rules used to count qualified members.
    pub fn with_rules(mut self, rules: ComplianceRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    /// Partitions `properties` into clusters.
    ///
    /// Every property must be locatable; filter with [`crate::models::locatable`]
    /// first. Duplicate ids are rejected.
    pub fn build(&self, properties: &[Property]) -> Result<Vec<Cluster>, AppError> {
        let coordinates = self.validate(properties)?;

        let mut processed = vec![false; properties.len()];
        let mut clusters = Vec::new();

        for seed_idx in 0..properties.len() {
            if processed[seed_idx] {
                continue;
            }
            processed[seed_idx] = true;

            let seed = coordinates[seed_idx];
            let mut members = vec![properties[seed_idx].clone()];

            for idx in (seed_idx + 1)..properties.len() {
                if processed[idx] {
                    continue;
                }
                if seed.planar_distance(&coordinates[idx]) < self.distance_threshold {
                    processed[idx] = true;
                    members.push(properties[idx].clone());
                }
            }

            clusters.push(self.finish(seed, members));
        }

        tracing::debug!(
            "Built {} clusters from {} properties (threshold {})",
            clusters.len(),
            properties.len(),
            self.distance_threshold
        );

        Ok(clusters)
    }

    fn validate(&self, properties: &[Property]) -> Result<Vec<Coordinate>, AppError> {
        let mut seen = HashSet::with_capacity(properties.len());
        properties
            .iter()
            .map(|p| {
                if !seen.insert(p.id.as_str()) {
                    return Err(AppError::DuplicatePropertyId(p.id.clone()));
                }
                p.coordinate().ok_or_else(|| {
                    AppError::BadRequest(format!("property {} has no valid coordinates", p.id))
                })
            })
            .collect()
    }

    fn finish(&self, seed: Coordinate, members: Vec<Property>) -> Cluster {
        let qualified_count = members
            .iter()
            .filter(|p| p.effective_status(&self.rules) == WorkflowStatus::Qualified)
            .count();

        Cluster {
            id: format!("cluster-{}", members[0].id),
            coordinate: seed,
            total_count: members.len(),
            qualified_count,
            members,
        }
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            rules: ComplianceRules::default(),
        }
    }
}
