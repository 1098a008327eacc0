use serde::{Deserialize, Serialize};

use crate::compliance::ComplianceRules;
use crate::models::{Occupancy, Property, TriState, WorkflowStatus};

/// Qualification filter applied before clustering and mode selection.
///
/// Every criterion is optional; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationFilter {
    /// Matches on the derived status, not the cached one.
    pub statuses: Vec<WorkflowStatus>,
    pub zoning_by_right: Option<TriState>,
    pub fire_sprinklers: Option<TriState>,
    pub occupancies: Vec<Occupancy>,
    pub min_square_footage: Option<u32>,
    pub max_square_footage: Option<u32>,
    pub assigned_to: Option<String>,
    /// Case-insensitive substring over id, name and address.
    pub search: Option<String>,
}

impl QualificationFilter {
    pub fn is_active(&self) -> bool {
        *self != QualificationFilter::default()
    }

    pub fn matches(&self, property: &Property, rules: &ComplianceRules) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&property.effective_status(rules)) {
            return false;
        }
        if self
            .zoning_by_right
            .is_some_and(|z| z != property.zoning_by_right)
        {
            return false;
        }
        if self
            .fire_sprinklers
            .is_some_and(|f| f != property.fire_sprinklers)
        {
            return false;
        }
        if !self.occupancies.is_empty()
            && !property
                .current_occupancy
                .is_some_and(|o| self.occupancies.contains(&o))
        {
            return false;
        }
        if self
            .min_square_footage
            .is_some_and(|min| property.square_footage < min)
        {
            return false;
        }
        if self
            .max_square_footage
            .is_some_and(|max| property.square_footage > max)
        {
            return false;
        }
        if let Some(analyst) = &self.assigned_to {
            if property.assigned_to.as_deref() != Some(analyst.as_str()) {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = |s: Option<&str>| s.is_some_and(|s| s.to_lowercase().contains(&term));
            if !(hit(Some(property.id.as_str()))
                || hit(property.name.as_deref())
                || hit(property.address.as_deref()))
            {
                return false;
            }
        }
        true
    }

    /// Returns the matching properties, preserving input order.
    pub fn apply(&self, properties: &[Property], rules: &ComplianceRules) -> Vec<Property> {
        if !self.is_active() {
            return properties.to_vec();
        }
        let matched: Vec<Property> = properties
            .iter()
            .filter(|p| self.matches(p, rules))
            .cloned()
            .collect();
        tracing::debug!(
            "Qualification filter kept {} of {} properties",
            matched.len(),
            properties.len()
        );
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Property> {
        let mut a = Property::new("MA-001");
        a.name = Some("Former Fisher Office Park".to_string());
        a.zoning_by_right = TriState::Yes;
        a.fire_sprinklers = TriState::Yes;
        a.current_occupancy = Some(Occupancy::Educational);
        a.square_footage = 20_000;
        a.assigned_to = Some("dana".to_string());

        let mut b = Property::new("MA-002");
        b.address = Some("12 Harbor St, Boston".to_string());
        b.fire_sprinklers = TriState::No;
        b.square_footage = 4_000;

        let c = Property::new("MA-003");

        vec![a, b, c]
    }

    fn ids(props: &[Property]) -> Vec<&str> {
        props.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = QualificationFilter::default();
        assert!(!filter.is_active());
        assert_eq!(filter.apply(&sample(), &ComplianceRules::default()).len(), 3);
    }

    #[test]
    fn test_status_filter_uses_derived_status() {
        let mut props = sample();
        // Stale cache claims qualified
        props[1].status = Some(WorkflowStatus::Qualified);

        let filter = QualificationFilter {
            statuses: vec![WorkflowStatus::Qualified],
            ..Default::default()
        };
        let out = filter.apply(&props, &ComplianceRules::default());
        assert_eq!(ids(&out), vec!["MA-001"]);
    }

    #[test]
    fn test_tristate_and_range_criteria() {
        let rules = ComplianceRules::default();
        let props = sample();

        let unknown_zoning = QualificationFilter {
            zoning_by_right: Some(TriState::Unknown),
            ..Default::default()
        };
        assert_eq!(ids(&unknown_zoning.apply(&props, &rules)), vec!["MA-002", "MA-003"]);

        let mid_size = QualificationFilter {
            min_square_footage: Some(1_000),
            max_square_footage: Some(10_000),
            ..Default::default()
        };
        assert_eq!(ids(&mid_size.apply(&props, &rules)), vec!["MA-002"]);
    }

    #[test]
    fn test_search_and_assignment() {
        let rules = ComplianceRules::default();
        let props = sample();

        let search = QualificationFilter {
            search: Some("  harbor ".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&search.apply(&props, &rules)), vec!["MA-002"]);

        let assigned = QualificationFilter {
            assigned_to: Some("dana".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&assigned.apply(&props, &rules)), vec!["MA-001"]);
    }
}
