//! School-siting checklist evaluation
//!
//! The workflow status of a property is derived here from four facts:
//! 1. Zoning permits a school by right
//! 2. The building is sprinklered
//! 3. The occupancy group allows school use without a change of use
//! 4. The floor area meets the minimum
//!
//! A stored status on the record is only a cache of `derive_status`.

use serde::{Deserialize, Serialize};

use crate::models::{Property, TriState, WorkflowStatus};

pub const DEFAULT_MIN_SQUARE_FOOTAGE: u32 = 6_000;

/// Thresholds used when evaluating the checklist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRules {
    pub min_square_footage: u32,
}

impl Default for ComplianceRules {
    fn default() -> Self {
        Self {
            min_square_footage: DEFAULT_MIN_SQUARE_FOOTAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistField {
    ZoningByRight,
    FireSprinklers,
    CurrentOccupancy,
    SquareFootage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// A verified fact rules the site out.
    Blocking,
    /// The fact has not been verified yet.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    pub field: ChecklistField,
    pub severity: Severity,
    pub message: String,
}

impl ComplianceIssue {
    fn blocking(field: ChecklistField, message: impl Into<String>) -> Self {
        Self {
            field,
            severity: Severity::Blocking,
            message: message.into(),
        }
    }

    fn pending(field: ChecklistField, message: impl Into<String>) -> Self {
        Self {
            field,
            severity: Severity::Pending,
            message: message.into(),
        }
    }
}

/// Per-property evaluation returned by the compliance endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub property_id: String,
    pub issues: Vec<ComplianceIssue>,
    pub derived_status: WorkflowStatus,
    pub stored_status: Option<WorkflowStatus>,
    /// The stored status is missing or disagrees with the derived one.
    pub stale: bool,
}

/// Lists every checklist item the property fails or has not verified.
pub fn issues(property: &Property, rules: &ComplianceRules) -> Vec<ComplianceIssue> {
    let mut issues = Vec::new();

    match property.zoning_by_right {
        TriState::No => issues.push(ComplianceIssue::blocking(
            ChecklistField::ZoningByRight,
            "Zoning does not permit school use by right",
        )),
        TriState::Unknown => issues.push(ComplianceIssue::pending(
            ChecklistField::ZoningByRight,
            "Zoning by-right status not verified",
        )),
        TriState::Yes => {}
    }

    match property.fire_sprinklers {
        TriState::No => issues.push(ComplianceIssue::blocking(
            ChecklistField::FireSprinklers,
            "Building has no fire sprinkler system",
        )),
        TriState::Unknown => issues.push(ComplianceIssue::pending(
            ChecklistField::FireSprinklers,
            "Fire sprinkler status not verified",
        )),
        TriState::Yes => {}
    }

    match property.current_occupancy {
        None => issues.push(ComplianceIssue::pending(
            ChecklistField::CurrentOccupancy,
            "Current occupancy type not verified",
        )),
        Some(occupancy) if !occupancy.permits_school_use() => {
            issues.push(ComplianceIssue::blocking(
                ChecklistField::CurrentOccupancy,
                format!("Occupancy {:?} requires a change of use", occupancy),
            ))
        }
        Some(_) => {}
    }

    if property.square_footage == 0 {
        issues.push(ComplianceIssue::pending(
            ChecklistField::SquareFootage,
            "Square footage not measured",
        ));
    } else if property.square_footage < rules.min_square_footage {
        issues.push(ComplianceIssue::blocking(
            ChecklistField::SquareFootage,
            format!(
                "Square footage {} is below the {} minimum",
                property.square_footage, rules.min_square_footage
            ),
        ));
    }

    issues
}

/// Maps an issue list to the workflow lifecycle.
pub fn derive_status(property: &Property, issues: &[ComplianceIssue]) -> WorkflowStatus {
    if issues.iter().any(|i| i.severity == Severity::Blocking) {
        return WorkflowStatus::Disqualified;
    }
    if issues.is_empty() {
        return WorkflowStatus::Qualified;
    }

    let anything_known = property.zoning_by_right.is_known()
        || property.fire_sprinklers.is_known()
        || property.current_occupancy.is_some()
        || property.square_footage > 0;

    if anything_known {
        WorkflowStatus::Reviewing
    } else {
        WorkflowStatus::New
    }
}

pub fn report(property: &Property, rules: &ComplianceRules) -> ComplianceReport {
    let issues = issues(property, rules);
    let derived_status = derive_status(property, &issues);

    ComplianceReport {
        property_id: property.id.clone(),
        derived_status,
        stored_status: property.status,
        stale: property.status != Some(derived_status),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Occupancy;

    fn qualifying(id: &str) -> Property {
        let mut p = Property::new(id);
        p.zoning_by_right = TriState::Yes;
        p.fire_sprinklers = TriState::Yes;
        p.current_occupancy = Some(Occupancy::Educational);
        p.square_footage = 12_000;
        p
    }

    #[test]
    fn test_all_checks_pass_is_qualified() {
        let p = qualifying("a");
        let rules = ComplianceRules::default();

        assert!(issues(&p, &rules).is_empty());
        assert_eq!(p.effective_status(&rules), WorkflowStatus::Qualified);
    }

    #[test]
    fn test_nothing_known_is_new() {
        let p = Property::new("a");
        let rules = ComplianceRules::default();

        assert_eq!(issues(&p, &rules).len(), 4);
        assert_eq!(p.effective_status(&rules), WorkflowStatus::New);
    }

    #[test]
    fn test_partially_verified_is_reviewing() {
        let mut p = Property::new("a");
        p.zoning_by_right = TriState::Yes;

        assert_eq!(
            p.effective_status(&ComplianceRules::default()),
            WorkflowStatus::Reviewing
        );
    }

    #[test]
    fn test_any_blocking_issue_disqualifies() {
        let rules = ComplianceRules::default();

        let mut p = qualifying("a");
        p.fire_sprinklers = TriState::No;
        assert_eq!(p.effective_status(&rules), WorkflowStatus::Disqualified);

        let mut p = qualifying("b");
        p.current_occupancy = Some(Occupancy::Factory);
        assert_eq!(p.effective_status(&rules), WorkflowStatus::Disqualified);

        let mut p = qualifying("c");
        p.square_footage = 5_999;
        assert_eq!(p.effective_status(&rules), WorkflowStatus::Disqualified);

        // Blocking wins over pending
        let mut p = Property::new("d");
        p.zoning_by_right = TriState::No;
        assert_eq!(p.effective_status(&rules), WorkflowStatus::Disqualified);
    }

    #[test]
    fn test_min_square_footage_is_configurable() {
        let mut p = qualifying("a");
        p.square_footage = 8_000;

        let strict = ComplianceRules {
            min_square_footage: 10_000,
        };
        assert_eq!(p.effective_status(&strict), WorkflowStatus::Disqualified);
        assert_eq!(
            p.effective_status(&ComplianceRules::default()),
            WorkflowStatus::Qualified
        );
    }

    #[test]
    fn test_report_flags_stale_cache_and_reconcile_fixes_it() {
        let rules = ComplianceRules::default();
        let mut p = qualifying("a");
        p.status = Some(WorkflowStatus::Reviewing);

        let r = report(&p, &rules);
        assert!(r.stale);
        assert_eq!(r.derived_status, WorkflowStatus::Qualified);

        let before = p.updated_at;
        let now = before + chrono::Duration::seconds(5);
        assert!(p.reconcile_status(&rules, now));
        assert_eq!(p.status, Some(WorkflowStatus::Qualified));
        assert_eq!(p.updated_at, now);

        assert!(!p.reconcile_status(&rules, now));
        assert!(!report(&p, &rules).stale);
    }
}
