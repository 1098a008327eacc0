use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compliance::{self, ComplianceRules};

// ============ Checklist Fields ============

/// A compliance fact that is true, false, or not yet verified.
///
/// Serialized as `true`, `false` or `null` so records coming from the dashboard
/// can be passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum TriState {
    Yes,
    No,
    #[default]
    Unknown,
}

impl TriState {
    pub fn is_known(self) -> bool {
        !matches!(self, TriState::Unknown)
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::Yes,
            Some(false) => TriState::No,
            None => TriState::Unknown,
        }
    }
}

impl From<TriState> for Option<bool> {
    fn from(value: TriState) -> Self {
        match value {
            TriState::Yes => Some(true),
            TriState::No => Some(false),
            TriState::Unknown => None,
        }
    }
}

/// Building occupancy group (IBC letters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupancy {
    /// Educational.
    #[serde(rename = "E")]
    Educational,
    /// Assembly.
    #[serde(rename = "A")]
    Assembly,
    /// Business / office.
    #[serde(rename = "B")]
    Business,
    /// Mercantile / retail.
    #[serde(rename = "M")]
    Mercantile,
    /// Storage / warehouse.
    #[serde(rename = "S")]
    Storage,
    /// Factory / industrial.
    #[serde(rename = "F")]
    Factory,
    /// Residential.
    #[serde(rename = "R")]
    Residential,
    #[serde(other)]
    Other,
}

impl Occupancy {
    /// Whether a school can move in without a change-of-use permit.
    pub fn permits_school_use(self) -> bool {
        matches!(self, Occupancy::Educational | Occupancy::Assembly)
    }
}

/// Workflow stage of a property.
///
/// Older views label the terminal states `synced` and `not_qualified`; both
/// spellings are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    New,
    Reviewing,
    #[serde(alias = "synced")]
    Qualified,
    #[serde(alias = "not_qualified")]
    Disqualified,
}

// ============ Property ============

/// A commercial property under evaluation as a school site.
///
/// Owned by the calling application; the map core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Opaque unique identifier.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Latitude in degrees; `None` when the property has not been geocoded.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude in degrees; `None` when the property has not been geocoded.
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub zoning_by_right: TriState,
    #[serde(default)]
    pub fire_sprinklers: TriState,
    #[serde(default)]
    pub current_occupancy: Option<Occupancy>,
    /// Gross square footage, `0` when not measured.
    #[serde(default)]
    pub square_footage: u32,
    /// Cached workflow status. The derived status wins whenever they disagree.
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    /// Analyst the property is assigned to.
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Property {
    /// Creates an unlocated property with every checklist field unknown.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: None,
            address: None,
            latitude: None,
            longitude: None,
            zoning_by_right: TriState::Unknown,
            fire_sprinklers: TriState::Unknown,
            current_occupancy: None,
            square_footage: 0,
            status: None,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            notes: Vec::new(),
        }
    }

    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lng);
        self
    }

    /// Returns the coordinate when both components are present and valid.
    pub fn coordinate(&self) -> Option<Coordinate> {
        let coordinate = Coordinate::new(self.latitude?, self.longitude?);
        coordinate.is_valid().then_some(coordinate)
    }

    pub fn is_locatable(&self) -> bool {
        self.coordinate().is_some()
    }

    /// Status derived from the checklist fields.
    pub fn effective_status(&self, rules: &ComplianceRules) -> WorkflowStatus {
        compliance::derive_status(self, &compliance::issues(self, rules))
    }

    /// Rewrites the cached status when it disagrees with the derived one.
    ///
    /// Returns `true` when the cache was changed.
    pub fn reconcile_status(&mut self, rules: &ComplianceRules, now: DateTime<Utc>) -> bool {
        let derived = self.effective_status(rules);
        if self.status == Some(derived) {
            return false;
        }
        tracing::debug!(
            "Reconciling status for property {}: {:?} -> {:?}",
            self.id,
            self.status,
            derived
        );
        self.status = Some(derived);
        self.updated_at = now;
        true
    }

    pub fn set_zoning_by_right(&mut self, value: TriState) {
        self.zoning_by_right = value;
        self.status = None;
    }

    pub fn set_fire_sprinklers(&mut self, value: TriState) {
        self.fire_sprinklers = value;
        self.status = None;
    }

    pub fn set_occupancy(&mut self, value: Option<Occupancy>) {
        self.current_occupancy = value;
        self.status = None;
    }

    pub fn set_square_footage(&mut self, value: u32) {
        self.square_footage = value;
        self.status = None;
    }
}

/// Keeps only the properties that can be placed on the map.
pub fn locatable(properties: &[Property]) -> Vec<Property> {
    properties
        .iter()
        .filter(|p| p.is_locatable())
        .cloned()
        .collect()
}

/// Keeps the first occurrence of each id.
///
/// Returns the unique properties in input order and every id that appeared
/// more than once, listed once each.
pub fn split_duplicates(properties: Vec<Property>) -> (Vec<Property>, Vec<String>) {
    let mut seen = std::collections::HashSet::with_capacity(properties.len());
    let mut duplicates: Vec<String> = Vec::new();
    let mut unique = Vec::with_capacity(properties.len());
    for property in properties {
        if seen.insert(property.id.clone()) {
            unique.push(property);
        } else if !duplicates.contains(&property.id) {
            duplicates.push(property.id);
        }
    }
    (unique, duplicates)
}

// ============ Geometry ============

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Planar distance in raw degrees. Not geodesic: longitude deltas are
    /// overstated away from the equator.
    pub fn planar_distance(&self, other: &Coordinate) -> f64 {
        let dlat = self.lat - other.lat;
        let dlng = self.lng - other.lng;
        (dlat * dlat + dlng * dlng).sqrt()
    }

    /// `[lng, lat]`, the order map libraries expect.
    pub fn to_lng_lat(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    /// Smallest box containing every coordinate, `None` for an empty input.
    pub fn from_coordinates<I>(coordinates: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut iter = coordinates.into_iter();
        let first = iter.next()?;
        let init = Bounds {
            west: first.lng,
            south: first.lat,
            east: first.lng,
            north: first.lat,
        };
        Some(iter.fold(init, |b, c| Bounds {
            west: b.west.min(c.lng),
            south: b.south.min(c.lat),
            east: b.east.max(c.lng),
            north: b.north.max(c.lat),
        }))
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        (self.west..=self.east).contains(&c.lng) && (self.south..=self.north).contains(&c.lat)
    }
}

// ============ Clusters ============

/// Nearby properties merged into one map marker.
///
/// Rebuilt from scratch on every input change; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// `cluster-<seed property id>`.
    pub id: String,
    /// Coordinate of the seed property (not a centroid).
    pub coordinate: Coordinate,
    /// Members in processing order; the seed comes first.
    pub members: Vec<Property>,
    pub qualified_count: usize,
    pub total_count: usize,
}

impl Cluster {
    /// A cluster of one renders as an individual marker.
    pub fn is_singleton(&self) -> bool {
        self.total_count == 1
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|p| p.id.as_str())
    }

    /// Mean member position. Informational only; markers stay on the seed.
    pub fn centroid(&self) -> Coordinate {
        let (lat, lng, n) = self
            .members
            .iter()
            .filter_map(Property::coordinate)
            .fold((0.0, 0.0, 0usize), |(lat, lng, n), c| {
                (lat + c.lat, lng + c.lng, n + 1)
            });
        if n == 0 {
            return self.coordinate;
        }
        Coordinate::new(lat / n as f64, lng / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tristate_serializes_as_nullable_bool() {
        let json =
            serde_json::to_string(&[TriState::Yes, TriState::No, TriState::Unknown]).unwrap();
        assert_eq!(json, "[true,false,null]");
    }

    #[test]
    fn test_split_duplicates_keeps_first_copy() {
        let props = vec![
            Property::new("a").with_location(1.0, 1.0),
            Property::new("b"),
            Property::new("a").with_location(2.0, 2.0),
            Property::new("a"),
        ];
        let (unique, duplicates) = split_duplicates(props);

        let ids: Vec<&str> = unique.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(unique[0].latitude, Some(1.0));
        assert_eq!(duplicates, vec!["a".to_string()]);
    }

    #[test]
    fn test_property_deserializes_with_legacy_status_labels() {
        let json = r#"[
            {"id": "a", "status": "synced"},
            {"id": "b", "status": "not_qualified", "current_occupancy": "E"},
            {"id": "c", "current_occupancy": "H"}
        ]"#;
        let props: Vec<Property> = serde_json::from_str(json).unwrap();

        assert_eq!(props[0].status, Some(WorkflowStatus::Qualified));
        assert_eq!(props[1].status, Some(WorkflowStatus::Disqualified));
        assert_eq!(props[1].current_occupancy, Some(Occupancy::Educational));
        assert_eq!(props[2].current_occupancy, Some(Occupancy::Other));
        assert_eq!(props[2].zoning_by_right, TriState::Unknown);
    }

    #[test]
    fn test_coordinate_requires_both_components() {
        let mut p = Property::new("x");
        assert!(!p.is_locatable());

        p.latitude = Some(42.36);
        assert!(!p.is_locatable());

        p.longitude = Some(-71.06);
        assert_eq!(p.coordinate(), Some(Coordinate::new(42.36, -71.06)));

        p.latitude = Some(f64::NAN);
        assert!(!p.is_locatable());
    }

    #[test]
    fn test_bounds_from_coordinates() {
        assert_eq!(Bounds::from_coordinates(Vec::<Coordinate>::new()), None);

        let b = Bounds::from_coordinates(vec![
            Coordinate::new(42.30, -71.10),
            Coordinate::new(42.40, -71.00),
            Coordinate::new(42.35, -71.20),
        ])
        .unwrap();

        assert_eq!(
            b,
            Bounds {
                west: -71.20,
                south: 42.30,
                east: -71.00,
                north: 42.40,
            }
        );
        assert!(b.contains(&Coordinate::new(42.35, -71.05)));
    }

    #[test]
    fn test_compliance_setters_invalidate_cached_status() {
        let mut p = Property::new("x");
        p.status = Some(WorkflowStatus::Qualified);

        p.set_fire_sprinklers(TriState::No);
        assert_eq!(p.status, None);
    }
}
