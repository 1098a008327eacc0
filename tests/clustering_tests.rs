/// Integration tests for the greedy clustering pass
/// Pins partition, determinism, order sensitivity and singleton behavior
use site_qualify_api::clustering::ClusterBuilder;
use site_qualify_api::models::{locatable, Cluster, Property};
use std::collections::HashSet;

fn at(id: &str, lat: f64, lng: f64) -> Property {
    Property::new(id).with_location(lat, lng)
}

fn membership(clusters: &[Cluster]) -> Vec<Vec<String>> {
    clusters
        .iter()
        .map(|c| {
            let mut ids: Vec<String> = c.member_ids().map(String::from).collect();
            ids.sort();
            ids
        })
        .collect()
}

#[cfg(test)]
mod partition_tests {
    use super::*;

    #[test]
    fn test_every_property_lands_in_exactly_one_cluster() {
        let props = vec![
            at("a", 42.3600, -71.0600),
            at("b", 42.3620, -71.0610),
            at("c", 42.3700, -71.0700),
            at("d", 42.3605, -71.0590),
            at("e", 41.0000, -70.0000),
        ];
        let clusters = ClusterBuilder::default().build(&props).unwrap();

        let mut seen = HashSet::new();
        for id in clusters.iter().flat_map(|c| c.member_ids()) {
            assert!(seen.insert(id.to_string()), "{} appears twice", id);
        }
        let expected: HashSet<String> = props.iter().map(|p| p.id.clone()).collect();
        assert_eq!(seen, expected);
        assert!(clusters.iter().all(|c| c.total_count == c.members.len()));
    }

    #[test]
    fn test_caller_filters_unlocatable_first() {
        let mut half = Property::new("half");
        half.latitude = Some(42.0);
        let props = vec![at("a", 42.36, -71.06), half, Property::new("none")];

        let located = locatable(&props);
        assert_eq!(located.len(), 1);

        let clusters = ClusterBuilder::default().build(&located).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members[0].id, "a");
    }
}

#[cfg(test)]
mod ordering_tests {
    use super::*;

    #[test]
    fn test_same_order_same_clusters() {
        let props = vec![
            at("a", 42.3600, -71.0600),
            at("b", 42.3650, -71.0600),
            at("c", 42.3720, -71.0600),
            at("d", 42.3790, -71.0600),
        ];
        let builder = ClusterBuilder::default();

        assert_eq!(builder.build(&props).unwrap(), builder.build(&props).unwrap());
    }

    #[test]
    fn test_reversing_input_can_change_boundaries() {
        // b sits within range of both a and c, but a and c are out of range of each other
        let props = vec![
            at("a", 0.0, 0.000),
            at("b", 0.0, 0.008),
            at("c", 0.0, 0.016),
        ];
        let builder = ClusterBuilder::default();

        let forward = membership(&builder.build(&props).unwrap());
        assert_eq!(forward, vec![vec!["a", "b"], vec!["c"]]);

        let mut reversed = props.clone();
        reversed.reverse();
        let backward = membership(&builder.build(&reversed).unwrap());
        assert_eq!(backward, vec![vec!["b", "c"], vec!["a"]]);

        assert_ne!(forward, backward);
    }

    #[test]
    fn test_no_transitive_merging() {
        // A chain with 0.006 spacing: each link is in range, the chain is not
        let props: Vec<Property> = (0..5)
            .map(|i| at(&format!("p{}", i), 0.0, i as f64 * 0.006))
            .collect();
        let clusters = ClusterBuilder::default().build(&props).unwrap();

        assert_eq!(
            membership(&clusters),
            vec![vec!["p0", "p1"], vec!["p2", "p3"], vec!["p4"]]
        );
    }
}

#[cfg(test)]
mod singleton_tests {
    use super::*;

    #[test]
    fn test_isolated_property_forms_singleton() {
        let props = vec![
            at("a", 42.3600, -71.0600),
            at("b", 42.3610, -71.0605),
            at("lonely", 42.4500, -71.2000),
        ];
        let clusters = ClusterBuilder::default().build(&props).unwrap();

        let lonely = clusters
            .iter()
            .find(|c| c.member_ids().any(|id| id == "lonely"))
            .unwrap();
        assert!(lonely.is_singleton());
        assert_eq!(lonely.total_count, 1);
        assert_eq!(lonely.id, "cluster-lonely");
    }

    #[test]
    fn test_smaller_threshold_splits_everything() {
        let props = vec![at("a", 42.3600, -71.0600), at("b", 42.3610, -71.0605)];
        let clusters = ClusterBuilder::new(0.0001).unwrap().build(&props).unwrap();
        assert!(clusters.iter().all(Cluster::is_singleton));
    }
}
