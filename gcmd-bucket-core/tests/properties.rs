//! Property tests for the missing-set computation and the index renderer.

use std::collections::BTreeSet;

use gcmd_bucket_core::index::render_index;
use gcmd_bucket_core::synchronise::missing_packages;
use proptest::prelude::*;

fn package_id() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9][a-z0-9_-]{0,11}").unwrap()
}

fn catalog_ids() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(package_id(), 0..32)
}

fn bucket_ids() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set(package_id(), 0..32)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    /// Every missing identifier comes from the catalog.
    #[test]
    fn property_missing_is_subset_of_catalog(catalog in catalog_ids(), bucket in bucket_ids()) {
        let missing = missing_packages(&catalog, &bucket);
        let catalog_set: BTreeSet<String> = catalog.iter().cloned().collect();
        prop_assert!(missing.is_subset(&catalog_set));
    }

    /// Nothing already in the bucket is reported missing.
    #[test]
    fn property_missing_is_disjoint_from_bucket(catalog in catalog_ids(), bucket in bucket_ids()) {
        let missing = missing_packages(&catalog, &bucket);
        prop_assert!(missing.is_disjoint(&bucket));
    }

    /// The missing set is exactly the catalog minus the bucket.
    #[test]
    fn property_missing_is_set_difference(catalog in catalog_ids(), bucket in bucket_ids()) {
        let missing = missing_packages(&catalog, &bucket);
        let catalog_set: BTreeSet<String> = catalog.iter().cloned().collect();
        let expected: BTreeSet<String> = catalog_set.difference(&bucket).cloned().collect();
        prop_assert_eq!(missing, expected);
    }

    /// Uploading the missing set leaves nothing missing on the next run.
    #[test]
    fn property_second_diff_is_empty(catalog in catalog_ids(), bucket in bucket_ids()) {
        let missing = missing_packages(&catalog, &bucket);
        let after: BTreeSet<String> = bucket.union(&missing).cloned().collect();
        prop_assert!(missing_packages(&catalog, &after).is_empty());
    }

    /// Rendering is byte-identical across calls, with one list entry per identifier.
    #[test]
    fn property_index_is_deterministic(
        title in "[ -~]{0,24}",
        catalog in catalog_ids(),
    ) {
        let first = render_index(&title, "https://nasa.s3.example.org", &catalog);
        let second = render_index(&title, "https://nasa.s3.example.org", &catalog);
        prop_assert_eq!(first.as_bytes(), second.as_bytes());
        prop_assert_eq!(first.matches("<li>").count(), catalog.len());
        for id in &catalog {
            let link = format!("https://nasa.s3.example.org/{id}.xml");
            prop_assert!(first.contains(&link));
        }
    }
}
