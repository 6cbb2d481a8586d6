//! Property tests for canonical id normalization.

use std::collections::HashSet;

use habit_tracker_core::{IdNormalizer, IdSource};
use proptest::prelude::*;
use serde_json::{Value, json};

proptest! {
    #[test]
    fn numeric_strings_normalize_to_themselves(id in 0_i64..=i64::MAX) {
        let ids = IdNormalizer::new();
        prop_assert_eq!(ids.normalize(Some(&Value::String(id.to_string()))), id);
        prop_assert_eq!(ids.normalize(Some(&json!(id))), id);
    }

    #[test]
    fn non_numeric_text_never_collides_within_a_second(
        raws in prop::collection::vec("[a-zA-Z_-]{1,12}", 1..40),
    ) {
        let ids = IdNormalizer::with_clock(|| 1_700_000_000_i64);
        let mut seen = HashSet::new();
        for raw in &raws {
            let (id, source) = ids.normalize_with_source(Some(&Value::String(raw.clone())));
            prop_assert_eq!(source, IdSource::Replaced);
            prop_assert!(id >= 1_700_000_000);
            prop_assert!(seen.insert(id), "duplicate fresh id {}", id);
        }
        let absent = ids.normalize(None);
        prop_assert!(seen.insert(absent));
    }

    #[test]
    fn normalized_ids_are_never_negative(raw in any::<i64>()) {
        let ids = IdNormalizer::with_clock(|| 10_i64);
        prop_assert!(ids.normalize(Some(&json!(raw))) >= 0);
        prop_assert!(ids.normalize(Some(&Value::String(raw.to_string()))) >= 0);
    }
}
