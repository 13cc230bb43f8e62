//! Validation properties over generated candidates.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use correlate_core::config::ValidationConfig;
use correlate_core::{CorrelationIdValidator, storage};
use correlate_testing::properties::{invalid_id, valid_id};
use correlate_testing::{headers, test_context};
use proptest::prelude::*;

fn default_validator() -> CorrelationIdValidator {
    CorrelationIdValidator::from_config(&ValidationConfig::default()).unwrap()
}

proptest! {
    #[test]
    fn valid_ids_are_accepted(id in valid_id()) {
        prop_assert!(default_validator().is_valid(Some(&id)));
    }

    #[test]
    fn invalid_ids_are_rejected(id in invalid_id()) {
        prop_assert!(!default_validator().is_valid(Some(&id)));
    }

    #[test]
    fn valid_header_is_echoed(id in valid_id()) {
        let context = test_context("generated");
        let edge = context.http();

        let bound = storage::sync_scope(|| {
            edge.on_request(&headers(&[("X-Correlation-ID", id.as_str())]))
                .map(|binding| binding.id)
        });

        prop_assert_eq!(bound, Some(id));
    }

    #[test]
    fn invalid_header_never_leaks(id in invalid_id()) {
        let context = test_context("generated");
        let edge = context.http();
        let value = id.replace('\n', "x");
        prop_assume!(!default_validator().is_valid(Some(value.trim())));

        let bound = storage::sync_scope(|| {
            edge.on_request(&headers(&[("X-Correlation-ID", value.as_str())]))
                .map(|binding| binding.id)
        });

        prop_assert_eq!(bound.as_deref(), Some("generated"));
    }
}
