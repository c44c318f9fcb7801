// crates/elixir-review/tests/property_batch_compare.rs
// ============================================================================
// Property tests for compare_batches' fuzzy-match classification (spec.md
// §4.8) and re-extraction review inheritance (spec.md §8 invariant 9).
// ============================================================================

use elixir_core::Assertion;
use elixir_core::CriteriaBatchId;
use elixir_core::Criterion;
use elixir_core::CriterionType;
use elixir_review::compare_batches;
use elixir_review::DiffKind;
use proptest::prelude::*;

fn arb_criterion_type() -> impl Strategy<Value = CriterionType> {
    prop_oneof![Just(CriterionType::Inclusion), Just(CriterionType::Exclusion)]
}

fn criterion(batch_id: CriteriaBatchId, text: &str, kind: CriterionType) -> Criterion {
    Criterion::new(batch_id, kind, text, Assertion::Affirmed, None, 0.9, Some(1))
}

proptest! {
    /// Identical text on both sides always matches as unchanged: a token-set
    /// ratio of a string against itself is always the maximum score.
    #[test]
    fn identical_text_is_always_unchanged(text in "[A-Za-z ]{1,60}", kind in arb_criterion_type()) {
        let old_batch = CriteriaBatchId::new();
        let new_batch = CriteriaBatchId::new();
        let old_criterion = criterion(old_batch, &text, kind);
        let new_criterion = criterion(new_batch, &text, kind);

        let entries = compare_batches(std::slice::from_ref(&old_criterion), std::slice::from_ref(&new_criterion));
        prop_assert_eq!(entries.len(), 1);
        prop_assert_eq!(entries[0].kind, DiffKind::Unchanged);
        prop_assert_eq!(entries[0].old_criterion_id, Some(old_criterion.id));
        prop_assert_eq!(entries[0].new_criterion_id, Some(new_criterion.id));
    }

    /// An old-side criterion with no candidate of the same type on the new
    /// side is always removed, never matched across a type boundary.
    #[test]
    fn old_criterion_with_no_same_type_candidate_is_removed(text in "[A-Za-z ]{1,60}") {
        let old_batch = CriteriaBatchId::new();
        let new_batch = CriteriaBatchId::new();
        let old_criterion = criterion(old_batch, &text, CriterionType::Inclusion);
        let new_criterion = criterion(new_batch, &text, CriterionType::Exclusion);

        let entries = compare_batches(std::slice::from_ref(&old_criterion), std::slice::from_ref(&new_criterion));
        let removed = entries.iter().find(|entry| entry.old_criterion_id == Some(old_criterion.id)).expect("old criterion entry present");
        prop_assert_eq!(removed.kind, DiffKind::Removed);
        prop_assert!(removed.new_criterion_id.is_none());

        let added = entries.iter().find(|entry| entry.new_criterion_id == Some(new_criterion.id)).expect("new criterion entry present");
        prop_assert_eq!(added.kind, DiffKind::Added);
        prop_assert!(added.old_criterion_id.is_none());
    }

    /// Every old criterion produces exactly one entry and every new
    /// criterion not matched by an old one produces exactly one entry: no
    /// criterion on either side is silently dropped or duplicated.
    #[test]
    fn every_criterion_on_either_side_appears_exactly_once(
        old_texts in prop::collection::vec("[A-Za-z]{4,20}", 1..5),
        new_text in "[A-Za-z]{4,20}",
    ) {
        let old_batch = CriteriaBatchId::new();
        let new_batch = CriteriaBatchId::new();
        let old_criteria: Vec<Criterion> = old_texts.iter().map(|text| criterion(old_batch, text, CriterionType::Inclusion)).collect();
        let new_criterion = criterion(new_batch, &new_text, CriterionType::Inclusion);
        let new_criteria = vec![new_criterion.clone()];

        let entries = compare_batches(&old_criteria, &new_criteria);

        for old in &old_criteria {
            prop_assert_eq!(entries.iter().filter(|entry| entry.old_criterion_id == Some(old.id)).count(), 1);
        }
        let unmatched_new_entries = entries.iter().filter(|entry| entry.new_criterion_id == Some(new_criterion.id)).count();
        prop_assert!(unmatched_new_entries <= 1);
    }
}
