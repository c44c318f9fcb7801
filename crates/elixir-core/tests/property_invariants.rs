// crates/elixir-core/tests/property_invariants.rs
// ============================================================================
// Property tests for spec.md §8's domain invariants: stable criterion ids
// (invariant 7), batch dedup keys (invariant 2), and batch review status
// aggregation.
// ============================================================================

use elixir_core::compute_batch_review_status;
use elixir_core::domain::criterion::stable_criterion_id;
use elixir_core::find_duplicate_keys;
use elixir_core::normalize_text;
use elixir_core::Assertion;
use elixir_core::BatchReviewStatus;
use elixir_core::CriteriaBatchId;
use elixir_core::Criterion;
use elixir_core::CriterionReviewStatus;
use elixir_core::CriterionType;
use proptest::prelude::*;

fn arb_criterion_type() -> impl Strategy<Value = CriterionType> {
    prop_oneof![Just(CriterionType::Inclusion), Just(CriterionType::Exclusion)]
}

fn arb_review_status() -> impl Strategy<Value = CriterionReviewStatus> {
    prop_oneof![
        Just(CriterionReviewStatus::Unreviewed),
        Just(CriterionReviewStatus::Approved),
        Just(CriterionReviewStatus::Rejected),
        Just(CriterionReviewStatus::Modified),
    ]
}

proptest! {
    /// stable_criterion_id is a pure function of (batch, normalized text, type):
    /// re-deriving it from the same inputs always yields the same id.
    #[test]
    fn stable_criterion_id_is_deterministic(text in ".{1,80}", kind in arb_criterion_type()) {
        let batch_id = CriteriaBatchId::new();
        let first = stable_criterion_id(batch_id, &text, kind);
        let second = stable_criterion_id(batch_id, &text, kind);
        prop_assert_eq!(first, second);
    }

    /// Whitespace and casing differences normalize away: re-running parse on
    /// re-flowed extraction text must not mint a new criterion id.
    #[test]
    fn stable_criterion_id_ignores_whitespace_and_case(text in "[A-Za-z ]{1,40}", kind in arb_criterion_type()) {
        let batch_id = CriteriaBatchId::new();
        let padded = format!("  {}  ", text.to_uppercase());
        prop_assert_eq!(stable_criterion_id(batch_id, &text, kind), stable_criterion_id(batch_id, &padded, kind));
    }

    /// A different owning batch must never collide onto the same id for
    /// otherwise-identical text and type.
    #[test]
    fn stable_criterion_id_is_scoped_to_its_batch(text in ".{1,80}", kind in arb_criterion_type()) {
        let first_batch = CriteriaBatchId::new();
        let second_batch = CriteriaBatchId::new();
        prop_assume!(first_batch != second_batch);
        prop_assert_ne!(stable_criterion_id(first_batch, &text, kind), stable_criterion_id(second_batch, &text, kind));
    }

    /// normalize_text is idempotent: normalizing an already-normalized string
    /// is a no-op.
    #[test]
    fn normalize_text_is_idempotent(text in ".{0,120}") {
        let once = normalize_text(&text);
        let twice = normalize_text(&once);
        prop_assert_eq!(once, twice);
    }

    /// Two criteria in the same batch with identical (normalized text, type)
    /// are flagged as a duplicate pair exactly once, regardless of whitespace
    /// or case differences between the two copies.
    #[test]
    fn duplicate_text_and_type_is_always_flagged(text in "[A-Za-z ]{1,40}", kind in arb_criterion_type()) {
        let batch_id = CriteriaBatchId::new();
        let first = Criterion::new(batch_id, kind, text.clone(), Assertion::Affirmed, None, 0.9, Some(1));
        let second = Criterion::new(batch_id, kind, format!("  {}  ", text.to_uppercase()), Assertion::Affirmed, None, 0.9, Some(1));
        let duplicates = find_duplicate_keys(&[first, second]);
        prop_assert_eq!(duplicates.len(), 1);
    }

    /// The same text under opposite criterion types is never a duplicate:
    /// inclusion and exclusion share no dedup key space.
    #[test]
    fn same_text_opposite_type_never_duplicates(text in "[A-Za-z ]{1,40}") {
        let batch_id = CriteriaBatchId::new();
        let inclusion = Criterion::new(batch_id, CriterionType::Inclusion, text.clone(), Assertion::Affirmed, None, 0.9, Some(1));
        let exclusion = Criterion::new(batch_id, CriterionType::Exclusion, text, Assertion::Affirmed, None, 0.9, Some(1));
        let duplicates = find_duplicate_keys(&[inclusion, exclusion]);
        prop_assert!(duplicates.is_empty());
    }

    /// An empty criterion list is always pending_review, never any other
    /// status: a batch's aggregate status can't outrun what it contains.
    #[test]
    fn empty_batch_is_always_pending_review(_unit in Just(())) {
        prop_assert_eq!(compute_batch_review_status(&[]), BatchReviewStatus::PendingReview);
    }

    /// If every criterion is approved, the batch aggregates to approved.
    #[test]
    fn all_approved_aggregates_to_approved(count in 1usize..20) {
        let statuses = vec![CriterionReviewStatus::Approved; count];
        prop_assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::Approved);
    }

    /// Any rejection among fully-reviewed criteria forces the batch to
    /// rejected, regardless of how many siblings were approved.
    #[test]
    fn any_rejection_among_reviewed_forces_rejected(approved_count in 0usize..10) {
        let mut statuses = vec![CriterionReviewStatus::Approved; approved_count];
        statuses.push(CriterionReviewStatus::Rejected);
        prop_assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::Rejected);
    }

    /// A batch where at least one but not all criteria have been reviewed is
    /// always in_progress, whatever mix of statuses produced that split.
    #[test]
    fn partial_review_is_always_in_progress(
        reviewed in prop::collection::vec(arb_review_status().prop_filter("reviewed", |s| s.is_reviewed()), 1..6),
        unreviewed_count in 1usize..6,
    ) {
        let mut statuses = reviewed;
        statuses.extend(std::iter::repeat(CriterionReviewStatus::Unreviewed).take(unreviewed_count));
        prop_assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::InProgress);
    }
}
