// crates/elixir-review/src/metrics.rs
// ============================================================================
// Module: Agreement Metrics
// Description: Per-batch review/grounding agreement metrics, a pure
//              aggregation over persisted rows.
// Dependencies: elixir_core
// ============================================================================

use std::collections::BTreeMap;

use elixir_core::AuditEventType;
use elixir_core::AuditLog;
use elixir_core::Criterion;
use elixir_core::CriterionReviewStatus;
use elixir_core::Entity;
use elixir_core::ReviewTargetType;
use elixir_core::SchemaVersion;

/// Per-batch review and grounding agreement metrics, exposed through
/// `GET /reviews/batches/{id}/metrics`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchMetrics {
    /// Number of criteria in the batch.
    pub criteria_count: usize,
    /// Criteria with any reviewer action applied.
    pub reviewed_count: usize,
    /// Criteria approved as extracted.
    pub approved_count: usize,
    /// Criteria rejected.
    pub rejected_count: usize,
    /// Criteria edited by a reviewer.
    pub modified_count: usize,
    /// Mean extraction confidence across all criteria, `0.0` if empty.
    pub mean_confidence: f64,
    /// Mean grounding confidence across all entities, `0.0` if empty.
    pub mean_grounding_confidence: f64,
    /// Count of review-originated audit entries per schema version.
    pub schema_version_breakdown: BTreeMap<SchemaVersion, usize>,
}

/// Computes [`BatchMetrics`] for one batch's criteria, entities, and audit
/// log (spec.md §2 "Metrics" sub-component; §6 `/reviews/batches/{id}/metrics`).
#[must_use]
pub fn batch_metrics(criteria: &[Criterion], entities: &[Entity], audit_logs: &[AuditLog]) -> BatchMetrics {
    let criteria_count = criteria.len();
    let reviewed_count = criteria.iter().filter(|criterion| criterion.review_status.is_reviewed()).count();
    let approved_count = count_status(criteria, CriterionReviewStatus::Approved);
    let rejected_count = count_status(criteria, CriterionReviewStatus::Rejected);
    let modified_count = count_status(criteria, CriterionReviewStatus::Modified);

    let mean_confidence = mean(criteria.iter().map(|criterion| criterion.confidence));
    let mean_grounding_confidence = mean(entities.iter().map(|entity| entity.grounding_confidence));

    let mut schema_version_breakdown = BTreeMap::new();
    for log in audit_logs {
        if log.event_type != AuditEventType::ReviewApplied || log.target_type != ReviewTargetType::Criteria {
            continue;
        }
        if let Some(schema_version) = log.details.schema_version {
            *schema_version_breakdown.entry(schema_version).or_insert(0) += 1;
        }
    }

    BatchMetrics {
        criteria_count,
        reviewed_count,
        approved_count,
        rejected_count,
        modified_count,
        mean_confidence,
        mean_grounding_confidence,
        schema_version_breakdown,
    }
}

fn count_status(criteria: &[Criterion], status: CriterionReviewStatus) -> usize {
    criteria.iter().filter(|criterion| criterion.review_status == status).count()
}

fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss, reason = "criteria/entity counts per batch stay far below f64's exact-integer range")]
    let count_f64 = count as f64;
    values.sum::<f64>() / count_f64
}

#[cfg(test)]
mod tests {
    use elixir_core::Assertion;
    use elixir_core::CriteriaBatchId;
    use elixir_core::CriterionId;
    use elixir_core::CriterionType;
    use elixir_core::EntityType;

    use super::*;

    fn criterion_with_status(status: CriterionReviewStatus) -> Criterion {
        let mut criterion = Criterion::new(CriteriaBatchId::new(), CriterionType::Inclusion, "Age >= 18", Assertion::Affirmed, None, 0.8, Some(1));
        criterion.review_status = status;
        criterion
    }

    #[test]
    fn batch_metrics_counts_each_review_status() {
        let criteria = vec![
            criterion_with_status(CriterionReviewStatus::Approved),
            criterion_with_status(CriterionReviewStatus::Rejected),
            criterion_with_status(CriterionReviewStatus::Modified),
            criterion_with_status(CriterionReviewStatus::Unreviewed),
        ];
        let metrics = batch_metrics(&criteria, &[], &[]);
        assert_eq!(metrics.criteria_count, 4);
        assert_eq!(metrics.reviewed_count, 3);
        assert_eq!(metrics.approved_count, 1);
        assert_eq!(metrics.rejected_count, 1);
        assert_eq!(metrics.modified_count, 1);
    }

    #[test]
    fn batch_metrics_means_are_zero_for_empty_inputs() {
        let metrics = batch_metrics(&[], &[], &[]);
        assert_eq!(metrics.mean_confidence, 0.0);
        assert_eq!(metrics.mean_grounding_confidence, 0.0);
    }

    #[test]
    fn batch_metrics_mean_grounding_confidence_averages_entities() {
        let mut first = Entity::new(CriterionId::new(), "diabetes", EntityType::Condition, 0, 8);
        first.grounding_confidence = 0.8;
        let mut second = Entity::new(CriterionId::new(), "hypertension", EntityType::Condition, 0, 12);
        second.grounding_confidence = 0.4;
        let metrics = batch_metrics(&[], &[first, second], &[]);
        assert!((metrics.mean_grounding_confidence - 0.6).abs() < 1e-9);
    }
}
