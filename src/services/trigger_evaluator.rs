//! Trigger evaluation for one playbook against one signal.
//!
//! Orchestrates the condition, confidence, segment, and suppression checks
//! in cheapest-first order with short-circuit, producing a structured
//! evaluation whose decision summary is populated even on failure so the
//! "why didn't this trigger" view always has something to show.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::domain::errors::EngineResult;
use crate::domain::models::evaluation::{MissingCondition, SuppressionReason, TriggerEvaluation};
use crate::domain::models::run::{DecisionSummary, EvidenceField};
use crate::domain::models::{CustomerSnapshot, Playbook, Signal};
use crate::domain::ports::{ClaimDecision, CooldownTracker, SegmentMatcher};
use crate::services::predicate_evaluator::{self, EvaluationContext};

pub struct TriggerEvaluator {
    segment_matcher: Arc<dyn SegmentMatcher>,
    cooldown_tracker: Arc<dyn CooldownTracker>,
}

impl TriggerEvaluator {
    pub fn new(
        segment_matcher: Arc<dyn SegmentMatcher>,
        cooldown_tracker: Arc<dyn CooldownTracker>,
    ) -> Self {
        Self { segment_matcher, cooldown_tracker }
    }

    /// Evaluate one playbook against one signal.
    ///
    /// Returns `None` when the playbook simply does not participate:
    /// not Active, or interested in a different signal type. That is
    /// non-participation, not suppression.
    pub async fn evaluate(
        &self,
        playbook: &Playbook,
        customer: &CustomerSnapshot,
        signal: &Signal,
    ) -> EngineResult<Option<TriggerEvaluation>> {
        if !playbook.is_evaluable() || playbook.trigger_type != signal.signal_type {
            return Ok(None);
        }

        let mut missing_conditions = Vec::new();
        let mut suppression = None;
        let ctx = EvaluationContext::new(signal, customer);

        // 1. Predicate.
        let conditions_met = predicate_evaluator::evaluate(&playbook.trigger_conditions, &ctx);
        if !conditions_met {
            for clause in predicate_evaluator::unmet_clauses(&playbook.trigger_conditions, &ctx) {
                missing_conditions.push(MissingCondition::Condition { clause });
            }
        }

        // 2. Confidence threshold.
        let confident = conditions_met && signal.confidence >= playbook.min_confidence;
        if conditions_met && !confident {
            missing_conditions.push(MissingCondition::Confidence {
                actual: signal.confidence,
                required: playbook.min_confidence,
            });
        }

        // 3. Segment membership (vacuously true when untargeted).
        let mut in_segment = confident;
        if confident && !playbook.target_segments.is_empty() {
            let memberships = self.segment_matcher.segments_for(&customer.customer_id).await?;
            let matched: Vec<String> = playbook
                .target_segments
                .iter()
                .filter(|s| memberships.contains(*s))
                .cloned()
                .collect();
            if matched.is_empty() {
                in_segment = false;
                missing_conditions.push(MissingCondition::Segment {
                    matched,
                    missing: playbook.target_segments.clone(),
                });
            }
        }

        // 4. Suppression: cooldown window and concurrency limit.
        let mut would_trigger = in_segment;
        if in_segment {
            match self
                .cooldown_tracker
                .check(&customer.customer_id, playbook, Utc::now())
                .await?
            {
                ClaimDecision::Claimed => {}
                ClaimDecision::OnCooldown { ends_at } => {
                    would_trigger = false;
                    suppression = Some(SuppressionReason::Cooldown { ends_at });
                }
                ClaimDecision::ConcurrencyLimited { active, max } => {
                    would_trigger = false;
                    suppression = Some(SuppressionReason::ConcurrencyLimit { active, max });
                }
            }
        }

        debug!(
            playbook = %playbook.name,
            customer = %customer.customer_id,
            would_trigger,
            "evaluated playbook"
        );

        Ok(Some(TriggerEvaluation {
            playbook_id: playbook.id,
            playbook_name: playbook.name.clone(),
            customer_id: customer.customer_id.clone(),
            would_trigger,
            missing_conditions,
            suppression,
            decision_summary: build_summary(playbook, customer, signal),
            evaluated_at: Utc::now(),
        }))
    }
}

/// Assemble the decision summary: specific trigger, evidence fields, and
/// confidence. Built for every evaluation, passing or not.
fn build_summary(playbook: &Playbook, customer: &CustomerSnapshot, signal: &Signal) -> DecisionSummary {
    let evidence = signal
        .attributes
        .iter()
        .map(|(field, value)| EvidenceField { field: field.clone(), value: value.clone() })
        .collect();
    let recommended_actions = playbook
        .ordered_actions()
        .into_iter()
        .map(|a| a.action_type.as_str().to_string())
        .collect();
    DecisionSummary {
        trigger: signal.signal_type.clone(),
        why_now: format!(
            "{} signal for {} at {}",
            signal.signal_type,
            customer.name,
            signal.occurred_at.to_rfc3339()
        ),
        why_this_playbook: format!(
            "{} targets {} signals ({})",
            playbook.name,
            playbook.trigger_type,
            playbook.trigger_conditions.describe()
        ),
        confidence: signal.confidence,
        evidence,
        recommended_actions,
        evaluated_at: Some(Utc::now()),
    }
}
