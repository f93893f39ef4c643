//! Signal intake pipeline.
//!
//! One pass per incoming signal: fan evaluation out across every active
//! playbook for the signal type, arbitrate the qualifying candidates down
//! to a single winner, materialize its run, and auto-dispatch execution
//! when the playbook asks for it.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, instrument};

use crate::domain::errors::EngineResult;
use crate::domain::models::{CustomerSnapshot, ExecutionMode, PlaybookRun, Signal, TriggerEvaluation};
use crate::domain::ports::PlaybookRepository;
use crate::services::action_executor::ActionExecutor;
use crate::services::conflict_resolver::{Candidate, ConflictResolver};
use crate::services::run_lifecycle::RunLifecycleService;
use crate::services::trigger_evaluator::TriggerEvaluator;

/// Everything one signal pass produced, for diagnostics and tests.
#[derive(Debug)]
pub struct SignalOutcome {
    /// Every evaluation that participated, triggering or not.
    pub evaluations: Vec<TriggerEvaluation>,
    /// The run created for the arbitration winner, if any.
    pub created_run: Option<PlaybookRun>,
}

pub struct SignalProcessor {
    playbooks: Arc<dyn PlaybookRepository>,
    evaluator: Arc<TriggerEvaluator>,
    resolver: Arc<ConflictResolver>,
    lifecycle: Arc<RunLifecycleService>,
    executor: Arc<ActionExecutor>,
}

impl SignalProcessor {
    pub fn new(
        playbooks: Arc<dyn PlaybookRepository>,
        evaluator: Arc<TriggerEvaluator>,
        resolver: Arc<ConflictResolver>,
        lifecycle: Arc<RunLifecycleService>,
        executor: Arc<ActionExecutor>,
    ) -> Self {
        Self { playbooks, evaluator, resolver, lifecycle, executor }
    }

    /// Process one signal end to end.
    ///
    /// A playbook whose evaluation errors is skipped; one bad predicate
    /// must not block the rest of the pass.
    #[instrument(skip_all, fields(customer = %signal.customer_id, signal_type = %signal.signal_type))]
    pub async fn process(
        &self,
        signal: &Signal,
        customer: &CustomerSnapshot,
    ) -> EngineResult<SignalOutcome> {
        let playbooks = self
            .playbooks
            .list_active_for_trigger(&signal.signal_type)
            .await?;
        info!(candidates = playbooks.len(), "evaluating signal");

        let evaluations = join_all(
            playbooks
                .iter()
                .map(|p| self.evaluator.evaluate(p, customer, signal)),
        )
        .await;

        let mut all_evaluations = Vec::new();
        let mut candidates = Vec::new();
        for (playbook, result) in playbooks.into_iter().zip(evaluations) {
            match result {
                Ok(Some(evaluation)) => {
                    if evaluation.would_trigger {
                        candidates.push(Candidate {
                            playbook,
                            evaluation: evaluation.clone(),
                        });
                    }
                    all_evaluations.push(evaluation);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(playbook = %playbook.name, error = %e, "evaluation failed, skipping playbook");
                }
            }
        }

        let resolution = self
            .resolver
            .resolve(&signal.customer_id, candidates, Utc::now())
            .await?;

        let created_run = match resolution.winner {
            Some(winner) => {
                let run = self
                    .lifecycle
                    .create_from_evaluation(&winner.playbook, &winner.evaluation, signal)
                    .await?;
                info!(run_id = %run.id, playbook = %winner.playbook.name, "run created");
                if winner.playbook.execution_mode == ExecutionMode::AutoExecute {
                    self.executor.execute(run.id).await?;
                    // Re-read so the outcome reflects the executed state.
                    Some(self.lifecycle.get(run.id).await?)
                } else {
                    Some(run)
                }
            }
            None => None,
        };

        Ok(SignalOutcome { evaluations: all_evaluations, created_run })
    }
}
