//! Service layer: the engine's decision and lifecycle logic, written
//! against the domain ports and wired to adapters at composition time.

pub mod action_executor;
pub mod conflict_resolver;
pub mod optimistic;
pub mod playbook_service;
pub mod predicate_evaluator;
pub mod run_lifecycle;
pub mod signal_processor;
pub mod snooze_scheduler;
pub mod trigger_evaluator;
pub mod work_queue;

pub use action_executor::{ActionExecutor, RunOutcome};
pub use conflict_resolver::{Candidate, ConflictResolver, Resolution};
pub use optimistic::apply_optimistic;
pub use playbook_service::PlaybookService;
pub use predicate_evaluator::EvaluationContext;
pub use run_lifecycle::RunLifecycleService;
pub use signal_processor::{SignalOutcome, SignalProcessor};
pub use snooze_scheduler::SnoozeScheduler;
pub use trigger_evaluator::TriggerEvaluator;
pub use work_queue::WorkQueueService;
