//! Domain models for the Reclaim playbook engine.

pub mod config;
pub mod conflict;
pub mod cooldown;
pub mod evaluation;
pub mod playbook;
pub mod predicate;
pub mod queue;
pub mod run;
pub mod signal;

pub use config::{DatabaseConfig, EngineConfig, ExecutionConfig, LoggingConfig, QueueConfig};
pub use conflict::ConflictLogEntry;
pub use cooldown::CooldownRecord;
pub use evaluation::{MissingCondition, SuppressionReason, TriggerEvaluation};
pub use playbook::{ActionType, ExecutionMode, Playbook, PlaybookAction, PlaybookStatus};
pub use predicate::{CompareOp, ConditionNode};
pub use queue::{
    BulkActionFailure, BulkActionOutcome, FailedSummary, PendingSummary, QueueAction, QueueView,
    RecentlyActedSummary, WorkQueueItem,
};
pub use run::{
    ActionStatus, DecisionSummary, EvidenceField, PlaybookRun, RunAction, RunStatus,
};
pub use signal::{CustomerSnapshot, Signal};
