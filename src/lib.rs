//! Reclaim - Customer Retention Playbook Engine
//!
//! Reclaim turns churn-risk signals into tracked retention work: playbooks
//! declare trigger predicates over incoming signals, a conflict resolver
//! arbitrates competing playbooks down to one run per customer, and a work
//! queue carries each run through approval, execution, and retry.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business logic and domain models
//! - **Service Layer** (`services`): Evaluation, arbitration, lifecycle, and queue logic
//! - **Adapters Layer** (`adapters`): SQLite persistence and outbound action delivery
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//!
//! # Example
//!
//! ```ignore
//! use reclaim::adapters::sqlite::initialize_default_database;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = initialize_default_database().await?;
//!     // Wire repositories and services, then feed signals.
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    ActionStatus, ActionType, ConditionNode, CustomerSnapshot, DecisionSummary, EngineConfig,
    ExecutionMode, Playbook, PlaybookRun, PlaybookStatus, QueueAction, RunStatus, Signal,
    SuppressionReason, TriggerEvaluation,
};
pub use domain::ports::{
    ActionAdapter, ClaimDecision, ConflictLogRepository, CooldownTracker, PlaybookFilter,
    PlaybookRepository, RunFilter, RunRepository, SegmentMatcher,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ActionExecutor, ConflictResolver, PlaybookService, RunLifecycleService, SignalProcessor,
    SnoozeScheduler, TriggerEvaluator, WorkQueueService,
};
