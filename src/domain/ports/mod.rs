//! Ports (trait interfaces) between the engine and its collaborators.

pub mod action_adapter;
pub mod conflict_log;
pub mod cooldown_tracker;
pub mod playbook_repository;
pub mod run_repository;
pub mod segment_matcher;

pub use action_adapter::{ActionAdapter, AdapterError, AdapterResponse};
pub use conflict_log::ConflictLogRepository;
pub use cooldown_tracker::{ClaimDecision, CooldownTracker};
pub use playbook_repository::{PlaybookFilter, PlaybookRepository};
pub use run_repository::{RunFilter, RunRepository};
pub use segment_matcher::{SegmentMatcher, StaticSegmentMatcher};
