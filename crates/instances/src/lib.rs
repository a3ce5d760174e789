//! Instance enable/disable workflow for lmctl
//!
//! - [`resolver`] - Match module names and device-scoped ids against applied modules
//! - [`mutator`] - List a module's instances and patch each one, best effort
//! - [`workflow`] - The run state machine and its exit status
//! - [`listing`] - Read-only module and instance listings

pub mod listing;
pub mod mutator;
pub mod resolver;
pub mod workflow;

pub use mutator::{BatchOutcome, InstanceMutator, ModuleBatch};
pub use resolver::{resolve, Resolution};
pub use workflow::{InstanceWorkflow, WorkflowReport, WorkflowRequest, WorkflowState};
