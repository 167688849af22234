//! Actor System
//!
//! Long-running tasks that meet only on the task bus:
//!
//! ```text
//! EditorIntegration --generate-cache--> CompilerOrchestrator
//!        (detect)                          (coalesce, build)
//!                                                 |
//! VariableSync <----------cache-generated---------+
//!   (refresh)
//! ```
//!
//! # Module Structure
//!
//! - `integration` - Save detection inside one editor document
//! - `orchestrator` - Coalesced, serialized cache builds
//! - `sync` - Design-token stylesheet refresh
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod integration;
pub mod orchestrator;
pub mod sync;

pub use coordinator::Coordinator;
