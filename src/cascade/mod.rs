//! Referential-integrity cascade engine
//!
//! The document store has no foreign keys and no cascading deletes, so
//! removing a core entity is a coordinated operation:
//!
//! 1. **scanner** finds every document referencing the target, using the
//!    fixed edge table in **registry**
//! 2. **policy** decides whether deletion is allowed at all
//! 3. **orchestrator** runs the ordered cleanup pipeline and the terminal
//!    delete, delegating multi-document writes to **batch**
//!
//! **reference** normalizes the store's two historical reference shapes at
//! the boundary.

pub mod batch;
pub mod orchestrator;
pub mod policy;
pub mod reference;
pub mod registry;
pub mod scanner;

pub use batch::{BatchExecutor, BatchOutcome};
pub use orchestrator::{
    CascadeOrchestrator, CascadeOutcome, CascadeResult, DeleteConflict, DeletionRequest,
    UnresolvedHolder,
};
pub use policy::{ConflictReason, ConflictReport, MAX_SAMPLES};
pub use reference::Reference;
pub use registry::{CleanupAction, EntityKind, RefEdge};
pub use scanner::{ReferenceHit, ReferenceHitSet, ReferenceScanner};
