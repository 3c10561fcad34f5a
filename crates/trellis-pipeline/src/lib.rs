//! Mutation Pipeline — change control for a governed component graph.
//!
//! A proposed mutation moves through a fixed state machine:
//!
//! 1. **Proposed** — submitted against a base generation; a stale base is
//!    rejected immediately (optimistic concurrency, single winner).
//! 2. **Validating** — the mutation is applied to a *copy* of the current
//!    graph and the Compatibility Validator runs over the candidate. Any
//!    structural violation rejects the mutation; no score is computed for an
//!    illegal graph.
//! 3. **Scored** — the Anti-Pattern Scanner and Fitness Scorer run against
//!    the candidate.
//! 4. **Accepted | Rejected** — accepted iff the score clears the absolute
//!    floor, does not regress beyond the configured tolerance, and no
//!    finding breaches the severity ceiling. Accepted mutations append a new
//!    generation; rejected mutations are recorded but change nothing.
//!
//! ## Invariants
//!
//! - The audit log is append-only: no delete or modify operations exist.
//! - Rejected mutations are first-class records, with their full reason.
//! - The current graph is always reproducible by folding accepted records
//!   from generation zero (log/state equivalence).
//! - All rejections are terminal for that submission; the pipeline never
//!   repairs or retries a change on the caller's behalf.

pub mod audit;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod report;

pub use audit::{AuditLog, MutationRecord};
pub use error::{AuditError, PipelineError};
pub use pipeline::MutationPipeline;
pub use policy::AcceptancePolicy;
pub use report::{GateDecision, GateReport, RejectionReason};
