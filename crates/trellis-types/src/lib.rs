//! Shared vocabulary for the Trellis governance engine.
//!
//! Everything in this crate is plain data: component kinds and their arity
//! contracts, declarations, bonds, graph snapshots, and mutations. All types
//! serialize with serde and order deterministically (`BTreeMap`, derived
//! `Ord`) so that every downstream report is byte-for-byte reproducible.
//!
//! ## Core invariants
//!
//! - **Closed taxonomy**: `ComponentKind` is a closed enum. Every declared
//!   component resolves to exactly one kind; there is no open extension
//!   point.
//! - **Derived graph state**: a `GraphSnapshot` is a value. Applying a
//!   `Mutation` yields a *new* snapshot and never modifies the original.
//! - **Deterministic ordering**: components are keyed by id in a `BTreeMap`,
//!   and bonds iterate in (source, relation, target) order.

pub mod bond;
pub mod component;
pub mod graph;
pub mod mutation;

pub use bond::{Bond, BondSpec, RelationKind};
pub use component::{
    ArityBounds, ArityContract, ComponentId, ComponentKind, KindDefinition, Mutability, Severity,
};
pub use graph::{ComponentDeclaration, GraphSnapshot};
pub use mutation::{ApplyError, Generation, Mutation, MutationOp};
