//! Divide-and-conquer phylogenetic placement engine.
//!
//! A large alignment/tree problem is decomposed into independent subsets,
//! per-subset computations run through an external-tool pipeline (model
//! build → search → align → place), fragments are probabilistically
//! assigned to subsets, and results are recombined by an external merge
//! tool. This crate provides the scheduling, barrier-synchronization,
//! assignment, fan-out, and merge machinery; decomposition and the tools
//! themselves are external collaborators.

pub mod assign;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod fanout;
pub mod fragments;
pub mod merge;
pub mod pipeline;
pub mod problem;
pub mod scheduler;
