//! Rank-partitioned analysis pipeline with a gated collective gather.
//!
//! Every rank generates a partition, transforms it locally, and checks it
//! for corruption before a collective gather assembles the full array on a
//! coordinator rank for finalization and validation. The group primitives
//! live behind [`comm::ProcessGroup`]: an in-process thread group backs the
//! default `run` subcommand, and an MPI world backs the feature-gated `mpi`
//! subcommand.

pub mod cli;
pub mod comm;
pub mod config;
pub mod pipeline;
pub mod reporter;
pub mod runner;
pub mod types;
