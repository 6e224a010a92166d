//! Analysis building blocks shared by analyzer plugins
//!
//! The batch orchestration lives in [`crate::pipeline::analyze`]; this module
//! holds what analyzers themselves use to cooperate across files.

pub mod group;

pub use group::{GroupMember, GroupToken};
