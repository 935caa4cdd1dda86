//! Storage module for persisting harvest progress
//!
//! This module handles the checkpoint that makes a run resumable:
//! - The `Checkpoint` snapshot type and its JSON layout
//! - The `CheckpointStore` trait
//! - A file-backed implementation with atomic replacement

mod checkpoint;
mod traits;

pub use checkpoint::{Checkpoint, JsonCheckpointStore};
pub use traits::{CheckpointStore, StorageError, StorageResult};
