// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch writing to the target store.

pub mod resilient_writer;

pub use resilient_writer::{normalize_batch, ResilientWriter, WriteOutcome, IDENTITY_ATTRIBUTE};
