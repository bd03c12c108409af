//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

/// Tab-separated record streams
pub mod tsv;

/// Batched worker pool
pub mod pool;

/// Worker-count sizing
pub mod procs;

/// Wall-clock progress reporting
pub mod progress;

/// Simple timer
pub mod timer;
