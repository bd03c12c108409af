//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Worker-count sizing.

use std::thread;

/// Number of pool workers to run: the machine's parallelism minus headroom
/// for the reader, writer and progress threads. Never below one.
pub fn worker_count() -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    sized(cores)
}

fn sized(cores: usize) -> usize {
    if cores <= 1 {
        1
    } else if cores <= 5 {
        cores - 1
    } else {
        cores - 2
    }
}
