//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Wall-clock progress reporting.
//!
//! A ticker thread wakes once per second, sums the readers' line counters
//! and rewrites a `label: current/total` status line on stderr. Totals are
//! counted by the caller up front (read through, reset); the ticker itself
//! never touches the streams, only their counters, so it cannot affect the
//! stage outcome.

use std::io;
use std::io::Write;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc::sync_channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct Progress {
    cancel: SyncSender<()>,
    ticker: Option<thread::JoinHandle<()>>,
}

impl Progress {
    /// Spawn the ticker over the given line counters.
    pub fn track(label: &str, total: u64, counters: Vec<Arc<AtomicU64>>) -> Progress {
        let label = label.to_string();
        let (cancel, cancelled) = sync_channel::<()>(1);
        let ticker = thread::spawn(move || run(&label, total, &counters, &cancelled));
        Progress {
            cancel,
            ticker: Some(ticker),
        }
    }

    /// Stop the ticker and blank the status line.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.cancel.try_send(());
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(label: &str, total: u64, counters: &[Arc<AtomicU64>], cancelled: &Receiver<()>) {
    let mut line_len = 0;
    loop {
        match cancelled.recv_timeout(Duration::from_secs(1)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                eprint!("\r{}\r", " ".repeat(line_len));
                let _ = io::stderr().flush();
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let current: u64 = counters.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        let line = format!("{}: {}/{}", label, current, total);
        line_len = line.len();
        eprint!("\r{}", line);
        let _ = io::stderr().flush();
    }
}
