//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Batched worker pool.
//!
//! Tasks arrive in batches over a bounded channel and fan out across a fixed
//! set of threads; every task produces exactly one `Result` on the bounded
//! result channel, in completion order rather than submission order. A stage
//! that needs its input order back carries an explicit index in the task.
//!
//! One failing task does not stop the pool; the consumer decides whether to
//! keep the first error and fail after the drain.

use std::sync::mpsc::sync_channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use crate::procs;

pub struct WorkerPool<T> {
    tasks: SyncSender<Vec<T>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Pool sized for the machine, see [`procs::worker_count`]. Returns the
    /// pool handle and the receiving end of the result channel.
    pub fn new<V, E, F>(handler: F) -> (WorkerPool<T>, Receiver<Result<V, E>>)
    where
        V: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Result<V, E> + Send + Sync + 'static,
    {
        Self::with_workers(procs::worker_count(), handler)
    }

    pub fn with_workers<V, E, F>(
        num_workers: usize,
        handler: F,
    ) -> (WorkerPool<T>, Receiver<Result<V, E>>)
    where
        V: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Result<V, E> + Send + Sync + 'static,
    {
        let num_workers = num_workers.max(1);
        let (task_tx, task_rx) = sync_channel::<Vec<T>>(num_workers);
        let (result_tx, result_rx) = sync_channel::<Result<V, E>>(num_workers * 2);

        let task_rx = Arc::new(Mutex::new(task_rx));
        let handler = Arc::new(handler);

        let mut workers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            let handler = Arc::clone(&handler);
            workers.push(thread::spawn(move || loop {
                let batch = {
                    let rx = task_rx.lock().expect("task channel lock");
                    rx.recv()
                };
                let batch = match batch {
                    Ok(batch) => batch,
                    // task side closed and the queue is drained
                    Err(_) => break,
                };
                for task in batch {
                    if result_tx.send((*handler)(task)).is_err() {
                        // consumer went away, nobody wants the rest
                        return;
                    }
                }
            }));
        }

        (
            WorkerPool {
                tasks: task_tx,
                workers,
            },
            result_rx,
        )
    }

    /// Enqueue one batch; blocks while the task buffer is full.
    pub fn add(&self, batch: Vec<T>) {
        // workers keep the receiver alive until close(), so this only fails
        // if every worker panicked
        self.tasks
            .send(batch)
            .expect("worker pool has no live workers");
    }

    /// Stop accepting work. Workers drain the queue and exit; a detached
    /// waiter joins them, which closes the result channel once the last
    /// result has been delivered.
    pub fn close(self) {
        let WorkerPool { tasks, workers } = self;
        drop(tasks);
        thread::spawn(move || {
            for worker in workers {
                let _ = worker.join();
            }
        });
    }
}
