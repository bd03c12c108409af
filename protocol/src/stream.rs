//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Shared driver for the pooled stages.
//!
//! Every parallel stage has the same shape: pull records, turn each into a
//! task, fan batches out to the worker pool, and write finished rows as
//! they arrive. Rows land in completion order; the index travelling inside
//! each task is what ties them back to their input line.

use std::mem;
use std::thread;

use common::pool::WorkerPool;
use common::tsv::RecordRead;
use common::tsv::RecordWrite;

use crate::ProtocolError;

/// What a stage did: records consumed and, for the join stages, how many
/// rows found a partner.
#[derive(Debug)]
pub struct StageStats {
    pub records: u64,
    pub matched: u64,
}

/// One output row from a task.
pub(crate) struct Row {
    pub fields: Vec<String>,
    pub matched: bool,
}

/// Read records, map them to tasks with `make_task`, run `handler` across
/// the pool and write the rows. A read-side failure stops the intake and
/// wins over any task error; task errors are kept first-come and surfaced
/// after the drain. Either way the pool is drained before returning.
pub(crate) fn run_batched<R, W, T, F, H>(
    reader: &mut R,
    writer: &mut W,
    batch_size: usize,
    mut make_task: F,
    handler: H,
) -> Result<StageStats, ProtocolError>
where
    R: RecordRead,
    W: RecordWrite + Send,
    T: Send + 'static,
    F: FnMut(u64, Vec<String>) -> Result<T, ProtocolError>,
    H: Fn(T) -> Result<Row, ProtocolError> + Send + Sync + 'static,
{
    let batch_size = batch_size.max(1);
    let (pool, results) = WorkerPool::new(handler);

    let (records, matched, read_err, first_err) = thread::scope(|s| {
        let drain = s.spawn(move || {
            let mut first_err: Option<ProtocolError> = None;
            let mut matched: u64 = 0;
            for result in results.iter() {
                match result {
                    Err(err) => {
                        if first_err.is_none() {
                            first_err = Some(err);
                        }
                    }
                    Ok(row) => {
                        if first_err.is_some() {
                            continue;
                        }
                        match writer.write(&row.fields) {
                            Ok(()) => {
                                if row.matched {
                                    matched += 1;
                                }
                            }
                            Err(err) => first_err = Some(err.into()),
                        }
                    }
                }
            }
            (matched, first_err)
        });

        let mut records: u64 = 0;
        let mut read_err: Option<ProtocolError> = None;
        let mut batch: Vec<T> = Vec::with_capacity(batch_size);
        loop {
            let record = match reader.read() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(err) => {
                    read_err = Some(err.into());
                    break;
                }
            };
            match make_task(records, record) {
                Ok(task) => batch.push(task),
                Err(err) => {
                    read_err = Some(err);
                    break;
                }
            }
            records += 1;
            if batch.len() >= batch_size {
                pool.add(mem::replace(&mut batch, Vec::with_capacity(batch_size)));
            }
        }
        if read_err.is_none() && !batch.is_empty() {
            pool.add(batch);
        }
        pool.close();

        let (matched, first_err) = drain.join().expect("drain thread panicked");
        (records, matched, read_err, first_err)
    });

    if let Some(err) = read_err {
        return Err(err);
    }
    if let Some(err) = first_err {
        return Err(err);
    }
    Ok(StageStats { records, matched })
}

#[cfg(test)]
mod tests {
    use common::tsv::{TsvReader, TsvWriter};

    use super::*;

    #[test]
    fn rows_carry_their_index_through_the_pool() {
        let input: String = (0..50).map(|i| format!("v{}\tx\n", i)).collect();
        let mut reader = TsvReader::memory(&input);
        let (mut writer, sink) = TsvWriter::memory();

        let stats = run_batched(
            &mut reader,
            &mut writer,
            8,
            |index, record| Ok((index, record[0].clone())),
            |(index, value): (u64, String)| {
                Ok(Row {
                    fields: vec![index.to_string(), value],
                    matched: false,
                })
            },
        )
        .unwrap();
        writer.close().unwrap();
        assert_eq!(stats.records, 50);

        let mut seen = vec![false; 50];
        for line in sink.contents().lines() {
            let (index, value) = line.split_once('\t').unwrap();
            let index: usize = index.parse().unwrap();
            assert_eq!(value, format!("v{}", index));
            seen[index] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn read_side_error_wins() {
        let mut reader = TsvReader::memory("a\tb\nbad\n");
        let (mut writer, _sink) = TsvWriter::memory();

        let err = run_batched(
            &mut reader,
            &mut writer,
            1,
            |line, record| {
                if record.len() != 2 {
                    return Err(ProtocolError::MalformedRecord {
                        line,
                        expected: 2,
                        got: record.len(),
                    });
                }
                Ok(line)
            },
            |_line: u64| {
                Err::<Row, _>(ProtocolError::InvalidPhone { line: 0 })
            },
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn first_task_error_surfaces_after_drain() {
        let mut reader = TsvReader::memory("a\nb\nc\n");
        let (mut writer, _sink) = TsvWriter::memory();

        let err = run_batched(
            &mut reader,
            &mut writer,
            1,
            |line, _record| Ok(line),
            |line: u64| {
                if line == 1 {
                    Err(ProtocolError::InvalidPhone { line })
                } else {
                    Ok(Row {
                        fields: vec![line.to_string()],
                        matched: false,
                    })
                }
            },
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPhone { .. }));
    }
}
