//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Alpha-side stages.
//!
//! Alpha receives the HMAC key and Beta's encrypted stream. In step 1 it
//! re-encrypts that stream with its own scalar `A` and encrypts its own
//! records in parallel; in step 2 it joins Beta's final rows back to its
//! user ids by index. Alpha never sees a Beta phone, only blinded points.

use std::collections::HashMap;

use common::tsv::RecordRead;
use common::tsv::RecordWrite;
use crypto::ecdh::EcdhKey;
use crypto::mac::HmacKey;
use crypto::mac::KeyedMac;

use crate::phone;
use crate::stream::run_batched;
use crate::stream::Row;
use crate::stream::StageStats;
use crate::ProtocolError;

/// Step 1, Beta branch: `(i_B, H_K(phone_b)^B)` to `(i_B, H_K(phone_b)^{BA})`.
///
/// The index passes through untouched. Extra trailing fields are ignored.
/// Returns the record count.
pub fn reencrypt_beta<R, W>(
    reader: &mut R,
    writer: &mut W,
    key_a: &EcdhKey,
    batch_size: usize,
) -> Result<u64, ProtocolError>
where
    R: RecordRead,
    W: RecordWrite + Send,
{
    struct Task {
        index: String,
        point: String,
    }

    let key = key_a.clone();

    let stats = run_batched(
        reader,
        writer,
        batch_size,
        |line, record| {
            if record.len() < 2 {
                return Err(ProtocolError::MalformedRecord {
                    line,
                    expected: 2,
                    got: record.len(),
                });
            }
            let mut fields = record.into_iter();
            Ok(Task {
                index: fields.next().unwrap_or_default(),
                point: fields.next().unwrap_or_default(),
            })
        },
        move |task: Task| {
            let point = key.apply(&task.point)?;
            Ok(Row {
                fields: vec![task.index, point],
                matched: false,
            })
        },
    )?;
    Ok(stats.records)
}

/// Step 1, own branch: `(phone, alpha_user_id)` to
/// `(j, alpha_user_id, H_K(phone_a)^A)`. Returns the record count.
pub fn encrypt_own<R, W>(
    reader: &mut R,
    writer: &mut W,
    hmac_key: &HmacKey,
    key_a: &EcdhKey,
    batch_size: usize,
) -> Result<u64, ProtocolError>
where
    R: RecordRead,
    W: RecordWrite + Send,
{
    struct Task {
        index: u64,
        phone: String,
        user_id: String,
    }

    let mac = KeyedMac::new(hmac_key);
    let key = key_a.clone();

    let stats = run_batched(
        reader,
        writer,
        batch_size,
        |index, record| {
            if record.len() != 2 {
                return Err(ProtocolError::MalformedRecord {
                    line: index,
                    expected: 2,
                    got: record.len(),
                });
            }
            let mut fields = record.into_iter();
            Ok(Task {
                index,
                phone: fields.next().unwrap_or_default(),
                user_id: fields.next().unwrap_or_default(),
            })
        },
        move |task: Task| {
            phone::validate_e164(&task.phone, task.index)?;
            let tag = mac.tag(task.phone.as_bytes());
            let point = key.apply_bytes(&tag)?;
            Ok(Row {
                fields: vec![task.index.to_string(), task.user_id, point],
                matched: false,
            })
        },
    )?;
    Ok(stats.records)
}

/// One row of Beta's final output, keyed by the Alpha index it carries.
pub struct FinalRow {
    pub point: String,
    pub beta_user_id: String,
}

/// Load `F_B` as `j` to `(point, beta_user_id_or_empty)`. Rows with fewer
/// than 3 fields are skipped.
pub fn load_final_rows<R: RecordRead>(
    reader: &mut R,
) -> Result<HashMap<String, FinalRow>, ProtocolError> {
    let mut table = HashMap::new();
    while let Some(record) = reader.read()? {
        if record.len() < 3 {
            continue;
        }
        let mut fields = record.into_iter();
        let index = fields.next().unwrap_or_default();
        let point = fields.next().unwrap_or_default();
        let beta_user_id = fields.next().unwrap_or_default();
        table.insert(
            index,
            FinalRow {
                point,
                beta_user_id,
            },
        );
    }
    debug!("final row table: {} entries", table.len());
    Ok(table)
}

/// Step 2: `(j, alpha_user_id, _)` joined with `F_B` gives
/// `(alpha_user_id, beta_user_id_or_empty)`.
///
/// Sequential: the join is a hash lookup per row and there is no crypto
/// left. Emits exactly one output row per input row.
pub fn step2<R, W>(
    reader: &mut R,
    writer: &mut W,
    final_rows: &HashMap<String, FinalRow>,
) -> Result<StageStats, ProtocolError>
where
    R: RecordRead,
    W: RecordWrite,
{
    let mut records: u64 = 0;
    let mut matched: u64 = 0;

    while let Some(record) = reader.read()? {
        if record.len() < 3 {
            return Err(ProtocolError::MalformedRecord {
                line: records,
                expected: 3,
                got: record.len(),
            });
        }
        let mut fields = record.into_iter();
        let index = fields.next().unwrap_or_default();
        let alpha_user_id = fields.next().unwrap_or_default();

        let beta_user_id = match final_rows.get(&index) {
            Some(row) if !row.beta_user_id.is_empty() => {
                matched += 1;
                row.beta_user_id.clone()
            }
            _ => String::new(),
        };

        writer.write(&[alpha_user_id, beta_user_id])?;
        records += 1;
    }

    Ok(StageStats { records, matched })
}

#[cfg(test)]
mod tests {
    use common::tsv::TsvReader;
    use common::tsv::TsvWriter;

    use super::*;

    #[test]
    fn load_final_rows_skips_short_rows() {
        let mut reader = TsvReader::memory("0\tAAAA\tb1\n1\tBBBB\n2\tCCCC\t\n");
        let table = load_final_rows(&mut reader).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("0").unwrap().beta_user_id, "b1");
        assert_eq!(table.get("2").unwrap().beta_user_id, "");
        assert!(!table.contains_key("1"));
    }

    #[test]
    fn step2_emits_one_row_per_input() {
        let mut table = HashMap::new();
        table.insert(
            String::from("1"),
            FinalRow {
                point: String::from("AAAA"),
                beta_user_id: String::from("b7"),
            },
        );

        let mut reader = TsvReader::memory("0\ta1\tPPPP\n1\ta2\tQQQQ\n2\ta3\tRRRR\n");
        let (mut writer, sink) = TsvWriter::memory();
        let stats = step2(&mut reader, &mut writer, &table).unwrap();
        writer.close().unwrap();

        assert_eq!(stats.records, 3);
        assert_eq!(stats.matched, 1);
        assert_eq!(sink.contents(), "a1\t\na2\tb7\na3\t\n");
    }

    #[test]
    fn step2_rejects_short_rows() {
        let mut reader = TsvReader::memory("0\ta1\tPPPP\n1\ta2\n");
        let (mut writer, _sink) = TsvWriter::memory();
        let err = step2(&mut reader, &mut writer, &HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedRecord {
                line: 1,
                expected: 3,
                got: 2,
            }
        ));
    }
}
