//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Beta-side stages.
//!
//! Beta owns the HMAC key and the private scalar `B`. In step 1 it tags
//! and encrypts its own phones; in step 2 it re-encrypts Alpha's stream
//! with `B`, recognizes its own doubly-encrypted points among them, and
//! attaches the matching user ids.

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

/// Step 1: `(phone, beta_user_id)` to `(index, H_K(phone)^B)`.
///
/// Rows are emitted in pool-completion order; the index field is what
/// preserves the alignment with the input. Returns the record count.
pub fn step1<R, W>(
    reader: &mut R,
    writer: &mut W,
    hmac_key: &HmacKey,
    key_b: &EcdhKey,
    batch_size: usize,
) -> Result<u64, ProtocolError>
where
    R: RecordRead,
    W: RecordWrite + Send,
{
    struct Task {
        index: u64,
        phone: String,
    }

    let mac = KeyedMac::new(hmac_key);
    let key = key_b.clone();

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
            })
        },
        move |task: Task| {
            phone::validate_e164(&task.phone, task.index)?;
            let tag = mac.tag(task.phone.as_bytes());
            let point = key.apply_bytes(&tag)?;
            Ok(Row {
                fields: vec![task.index.to_string(), point],
                matched: false,
            })
        },
    )?;
    Ok(stats.records)
}

/// Index of the re-encrypted points Alpha sent back:
/// `H_K(phone_b)^{BA}` to `i_B`. Rows with fewer than 2 fields are skipped.
pub fn load_reencrypted<R: RecordRead>(
    reader: &mut R,
) -> Result<HashMap<String, String>, ProtocolError> {
    let mut table = HashMap::new();
    while let Some(record) = reader.read()? {
        if record.len() < 2 {
            continue;
        }
        let mut fields = record.into_iter();
        let index = fields.next().unwrap_or_default();
        let point = fields.next().unwrap_or_default();
        table.insert(point, index);
    }
    debug!("re-encrypted point table: {} entries", table.len());
    Ok(table)
}

/// Re-derives `i_B` to `beta_user_id` by re-reading the original input and
/// assigning indices by position, exactly as step 1 did. Rows with fewer
/// than 2 fields are skipped.
pub fn load_original_ids<R: RecordRead>(
    reader: &mut R,
) -> Result<HashMap<String, String>, ProtocolError> {
    let mut table = HashMap::new();
    let mut index: u64 = 0;
    while let Some(record) = reader.read()? {
        if record.len() < 2 {
            continue;
        }
        let mut fields = record.into_iter();
        let _phone = fields.next();
        let user_id = fields.next().unwrap_or_default();
        table.insert(index.to_string(), user_id);
        index += 1;
    }
    Ok(table)
}

/// Step 2: for each Alpha row `(j, alpha_user_id, H_K(phone_a)^A)` emit
/// `(j, H_K(phone_a)^{AB}, beta_user_id_or_empty)`.
///
/// The first output field is the index of the stream being consumed, not a
/// Beta index; Beta indices are reached only through the re-encrypted point
/// table. Requires at least 3 input fields per row.
pub fn step2<R, W>(
    reader: &mut R,
    writer: &mut W,
    key_b: &EcdhKey,
    reencrypted: HashMap<String, String>,
    original_ids: HashMap<String, String>,
    batch_size: usize,
) -> Result<StageStats, ProtocolError>
where
    R: RecordRead,
    W: RecordWrite + Send,
{
    struct Task {
        index: String,
        point: String,
    }

    let key = key_b.clone();

    run_batched(
        reader,
        writer,
        batch_size,
        |line, record| {
            if record.len() < 3 {
                return Err(ProtocolError::MalformedRecord {
                    line,
                    expected: 3,
                    got: record.len(),
                });
            }
            let mut fields = record.into_iter();
            let index = fields.next().unwrap_or_default();
            let _alpha_user_id = fields.next();
            let point = fields.next().unwrap_or_default();
            Ok(Task { index, point })
        },
        move |task: Task| {
            let point_ab = key.apply(&task.point)?;
            let hit = reencrypted
                .get(&point_ab)
                .and_then(|i_b| original_ids.get(i_b));
            let matched = hit.is_some();
            let beta_user_id = hit.cloned().unwrap_or_default();
            Ok(Row {
                fields: vec![task.index, point_ab, beta_user_id],
                matched,
            })
        },
    )
}
