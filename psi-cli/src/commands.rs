//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! One function per subcommand: flag plumbing, key and stream setup,
//! progress wiring and the stderr run summary. The protocol work itself
//! lives in the `protocol` crate.

use std::collections::BTreeMap;
use std::error::Error;
use std::thread;

use clap::ArgMatches;
use common::progress::Progress;
use common::timer::Timer;
use common::tsv::RecordRead;
use common::tsv::TsvReader;
use common::tsv::TsvWriter;
use crypto::ecdh::EcdhKey;
use crypto::keys;
use crypto::mac::HmacKey;
use protocol::alpha;
use protocol::beta;
use protocol::ProtocolError;

type CmdResult = Result<(), Box<dyn Error>>;

fn batch_size(args: &ArgMatches) -> Result<usize, Box<dyn Error>> {
    let raw = args.value_of("batch-size").unwrap();
    raw.parse::<usize>()
        .map_err(|_| format!("invalid --batch-size '{}'", raw).into())
}

pub fn beta_step1(args: &ArgMatches) -> CmdResult {
    let input = args.value_of("input").unwrap();
    let out_hmac_key = args.value_of("out-hmac-key").unwrap();
    let out_ecdh_key = args.value_of("out-ecdh-key").unwrap();
    let out_encrypted = args.value_of("out-encrypted").unwrap();
    let batch_size = batch_size(args)?;

    let hmac_key = HmacKey::generate()?;
    let key_b = EcdhKey::generate()?;
    keys::save_hmac_key(out_hmac_key, &hmac_key)?;
    keys::save_ecdh_key(out_ecdh_key, &key_b)?;

    let mut reader = TsvReader::open(input)?;
    let total = reader.line_count()?;
    let mut writer = TsvWriter::create(out_encrypted)?;

    let progress = Progress::track("processing", total, vec![reader.lines_read()]);
    let timer = Timer::new("beta-step1");
    let outcome = beta::step1(&mut reader, &mut writer, &hmac_key, &key_b, batch_size);
    progress.stop();
    let count = outcome?;
    writer.close()?;
    timer.qps("encrypt", count as usize);

    eprintln!("Records processed: {}", count);
    eprintln!("HMAC key K (hand to alpha): {}", out_hmac_key);
    eprintln!("ECDH key B (private): {}", out_ecdh_key);
    eprintln!("Encrypted data: {}", out_encrypted);
    Ok(())
}

pub fn alpha_step1(args: &ArgMatches) -> CmdResult {
    let out_ecdh_key = args.value_of("out-ecdh-key").unwrap();
    let out_encrypted_beta = args.value_of("out-encrypted-beta").unwrap();
    let out_encrypted_alpha = args.value_of("out-encrypted-alpha").unwrap();
    let batch_size = batch_size(args)?;

    let hmac_key = keys::load_hmac_key(args.value_of("in-hmac-key").unwrap())?;
    let key_a = EcdhKey::generate()?;
    keys::save_ecdh_key(out_ecdh_key, &key_a)?;

    let mut beta_reader = TsvReader::open(args.value_of("in-encrypted").unwrap())?;
    let mut alpha_reader = TsvReader::open(args.value_of("in-alpha-data").unwrap())?;
    let total = beta_reader.line_count()? + alpha_reader.line_count()?;
    let mut beta_writer = TsvWriter::create(out_encrypted_beta)?;
    let mut alpha_writer = TsvWriter::create(out_encrypted_alpha)?;

    let progress = Progress::track(
        "processing",
        total,
        vec![beta_reader.lines_read(), alpha_reader.lines_read()],
    );
    let timer = Timer::new("alpha-step1");

    // the two sub-pipelines run concurrently and are both joined before the
    // first error is surfaced
    let (beta_outcome, alpha_outcome) = thread::scope(|s| {
        let beta_branch = s.spawn(|| -> Result<u64, ProtocolError> {
            let count =
                alpha::reencrypt_beta(&mut beta_reader, &mut beta_writer, &key_a, batch_size)?;
            beta_writer.close()?;
            Ok(count)
        });
        let alpha_branch = s.spawn(|| -> Result<u64, ProtocolError> {
            let count = alpha::encrypt_own(
                &mut alpha_reader,
                &mut alpha_writer,
                &hmac_key,
                &key_a,
                batch_size,
            )?;
            alpha_writer.close()?;
            Ok(count)
        });
        (
            beta_branch.join().expect("beta branch panicked"),
            alpha_branch.join().expect("alpha branch panicked"),
        )
    });
    progress.stop();

    let beta_count = beta_outcome?;
    let alpha_count = alpha_outcome?;
    timer.qps("encrypt", (beta_count + alpha_count) as usize);

    eprintln!("Beta records re-encrypted: {}", beta_count);
    eprintln!("Alpha records encrypted: {}", alpha_count);
    eprintln!("ECDH key A (private): {}", out_ecdh_key);
    eprintln!("H_K(phone_b)^BA saved: {}", out_encrypted_beta);
    eprintln!("H_K(phone_a)^A saved: {}", out_encrypted_alpha);
    Ok(())
}

pub fn beta_step2(args: &ArgMatches) -> CmdResult {
    let output = args.value_of("output").unwrap();
    let batch_size = batch_size(args)?;

    let key_b = keys::load_ecdh_key(args.value_of("in-ecdh-key").unwrap())?;

    let mut reenc_reader = TsvReader::open(args.value_of("in-beta-enc").unwrap())?;
    let reencrypted = beta::load_reencrypted(&mut reenc_reader)?;
    let mut orig_reader = TsvReader::open(args.value_of("in-original").unwrap())?;
    let original_ids = beta::load_original_ids(&mut orig_reader)?;

    let mut reader = TsvReader::open(args.value_of("in-alpha-enc").unwrap())?;
    let total = reader.line_count()?;
    let mut writer = TsvWriter::create(output)?;

    let progress = Progress::track("processing", total, vec![reader.lines_read()]);
    let timer = Timer::new("beta-step2");
    let outcome = beta::step2(
        &mut reader,
        &mut writer,
        &key_b,
        reencrypted,
        original_ids,
        batch_size,
    );
    progress.stop();
    let stats = outcome?;
    writer.close()?;
    timer.qps("match", stats.records as usize);

    eprintln!(
        "Records processed: {}, matched: {}",
        stats.records, stats.matched
    );
    eprintln!("Result saved: {}", output);
    Ok(())
}

pub fn alpha_step2(args: &ArgMatches) -> CmdResult {
    let output = args.value_of("output").unwrap();

    let mut beta_reader = TsvReader::open(args.value_of("in-beta").unwrap())?;
    let final_rows = alpha::load_final_rows(&mut beta_reader)?;

    let mut reader = TsvReader::open(args.value_of("in-original").unwrap())?;
    let total = reader.line_count()?;
    let mut writer = TsvWriter::create(output)?;

    let progress = Progress::track("processing", total, vec![reader.lines_read()]);
    let outcome = alpha::step2(&mut reader, &mut writer, &final_rows);
    progress.stop();
    let stats = outcome?;
    writer.close()?;

    eprintln!(
        "Records processed: {}, matched: {}",
        stats.records, stats.matched
    );
    eprintln!("Final mapping saved: {}", output);
    Ok(())
}

pub fn validate(args: &ArgMatches) -> CmdResult {
    let input = args.value_of("input").unwrap();
    let mut reader = TsvReader::open(input)?;

    let mut count: u64 = 0;
    let mut field_counts: BTreeMap<usize, u64> = BTreeMap::new();
    while let Some(record) = reader.read()? {
        *field_counts.entry(record.len()).or_insert(0) += 1;
        count += 1;
    }

    eprintln!("File is readable: {}", input);
    eprintln!("Total records: {}", count);
    eprintln!("Field count distribution:");
    for (fields, records) in &field_counts {
        eprintln!("  {} fields: {} records", fields, records);
    }
    Ok(())
}
