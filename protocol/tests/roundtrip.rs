//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of all four stages over in-memory streams.

use std::collections::HashMap;
use std::collections::HashSet;

use common::tsv::TsvReader;
use common::tsv::TsvWriter;
use crypto::ecdh::EcdhKey;
use crypto::mac::HmacKey;
use protocol::alpha;
use protocol::beta;
use protocol::ProtocolError;

const BATCH: usize = 3;

struct ProtocolRun {
    e_b: String,
    e_ba: String,
    e_a: String,
    f_b: String,
    finals: Vec<(String, String)>,
}

fn run_protocol(beta_input: &str, alpha_input: &str) -> ProtocolRun {
    let hmac_key = HmacKey::generate().unwrap();
    let key_b = EcdhKey::generate().unwrap();

    // Beta step 1
    let mut reader = TsvReader::memory(beta_input);
    let (mut writer, e_b_sink) = TsvWriter::memory();
    beta::step1(&mut reader, &mut writer, &hmac_key, &key_b, BATCH).unwrap();
    writer.close().unwrap();
    let e_b = e_b_sink.contents();

    // Alpha step 1, both branches
    let key_a = EcdhKey::generate().unwrap();
    let mut beta_reader = TsvReader::memory(&e_b);
    let (mut beta_writer, e_ba_sink) = TsvWriter::memory();
    alpha::reencrypt_beta(&mut beta_reader, &mut beta_writer, &key_a, BATCH).unwrap();
    beta_writer.close().unwrap();
    let e_ba = e_ba_sink.contents();

    let mut alpha_reader = TsvReader::memory(alpha_input);
    let (mut alpha_writer, e_a_sink) = TsvWriter::memory();
    alpha::encrypt_own(&mut alpha_reader, &mut alpha_writer, &hmac_key, &key_a, BATCH).unwrap();
    alpha_writer.close().unwrap();
    let e_a = e_a_sink.contents();

    // Beta step 2
    let reencrypted = beta::load_reencrypted(&mut TsvReader::memory(&e_ba)).unwrap();
    let original_ids = beta::load_original_ids(&mut TsvReader::memory(beta_input)).unwrap();
    let mut reader = TsvReader::memory(&e_a);
    let (mut writer, f_b_sink) = TsvWriter::memory();
    beta::step2(
        &mut reader,
        &mut writer,
        &key_b,
        reencrypted,
        original_ids,
        BATCH,
    )
    .unwrap();
    writer.close().unwrap();
    let f_b = f_b_sink.contents();

    // Alpha step 2
    let final_rows = alpha::load_final_rows(&mut TsvReader::memory(&f_b)).unwrap();
    let mut reader = TsvReader::memory(&e_a);
    let (mut writer, out_sink) = TsvWriter::memory();
    alpha::step2(&mut reader, &mut writer, &final_rows).unwrap();
    writer.close().unwrap();

    let finals = out_sink
        .contents()
        .lines()
        .map(|line| {
            let (a, b) = line.split_once('\t').unwrap();
            (a.to_string(), b.to_string())
        })
        .collect();

    ProtocolRun {
        e_b,
        e_ba,
        e_a,
        f_b,
        finals,
    }
}

fn final_map(run: &ProtocolRun) -> HashMap<String, String> {
    run.finals.iter().cloned().collect()
}

fn expected(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

#[test]
fn basic_intersection() {
    let beta_input = "\
+79991110001\tb1
+79991110002\tb2
+79991110003\tb3
+79991110004\tb4
";
    let alpha_input = "\
+79991110001\ta1
+79991110004\ta2
+79991110003\ta3
+79991119999\ta4
";
    let run = run_protocol(beta_input, alpha_input);
    assert_eq!(
        final_map(&run),
        expected(&[("a1", "b1"), ("a2", "b4"), ("a3", "b3"), ("a4", "")])
    );
}

#[test]
fn empty_intersection() {
    let beta_input = "+79991110010\tb1\n+79991110011\tb2\n";
    let alpha_input = "+79990000001\ta1\n+79990000002\ta2\n";
    let run = run_protocol(beta_input, alpha_input);
    assert_eq!(final_map(&run), expected(&[("a1", ""), ("a2", "")]));
}

#[test]
fn full_intersection() {
    let beta_input = "+79991110001\tb1\n+79991110002\tb2\n";
    let alpha_input = "+79991110001\ta1\n+79991110002\ta2\n";
    let run = run_protocol(beta_input, alpha_input);
    assert_eq!(final_map(&run), expected(&[("a1", "b1"), ("a2", "b2")]));
}

#[test]
fn output_cardinality_follows_alpha_input() {
    let beta_input = "+79991110001\tb1\n";
    let alpha_input = "\
+79991110001\ta1
+79991110002\ta2
+79991110003\ta3
";
    let run = run_protocol(beta_input, alpha_input);
    assert_eq!(run.e_a.lines().count(), 3);
    assert_eq!(run.f_b.lines().count(), 3);
    assert_eq!(run.finals.len(), 3);
}

#[test]
fn emitted_indices_are_dense() {
    let beta_input = "\
+79991110001\tb1
+79991110002\tb2
+79991110003\tb3
";
    let alpha_input = "+79991110001\ta1\n+79991110009\ta2\n";
    let run = run_protocol(beta_input, alpha_input);

    let e_b_indices: HashSet<u64> = run
        .e_b
        .lines()
        .map(|l| l.split('\t').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(e_b_indices, (0..3).collect());

    let e_a_indices: HashSet<u64> = run
        .e_a
        .lines()
        .map(|l| l.split('\t').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(e_a_indices, (0..2).collect());
}

#[test]
fn no_phone_leaks_into_any_output() {
    let phones = [
        "79991110001",
        "79991110002",
        "79991110004",
        "79991119999",
    ];
    let beta_input = "+79991110001\tb1\n+79991110002\tb2\n";
    let alpha_input = "+79991110004\ta1\n+79991119999\ta2\n";
    let run = run_protocol(beta_input, alpha_input);

    let finals_text: String = run
        .finals
        .iter()
        .map(|(a, b)| format!("{}\t{}\n", a, b))
        .collect();
    for output in [&run.e_b, &run.e_ba, &run.e_a, &run.f_b, &finals_text] {
        for phone in phones {
            assert!(
                !output.contains(phone),
                "phone {} leaked into an output",
                phone
            );
        }
    }
}

#[test]
fn invalid_phone_fails_beta_step1() {
    let mut reader = TsvReader::memory("79991234567\tb1\n");
    let (mut writer, _sink) = TsvWriter::memory();
    let err = beta::step1(
        &mut reader,
        &mut writer,
        &HmacKey::generate().unwrap(),
        &EcdhKey::generate().unwrap(),
        BATCH,
    )
    .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPhone { line: 0 }));
}

#[test]
fn invalid_phone_reports_its_line() {
    let mut reader = TsvReader::memory("+79991110001\ta1\n+7 999\ta2\n");
    let (mut writer, _sink) = TsvWriter::memory();
    let err = alpha::encrypt_own(
        &mut reader,
        &mut writer,
        &HmacKey::generate().unwrap(),
        &EcdhKey::generate().unwrap(),
        BATCH,
    )
    .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPhone { line: 1 }));
}

#[test]
fn malformed_beta_record_fails_step1() {
    let mut reader = TsvReader::memory("+79991110001\tb1\textra\n");
    let (mut writer, _sink) = TsvWriter::memory();
    let err = beta::step1(
        &mut reader,
        &mut writer,
        &HmacKey::generate().unwrap(),
        &EcdhKey::generate().unwrap(),
        BATCH,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::MalformedRecord {
            line: 0,
            expected: 2,
            got: 3,
        }
    ));
}

#[test]
fn beta_step2_counts_matches() {
    let beta_input = "+79991110001\tb1\n+79991110002\tb2\n";
    let alpha_input = "+79991110002\ta1\n+79991117777\ta2\n";

    let hmac_key = HmacKey::generate().unwrap();
    let key_b = EcdhKey::generate().unwrap();
    let key_a = EcdhKey::generate().unwrap();

    let mut reader = TsvReader::memory(beta_input);
    let (mut writer, e_b_sink) = TsvWriter::memory();
    beta::step1(&mut reader, &mut writer, &hmac_key, &key_b, BATCH).unwrap();
    writer.close().unwrap();

    let mut reader = TsvReader::memory(&e_b_sink.contents());
    let (mut writer, e_ba_sink) = TsvWriter::memory();
    alpha::reencrypt_beta(&mut reader, &mut writer, &key_a, BATCH).unwrap();
    writer.close().unwrap();

    let mut reader = TsvReader::memory(alpha_input);
    let (mut writer, e_a_sink) = TsvWriter::memory();
    alpha::encrypt_own(&mut reader, &mut writer, &hmac_key, &key_a, BATCH).unwrap();
    writer.close().unwrap();

    let reencrypted =
        beta::load_reencrypted(&mut TsvReader::memory(&e_ba_sink.contents())).unwrap();
    let original_ids = beta::load_original_ids(&mut TsvReader::memory(beta_input)).unwrap();
    let mut reader = TsvReader::memory(&e_a_sink.contents());
    let (mut writer, _f_b_sink) = TsvWriter::memory();
    let stats = beta::step2(
        &mut reader,
        &mut writer,
        &key_b,
        reencrypted,
        original_ids,
        BATCH,
    )
    .unwrap();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.matched, 1);
}
