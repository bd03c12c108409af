//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::process;

use clap::App;
use clap::AppSettings;
use clap::Arg;
use clap::SubCommand;

mod commands;

fn batch_size_arg() -> Arg<'static, 'static> {
    Arg::with_name("batch-size")
        .long("batch-size")
        .takes_value(true)
        .default_value("128")
        .help("Batch size for parallel processing")
}

fn main() {
    env_logger::init();

    let matches = App::new("psi")
        .version("0.1")
        .about("Two-party private set intersection over phone numbers (HMAC-SHA256 + ECDH P-256)")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("beta-step1")
                .about("Beta step 1: generate keys and encrypt phones")
                .args(&[
                    Arg::with_name("input")
                        .long("input")
                        .short("i")
                        .takes_value(true)
                        .required(true)
                        .help("Input TSV file (phone tab beta_user_id)"),
                    Arg::with_name("out-hmac-key")
                        .long("out-hmac-key")
                        .takes_value(true)
                        .default_value("beta_hmac_key.txt")
                        .help("Output file with the HMAC key K (hand to alpha)"),
                    Arg::with_name("out-ecdh-key")
                        .long("out-ecdh-key")
                        .takes_value(true)
                        .default_value("beta_ecdh_key.txt")
                        .help("Output file with the ECDH key B (private)"),
                    Arg::with_name("out-encrypted")
                        .long("out-encrypted")
                        .short("e")
                        .takes_value(true)
                        .default_value("beta_encrypted.tsv.gz")
                        .help("Output file with index and H_K(phone)^B (hand to alpha)"),
                    batch_size_arg(),
                ]),
        )
        .subcommand(
            SubCommand::with_name("alpha-step1")
                .about("Alpha step 1: re-encrypt beta's data and encrypt own records")
                .args(&[
                    Arg::with_name("in-hmac-key")
                        .long("in-hmac-key")
                        .takes_value(true)
                        .required(true)
                        .help("Input file with the HMAC key K from beta"),
                    Arg::with_name("in-encrypted")
                        .long("in-encrypted")
                        .takes_value(true)
                        .required(true)
                        .help("Input file H_K(phone_b)^B from beta"),
                    Arg::with_name("in-alpha-data")
                        .long("in-alpha-data")
                        .takes_value(true)
                        .required(true)
                        .help("Input TSV file (phone tab alpha_user_id)"),
                    Arg::with_name("out-ecdh-key")
                        .long("out-ecdh-key")
                        .takes_value(true)
                        .default_value("alpha_ecdh_key.txt")
                        .help("Output file with the ECDH key A (private)"),
                    Arg::with_name("out-encrypted-beta")
                        .long("out-encrypted-beta")
                        .takes_value(true)
                        .default_value("beta_encrypted_a.tsv.gz")
                        .help("Output file H_K(phone_b)^BA (hand back to beta)"),
                    Arg::with_name("out-encrypted-alpha")
                        .long("out-encrypted-alpha")
                        .takes_value(true)
                        .default_value("alpha_encrypted.tsv.gz")
                        .help("Output file index, alpha_user_id, H_K(phone_a)^A"),
                    batch_size_arg(),
                ]),
        )
        .subcommand(
            SubCommand::with_name("beta-step2")
                .about("Beta step 2: compute the intersection and attach user ids")
                .args(&[
                    Arg::with_name("in-ecdh-key")
                        .long("in-ecdh-key")
                        .takes_value(true)
                        .default_value("beta_ecdh_key.txt")
                        .help("File with the ECDH key B"),
                    Arg::with_name("in-original")
                        .long("in-original")
                        .takes_value(true)
                        .required(true)
                        .help("Original input file (phone tab beta_user_id)"),
                    Arg::with_name("in-alpha-enc")
                        .long("in-alpha-enc")
                        .takes_value(true)
                        .default_value("alpha_encrypted.tsv.gz")
                        .help("File H_K(phone_a)^A from alpha"),
                    Arg::with_name("in-beta-enc")
                        .long("in-beta-enc")
                        .takes_value(true)
                        .default_value("beta_encrypted_a.tsv.gz")
                        .help("File H_K(phone_b)^BA from alpha"),
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .default_value("beta_final.tsv.gz")
                        .help("Output file index, H_K(phone_a)^AB, beta_user_id"),
                    batch_size_arg(),
                ]),
        )
        .subcommand(
            SubCommand::with_name("alpha-step2")
                .about("Alpha step 2: final alpha_user_id to beta_user_id mapping")
                .args(&[
                    Arg::with_name("in-original")
                        .long("in-original")
                        .takes_value(true)
                        .default_value("alpha_encrypted.tsv.gz")
                        .help("File index, alpha_user_id, H_K(phone_a)^A from step 1"),
                    Arg::with_name("in-beta")
                        .long("in-beta")
                        .takes_value(true)
                        .default_value("beta_final.tsv.gz")
                        .help("File index, H_K(phone_a)^AB, beta_user_id from beta"),
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .default_value("alpha_final.tsv.gz")
                        .help("Output file alpha_user_id, beta_user_id"),
                ]),
        )
        .subcommand(
            SubCommand::with_name("validate")
                .about("Count records and field distribution of a TSV file")
                .arg(
                    Arg::with_name("input")
                        .long("input")
                        .short("i")
                        .takes_value(true)
                        .required(true)
                        .help("Input file to validate"),
                ),
        )
        .get_matches();

    let outcome = match matches.subcommand() {
        ("beta-step1", Some(args)) => commands::beta_step1(args),
        ("alpha-step1", Some(args)) => commands::alpha_step1(args),
        ("beta-step2", Some(args)) => commands::beta_step2(args),
        ("alpha-step2", Some(args)) => commands::alpha_step2(args),
        ("validate", Some(args)) => commands::validate(args),
        _ => unreachable!("subcommand is required"),
    };

    if let Err(err) = outcome {
        eprintln!("{}", err);
        process::exit(1);
    }
}
