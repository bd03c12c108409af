//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use clap::App;
use clap::Arg;
use log::info;

use common::tsv::RecordWrite;
use common::tsv::TsvError;
use common::tsv::TsvWriter;

pub mod gen {
    use rand::prelude::SliceRandom;
    use rand::thread_rng;
    use rand::Rng;

    pub struct Data {
        pub alpha: Vec<String>,
        pub beta: Vec<String>,
    }

    /// Random E.164 phones for both parties with a planted overlap.
    pub fn random_data(alpha_size: usize, beta_size: usize, intersection_size: usize) -> Data {
        let intersection = random_phones(intersection_size);
        let mut rng = thread_rng();

        let mut alpha = random_phones(alpha_size);
        alpha.extend_from_slice(&intersection);
        alpha.shuffle(&mut rng);

        let mut beta = random_phones(beta_size);
        beta.extend_from_slice(&intersection);
        beta.shuffle(&mut rng);

        Data { alpha, beta }
    }

    fn random_phones(size: usize) -> Vec<String> {
        (0..size).map(|_| random_phone()).collect()
    }

    fn random_phone() -> String {
        let mut rng = thread_rng();
        format!("+7999{:07}", rng.gen_range(0..10_000_000))
    }
}

fn write_party_file(phones: &[String], id_prefix: &str, path: &str) -> Result<(), TsvError> {
    let mut writer = TsvWriter::create(path)?;
    for (i, phone) in phones.iter().enumerate() {
        writer.write(&[phone.clone(), format!("{}_{:06}", id_prefix, i)])?;
    }
    writer.close()
}

fn main() {
    env_logger::init();

    let matches = App::new("Datagen util")
        .version("0.1")
        .about("Generates paired party inputs for protocol runs")
        .args(&[
            Arg::with_name("alpha-size")
                .long("alpha-size")
                .takes_value(true)
                .default_value("1000")
                .help("Records unique to the alpha file"),
            Arg::with_name("beta-size")
                .long("beta-size")
                .takes_value(true)
                .default_value("1000")
                .help("Records unique to the beta file"),
            Arg::with_name("intersection-size")
                .long("intersection-size")
                .takes_value(true)
                .default_value("100")
                .help("Phones planted in both files"),
            Arg::with_name("alpha-out")
                .long("alpha-out")
                .takes_value(true)
                .default_value("alpha_data.tsv")
                .help("Output path for the alpha input"),
            Arg::with_name("beta-out")
                .long("beta-out")
                .takes_value(true)
                .default_value("beta_data.tsv")
                .help("Output path for the beta input"),
        ])
        .get_matches();

    let alpha_size = matches
        .value_of("alpha-size")
        .unwrap()
        .parse::<usize>()
        .expect("--alpha-size must be a number");
    let beta_size = matches
        .value_of("beta-size")
        .unwrap()
        .parse::<usize>()
        .expect("--beta-size must be a number");
    let intersection_size = matches
        .value_of("intersection-size")
        .unwrap()
        .parse::<usize>()
        .expect("--intersection-size must be a number");
    let alpha_out = matches.value_of("alpha-out").unwrap();
    let beta_out = matches.value_of("beta-out").unwrap();

    let data = gen::random_data(alpha_size, beta_size, intersection_size);
    write_party_file(&data.alpha, "puid", alpha_out).expect("Failed to write alpha file");
    write_party_file(&data.beta, "user", beta_out).expect("Failed to write beta file");

    info!("alpha: {} records -> {}", data.alpha.len(), alpha_out);
    info!("beta: {} records -> {}", data.beta.len(), beta_out);
}
