//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

extern crate criterion;
extern crate crypto;

use criterion::*;
use crypto::ecdh::EcdhKey;
use crypto::mac::HmacKey;
use crypto::mac::KeyedMac;

fn tag_inputs(n: usize) -> Vec<[u8; 32]> {
    let key = HmacKey::generate().unwrap();
    (0..n)
        .map(|i| key.tag(format!("+7999{:07}", i).as_bytes()))
        .collect()
}

fn hmac_tags(n: usize, c: &mut Criterion) {
    let key = HmacKey::generate().unwrap();
    let mac = KeyedMac::new(&key);
    let phones: Vec<String> = (0..n).map(|i| format!("+7999{:07}", i)).collect();
    c.bench_function(format!("hmac tag, size: {}", n).as_str(), move |b| {
        b.iter(|| {
            for phone in phones.iter() {
                black_box(mac.tag(phone.as_bytes()));
            }
        })
    });
}

fn apply_tags(n: usize, c: &mut Criterion) {
    let key = EcdhKey::generate().unwrap();
    let tags = tag_inputs(n);
    c.bench_function(format!("ecdh apply tag, size: {}", n).as_str(), move |b| {
        b.iter(|| {
            for tag in tags.iter() {
                black_box(key.apply_bytes(tag).unwrap());
            }
        })
    });
}

fn apply_points(n: usize, c: &mut Criterion) {
    let key_a = EcdhKey::generate().unwrap();
    let key_b = EcdhKey::generate().unwrap();
    let points: Vec<String> = tag_inputs(n)
        .iter()
        .map(|tag| key_a.apply_bytes(tag).unwrap())
        .collect();
    c.bench_function(
        format!("ecdh apply point, size: {}", n).as_str(),
        move |b| {
            b.iter(|| {
                for point in points.iter() {
                    black_box(key_b.apply(point).unwrap());
                }
            })
        },
    );
}

fn bench(c: &mut Criterion) {
    hmac_tags(1000, c);
    apply_tags(100, c);
    apply_points(100, c);
}

criterion_group!(benches, bench);
criterion_main!(benches);
