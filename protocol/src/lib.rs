#![forbid(unsafe_code)]
#![crate_name = "protocol"]

#[macro_use]
extern crate log;

pub mod alpha;
pub mod beta;
pub mod phone;

mod stream;

pub use stream::StageStats;

use common::tsv::TsvError;
use crypto::errors::CryptoError;

/// Stage-fatal failures. Inside the worker pool an error stays scoped to
/// its task; the stage driver keeps the first one and surfaces it after the
/// drain.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("stream failure: {0}")]
    Io(#[from] TsvError),

    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    #[error("line {line}: expected {expected} fields, got {got}")]
    MalformedRecord {
        line: u64,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: phone number is not E.164 (+[country code][number], 7-15 digits)")]
    InvalidPhone { line: u64 },
}
