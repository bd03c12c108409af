//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! E.164 phone validation.

use regex::Regex;

use crate::ProtocolError;

lazy_static::lazy_static! {
    /// Leading `+`, country code starting 1-9, 7 to 15 digits total, no
    /// separators.
    static ref E164_REGEX: Regex = Regex::new(r"^\+[1-9]\d{6,14}$")
        .expect("Failed to build E164_REGEX");
}

/// Check one phone number; `line` is the 0-based record index carried into
/// the error.
pub fn validate_e164(phone: &str, line: u64) -> Result<(), ProtocolError> {
    if E164_REGEX.is_match(phone) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidPhone { line })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_e164() {
        for phone in ["+79991234567", "+12025550123", "+1234567", "+998901234567"] {
            assert!(validate_e164(phone, 0).is_ok(), "{} should pass", phone);
        }
        // 15 digits is the maximum
        assert!(validate_e164("+123456789012345", 0).is_ok());
    }

    #[test]
    fn rejects_everything_else() {
        for phone in [
            "79991234567",      // no plus
            "+0123456789",      // zero country code
            "+123456",          // 6 digits, too short
            "+1234567890123456",// 16 digits, too long
            "+7 999 123 45 67", // separators
            "+7999123456a",     // letters
            "",
            "+",
        ] {
            assert!(validate_e164(phone, 0).is_err(), "{} should fail", phone);
        }
    }

    #[test]
    fn error_carries_the_line() {
        match validate_e164("bogus", 41) {
            Err(ProtocolError::InvalidPhone { line }) => assert_eq!(line, 41),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
