// =====================
// 整合性チェックサム
// =====================
//
// (基準日エポック秒, setupIndex, salt) を固定形式の文字列にして
// sha256 → 先頭8バイトを16進表記した 16 文字の指紋。
// 純粋関数で、I/Oも時刻取得もしない。

use std::fmt::Write as _;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::domain::context::reference_epoch;

const CHECKSUM_SALT: &str = "shift-core.reference.v1";

/// チェックサムの長さ（16進文字数）
pub const CHECKSUM_LEN: usize = 16;

pub fn generate_checksum(reference_date: NaiveDate, setup_index: usize) -> String {
    let input = format!(
        "{}_{}_{}",
        reference_epoch(reference_date),
        setup_index,
        CHECKSUM_SALT
    );

    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(CHECKSUM_LEN);
    for byte in digest.iter().take(CHECKSUM_LEN / 2) {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

pub fn verify_checksum(reference_date: NaiveDate, setup_index: usize, stored: &str) -> bool {
    generate_checksum(reference_date, setup_index) == stored
}

#[cfg(test)]
mod checksum_tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// 往復性: verify(date, idx, generate(date, idx)) は常に true
    #[test]
    fn test_generate_verify_round_trip() {
        for (d, idx) in [
            (date(2024, 3, 15), 0),
            (date(2024, 3, 15), 4),
            (date(1999, 12, 31), 2),
            (date(2030, 1, 1), 7),
        ] {
            let checksum = generate_checksum(d, idx);
            assert_eq!(checksum.len(), CHECKSUM_LEN);
            assert!(verify_checksum(d, idx, &checksum));
        }
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let a = generate_checksum(date(2024, 3, 15), 2);
        let b = generate_checksum(date(2024, 3, 15), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_inputs_differ() {
        let base = generate_checksum(date(2024, 3, 15), 2);
        assert_ne!(base, generate_checksum(date(2024, 3, 16), 2));
        assert_ne!(base, generate_checksum(date(2024, 3, 15), 3));
    }
}
