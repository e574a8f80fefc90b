// =====================
// 日単位の手動上書きマップ
// =====================
//
// キーは "YYYY-MM-DD"（ゼロ埋め）の正規形。
// 旧形式（月・日がゼロ埋めされていない "2024-3-5" など）のキーは
// DayKeyMigration が一度だけ正規形へ書き換えるが、移行期間中の読み出しの
// ために両形式を引ける dual lookup を提供する。

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::phase::Phase;

/// 正規形のキー（ゼロ埋め YYYY-MM-DD）
pub fn canonical_day_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// 旧形式のキー（ゼロ埋めなし）
pub fn legacy_day_key(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}

/// キーを暦日として解釈する。正規形・旧形式のどちらも受け付ける
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    let mut parts = key.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// ゼロ埋め済みの正規形かどうか
pub fn is_canonical_key(key: &str) -> bool {
    match parse_day_key(key) {
        Some(date) => canonical_day_key(date) == key,
        None => false,
    }
}

/// 解釈はできるが正規形ではない（= 移行対象の旧形式）かどうか
pub fn is_legacy_key(key: &str) -> bool {
    parse_day_key(key).is_some() && !is_canonical_key(key)
}

/// dayKey → Phase のマップ。所有者はコンテキストの利用側で、
/// エンジンからは上書きレイヤとして読み取り専用で参照される
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideMap {
    entries: HashMap<String, Phase>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, phase: Phase) {
        self.entries.insert(canonical_day_key(date), phase);
    }

    /// 正規形→旧形式の順で引く dual lookup
    pub fn lookup(&self, date: NaiveDate) -> Option<Phase> {
        self.entries
            .get(&canonical_day_key(date))
            .or_else(|| self.entries.get(&legacy_day_key(date)))
            .copied()
    }

    pub fn remove(&mut self, date: NaiveDate) {
        self.entries.remove(&canonical_day_key(date));
        self.entries.remove(&legacy_day_key(date));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Phase)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// 旧形式キーをすべて正規形に書き換える。戻り値は書き換えた件数。
    /// 正規形キーが既に存在する場合はそちらを残し、旧キーは捨てる
    pub fn canonicalize_keys(&mut self) -> usize {
        let legacy: Vec<String> = self
            .entries
            .keys()
            .filter(|k| is_legacy_key(k))
            .cloned()
            .collect();

        let mut rewritten = 0;
        for key in legacy {
            if let Some(phase) = self.entries.remove(&key) {
                let canonical = match parse_day_key(&key) {
                    Some(date) => canonical_day_key(date),
                    None => continue,
                };
                self.entries.entry(canonical).or_insert(phase);
                rewritten += 1;
            }
        }
        rewritten
    }
}

#[cfg(test)]
mod overrides_tests {
    use super::*;

    #[test]
    fn test_key_classification() {
        assert!(is_canonical_key("2024-03-05"));
        assert!(!is_legacy_key("2024-03-05"));

        assert!(is_legacy_key("2024-3-5"));
        assert!(is_legacy_key("2024-03-5"));
        assert!(is_legacy_key("2024-3-05"));

        // 日付として無効なキーはどちらでもない
        assert!(!is_canonical_key("2024-13-40"));
        assert!(!is_legacy_key("2024-13-40"));
        assert!(!is_legacy_key("not-a-date"));
    }

    #[test]
    fn test_dual_lookup_reads_both_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        // 旧形式キーで直接書かれたデータ（移行前の状態を再現）
        let json = r#"{"2024-3-5":"leave"}"#;
        let map: OverrideMap = serde_json::from_str(json).unwrap();

        assert_eq!(map.lookup(date), Some(Phase::Leave));

        // 正規形で書けば正規形で引ける
        let mut map = OverrideMap::new();
        map.insert(date, Phase::Morning);
        assert_eq!(map.lookup(date), Some(Phase::Morning));
    }

    #[test]
    fn test_canonicalize_rewrites_only_legacy_keys() {
        let json = r#"{"2024-3-5":"leave","2024-03-06":"off","2024-12-7":"night"}"#;
        let mut map: OverrideMap = serde_json::from_str(json).unwrap();

        let rewritten = map.canonicalize_keys();

        assert_eq!(rewritten, 2);
        assert_eq!(map.len(), 3);
        assert_eq!(
            map.lookup(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            Some(Phase::Leave)
        );
        assert_eq!(
            map.lookup(NaiveDate::from_ymd_opt(2024, 12, 7).unwrap()),
            Some(Phase::Night)
        );
        // すべて正規形になっている
        for (key, _) in map.iter() {
            assert!(is_canonical_key(key), "{} が正規形でない", key);
        }
    }

    #[test]
    fn test_canonicalize_keeps_existing_canonical_on_conflict() {
        // 同じ日の旧形式と正規形が衝突した場合、正規形の値が勝つ
        let json = r#"{"2024-3-5":"leave","2024-03-05":"night"}"#;
        let mut map: OverrideMap = serde_json::from_str(json).unwrap();

        map.canonicalize_keys();

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.lookup(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            Some(Phase::Night)
        );
    }
}
