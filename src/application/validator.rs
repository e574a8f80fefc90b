// =====================
// 基準日バリデーター
// =====================

use chrono::{Months, NaiveDate};

use crate::application::checksum::verify_checksum;
use crate::domain::context::BackupSnapshot;

/// 基準日が過去に遡れる上限（年）
const MAX_AGE_YEARS: u32 = 2;
/// 基準日が未来に設定できる上限（日）
const MAX_DAYS_AHEAD: i64 = 1;

/// 検証の結果。失敗もすべて戻り値であり、例外としては伝播しない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    /// 基準日そのものが保存されていない
    Missing,
    /// setupIndex が保存されていない
    SetupIndexMissing,
    /// 基準日が明日より先にある
    FutureDate { days_ahead: i64 },
    /// 基準日が2年より古い
    TooOld { years_old: i64 },
    /// 保存されたチェックサムと再計算値の不一致
    ChecksumMismatch,
    /// プライマリ自体は正常だが、バックアップスナップショットと食い違う
    BackupMismatch,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// リカバリー（バックアップ復元またはウィザード）が必要かどうか
    pub fn requires_recovery(&self) -> bool {
        !self.is_valid()
    }

    pub fn description(&self) -> String {
        match self {
            ValidationResult::Valid => "reference date is valid".to_string(),
            ValidationResult::Missing => "no reference date is stored".to_string(),
            ValidationResult::SetupIndexMissing => {
                "no setup index is stored for the reference date".to_string()
            }
            ValidationResult::FutureDate { days_ahead } => {
                format!("reference date is {} day(s) in the future", days_ahead)
            }
            ValidationResult::TooOld { years_old } => {
                format!("reference date is {} year(s) old", years_old)
            }
            ValidationResult::ChecksumMismatch => {
                "stored checksum does not match the reference date".to_string()
            }
            ValidationResult::BackupMismatch => {
                "reference date disagrees with its backup snapshot".to_string()
            }
        }
    }
}

/// 基準日と setupIndex の整合性を検査する。
/// 状態は持たず、「今日」は呼び出し側から渡す（テスト分離のため）
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceDateValidator;

impl ReferenceDateValidator {
    pub fn new() -> Self {
        Self
    }

    /// 規則は順番に適用される:
    /// 日付がある → index がある → 未来すぎない → 古すぎない → チェックサム一致。
    /// チェックサム未保存の旧データは許容する（以後の保存で生成される）
    pub fn validate(
        &self,
        today: NaiveDate,
        reference_date: Option<NaiveDate>,
        setup_index: Option<usize>,
        stored_checksum: Option<&str>,
    ) -> ValidationResult {
        let date = match reference_date {
            Some(d) => d,
            None => return ValidationResult::Missing,
        };
        let index = match setup_index {
            Some(i) => i,
            None => return ValidationResult::SetupIndexMissing,
        };

        let days_ahead = (date - today).num_days();
        if days_ahead > MAX_DAYS_AHEAD {
            return ValidationResult::FutureDate { days_ahead };
        }

        // 閏年をまたぐと 2 年が 731 日になるため、日数ではなく暦で比較する
        let earliest = today.checked_sub_months(Months::new(12 * MAX_AGE_YEARS));
        if let Some(earliest) = earliest {
            if date < earliest {
                let days_old = (today - date).num_days();
                return ValidationResult::TooOld {
                    years_old: days_old / 365,
                };
            }
        }

        if let Some(stored) = stored_checksum {
            if !verify_checksum(date, index, stored) {
                return ValidationResult::ChecksumMismatch;
            }
        }

        ValidationResult::Valid
    }

    /// プライマリの検証に加えてバックアップスナップショットと突き合わせる。
    /// 日単位の日付または index の不一致は、プライマリ単体が
    /// 正常でも BackupMismatch としてリカバリー要求になる
    pub fn validate_with_backup(
        &self,
        today: NaiveDate,
        reference_date: Option<NaiveDate>,
        setup_index: Option<usize>,
        stored_checksum: Option<&str>,
        backup: Option<&BackupSnapshot>,
    ) -> ValidationResult {
        let primary = self.validate(today, reference_date, setup_index, stored_checksum);
        if !primary.is_valid() {
            return primary;
        }

        if let Some(snapshot) = backup {
            let date_matches = reference_date == Some(snapshot.reference_date);
            let index_matches = setup_index == Some(snapshot.setup_index);
            if !date_matches || !index_matches {
                return ValidationResult::BackupMismatch;
            }
        }

        ValidationResult::Valid
    }
}
