// =====================
// 日キー移行（ゼロ埋め正規化）
// =====================
//
// 上書きマップのキーを旧形式（"2024-3-5"）から正規形（"2024-03-05"）へ
// 一度だけ書き換える。完了フラグにより再実行は no-op になる。
// 移行期間中の読み出しは OverrideMap::lookup の dual lookup が担う。

use tracing::info;

use crate::infrastructure::context_repo::ContextRepository;
use crate::infrastructure::store::{KeyValueStore, StoreError};

pub const DAY_KEY_MIGRATION_ID: &str = "dayKeyZeroPadding";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayKeyOutcome {
    /// 書き換えたキーの件数
    pub rewritten: usize,
    /// 完了フラグにより何もしなかった
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DayKeyMigration;

impl DayKeyMigration {
    pub fn new() -> Self {
        Self
    }

    pub fn migrate_if_needed<S: KeyValueStore>(
        &self,
        repo: &mut ContextRepository<S>,
    ) -> Result<DayKeyOutcome, StoreError> {
        if repo.migration_completed(DAY_KEY_MIGRATION_ID)? {
            return Ok(DayKeyOutcome {
                rewritten: 0,
                skipped: true,
            });
        }

        let mut overrides = repo.load_overrides()?;
        let rewritten = overrides.canonicalize_keys();
        if rewritten > 0 {
            repo.save_overrides(&overrides)?;
        }
        repo.mark_migration_completed(DAY_KEY_MIGRATION_ID)?;

        if rewritten > 0 {
            info!(rewritten, "override day keys canonicalized");
        }
        Ok(DayKeyOutcome {
            rewritten,
            skipped: false,
        })
    }
}

#[cfg(test)]
mod day_key_tests {
    use super::*;
    use crate::domain::overrides::{is_canonical_key, OverrideMap};
    use crate::domain::phase::Phase;
    use crate::infrastructure::store::MemoryStore;
    use chrono::NaiveDate;

    fn repo_with_legacy_keys() -> ContextRepository<MemoryStore> {
        let json = r#"{"2024-3-5":"leave","2024-03-06":"off"}"#;
        let overrides: OverrideMap = serde_json::from_str(json).unwrap();

        let mut repo = ContextRepository::new(MemoryStore::new());
        repo.save_overrides(&overrides).unwrap();
        repo
    }

    #[test]
    fn test_rewrites_legacy_keys_once() {
        let mut repo = repo_with_legacy_keys();
        let migration = DayKeyMigration::new();

        let outcome = migration.migrate_if_needed(&mut repo).unwrap();

        assert!(!outcome.skipped);
        assert_eq!(outcome.rewritten, 1);

        let overrides = repo.load_overrides().unwrap();
        for (key, _) in overrides.iter() {
            assert!(is_canonical_key(key));
        }
        assert_eq!(
            overrides.lookup(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            Some(Phase::Leave)
        );
    }

    /// 冪等性: 2回目の呼び出しは保存状態を変えず、追加の移行もゼロ
    #[test]
    fn test_second_invocation_is_a_noop() {
        let mut repo = repo_with_legacy_keys();
        let migration = DayKeyMigration::new();

        migration.migrate_if_needed(&mut repo).unwrap();
        let after_first = repo.load_overrides().unwrap();

        let outcome = migration.migrate_if_needed(&mut repo).unwrap();

        assert!(outcome.skipped);
        assert_eq!(outcome.rewritten, 0);
        assert_eq!(repo.load_overrides().unwrap(), after_first);
    }

    #[test]
    fn test_empty_map_still_marks_completion() {
        let mut repo = ContextRepository::new(MemoryStore::new());
        let migration = DayKeyMigration::new();

        let outcome = migration.migrate_if_needed(&mut repo).unwrap();
        assert!(!outcome.skipped);
        assert_eq!(outcome.rewritten, 0);

        assert!(repo.migration_completed(DAY_KEY_MIGRATION_ID).unwrap());
    }
}
