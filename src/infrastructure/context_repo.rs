// =====================
// コンテキストリポジトリ
// =====================
//
// 永続化レイアウト（キー配置）を一手に引き受ける型付きリポジトリ。
// コンテキスト本体・チェックサム・バックアップ・上書きマップ・
// 各種フラグはすべてここを経由して読み書きされる。

use thiserror::Error;

use crate::application::checksum::generate_checksum;
use crate::domain::context::{BackupSnapshot, ContextDecodeError, ShiftContext};
use crate::domain::overrides::OverrideMap;
use crate::infrastructure::store::{KeyValueStore, StoreError};

pub mod keys {
    pub const CONTEXT: &str = "shift.context";
    pub const CHECKSUM: &str = "shift.context.checksum";
    pub const BACKUP: &str = "shift.context.backup";
    pub const OVERRIDES: &str = "shift.overrides";
    pub const NEEDS_VERIFICATION: &str = "shift.needsVerification";
    pub const SCHEMA_VERSION: &str = "shift.schemaVersion";
    pub const MIGRATION_SNAPSHOT: &str = "shift.migration.snapshot";

    /// マイグレーションごとの完了フラグ（冪等性の担保）
    pub fn migration_flag(id: &str) -> String {
        format!("shift.migration.done.{}", id)
    }
}

#[derive(Debug, Error)]
pub enum ContextLoadError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Decode(#[from] ContextDecodeError),
}

pub struct ContextRepository<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ContextRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // =====================
    // コンテキスト本体
    // =====================

    pub fn context_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get_raw(keys::CONTEXT)
    }

    /// マイグレーション実行後の移行済みバイト列の書き戻し専用
    pub fn set_context_bytes(&mut self, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.store.set_raw(keys::CONTEXT, bytes)
    }

    pub fn load_context(&self) -> Result<Option<ShiftContext>, ContextLoadError> {
        match self.context_bytes()? {
            Some(bytes) => Ok(Some(ShiftContext::from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// コンテキストの保存。
    /// 保存が成功するたびにチェックサムとバックアップスナップショットを
    /// 必ず再生成する（setupIndex がある場合）
    pub fn save_context(&mut self, ctx: &ShiftContext) -> Result<(), StoreError> {
        let bytes = ctx.to_json().map_err(|e| StoreError::Write {
            key: keys::CONTEXT.to_string(),
            cause: e.to_string(),
        })?;
        self.store.set_raw(keys::CONTEXT, bytes)?;

        if let Some(index) = ctx.setup_index {
            let checksum = generate_checksum(ctx.reference_date, index);
            self.store.set(keys::CHECKSUM, &checksum)?;
            self.store.set(
                keys::BACKUP,
                &BackupSnapshot {
                    reference_date: ctx.reference_date,
                    setup_index: index,
                },
            )?;
        }
        Ok(())
    }

    // =====================
    // チェックサム・バックアップ
    // =====================

    pub fn stored_checksum(&self) -> Result<Option<String>, StoreError> {
        self.store.get(keys::CHECKSUM)
    }

    pub fn backup_snapshot(&self) -> Result<Option<BackupSnapshot>, StoreError> {
        self.store.get(keys::BACKUP)
    }

    // =====================
    // 上書きマップ
    // =====================

    pub fn load_overrides(&self) -> Result<OverrideMap, StoreError> {
        Ok(self.store.get(keys::OVERRIDES)?.unwrap_or_default())
    }

    pub fn save_overrides(&mut self, overrides: &OverrideMap) -> Result<(), StoreError> {
        self.store.set(keys::OVERRIDES, overrides)
    }

    // =====================
    // フラグ類
    // =====================

    pub fn needs_verification(&self) -> Result<bool, StoreError> {
        Ok(self.store.get(keys::NEEDS_VERIFICATION)?.unwrap_or(false))
    }

    pub fn set_needs_verification(&mut self, value: bool) -> Result<(), StoreError> {
        self.store.set(keys::NEEDS_VERIFICATION, &value)
    }

    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        self.store.get(keys::SCHEMA_VERSION)
    }

    pub fn set_schema_version(&mut self, version: u32) -> Result<(), StoreError> {
        self.store.set(keys::SCHEMA_VERSION, &version)
    }

    pub fn migration_completed(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&keys::migration_flag(id))?.unwrap_or(false))
    }

    pub fn mark_migration_completed(&mut self, id: &str) -> Result<(), StoreError> {
        self.store.set(&keys::migration_flag(id), &true)
    }

    /// マイグレーション前のスナップショット保存（backup-before-mutate）
    pub fn save_migration_snapshot(&mut self, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.store.set_raw(keys::MIGRATION_SNAPSHOT, bytes)
    }
}
