// =====================
// バックアップマネージャー
// =====================

use tracing::{info, warn};

use crate::application::validator::ReferenceDateValidator;
use crate::domain::context::ShiftContext;
use crate::infrastructure::context_repo::ContextRepository;
use crate::infrastructure::store::{KeyValueStore, StoreError};

/// バックアップスナップショットからの復元を担当する。
/// スナップショットの書き込み自体は ContextRepository::save_context の
/// 保存規律に含まれている
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupManager;

impl BackupManager {
    pub fn new() -> Self {
        Self
    }

    /// バックアップが今日時点で有効なら、プライマリの基準日と setupIndex を
    /// スナップショットの値で書き戻す。成功時は復元後のコンテキストを返す。
    ///
    /// スナップショットが無い・無効・コンテキスト本体が読めない場合は
    /// 何も書き換えずに None を返す（ウィザードへの委譲を意味する）
    pub fn restore<S: KeyValueStore>(
        &self,
        repo: &mut ContextRepository<S>,
        today: chrono::NaiveDate,
    ) -> Result<Option<ShiftContext>, StoreError> {
        let snapshot = match repo.backup_snapshot()? {
            Some(s) => s,
            None => return Ok(None),
        };

        // 壊れたプライマリを壊れたバックアップで上書きしないための検査
        let validator = ReferenceDateValidator::new();
        let snapshot_result = validator.validate(
            today,
            Some(snapshot.reference_date),
            Some(snapshot.setup_index),
            None,
        );
        if !snapshot_result.is_valid() {
            warn!(
                reason = %snapshot_result.description(),
                "backup snapshot is itself invalid; leaving primary untouched"
            );
            return Ok(None);
        }

        let current = match repo.load_context() {
            Ok(Some(ctx)) => ctx,
            // 本体が読めないならフィールドの移植先がない
            Ok(None) | Err(_) => return Ok(None),
        };

        // フィールド単位で書き換えず、差し替え用の値を丸ごと作る
        let mut restored = current;
        restored.reference_date = snapshot.reference_date;
        restored.setup_index = Some(snapshot.setup_index);

        // save_context がチェックサムとスナップショットを再生成する
        repo.save_context(&restored)?;

        info!(
            recovery = "backup_restore",
            reference_date = %restored.reference_date,
            setup_index = snapshot.setup_index,
            "restored reference date from backup snapshot"
        );

        Ok(Some(restored))
    }
}
