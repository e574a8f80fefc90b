// =====================
// 起動シーケンス
// =====================
//
// マイグレーション → コンテキスト読み込み → 検証 → サイレント復旧、の順。
// 復旧しきれない場合はウィザード起動の要求として結果を返し、
// ここでは例外を外に出さない。

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::application::backup::BackupManager;
use crate::application::validator::{ReferenceDateValidator, ValidationResult};
use crate::application::wizard::RecoveryReason;
use crate::domain::context::ShiftContext;
use crate::infrastructure::context_repo::{ContextLoadError, ContextRepository};
use crate::infrastructure::store::{KeyValueStore, StoreError};
use crate::migration::day_key::DayKeyMigration;
use crate::migration::{run_store_migrations, MigrationRegistry};

/// 起動シーケンスの結末。
/// Ready のコンテキストだけがエンジンに渡ってよい
#[derive(Debug)]
pub enum StartupOutcome {
    Ready {
        context: ShiftContext,
    },
    /// ウィザードによるユーザー確認が必要。
    /// context はデコードできた場合のみ入る（ウィザードの周期解決に使う）
    NeedsVerification {
        context: Option<ShiftContext>,
        reason: RecoveryReason,
    },
    /// 何も保存されていない（初回起動）
    NotConfigured,
}

pub fn run_startup<S: KeyValueStore>(
    repo: &mut ContextRepository<S>,
    registry: &MigrationRegistry,
    target_version: u32,
    today: NaiveDate,
) -> Result<StartupOutcome, StoreError> {
    // 1. スキーマ移行。失敗しても保存データは移行前のまま残っているので、
    //    そのまま検証に進む（たいてい下でウィザード行きになる）
    if let Some(result) = run_store_migrations(repo, registry, target_version)? {
        if !result.success {
            warn!(
                from = result.from_version,
                to = result.to_version,
                error = ?result.error,
                "schema migration failed; continuing with pre-migration data"
            );
        }
    }

    // 2. 日キーの正規化（完了フラグ付きなので何度呼んでも安全）
    DayKeyMigration::new().migrate_if_needed(repo)?;

    // 3. コンテキスト読み込み
    let ctx = match repo.load_context() {
        Ok(Some(ctx)) => ctx,
        Ok(None) => return Ok(StartupOutcome::NotConfigured),
        Err(ContextLoadError::Store(e)) => return Err(e),
        Err(ContextLoadError::Decode(e)) => {
            warn!(error = %e, "stored context is undecodable");
            return Ok(StartupOutcome::NeedsVerification {
                context: None,
                reason: RecoveryReason::Undecodable(e.to_string()),
            });
        }
    };

    // 4. 検証（プライマリ + バックアップ突き合わせ）
    let validator = ReferenceDateValidator::new();
    let checksum = repo.stored_checksum()?;
    let backup = repo.backup_snapshot()?;
    let result = validator.validate_with_backup(
        today,
        Some(ctx.reference_date),
        ctx.setup_index,
        checksum.as_deref(),
        backup.as_ref(),
    );

    if result.is_valid() {
        // チェックサム未保存の旧データはここで生成して前に進める
        if checksum.is_none() && ctx.setup_index.is_some() {
            repo.save_context(&ctx)?;
            info!("checksum generated for legacy context");
        }

        // 前回 dismiss されたままなら有効でも確認を求める
        if repo.needs_verification()? {
            return Ok(StartupOutcome::NeedsVerification {
                context: Some(ctx),
                reason: RecoveryReason::PendingVerification,
            });
        }
        return Ok(StartupOutcome::Ready { context: ctx });
    }

    // 5. 旧形式: setupIndex が無くても startPhase から導けるなら
    //    その場で引き上げて保存し直す
    if result == ValidationResult::SetupIndexMissing {
        let system = ctx.system();
        if let Some(index) = ctx.effective_setup_index(&system) {
            let mut upgraded = ctx.clone();
            upgraded.setup_index = Some(index);
            let recheck =
                validator.validate(today, Some(upgraded.reference_date), Some(index), None);
            if recheck.is_valid() {
                repo.save_context(&upgraded)?;
                info!(setup_index = index, "legacy start phase upgraded to setup index");
                return Ok(StartupOutcome::Ready { context: upgraded });
            }
        }
    }

    // 6. サイレント復旧。バックアップが有効ならユーザーに聞かずに直す
    if let Some(restored) = BackupManager::new().restore(repo, today)? {
        return Ok(StartupOutcome::Ready { context: restored });
    }

    // 7. ここまで来たらウィザードに委ねる
    warn!(reason = %result.description(), "context requires user verification");
    Ok(StartupOutcome::NeedsVerification {
        context: Some(ctx),
        reason: RecoveryReason::Validation(result),
    })
}
