// =====================
// バージョン付きデータマイグレーション
// =====================
//
// fromVersion → toVersion の単一ホップを貪欲に繋いでチェーンを作る。
// 繋がらなければ保存データに触れる前に NoMigrationPath で中断する。
// 実行は必ずスナップショットを取ってから行い、途中で失敗しても
// 部分的に移行された状態は残さない（呼び出し側は元のバイト列で再試行できる）。

pub mod day_key;

use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::infrastructure::context_repo::ContextRepository;
use crate::infrastructure::store::{KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("no migration path from v{from} to v{to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("migration {id} failed: {cause}")]
    MigrationFailed { id: String, cause: String },
    #[error("migration {id} does not support rollback")]
    RollbackNotSupported { id: String },
    #[error("persisted data is corrupted: {0}")]
    DataCorruption(String),
    #[error("failed to write pre-migration backup: {0}")]
    BackupFailed(String),
}

/// スキーマバージョン間の1ホップ変換
pub trait Migration {
    fn id(&self) -> &str;
    fn from_version(&self) -> u32;
    fn to_version(&self) -> u32;

    fn migrate(&self, bytes: &[u8]) -> Result<Vec<u8>, MigrationError>;

    /// 逆方向変換はオプション
    fn rollback(&self, _bytes: &[u8]) -> Result<Vec<u8>, MigrationError> {
        Err(MigrationError::RollbackNotSupported {
            id: self.id().to_string(),
        })
    }
}

/// 1回のチェーン実行の報告
#[derive(Debug)]
pub struct MigrationResult {
    pub success: bool,
    pub from_version: u32,
    pub to_version: u32,
    pub timestamp: DateTime<Utc>,
    pub duration: std::time::Duration,
    pub migrations_applied: u32,
    pub error: Option<MigrationError>,
}

/// チェーン実行の結果。bytes は成功時は移行済み、失敗時は元のまま
#[derive(Debug)]
pub struct ChainRun {
    pub result: MigrationResult,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct MigrationRegistry {
    steps: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn register(&mut self, step: Box<dyn Migration>) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 貪欲な単一ホップ探索。
    /// 現在のバージョンに一致する fromVersion のステップを繰り返し辿る
    pub fn resolve_path(&self, from: u32, to: u32) -> Result<Vec<&dyn Migration>, MigrationError> {
        let mut path = Vec::new();
        let mut current = from;

        while current != to {
            let step = self
                .steps
                .iter()
                .find(|s| s.from_version() == current)
                .ok_or(MigrationError::NoMigrationPath { from, to })?;

            path.push(step.as_ref());
            current = step.to_version();

            // 循環防止。登録数を超えるホップは行き止まりと同じ扱い
            if path.len() > self.steps.len() {
                return Err(MigrationError::NoMigrationPath { from, to });
            }
        }
        Ok(path)
    }

    /// チェーンの実行。保存はしない（それは呼び出し側の責務）
    pub fn run_chain(&self, bytes: &[u8], from: u32, to: u32) -> ChainRun {
        let started = Instant::now();
        let timestamp = Utc::now();

        // 経路が完成しない場合、データに触れる前に中断する
        let path = match self.resolve_path(from, to) {
            Ok(p) => p,
            Err(e) => {
                return ChainRun {
                    result: MigrationResult {
                        success: false,
                        from_version: from,
                        to_version: to,
                        timestamp,
                        duration: started.elapsed(),
                        migrations_applied: 0,
                        error: Some(e),
                    },
                    bytes: bytes.to_vec(),
                };
            }
        };

        let mut current = bytes.to_vec();
        let mut applied: u32 = 0;

        for step in path {
            match step.migrate(&current) {
                Ok(next) => {
                    info!(
                        id = step.id(),
                        from = step.from_version(),
                        to = step.to_version(),
                        "migration step applied"
                    );
                    current = next;
                    applied += 1;
                }
                Err(e) => {
                    // 最初の失敗で停止。部分適用された結果は返さない
                    error!(id = step.id(), error = %e, "migration step failed");
                    return ChainRun {
                        result: MigrationResult {
                            success: false,
                            from_version: from,
                            to_version: to,
                            timestamp,
                            duration: started.elapsed(),
                            migrations_applied: applied,
                            error: Some(e),
                        },
                        bytes: bytes.to_vec(),
                    };
                }
            }
        }

        ChainRun {
            result: MigrationResult {
                success: true,
                from_version: from,
                to_version: to,
                timestamp,
                duration: started.elapsed(),
                migrations_applied: applied,
                error: None,
            },
            bytes: current,
        }
    }
}

/// ストア上のコンテキストブロブをターゲットバージョンまで移行する。
///
/// backup-before-mutate: 変更前のバイト列を必ずスナップショットキーへ
/// 退避してからチェーンを回し、成功した場合だけ書き戻す
pub fn run_store_migrations<S: KeyValueStore>(
    repo: &mut ContextRepository<S>,
    registry: &MigrationRegistry,
    target_version: u32,
) -> Result<Option<MigrationResult>, StoreError> {
    let bytes = match repo.context_bytes()? {
        Some(b) => b,
        // 保存データがなければ移行対象もない。バージョンだけ前に出す
        None => {
            repo.set_schema_version(target_version)?;
            return Ok(None);
        }
    };

    // バージョン未記録の既存データは v1 として扱う
    let current = repo.schema_version()?.unwrap_or(1);
    if current >= target_version {
        return Ok(None);
    }

    if let Err(e) = repo.save_migration_snapshot(bytes.clone()) {
        // スナップショットが書けないなら移行は始めない
        let result = MigrationResult {
            success: false,
            from_version: current,
            to_version: target_version,
            timestamp: Utc::now(),
            duration: std::time::Duration::ZERO,
            migrations_applied: 0,
            error: Some(MigrationError::BackupFailed(e.to_string())),
        };
        return Ok(Some(result));
    }

    let run = registry.run_chain(&bytes, current, target_version);
    if run.result.success {
        repo.set_context_bytes(run.bytes)?;
        repo.set_schema_version(target_version)?;
        info!(
            from = current,
            to = target_version,
            applied = run.result.migrations_applied,
            "schema migration completed"
        );
    }
    Ok(Some(run.result))
}
