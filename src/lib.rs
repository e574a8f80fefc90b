pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod migration;

use infrastructure::context_repo::ContextRepository;
use infrastructure::store::KeyValueStore;
use migration::MigrationRegistry;

pub use application::bootstrap::{run_startup, StartupOutcome};
pub use application::validator::{ReferenceDateValidator, ValidationResult};
pub use application::wizard::{RecoveryReason, RecoveryWizard, WizardState};
pub use domain::context::ShiftContext;
pub use domain::engine::ShiftEngine;
pub use domain::phase::{Phase, ShiftSystemId};

/// 現在の保存データのスキーマバージョン
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// =====================
// サービスコンテナ
// =====================

/// コアの協調オブジェクトを一括で保持するコンテナ。
/// グローバルに持たず、ホスト側が生成して引き回す。
pub struct CoreServices<S: KeyValueStore> {
    pub repo: ContextRepository<S>,
    pub registry: MigrationRegistry,
    pub wizard: RecoveryWizard,
}

impl<S: KeyValueStore> CoreServices<S> {
    pub fn new(store: S) -> Self {
        Self {
            repo: ContextRepository::new(store),
            registry: MigrationRegistry::new(),
            wizard: RecoveryWizard::new(),
        }
    }

    /// 起動シーケンスを実行する。
    /// マイグレーション → 検証 → （必要なら）サイレント復旧 の順。
    pub fn startup(
        &mut self,
        today: chrono::NaiveDate,
    ) -> Result<StartupOutcome, infrastructure::store::StoreError> {
        run_startup(&mut self.repo, &self.registry, CURRENT_SCHEMA_VERSION, today)
    }
}
