// =====================
// リカバリーウィザード
// =====================
//
// 破損した基準日を「今日のフェーズ」の確認で再計算する状態機械。
// 遷移は不変の状態値に対する純粋関数で、永続化などの副作用は
// コントローラー（RecoveryWizard）がイベントを発行する際に行う。

use thiserror::Error;
use tracing::{info, warn};

use crate::application::backup::BackupManager;
use crate::application::validator::ValidationResult;
use crate::domain::context::ShiftContext;
use crate::domain::phase::Phase;
use crate::infrastructure::context_repo::ContextRepository;
use crate::infrastructure::store::{KeyValueStore, StoreError};

/// ウィザードを起動した理由
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryReason {
    /// バリデーターが失敗を報告した
    Validation(ValidationResult),
    /// コンテキストのブロブ自体がデコードできなかった
    Undecodable(String),
    /// 前回 dismiss されたまま未解決（needsVerification フラグ）
    PendingVerification,
}

impl RecoveryReason {
    pub fn description(&self) -> String {
        match self {
            RecoveryReason::Validation(result) => result.description(),
            RecoveryReason::Undecodable(cause) => {
                format!("stored context could not be decoded: {}", cause)
            }
            RecoveryReason::PendingVerification => {
                "verification was dismissed on a previous launch".to_string()
            }
        }
    }
}

/// idle → presenting → processingSelection → {completed | failed | dismissed}。
/// idle は初期状態かつ再突入可能。右の3つはその起動回における終端
#[derive(Debug, Clone, PartialEq)]
pub enum WizardState {
    Idle,
    Presenting {
        reason: RecoveryReason,
        phases: Vec<Phase>,
    },
    ProcessingSelection {
        selected: Phase,
    },
    Completed,
    Failed {
        message: String,
    },
    Dismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    Start {
        reason: RecoveryReason,
        phases: Vec<Phase>,
    },
    Select(Phase),
    Succeed,
    Fail(String),
    Dismiss,
    /// 終端状態から idle へ戻す（ホスト側の自動クローズに相当）
    Reset,
}

impl Default for WizardState {
    fn default() -> Self {
        WizardState::Idle
    }
}

impl WizardState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WizardState::Completed | WizardState::Failed { .. } | WizardState::Dismissed
        )
    }

    /// 純粋な遷移関数。定義外の (状態, イベント) の組では状態を変えない
    pub fn next(self, event: WizardEvent) -> WizardState {
        match (self, event) {
            (WizardState::Idle, WizardEvent::Start { reason, phases }) => {
                WizardState::Presenting { reason, phases }
            }
            (WizardState::Presenting { .. }, WizardEvent::Select(phase)) => {
                WizardState::ProcessingSelection { selected: phase }
            }
            (WizardState::ProcessingSelection { .. }, WizardEvent::Succeed) => {
                WizardState::Completed
            }
            (WizardState::ProcessingSelection { .. }, WizardEvent::Fail(message)) => {
                WizardState::Failed { message }
            }
            (WizardState::Presenting { .. }, WizardEvent::Dismiss) => WizardState::Dismissed,
            (state, WizardEvent::Reset) if state.is_terminal() => WizardState::Idle,
            (state, _) => state,
        }
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("wizard is not presenting a verification prompt")]
    NotPresenting,
    #[error("phase {0:?} is not part of the active cycle")]
    PhaseNotInCycle(Phase),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 状態値を保持し、イベント発行と副作用（永続化）を束ねるコントローラー
#[derive(Debug, Clone, Default)]
pub struct RecoveryWizard {
    state: WizardState,
}

impl RecoveryWizard {
    pub fn new() -> Self {
        Self {
            state: WizardState::Idle,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    fn apply(&mut self, event: WizardEvent) {
        self.state = std::mem::take(&mut self.state).next(event);
    }

    /// 起動理由を記録し、選択肢をユーザーに見せられるフェーズへ絞って
    /// presenting に入る
    pub fn start_verification(&mut self, reason: RecoveryReason, available_phases: &[Phase]) {
        let phases: Vec<Phase> = available_phases
            .iter()
            .copied()
            .filter(|p| p.is_user_visible())
            .collect();

        info!(reason = %reason.description(), "starting reference date verification");
        self.apply(WizardEvent::Start { reason, phases });
    }

    /// 「今日のフェーズ」の確定。
    ///
    /// フェーズが周期内に見つかれば、基準日=今日・setupIndex=その位置で
    /// コンテキストを丸ごと差し替えて保存し（チェックサムとバックアップは
    /// 保存規律で再生成される）、新しいコンテキストを返す。
    /// 呼び出し側はこれを受けて下流のスケジュールを再計算する。
    ///
    /// フェーズが周期に無い場合は failed に遷移し、保存データには触れない
    pub fn complete_verification<S: KeyValueStore>(
        &mut self,
        repo: &mut ContextRepository<S>,
        ctx: &ShiftContext,
        today: chrono::NaiveDate,
        today_phase: Phase,
    ) -> Result<ShiftContext, WizardError> {
        if !matches!(self.state, WizardState::Presenting { .. }) {
            return Err(WizardError::NotPresenting);
        }
        self.apply(WizardEvent::Select(today_phase));

        let system = ctx.system();
        let index = match system.phase_index(today_phase) {
            Some(i) => i,
            None => {
                let message = format!(
                    "phase {:?} does not occur in system {:?}",
                    today_phase, system.id
                );
                warn!(%message, "verification failed");
                self.apply(WizardEvent::Fail(message));
                return Err(WizardError::PhaseNotInCycle(today_phase));
            }
        };

        let mut updated = ctx.clone();
        updated.reference_date = today;
        updated.setup_index = Some(index);

        if let Err(e) = repo.save_context(&updated) {
            self.apply(WizardEvent::Fail(e.to_string()));
            return Err(WizardError::Store(e));
        }
        if let Err(e) = repo.set_needs_verification(false) {
            self.apply(WizardEvent::Fail(e.to_string()));
            return Err(WizardError::Store(e));
        }

        info!(
            recovery = "wizard_verification",
            reference_date = %updated.reference_date,
            setup_index = index,
            "reference date recomputed from today's phase"
        );
        self.apply(WizardEvent::Succeed);
        Ok(updated)
    }

    /// ウィザードを閉じる。
    ///
    /// use_fallback が真で有効なバックアップがあればそこから復元する。
    /// 復元できなければ needsVerification フラグを立てて次回起動に持ち越す
    pub fn dismiss<S: KeyValueStore>(
        &mut self,
        repo: &mut ContextRepository<S>,
        today: chrono::NaiveDate,
        use_fallback: bool,
    ) -> Result<Option<ShiftContext>, StoreError> {
        let restored = if use_fallback {
            BackupManager::new().restore(repo, today)?
        } else {
            None
        };

        match &restored {
            Some(_) => {
                repo.set_needs_verification(false)?;
            }
            None => {
                repo.set_needs_verification(true)?;
                warn!("verification dismissed without resolution; flagged for next launch");
            }
        }

        self.apply(WizardEvent::Dismiss);
        Ok(restored)
    }

    /// 終端状態の表示をホストが閉じたあと、idle に戻す
    pub fn acknowledge(&mut self) {
        self.apply(WizardEvent::Reset);
    }
}
