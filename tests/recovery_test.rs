#[cfg(test)]
mod recovery_tests {
    use chrono::NaiveDate;

    use shift_core::domain::context::{ContextZone, ShiftContext};
    use shift_core::domain::engine::ShiftEngine;
    use shift_core::infrastructure::store::MemoryStore;
    use shift_core::{
        CoreServices, Phase, RecoveryReason, ShiftSystemId, StartupOutcome, ValidationResult,
        WizardState,
    };

    // ========================================================================
    // 1. テスト用セットアップ
    // ========================================================================

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn services() -> CoreServices<MemoryStore> {
        CoreServices::new(MemoryStore::new())
    }

    fn context(reference: NaiveDate, setup_index: usize) -> ShiftContext {
        let mut ctx = ShiftContext::new(ShiftSystemId::ThreeShiftFive, reference);
        ctx.setup_index = Some(setup_index);
        ctx.zone = ContextZone::Named(chrono_tz::UTC);
        ctx
    }

    // ========================================================================
    // 2. 起動と検証の正常系
    // ========================================================================

    #[test]
    fn test_first_launch_then_configure_then_ready() {
        let mut services = services();
        let today = date(2024, 3, 16);

        // [Act] 何も保存されていない初回起動
        let outcome = services.startup(today).unwrap();

        // [Assert]
        assert!(matches!(outcome, StartupOutcome::NotConfigured));

        // [Act] 設定を保存してもう一度起動
        let ctx = context(date(2024, 3, 15), 2);
        services.repo.save_context(&ctx).unwrap();
        let outcome = services.startup(today).unwrap();

        // [Assert] そのまま Ready で、エンジンに渡せるコンテキストが返る
        match outcome {
            StartupOutcome::Ready { context } => {
                assert_eq!(context, ctx);
                let engine = ShiftEngine::for_context(&context);
                // setupIndex=2 (Night) の翌日は周期の position 3 (Off)
                assert_eq!(engine.phase_for_date(&context, today), Phase::Off);
            }
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_tampered_primary_is_restored_from_backup_silently() {
        // [Setup] 正常保存後、プライマリの基準日だけをずらす
        let mut services = services();
        let today = date(2024, 3, 16);
        let ctx = context(date(2024, 3, 15), 2);
        services.repo.save_context(&ctx).unwrap();

        let mut tampered = ctx.clone();
        tampered.reference_date = date(2024, 2, 1);
        services
            .repo
            .set_context_bytes(tampered.to_json().unwrap())
            .unwrap();

        // [Act]
        let outcome = services.startup(today).unwrap();

        // [Assert] ユーザーに聞くことなくバックアップの値が書き戻されている
        match outcome {
            StartupOutcome::Ready { context } => {
                assert_eq!(context.reference_date, date(2024, 3, 15));
                assert_eq!(context.setup_index, Some(2));
            }
            other => panic!("expected silent restore, got {:?}", other),
        }
        let reloaded = services.repo.load_context().unwrap().unwrap();
        assert_eq!(reloaded.reference_date, date(2024, 3, 15));
    }

    // ========================================================================
    // 3. ウィザードによる復旧
    // ========================================================================

    #[test]
    fn test_wizard_recovers_a_context_too_old_to_trust() {
        // [Setup] 2年以上前の基準日。バックアップも同じ値なので復元では直らない
        let mut services = services();
        let today = date(2024, 3, 16);
        let stale = context(date(2021, 3, 15), 1);
        services.repo.save_context(&stale).unwrap();

        // [Act] 起動はウィザード行きになる
        let outcome = services.startup(today).unwrap();
        let (ctx, reason) = match outcome {
            StartupOutcome::NeedsVerification {
                context: Some(ctx),
                reason,
            } => (ctx, reason),
            other => panic!("expected NeedsVerification, got {:?}", other),
        };
        assert!(matches!(
            reason,
            RecoveryReason::Validation(ValidationResult::TooOld { years_old: 3 })
        ));

        // [Act] ウィザードを開始し、「今日は夜勤」とユーザーが答える
        let phases = ctx.system().distinct_phases();
        services.wizard.start_verification(reason, &phases);
        match services.wizard.state() {
            WizardState::Presenting { phases, .. } => {
                // ★ Leave のような内部フェーズは選択肢に出ない
                assert!(phases.iter().all(|p| *p != Phase::Leave));
            }
            other => panic!("expected Presenting, got {:?}", other),
        }

        let updated = services
            .wizard
            .complete_verification(&mut services.repo, &ctx, today, Phase::Night)
            .unwrap();

        // [Assert] 基準日は今日、setupIndex は Night の周期内位置
        assert_eq!(updated.reference_date, today);
        assert_eq!(updated.setup_index, Some(2));
        assert!(matches!(services.wizard.state(), WizardState::Completed));

        // [Assert] 次回起動は何も聞かずに Ready、今日のフェーズは申告どおり
        services.wizard.acknowledge();
        let outcome = services.startup(today).unwrap();
        match outcome {
            StartupOutcome::Ready { context } => {
                let engine = ShiftEngine::for_context(&context);
                assert_eq!(engine.phase_for_date(&context, today), Phase::Night);
            }
            other => panic!("expected Ready after recovery, got {:?}", other),
        }
    }

    #[test]
    fn test_selecting_a_phase_outside_the_cycle_fails_without_saving() {
        let mut services = services();
        let today = date(2024, 3, 16);
        let stale = context(date(2021, 3, 15), 1);
        services.repo.save_context(&stale).unwrap();

        let outcome = services.startup(today).unwrap();
        let (ctx, reason) = match outcome {
            StartupOutcome::NeedsVerification {
                context: Some(ctx),
                reason,
            } => (ctx, reason),
            other => panic!("expected NeedsVerification, got {:?}", other),
        };

        services
            .wizard
            .start_verification(reason, &ctx.system().distinct_phases());

        // [Act] ThreeShiftFive の周期に Weekend は存在しない
        let result = services
            .wizard
            .complete_verification(&mut services.repo, &ctx, today, Phase::Weekend);

        // [Assert] 失敗として報告され、保存データは手つかず
        assert!(result.is_err());
        assert!(matches!(services.wizard.state(), WizardState::Failed { .. }));
        let reloaded = services.repo.load_context().unwrap().unwrap();
        assert_eq!(reloaded.reference_date, date(2021, 3, 15));
    }

    // ========================================================================
    // 4. dismiss と再確認フラグ
    // ========================================================================

    #[test]
    fn test_dismiss_without_fallback_forces_verification_next_launch() {
        let mut services = services();
        let today = date(2024, 3, 16);
        let ctx = context(date(2024, 3, 15), 2);
        services.repo.save_context(&ctx).unwrap();

        // [Act] 提示中のウィザードをユーザーが閉じた（復元は使わない）
        services
            .wizard
            .start_verification(RecoveryReason::PendingVerification, &ctx.system().distinct_phases());
        let restored = services
            .wizard
            .dismiss(&mut services.repo, today, false)
            .unwrap();
        assert!(restored.is_none());
        assert!(matches!(services.wizard.state(), WizardState::Dismissed));

        // [Assert] データ自体は正常でも、次の起動で確認が要求される
        let outcome = services.startup(today).unwrap();
        assert!(matches!(
            outcome,
            StartupOutcome::NeedsVerification {
                reason: RecoveryReason::PendingVerification,
                ..
            }
        ));

        // [Act] 確認を完了するとフラグは消える
        let (ctx, reason) = match services.startup(today).unwrap() {
            StartupOutcome::NeedsVerification {
                context: Some(ctx),
                reason,
            } => (ctx, reason),
            other => panic!("expected NeedsVerification, got {:?}", other),
        };
        services.wizard.acknowledge();
        services
            .wizard
            .start_verification(reason, &ctx.system().distinct_phases());
        services
            .wizard
            .complete_verification(&mut services.repo, &ctx, today, Phase::Morning)
            .unwrap();

        let outcome = services.startup(today).unwrap();
        assert!(matches!(outcome, StartupOutcome::Ready { .. }));
    }
}
