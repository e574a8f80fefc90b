// =====================
// シフトエンジン（フェーズ導出と時刻計算）
// =====================

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::domain::context::{start_of_day, ShiftContext};
use crate::domain::overrides::OverrideMap;
use crate::domain::phase::Phase;
use crate::domain::system::{Schedule, ShiftSystem};

/// 1回の勤務の開始・終了時刻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftTimes {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// タイムライン上の1日分
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledDay {
    pub date: NaiveDate,
    pub phase: Phase,
    /// 休み系フェーズでは None
    pub times: Option<ShiftTimes>,
    /// 手動上書きによって決まったフェーズかどうか
    pub overridden: bool,
}

/// コンテキストからフェーズと勤務時刻を導出する計算器。
/// 内部状態は解決済みのシステム定義だけで、I/Oは一切行わない
#[derive(Debug, Clone)]
pub struct ShiftEngine {
    system: ShiftSystem,
}

impl ShiftEngine {
    pub fn for_context(ctx: &ShiftContext) -> Self {
        Self {
            system: ctx.system(),
        }
    }

    pub fn system(&self) -> &ShiftSystem {
        &self.system
    }

    /// 指定日のフェーズ。
    ///
    /// 周期システム: (基準日からの経過日数 + setupIndex) を周期長で floor-mod。
    /// 基準日より前の日付でも負のインデックスにならない。
    /// 固定週システム: 曜日だけで決まり、setupIndex は無視される
    pub fn phase_for_date(&self, ctx: &ShiftContext, date: NaiveDate) -> Phase {
        match &self.system.schedule {
            Schedule::Cyclic(phases) => {
                let setup_index =
                    ctx.effective_setup_index(&self.system).unwrap_or(0) as i64;
                let delta = (date - ctx.reference_date).num_days();
                let index = (delta + setup_index).rem_euclid(phases.len() as i64);
                phases[index as usize]
            }
            Schedule::FixedWeek(week) => {
                week[date.weekday().num_days_from_monday() as usize]
            }
        }
    }

    /// 勤務時刻の計算。休み系フェーズは None（勤務フェーズではないという通知）。
    ///
    /// start = 日頭 + アンカー + フェーズオフセット
    /// end   = start + 勤務時間（コンテキストの上書きがあればそちら）
    ///
    /// end <= start になった場合は必ず1日加算する（日跨ぎ補正）。
    /// オフセットが24時間を超えるシステムがあるため、この補正は省略できない
    pub fn compute_shift_times(
        &self,
        ctx: &ShiftContext,
        date: NaiveDate,
        phase: Phase,
    ) -> Option<ShiftTimes> {
        let offset = self.system.start_offset_hours(phase)?;
        let duration = ctx
            .work_duration_hours
            .filter(|h| *h > 0)
            .or_else(|| self.system.duration_hours(phase))?;

        let local_start = start_of_day(date)
            + Duration::hours(i64::from(ctx.anchor_hour))
            + Duration::minutes(i64::from(ctx.anchor_minute))
            + Duration::hours(offset);

        let start = ctx.zone.to_utc(local_start);
        let mut end = start + Duration::hours(duration);
        if end <= start {
            end += Duration::days(1);
        }

        Some(ShiftTimes { start, end })
    }

    /// from から days 日分のタイムラインを構築する。
    /// 手動上書きは flexibility で有効な場合のみ適用される
    pub fn build_timeline(
        &self,
        ctx: &ShiftContext,
        overrides: &OverrideMap,
        from: NaiveDate,
        days: u32,
    ) -> Vec<ScheduledDay> {
        (0..days)
            .map(|i| {
                let date = from + Duration::days(i64::from(i));
                let scheduled = self.phase_for_date(ctx, date);

                let (phase, overridden) = if ctx.flexibility.manual_override_enabled {
                    match overrides.lookup(date) {
                        Some(p) => (p, true),
                        None => (scheduled, false),
                    }
                } else {
                    (scheduled, false)
                };

                ScheduledDay {
                    date,
                    phase,
                    times: self.compute_shift_times(ctx, date, phase),
                    overridden,
                }
            })
            .collect()
    }
}
