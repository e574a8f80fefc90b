// =====================
// シフトシステム定義
// =====================

use chrono::Weekday;

use crate::domain::phase::{Phase, ShiftSystemId};

/// 周期型か固定週型か
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// 基準日からの経過日数で回る周期（周期順のフェーズ列）
    Cyclic(Vec<Phase>),
    /// 曜日で決まる固定週（月曜始まりの7要素）
    FixedWeek([Phase; 7]),
}

/// フェーズ列と、フェーズごとの時間オフセット・勤務時間を持つシフトシステム。
/// オフセットと勤務時間は整数時間のみ。勤務時間は必ず正。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftSystem {
    pub id: ShiftSystemId,
    pub schedule: Schedule,
}

impl ShiftSystem {
    /// IDから組み込み定義を引く。IDは列挙型なので必ず解決できる
    pub fn for_id(id: ShiftSystemId) -> Self {
        let schedule = match id {
            ShiftSystemId::ThreeShiftFive => Schedule::Cyclic(vec![
                Phase::Morning,
                Phase::Evening,
                Phase::Night,
                Phase::Off,
                Phase::Off,
            ]),
            ShiftSystemId::ContinuousRotation => Schedule::Cyclic(vec![
                Phase::Morning,
                Phase::Morning,
                Phase::Evening,
                Phase::Evening,
                Phase::Night,
                Phase::Night,
                Phase::FirstOff,
                Phase::SecondOff,
            ]),
            ShiftSystemId::TwoShiftFour => Schedule::Cyclic(vec![
                Phase::Morning,
                Phase::Evening,
                Phase::Off,
                Phase::Off,
            ]),
            ShiftSystemId::FixedWeek => Schedule::FixedWeek([
                Phase::Morning, // 月
                Phase::Morning,
                Phase::Morning,
                Phase::Morning,
                Phase::Morning, // 金
                Phase::Weekend,
                Phase::Weekend,
            ]),
        };
        Self { id, schedule }
    }

    /// 周期列（固定週システムでは空スライス）
    pub fn cycle(&self) -> &[Phase] {
        match &self.schedule {
            Schedule::Cyclic(phases) => phases,
            Schedule::FixedWeek(_) => &[],
        }
    }

    pub fn cycle_len(&self) -> usize {
        self.cycle().len()
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self.schedule, Schedule::Cyclic(_))
    }

    /// 固定週システムの曜日→フェーズ。周期システムには意味がないので None
    pub fn phase_for_weekday(&self, weekday: Weekday) -> Option<Phase> {
        match &self.schedule {
            Schedule::FixedWeek(week) => {
                Some(week[weekday.num_days_from_monday() as usize])
            }
            Schedule::Cyclic(_) => None,
        }
    }

    /// 周期内でフェーズが最初に現れる位置。
    /// リカバリーウィザードが「今日のフェーズ」から setupIndex を逆算するのに使う
    pub fn phase_index(&self, phase: Phase) -> Option<usize> {
        self.cycle().iter().position(|p| *p == phase)
    }

    /// 周期内に現れるフェーズの一覧（重複なし・出現順）。
    /// ウィザードの選択肢に使う
    pub fn distinct_phases(&self) -> Vec<Phase> {
        let source: &[Phase] = match &self.schedule {
            Schedule::Cyclic(phases) => phases,
            Schedule::FixedWeek(week) => week,
        };
        let mut seen = Vec::new();
        for p in source {
            if !seen.contains(p) {
                seen.push(*p);
            }
        }
        seen
    }

    /// アンカー時刻からの開始オフセット（時間単位）。休み系フェーズは None
    pub fn start_offset_hours(&self, phase: Phase) -> Option<i64> {
        match (self.id, phase) {
            (_, Phase::Morning) => Some(0),
            (ShiftSystemId::TwoShiftFour, Phase::Evening) => Some(9),
            (_, Phase::Evening) => Some(8),
            (_, Phase::Night) => Some(16),
            _ => None,
        }
    }

    /// 勤務時間（時間単位、必ず正）。休み系フェーズは None
    pub fn duration_hours(&self, phase: Phase) -> Option<i64> {
        if !phase.is_work_phase() {
            return None;
        }
        match self.id {
            ShiftSystemId::TwoShiftFour => Some(9),
            _ => Some(8),
        }
    }
}
