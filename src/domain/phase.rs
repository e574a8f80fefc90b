// =====================
// フェーズとシステムID定義
// =====================

use serde::{Deserialize, Serialize};

/// シフトの1日分の割り当てを表すタグ。
/// 時刻の計算ロジックは一切持たない（それは ShiftSystem の仕事）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Morning,
    Evening,
    Night,
    Off,
    FirstOff,
    SecondOff,
    Weekend,
    Leave,
}

impl Phase {
    /// 勤務フェーズかどうか。休み系のフェーズには開始・終了時刻が存在しない
    pub fn is_work_phase(&self) -> bool {
        matches!(self, Phase::Morning | Phase::Evening | Phase::Night)
    }

    /// ユーザーが選択肢として目にするフェーズかどうか。
    /// Leave は手動上書き専用のマーカーで、ウィザードの選択肢には出さない
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Phase::Leave)
    }
}

/// 組み込みシフトシステムの識別子。
///
/// 保存データ上は文字列だが、読み込み時に必ずこの列挙型へ解決する。
/// 解決できないIDはデコードエラーであり、デフォルトシステムへの
/// 暗黙フォールバックはしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftSystemId {
    /// 3交代・5日周期 [朝, 夕, 夜, 休, 休]
    ThreeShiftFive,
    /// 連続操業ローテーション [朝, 朝, 夕, 夕, 夜, 夜, 明け休, 休]
    ContinuousRotation,
    /// 2交代・4日周期 [朝, 夕, 休, 休]
    TwoShiftFour,
    /// 固定週（平日勤務・土日休み）。setupIndex は使わない
    FixedWeek,
}

impl ShiftSystemId {
    pub const ALL: [ShiftSystemId; 4] = [
        ShiftSystemId::ThreeShiftFive,
        ShiftSystemId::ContinuousRotation,
        ShiftSystemId::TwoShiftFour,
        ShiftSystemId::FixedWeek,
    ];

    /// 保存データ用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftSystemId::ThreeShiftFive => "threeShiftFive",
            ShiftSystemId::ContinuousRotation => "continuousRotation",
            ShiftSystemId::TwoShiftFour => "twoShiftFour",
            ShiftSystemId::FixedWeek => "fixedWeek",
        }
    }

    /// 文字列からの解決。未知のIDは None
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_str() == s)
    }
}
