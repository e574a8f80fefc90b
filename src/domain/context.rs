// =====================
// シフトコンテキスト（ユーザー設定の値オブジェクト）
// =====================

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::phase::{Phase, ShiftSystemId};
use crate::domain::system::ShiftSystem;

/// アンカー時刻のデフォルト（07:00）
pub const DEFAULT_ANCHOR_HOUR: u32 = 7;
pub const DEFAULT_ANCHOR_MINUTE: u32 = 0;

// =====================
// タイムゾーン
// =====================

/// コンテキストのタイムゾーン。
/// IANA識別子で指定されるか、未指定なら端末ローカル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextZone {
    Named(chrono_tz::Tz),
    Device,
}

impl ContextZone {
    /// 保存データに書き出すIANA識別子。Device は省略される
    pub fn identifier(&self) -> Option<&'static str> {
        match self {
            ContextZone::Named(tz) => Some(tz.name()),
            ContextZone::Device => None,
        }
    }

    /// ローカル日時をUTCの時刻へ解決する
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            ContextZone::Named(tz) => resolve_local(tz, local),
            ContextZone::Device => resolve_local(&chrono::Local, local),
        }
    }

    /// UTCの時刻をこのゾーンの暦日に落とす
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            ContextZone::Named(tz) => instant.with_timezone(tz).date_naive(),
            ContextZone::Device => instant.with_timezone(&chrono::Local).date_naive(),
        }
    }

    /// このゾーンでの「今日」
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_date(now)
    }
}

fn resolve_local<Z: TimeZone>(tz: &Z, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // 夏時間の折返しで2回存在する時刻は早い方を取る
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // 夏時間の切替で存在しない時刻は1時間先送り
        LocalResult::None => match tz.from_local_datetime(&(local + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                dt.with_timezone(&Utc)
            }
            LocalResult::None => Utc.from_utc_datetime(&local),
        },
    }
}

// =====================
// 柔軟性ルール
// =====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlexibilityRules {
    /// 日単位の手動上書き（overrideマップ）をエンジンが読むかどうか
    pub manual_override_enabled: bool,
}

impl Default for FlexibilityRules {
    fn default() -> Self {
        Self {
            manual_override_enabled: true,
        }
    }
}

// =====================
// バックアップスナップショット
// =====================

/// プライマリと並んで保存される (基準日, setupIndex) の複製。
/// プライマリが正常な間は真実のソースにはならない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub reference_date: NaiveDate,
    pub setup_index: usize,
}

// =====================
// シフトコンテキスト本体
// =====================

/// 1ユーザー分のシフト設定を束ねる値オブジェクト。
/// 更新はフィールド単位の書き換えではなく、必ず丸ごと差し替える
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftContext {
    pub system_id: ShiftSystemId,
    /// 旧データ形式のフィールド。setup_index があればそちらが優先
    pub start_phase: Option<Phase>,
    /// 基準日時点での周期内位置。周期システムでは必須扱い
    pub setup_index: Option<usize>,
    pub anchor_hour: u32,
    pub anchor_minute: u32,
    /// 勤務時間の上書き（時間単位）。None ならシステム定義の値
    pub work_duration_hours: Option<i64>,
    /// 常にこのコンテキストのゾーンでの暦日（日頭）に正規化されている
    pub reference_date: NaiveDate,
    pub flexibility: FlexibilityRules,
    pub zone: ContextZone,
}

impl ShiftContext {
    pub fn new(system_id: ShiftSystemId, reference_date: NaiveDate) -> Self {
        Self {
            system_id,
            start_phase: None,
            setup_index: None,
            anchor_hour: DEFAULT_ANCHOR_HOUR,
            anchor_minute: DEFAULT_ANCHOR_MINUTE,
            work_duration_hours: None,
            reference_date,
            flexibility: FlexibilityRules::default(),
            zone: ContextZone::Device,
        }
    }

    pub fn system(&self) -> ShiftSystem {
        ShiftSystem::for_id(self.system_id)
    }

    /// 実効的な周期内位置。
    /// setup_index がなければ旧 start_phase から周期内の最初の位置を引く
    pub fn effective_setup_index(&self, system: &ShiftSystem) -> Option<usize> {
        self.setup_index
            .or_else(|| self.start_phase.and_then(|p| system.phase_index(p)))
    }

    /// 基準日のUTC正子エポック秒。チェックサムの入力に使う
    pub fn reference_epoch(&self) -> i64 {
        reference_epoch(self.reference_date)
    }

    // =====================
    // シリアライズ
    // =====================

    pub fn to_json(&self) -> Result<Vec<u8>, ContextDecodeError> {
        let raw = RawContext {
            system_id: self.system_id.as_str().to_string(),
            start_phase: self.start_phase,
            setup_index: self.setup_index,
            start_hour: self.anchor_hour,
            start_minute: self.anchor_minute,
            work_duration_hours: self.work_duration_hours,
            reference_date: self
                .zone
                .to_utc(start_of_day(self.reference_date))
                .timestamp(),
            flexibility: self.flexibility,
            time_zone_identifier: self.identifier_owned(),
        };
        serde_json::to_vec(&raw).map_err(ContextDecodeError::Malformed)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ContextDecodeError> {
        let raw: RawContext =
            serde_json::from_slice(bytes).map_err(ContextDecodeError::Malformed)?;
        Self::from_raw(raw)
    }

    /// ワイヤ形式からの再構築。
    /// ここで基準日の正規化と setupIndex の範囲チェックを行う
    fn from_raw(raw: RawContext) -> Result<Self, ContextDecodeError> {
        let system_id = ShiftSystemId::parse(&raw.system_id)
            .ok_or_else(|| ContextDecodeError::UnknownSystemId(raw.system_id.clone()))?;

        let zone = match &raw.time_zone_identifier {
            Some(name) => {
                let tz: chrono_tz::Tz = name
                    .parse()
                    .map_err(|_| ContextDecodeError::UnknownTimeZone(name.clone()))?;
                ContextZone::Named(tz)
            }
            None => ContextZone::Device,
        };

        // タイムスタンプを必ずこのゾーンの暦日へ落とす（日頭正規化）
        let instant = Utc
            .timestamp_opt(raw.reference_date, 0)
            .single()
            .ok_or(ContextDecodeError::InvalidReferenceDate(raw.reference_date))?;
        let reference_date = zone.local_date(instant);

        let system = ShiftSystem::for_id(system_id);
        if let Some(index) = raw.setup_index {
            if system.is_cyclic() && index >= system.cycle_len() {
                return Err(ContextDecodeError::SetupIndexOutOfRange {
                    index,
                    len: system.cycle_len(),
                });
            }
        }

        Ok(Self {
            system_id,
            start_phase: raw.start_phase,
            setup_index: raw.setup_index,
            anchor_hour: raw.start_hour,
            anchor_minute: raw.start_minute,
            work_duration_hours: raw.work_duration_hours,
            reference_date,
            flexibility: raw.flexibility,
            zone,
        })
    }

    fn identifier_owned(&self) -> Option<String> {
        self.zone.identifier().map(|s| s.to_string())
    }
}

/// 暦日の日頭（00:00）
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).expect("00:00:00 is a valid time")
}

/// 暦日のUTC正子エポック秒。ゾーンに依存しない決定的な値
pub fn reference_epoch(date: NaiveDate) -> i64 {
    start_of_day(date).and_utc().timestamp()
}

// =====================
// ワイヤ形式（保存用ヘルパー構造体）
// =====================

fn default_start_hour() -> u32 {
    DEFAULT_ANCHOR_HOUR
}

fn default_start_minute() -> u32 {
    DEFAULT_ANCHOR_MINUTE
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContext {
    #[serde(rename = "systemID")]
    system_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    setup_index: Option<usize>,
    #[serde(default = "default_start_hour")]
    start_hour: u32,
    #[serde(default = "default_start_minute")]
    start_minute: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    work_duration_hours: Option<i64>,
    /// エポック秒
    reference_date: i64,
    #[serde(default)]
    flexibility: FlexibilityRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone_identifier: Option<String>,
}

// =====================
// デコードエラー
// =====================

#[derive(Debug, Error)]
pub enum ContextDecodeError {
    #[error("unrecognized shift system id: {0}")]
    UnknownSystemId(String),
    #[error("unknown time zone identifier: {0}")]
    UnknownTimeZone(String),
    #[error("setup index {index} out of range (cycle length {len})")]
    SetupIndexOutOfRange { index: usize, len: usize },
    #[error("reference date timestamp {0} is out of range")]
    InvalidReferenceDate(i64),
    #[error("context blob could not be parsed: {0}")]
    Malformed(#[source] serde_json::Error),
}
