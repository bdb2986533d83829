//! 工作日曆模型

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 工作日曆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCalendar {
    /// 工作日（週一到週日，true表示工作日）
    /// 索引 0 = 週一, 1 = 週二, ..., 6 = 週日
    pub working_days: [bool; 7],

    /// 節假日列表
    pub holidays: Vec<NaiveDate>,

    /// 日曆ID
    pub calendar_id: String,
}

impl WorkCalendar {
    /// 創建新的工作日曆（預設週一到週五為工作日）
    pub fn new(calendar_id: String) -> Self {
        Self {
            working_days: [true, true, true, true, true, false, false], // 週一到週五
            calendar_id,
            holidays: Vec::new(),
        }
    }

    /// 建構器模式：設置工作日
    pub fn with_working_days(mut self, working_days: [bool; 7]) -> Self {
        self.working_days = working_days;
        self
    }

    /// 建構器模式：添加節假日
    pub fn with_holidays(mut self, mut holidays: Vec<NaiveDate>) -> Self {
        holidays.sort();
        holidays.dedup();
        self.holidays = holidays;
        self
    }

    /// 添加節假日
    pub fn add_holiday(&mut self, date: NaiveDate) {
        if let Err(pos) = self.holidays.binary_search(&date) {
            self.holidays.insert(pos, date);
        }
    }

    /// 檢查是否為工作日
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        if self.holidays.contains(&date) {
            return false;
        }

        let weekday_index = date.weekday().num_days_from_monday() as usize;
        self.working_days[weekday_index]
    }

    /// 一週內是否至少有一個工作日（否則推算會退化為日曆天）
    fn has_working_days(&self) -> bool {
        self.working_days.iter().any(|&d| d)
    }

    /// 計算工作日（向前推算）
    pub fn add_working_days(&self, start_date: NaiveDate, days: u32) -> NaiveDate {
        if !self.has_working_days() {
            return start_date
                .checked_add_signed(chrono::Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MAX);
        }

        let mut current = start_date;
        let mut remaining = days;

        while remaining > 0 {
            current = match current.succ_opt() {
                Some(next) => next,
                None => break,
            };
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }

        current
    }

    /// 計算工作日（向後推算）
    pub fn subtract_working_days(&self, start_date: NaiveDate, days: u32) -> NaiveDate {
        if !self.has_working_days() {
            return start_date
                .checked_sub_signed(chrono::Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN);
        }

        let mut current = start_date;
        let mut remaining = days;

        while remaining > 0 {
            current = match current.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }

        current
    }

    /// 計算兩個日期之間的工作日數量
    pub fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        let mut count = 0;
        let mut current = start;

        while current < end {
            current = match current.succ_opt() {
                Some(next) => next,
                None => break,
            };
            if self.is_working_day(current) {
                count += 1;
            }
        }

        count
    }
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::new("DEFAULT".to_string())
    }
}

/// 排班表資料結構（用於從 ERP 系統載入）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSchedule {
    /// 班別名稱
    pub name: String,
    /// 每班工時
    pub hours: Decimal,
}

impl ShiftSchedule {
    pub fn new(name: impl Into<String>, hours: Decimal) -> Self {
        Self {
            name: name.into(),
            hours,
        }
    }
}

/// 計劃停機
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Downtime {
    pub date: NaiveDate,
    pub hours: Decimal,
    pub reason: Option<String>,
}

impl WorkCalendar {
    /// 從排班資料創建工作日曆（索引超過 7 的資料會被忽略）
    pub fn from_shift_data(
        calendar_id: String,
        working_days_vec: Vec<bool>,
        holidays: Vec<NaiveDate>,
    ) -> Self {
        let mut working_days = [false; 7];
        for (slot, &is_working) in working_days.iter_mut().zip(working_days_vec.iter()) {
            *slot = is_working;
        }

        Self::new(calendar_id)
            .with_working_days(working_days)
            .with_holidays(holidays)
    }
}

/// 工作中心日曆：工作日 + 班別工時 + 例外工時 + 計劃停機
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkCenterCalendar {
    /// 工作日/假日
    pub calendar: WorkCalendar,

    /// 每個工作日的班別
    pub shifts: Vec<ShiftSchedule>,

    /// 特定日期的工時覆寫（加班、縮短工時等）
    pub overrides: BTreeMap<NaiveDate, Decimal>,

    /// 計劃停機
    pub downtime: Vec<Downtime>,
}

impl WorkCenterCalendar {
    /// 單班制日曆
    pub fn single_shift(calendar: WorkCalendar, hours: Decimal) -> Self {
        Self {
            calendar,
            shifts: vec![ShiftSchedule::new("DAY", hours)],
            overrides: BTreeMap::new(),
            downtime: Vec::new(),
        }
    }

    /// 建構器模式：增加班別
    pub fn with_shift(mut self, shift: ShiftSchedule) -> Self {
        self.shifts.push(shift);
        self
    }

    /// 建構器模式：覆寫某日工時
    pub fn with_override(mut self, date: NaiveDate, hours: Decimal) -> Self {
        self.overrides.insert(date, hours);
        self
    }

    /// 建構器模式：增加停機
    pub fn with_downtime(mut self, date: NaiveDate, hours: Decimal, reason: Option<String>) -> Self {
        self.downtime.push(Downtime {
            date,
            hours,
            reason,
        });
        self
    }

    /// 標準工作日工時（所有班別加總）
    pub fn standard_daily_hours(&self) -> Decimal {
        self.shifts.iter().map(|s| s.hours).sum()
    }

    /// 某日可用工時（不低於 0）
    pub fn hours_on(&self, date: NaiveDate) -> Decimal {
        let base = match self.overrides.get(&date) {
            Some(&hours) => hours,
            None if self.calendar.is_working_day(date) => self.standard_daily_hours(),
            None => Decimal::ZERO,
        };

        let down: Decimal = self
            .downtime
            .iter()
            .filter(|d| d.date == date)
            .map(|d| d.hours)
            .sum();

        (base - down).max(Decimal::ZERO)
    }

    /// 區間 [start, end) 的可用工時
    pub fn available_hours(&self, start: NaiveDate, end_exclusive: NaiveDate) -> Decimal {
        start
            .iter_days()
            .take_while(|d| *d < end_exclusive)
            .map(|d| self.hours_on(d))
            .sum()
    }
}

impl Default for WorkCenterCalendar {
    fn default() -> Self {
        Self::single_shift(WorkCalendar::default(), Decimal::from(8))
    }
}
