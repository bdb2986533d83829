//! 時間分桶

use chrono::{Months, NaiveDate};
use mrp_core::{BucketGranularity, MrpError, PlanScope, Result};

/// 時間桶
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket {
    pub index: usize,
    pub start: NaiveDate,
    /// 結束日（含）
    pub end: NaiveDate,
}

impl TimeBucket {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// 隔天（區間右開端）
    pub fn end_exclusive(&self) -> NaiveDate {
        self.end.succ_opt().unwrap_or(self.end)
    }
}

/// 計劃時界內的全部時間桶
#[derive(Debug, Clone)]
pub struct BucketSet {
    buckets: Vec<TimeBucket>,
    granularity: BucketGranularity,
}

impl BucketSet {
    /// 從計劃起始日到時界結束日建立時間桶
    ///
    /// 月桶以「起始日 + i 個月」計算，避免逐月累加造成的日期漂移。
    pub fn build(scope: &PlanScope) -> Result<Self> {
        Self::between(scope.start_date, scope.end_date, scope.granularity)
    }

    pub fn between(start: NaiveDate, end: NaiveDate, granularity: BucketGranularity) -> Result<Self> {
        if end < start {
            return Err(MrpError::InvalidDate(format!(
                "時界結束日 {end} 早於起始日 {start}"
            )));
        }

        let mut starts = Vec::new();
        let mut i: u32 = 0;
        loop {
            let bucket_start = Self::nth_start(start, granularity, i)?;
            if bucket_start > end {
                break;
            }
            starts.push(bucket_start);
            i += 1;
        }

        let buckets = starts
            .iter()
            .enumerate()
            .map(|(index, &bucket_start)| {
                let bucket_end = match starts.get(index + 1) {
                    Some(next) => next.pred_opt().unwrap_or(*next),
                    None => end,
                };
                TimeBucket {
                    index,
                    start: bucket_start,
                    end: bucket_end,
                }
            })
            .collect();

        Ok(Self {
            buckets,
            granularity,
        })
    }

    fn nth_start(start: NaiveDate, granularity: BucketGranularity, n: u32) -> Result<NaiveDate> {
        let date = match granularity {
            BucketGranularity::Day => start.checked_add_signed(chrono::Duration::days(i64::from(n))),
            BucketGranularity::Week => {
                start.checked_add_signed(chrono::Duration::weeks(i64::from(n)))
            }
            BucketGranularity::Month => start.checked_add_months(Months::new(n)),
        };
        date.ok_or_else(|| MrpError::InvalidDate(format!("時間桶日期溢出（起始 {start}，第 {n} 桶）")))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn granularity(&self) -> BucketGranularity {
        self.granularity
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeBucket> {
        self.buckets.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TimeBucket> {
        self.buckets.get(index)
    }

    pub fn as_slice(&self) -> &[TimeBucket] {
        &self.buckets
    }

    /// 日期所屬的時間桶
    ///
    /// 早於計劃起始日 → 第一個桶；晚於時界 → None（時界外）
    pub fn bucket_for(&self, date: NaiveDate) -> Option<usize> {
        let last = self.buckets.last()?;
        if date > last.end {
            return None;
        }
        let position = self.buckets.partition_point(|b| b.start <= date);
        Some(position.saturating_sub(1))
    }

    pub fn start_of(&self, index: usize) -> Option<NaiveDate> {
        self.buckets.get(index).map(|b| b.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(BucketGranularity::Day, 30)]
    #[case(BucketGranularity::Week, 5)]
    #[case(BucketGranularity::Month, 1)]
    fn test_bucket_count(#[case] granularity: BucketGranularity, #[case] expected: usize) {
        let set = BucketSet::between(date(2025, 11, 1), date(2025, 11, 30), granularity).unwrap();
        assert_eq!(set.len(), expected);
    }

    #[test]
    fn test_buckets_are_contiguous() {
        let set =
            BucketSet::between(date(2025, 11, 3), date(2025, 12, 31), BucketGranularity::Week)
                .unwrap();

        for pair in set.as_slice().windows(2) {
            assert_eq!(pair[0].end.succ_opt(), Some(pair[1].start));
        }
        assert_eq!(set.as_slice().last().unwrap().end, date(2025, 12, 31));
    }

    #[test]
    fn test_month_buckets_do_not_drift() {
        let set =
            BucketSet::between(date(2025, 1, 31), date(2025, 5, 31), BucketGranularity::Month)
                .unwrap();

        let starts: Vec<_> = set.iter().map(|b| b.start).collect();
        assert_eq!(
            starts,
            vec![
                date(2025, 1, 31),
                date(2025, 2, 28),
                date(2025, 3, 31),
                date(2025, 4, 30),
                date(2025, 5, 31),
            ]
        );
    }

    #[test]
    fn test_bucket_for() {
        let set =
            BucketSet::between(date(2025, 11, 3), date(2025, 11, 30), BucketGranularity::Week)
                .unwrap();

        assert_eq!(set.bucket_for(date(2025, 10, 1)), Some(0));
        assert_eq!(set.bucket_for(date(2025, 11, 3)), Some(0));
        assert_eq!(set.bucket_for(date(2025, 11, 9)), Some(0));
        assert_eq!(set.bucket_for(date(2025, 11, 10)), Some(1));
        assert_eq!(set.bucket_for(date(2025, 11, 30)), Some(3));
        assert_eq!(set.bucket_for(date(2025, 12, 1)), None);
    }

    #[test]
    fn test_reversed_horizon_rejected() {
        let result = BucketSet::between(date(2025, 11, 30), date(2025, 11, 1), BucketGranularity::Day);
        assert!(matches!(result, Err(MrpError::InvalidDate(_))));
    }
}
