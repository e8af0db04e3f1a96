use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::{CmsError, Result};

/// 统计窗口允许的最大天数
pub const MAX_WINDOW_DAYS: u32 = 365;

/// 统计窗口
///
/// 覆盖以 `until` 所在日期结尾的最近 `days` 个自然日（UTC），
/// 起点为第一天的零点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsWindow {
    pub days: u32,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl StatsWindow {
    /// 构造最近 `days` 天的窗口
    ///
    /// # 错误
    /// * `Validation` - `days` 不在 [1, 365] 内
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Result<Self> {
        if days == 0 || days > MAX_WINDOW_DAYS {
            return Err(CmsError::validation(
                "days",
                format!("must be between 1 and {}", MAX_WINDOW_DAYS),
            ));
        }

        let first_day = now.date_naive() - Duration::days(i64::from(days) - 1);
        let since = Utc.from_utc_datetime(&first_day.and_time(NaiveTime::default()));

        Ok(Self {
            days,
            since,
            until: now,
        })
    }

    pub fn since_millis(&self) -> i64 {
        self.since.timestamp_millis()
    }

    pub fn until_millis(&self) -> i64 {
        self.until.timestamp_millis()
    }

    /// 毫秒时间戳是否落在窗口内（两端闭区间）
    pub fn contains_millis(&self, ts: i64) -> bool {
        ts >= self.since_millis() && ts <= self.until_millis()
    }

    /// 窗口内的每一天，升序
    pub fn dates(&self) -> Vec<NaiveDate> {
        let first = self.since.date_naive();
        (0..i64::from(self.days))
            .map(|offset| first + Duration::days(offset))
            .collect()
    }
}

/// 计数条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountItem {
    pub key: String,
    pub count: u64,
}

/// 按日计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// 按计数降序、键升序排列，可截断到前 `top` 个
pub(crate) fn ranked(counts: HashMap<String, u64>, top: Option<usize>) -> Vec<CountItem> {
    let mut items: Vec<CountItem> = counts
        .into_iter()
        .map(|(key, count)| CountItem { key, count })
        .collect();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));

    if let Some(top) = top {
        items.truncate(top);
    }
    items
}

/// 计数加一
pub(crate) fn bump(counts: &mut HashMap<String, u64>, key: &str) {
    let entry = counts.entry(key.to_string()).or_insert(0);
    *entry = entry.saturating_add(1);
}

/// 生成窗口内逐日计数（无事件的日期补零）
pub(crate) fn daily_series(
    window: &StatsWindow,
    timestamps: impl IntoIterator<Item = i64>,
) -> Vec<DailyCount> {
    let mut buckets: BTreeMap<NaiveDate, u64> =
        window.dates().into_iter().map(|date| (date, 0)).collect();

    for ts in timestamps {
        if let Some(dt) = Utc.timestamp_millis_opt(ts).single() {
            if let Some(count) = buckets.get_mut(&dt.date_naive()) {
                *count = count.saturating_add(1);
            }
        }
    }

    buckets
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let window = StatsWindow::last_days(7, now()).unwrap();

        assert_eq!(window.since, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(window.until, now());
        assert_eq!(window.dates().len(), 7);
        assert_eq!(
            window.dates().last().copied(),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
    }

    #[test]
    fn test_single_day_window_starts_at_midnight() {
        let window = StatsWindow::last_days(1, now()).unwrap();
        assert_eq!(window.since, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(window.dates().len(), 1);
    }

    #[test]
    fn test_window_rejects_out_of_range_days() {
        assert!(matches!(
            StatsWindow::last_days(0, now()),
            Err(CmsError::Validation { .. })
        ));
        assert!(matches!(
            StatsWindow::last_days(366, now()),
            Err(CmsError::Validation { .. })
        ));
        assert!(StatsWindow::last_days(365, now()).is_ok());
    }

    #[test]
    fn test_ranked_breaks_ties_by_key() {
        let mut counts = HashMap::new();
        counts.insert("b".to_string(), 2);
        counts.insert("a".to_string(), 2);
        counts.insert("c".to_string(), 5);

        let items = ranked(counts, Some(2));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "c");
        assert_eq!(items[1].key, "a");
    }

    #[test]
    fn test_daily_series_zero_fills() {
        let window = StatsWindow::last_days(3, now()).unwrap();
        let inside = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let series = daily_series(
            &window,
            vec![inside.timestamp_millis(), inside.timestamp_millis(), outside.timestamp_millis()],
        );

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].count, 0);
        assert_eq!(series[1].count, 2);
        assert_eq!(series[2].count, 0);
    }
}
