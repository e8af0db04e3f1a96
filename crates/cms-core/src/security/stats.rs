use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::entity::security_events;
use crate::security::{event_types, Severity};
use crate::stats::{bump, daily_series, ranked, CountItem, DailyCount, StatsWindow};

const TOP_SOURCES: usize = 10;
const MAX_SCORE: u64 = 100;

/// 威胁等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Low,
    Elevated,
    High,
    Critical,
}

impl ThreatLevel {
    fn from_score(score: u64) -> Self {
        match score {
            0..=9 => ThreatLevel::Low,
            10..=29 => ThreatLevel::Elevated,
            30..=59 => ThreatLevel::High,
            _ => ThreatLevel::Critical,
        }
    }
}

/// 威胁评估
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatAssessment {
    pub level: ThreatLevel,
    /// 0-100
    pub score: u64,
    pub reasons: Vec<String>,
}

/// 安全统计摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityStats {
    pub days: u32,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub total_events: u64,
    pub by_severity: BTreeMap<String, u64>,
    pub by_type: Vec<CountItem>,
    pub top_sources: Vec<CountItem>,
    pub daily: Vec<DailyCount>,
    pub failed_logins: u64,
    pub threat: ThreatAssessment,
    pub truncated: bool,
}

/// 根据各级别事件数计算威胁评估
pub fn assess_threat(counts: &BTreeMap<Severity, u64>) -> ThreatAssessment {
    let raw: u64 = counts
        .iter()
        .map(|(severity, count)| severity.weight().saturating_mul(*count))
        .fold(0, u64::saturating_add);
    let score = raw.min(MAX_SCORE);

    let mut reasons = Vec::new();
    for severity in Severity::ALL.iter().rev() {
        let count = counts.get(severity).copied().unwrap_or(0);
        if count > 0 {
            reasons.push(format!("{} {} severity event(s)", count, severity));
        }
    }

    ThreatAssessment {
        level: ThreatLevel::from_score(score),
        score,
        reasons,
    }
}

/// 聚合窗口内的安全事件
pub fn aggregate_security(records: &[security_events::Model], window: &StatsWindow) -> SecurityStats {
    let in_window: Vec<&security_events::Model> = records
        .iter()
        .filter(|r| window.contains_millis(r.created_at))
        .collect();

    let mut severity_counts: BTreeMap<Severity, u64> =
        Severity::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_type = HashMap::new();
    let mut by_source = HashMap::new();
    let mut failed_logins = 0u64;

    for record in &in_window {
        // 未知级别按 low 计
        let severity = record.severity.parse().unwrap_or(Severity::Low);
        *severity_counts.entry(severity).or_insert(0) += 1;

        bump(&mut by_type, &record.event_type);
        if let Some(ip) = &record.ip_address {
            bump(&mut by_source, ip);
        }
        if record.event_type == event_types::LOGIN_FAILED {
            failed_logins += 1;
        }
    }

    let threat = assess_threat(&severity_counts);
    let by_severity = severity_counts
        .iter()
        .map(|(severity, count)| (severity.as_str().to_string(), *count))
        .collect();

    SecurityStats {
        days: window.days,
        since: window.since,
        until: window.until,
        total_events: in_window.len() as u64,
        by_severity,
        by_type: ranked(by_type, None),
        top_sources: ranked(by_source, Some(TOP_SOURCES)),
        daily: daily_series(window, in_window.iter().map(|r| r.created_at)),
        failed_logins,
        threat,
        truncated: false,
    }
}
