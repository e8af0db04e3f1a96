use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::audit::AuditOutcome;
use crate::entity::audit_logs;
use crate::stats::{bump, daily_series, ranked, CountItem, DailyCount, StatsWindow};

/// 用户排行保留条数
const TOP_USERS: usize = 10;

/// 审计统计摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditStats {
    pub days: u32,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub total_events: u64,
    pub unique_users: u64,
    pub by_outcome: BTreeMap<String, u64>,
    pub by_action: Vec<CountItem>,
    pub by_resource: Vec<CountItem>,
    pub top_users: Vec<CountItem>,
    pub daily: Vec<DailyCount>,
    pub denied_count: u64,
    pub failure_count: u64,
    /// 扫描行数达到上限，结果可能不完整
    pub truncated: bool,
}

/// 聚合窗口内的审计记录
///
/// 窗口外的记录被忽略；结果只取决于记录集合与窗口，与记录顺序无关。
pub fn aggregate_audit(records: &[audit_logs::Model], window: &StatsWindow) -> AuditStats {
    let in_window: Vec<&audit_logs::Model> = records
        .iter()
        .filter(|r| window.contains_millis(r.created_at))
        .collect();

    let mut by_outcome: BTreeMap<String, u64> = AuditOutcome::ALL
        .iter()
        .map(|o| (o.as_str().to_string(), 0))
        .collect();
    let mut by_action = HashMap::new();
    let mut by_resource = HashMap::new();
    let mut by_user = HashMap::new();
    let mut users = HashSet::new();

    for record in &in_window {
        *by_outcome.entry(record.outcome.clone()).or_insert(0) += 1;
        bump(&mut by_action, &record.action);
        bump(&mut by_resource, &record.resource);

        if let Some(user_id) = &record.user_id {
            users.insert(user_id.as_str());
            bump(&mut by_user, user_id);
        }
    }

    let denied_count = by_outcome
        .get(AuditOutcome::Denied.as_str())
        .copied()
        .unwrap_or(0);
    let failure_count = by_outcome
        .get(AuditOutcome::Failure.as_str())
        .copied()
        .unwrap_or(0);

    AuditStats {
        days: window.days,
        since: window.since,
        until: window.until,
        total_events: in_window.len() as u64,
        unique_users: users.len() as u64,
        by_outcome,
        by_action: ranked(by_action, None),
        by_resource: ranked(by_resource, None),
        top_users: ranked(by_user, Some(TOP_USERS)),
        daily: daily_series(window, in_window.iter().map(|r| r.created_at)),
        denied_count,
        failure_count,
        truncated: false,
    }
}
