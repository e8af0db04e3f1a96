use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{debug, warn};

use crate::audit::{aggregate_audit, AuditLogFilter, AuditStats, NewAuditEntry};
use crate::entity::audit_logs;
use crate::pagination::{Page, MAX_PAGE_SIZE};
use crate::stats::StatsWindow;
use crate::{CmsError, Result};

/// 单次统计最多扫描的记录数
const MAX_STATS_ROWS: u64 = 100_000;

/// 审计日志服务
///
/// 审计日志只追加，不提供修改和删除。
#[derive(Clone)]
pub struct AuditLogService {
    db: DatabaseConnection,
    stats_row_cap: u64,
}

impl AuditLogService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            stats_row_cap: MAX_STATS_ROWS,
        }
    }

    /// 调整统计扫描上限
    pub fn with_stats_row_cap(mut self, cap: u64) -> Self {
        self.stats_row_cap = cap.max(1);
        self
    }

    /// 写入一条审计记录
    pub async fn record(&self, entry: NewAuditEntry) -> Result<audit_logs::Model> {
        let outcome = entry.outcome;
        let model = audit_logs::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            user_id: Set(entry.user_id),
            action: Set(entry.action),
            resource: Set(entry.resource),
            resource_id: Set(entry.resource_id),
            outcome: Set(outcome.as_str().to_string()),
            ip_address: Set(entry.ip_address),
            user_agent: Set(entry.user_agent),
            details: Set(entry.details),
            created_at: Set(Utc::now().timestamp_millis()),
        }
        .insert(&self.db)
        .await?;

        cms_metrics::global().record_audit(outcome.as_str());
        debug!(
            audit_id = %model.id,
            action = %model.action,
            outcome = %model.outcome,
            "Audit record written"
        );

        Ok(model)
    }

    /// 按 ID 获取审计记录
    ///
    /// # 错误
    /// * `NotFound` - 记录不存在
    pub async fn get(&self, id: &str) -> Result<audit_logs::Model> {
        audit_logs::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("audit record {}", id)))
    }

    /// 分页查询审计记录，按时间倒序
    pub async fn list(&self, filter: &AuditLogFilter) -> Result<Page<audit_logs::Model>> {
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        let mut query = audit_logs::Entity::find();

        if let Some(user_id) = &filter.user_id {
            query = query.filter(audit_logs::Column::UserId.eq(user_id.clone()));
        }
        if let Some(action) = &filter.action {
            query = query.filter(audit_logs::Column::Action.eq(action.clone()));
        }
        if let Some(outcome) = filter.outcome {
            query = query.filter(audit_logs::Column::Outcome.eq(outcome.as_str()));
        }

        let total = query.clone().count(&self.db).await?;
        let items = query
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .limit(limit)
            .offset(filter.offset)
            .all(&self.db)
            .await?;

        Ok(Page {
            items,
            total,
            limit,
            offset: filter.offset,
        })
    }

    /// 统计最近 `days` 天的审计记录
    ///
    /// # 错误
    /// * `Validation` - `days` 不在 [1, 365] 内
    pub async fn stats(&self, days: u32, now: DateTime<Utc>) -> Result<AuditStats> {
        let window = StatsWindow::last_days(days, now)?;

        let rows = audit_logs::Entity::find()
            .filter(audit_logs::Column::CreatedAt.gte(window.since_millis()))
            .filter(audit_logs::Column::CreatedAt.lte(window.until_millis()))
            // 超出上限时丢弃最旧的记录，保证最近几天的桶完整
            .order_by_desc(audit_logs::Column::CreatedAt)
            .limit(self.stats_row_cap)
            .all(&self.db)
            .await?;

        let truncated = rows.len() as u64 >= self.stats_row_cap;
        if truncated {
            warn!(days = days, rows = rows.len(), "Audit stats hit the row cap");
        }

        let mut stats = aggregate_audit(&rows, &window);
        stats.truncated = truncated;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditOutcome;
    use sea_orm::{ConnectOptions, Database};

    async fn create_test_service() -> AuditLogService {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        crate::init_schema(&db).await.unwrap();
        AuditLogService::new(db)
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let service = create_test_service().await;

        let written = service
            .record(
                NewAuditEntry::new("auth.login", "session", AuditOutcome::Success)
                    .with_user("user-1")
                    .with_details(serde_json::json!({ "ip": "127.0.0.1" })),
            )
            .await
            .unwrap();

        let loaded = service.get(&written.id).await.unwrap();
        assert_eq!(loaded, written);
        assert_eq!(loaded.outcome, "success");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let service = create_test_service().await;
        let result = service.get("does-not-exist").await;
        assert!(matches!(result, Err(CmsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let service = create_test_service().await;

        for i in 0..5 {
            let outcome = if i % 2 == 0 { AuditOutcome::Success } else { AuditOutcome::Denied };
            service
                .record(NewAuditEntry::new("access", "audit", outcome).with_user("user-1"))
                .await
                .unwrap();
        }
        service
            .record(NewAuditEntry::new("auth.login", "session", AuditOutcome::Failure).with_user("user-2"))
            .await
            .unwrap();

        let page = service
            .list(&AuditLogFilter {
                user_id: Some("user-1".to_string()),
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);

        let denied = service
            .list(&AuditLogFilter {
                outcome: Some(AuditOutcome::Denied),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(denied.total, 2);
        assert!(denied.items.iter().all(|r| r.outcome == "denied"));
    }

    #[tokio::test]
    async fn test_stats_counts_recent_records() {
        let service = create_test_service().await;

        service
            .record(NewAuditEntry::new("auth.login", "session", AuditOutcome::Success).with_user("user-1"))
            .await
            .unwrap();
        service
            .record(NewAuditEntry::new("access", "audit", AuditOutcome::Denied).with_user("user-2"))
            .await
            .unwrap();

        let stats = service.stats(30, Utc::now()).await.unwrap();
        assert_eq!(stats.days, 30);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.denied_count, 1);
        assert_eq!(stats.daily.len(), 30);
        assert!(!stats.truncated);

        assert!(matches!(
            service.stats(400, Utc::now()).await,
            Err(CmsError::Validation { .. })
        ));
    }

    async fn insert_at(service: &AuditLogService, created_at: i64) {
        audit_logs::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            user_id: Set(Some("user-1".to_string())),
            action: Set("access".to_string()),
            resource: Set("audit".to_string()),
            resource_id: Set(None),
            outcome: Set(AuditOutcome::Success.as_str().to_string()),
            ip_address: Set(None),
            user_agent: Set(None),
            details: Set(None),
            created_at: Set(created_at),
        }
        .insert(&service.db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_capped_stats_keep_newest_rows() {
        let service = create_test_service().await.with_stats_row_cap(2);
        let now = Utc::now();
        for days_ago in [2, 1, 0] {
            insert_at(&service, (now - chrono::Duration::days(days_ago)).timestamp_millis()).await;
        }

        let stats = service.stats(7, now).await.unwrap();
        assert!(stats.truncated);
        assert_eq!(stats.total_events, 2);

        let count_on = |days_ago: i64| {
            let date = (now - chrono::Duration::days(days_ago)).date_naive();
            stats.daily.iter().find(|d| d.date == date).map(|d| d.count)
        };
        assert_eq!(count_on(0), Some(1));
        assert_eq!(count_on(1), Some(1));
        assert_eq!(count_on(2), Some(0));
    }
}
