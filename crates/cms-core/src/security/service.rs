use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{info, warn};

use crate::entity::security_events;
use crate::pagination::{Page, MAX_PAGE_SIZE};
use crate::security::{aggregate_security, NewSecurityEvent, SecurityEventFilter, SecurityStats};
use crate::stats::StatsWindow;
use crate::{CmsError, Result};

const MAX_STATS_ROWS: u64 = 100_000;

/// 安全事件服务
#[derive(Clone)]
pub struct SecurityEventService {
    db: DatabaseConnection,
    stats_row_cap: u64,
}

impl SecurityEventService {
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

    /// 记录安全事件
    pub async fn record(&self, event: NewSecurityEvent) -> Result<security_events::Model> {
        if event.event_type.trim().is_empty() {
            return Err(CmsError::validation("event_type", "must not be empty"));
        }

        let severity = event.severity;
        let model = security_events::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            event_type: Set(event.event_type),
            severity: Set(severity.as_str().to_string()),
            user_id: Set(event.user_id),
            ip_address: Set(event.ip_address),
            description: Set(event.description),
            details: Set(event.details),
            created_at: Set(Utc::now().timestamp_millis()),
        }
        .insert(&self.db)
        .await?;

        cms_metrics::global().record_security_event(severity.as_str());
        info!(
            event_id = %model.id,
            event_type = %model.event_type,
            severity = %model.severity,
            ip = ?model.ip_address,
            "Security event recorded"
        );

        Ok(model)
    }

    /// 分页查询安全事件，按时间倒序
    pub async fn list(&self, filter: &SecurityEventFilter) -> Result<Page<security_events::Model>> {
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        let mut query = security_events::Entity::find();

        if let Some(severity) = filter.severity {
            query = query.filter(security_events::Column::Severity.eq(severity.as_str()));
        }
        if let Some(event_type) = &filter.event_type {
            query = query.filter(security_events::Column::EventType.eq(event_type.clone()));
        }

        let total = query.clone().count(&self.db).await?;
        let items = query
            .order_by_desc(security_events::Column::CreatedAt)
            .order_by_desc(security_events::Column::Id)
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

    /// 统计最近 `days` 天的安全事件并给出威胁评估
    pub async fn stats(&self, days: u32, now: DateTime<Utc>) -> Result<SecurityStats> {
        let window = StatsWindow::last_days(days, now)?;

        let rows = security_events::Entity::find()
            .filter(security_events::Column::CreatedAt.gte(window.since_millis()))
            .filter(security_events::Column::CreatedAt.lte(window.until_millis()))
            // 超出上限时丢弃最旧的记录，保证最近几天的桶完整
            .order_by_desc(security_events::Column::CreatedAt)
            .limit(self.stats_row_cap)
            .all(&self.db)
            .await?;

        let truncated = rows.len() as u64 >= self.stats_row_cap;
        if truncated {
            warn!(days = days, rows = rows.len(), "Security stats hit the row cap");
        }

        let mut stats = aggregate_security(&rows, &window);
        stats.truncated = truncated;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{event_types, Severity, ThreatLevel};
    use sea_orm::{ConnectOptions, Database};

    async fn create_test_service() -> SecurityEventService {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        crate::init_schema(&db).await.unwrap();
        SecurityEventService::new(db)
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let service = create_test_service().await;

        service
            .record(
                NewSecurityEvent::new(event_types::LOGIN_FAILED, Severity::Low, "bad password")
                    .with_ip(Some("10.1.1.1".to_string())),
            )
            .await
            .unwrap();
        service
            .record(NewSecurityEvent::new("privilege.escalation", Severity::Critical, "role changed"))
            .await
            .unwrap();

        let all = service.list(&SecurityEventFilter::default()).await.unwrap();
        assert_eq!(all.total, 2);

        let critical = service
            .list(&SecurityEventFilter {
                severity: Some(Severity::Critical),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(critical.total, 1);
        assert_eq!(critical.items[0].event_type, "privilege.escalation");
    }

    #[tokio::test]
    async fn test_record_rejects_empty_type() {
        let service = create_test_service().await;
        let result = service
            .record(NewSecurityEvent::new("  ", Severity::Low, "nothing"))
            .await;
        assert!(matches!(result, Err(CmsError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_stats_threat_assessment() {
        let service = create_test_service().await;

        for _ in 0..3 {
            service
                .record(NewSecurityEvent::new(event_types::LOGIN_FAILED, Severity::Low, "bad password"))
                .await
                .unwrap();
        }

        let stats = service.stats(7, Utc::now()).await.unwrap();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.failed_logins, 3);
        assert_eq!(stats.threat.score, 3);
        assert_eq!(stats.threat.level, ThreatLevel::Low);
    }

    #[tokio::test]
    async fn test_capped_stats_keep_newest_rows() {
        let service = create_test_service().await.with_stats_row_cap(2);
        let now = Utc::now();
        for (days_ago, severity) in [(3, Severity::Critical), (1, Severity::Low), (0, Severity::Low)] {
            security_events::ActiveModel {
                id: Set(uuid::Uuid::new_v4().to_string()),
                event_type: Set(event_types::LOGIN_FAILED.to_string()),
                severity: Set(severity.as_str().to_string()),
                user_id: Set(None),
                ip_address: Set(None),
                description: Set("bad password".to_string()),
                details: Set(None),
                created_at: Set((now - chrono::Duration::days(days_ago)).timestamp_millis()),
            }
            .insert(&service.db)
            .await
            .unwrap();
        }

        let stats = service.stats(7, now).await.unwrap();
        assert!(stats.truncated);
        assert_eq!(stats.total_events, 2);
        // 最旧的 critical 被丢弃
        assert_eq!(stats.threat.score, 2);
        assert_eq!(stats.daily.last().map(|d| d.count), Some(1));
    }
}
