use async_trait::async_trait;
use cms_core::{
    security::event_types, AuditLogService, AuditOutcome, NewAuditEntry, NewSecurityEvent,
    SecurityEventService, Severity,
};
use cms_middleware::{AccessDecision, AuditSink};
use serde_json::json;

/// 把授权判定写入审计日志；拒绝同时记一条安全事件
pub struct DbAuditSink {
    audit: AuditLogService,
    security: SecurityEventService,
}

impl DbAuditSink {
    pub fn new(audit: AuditLogService, security: SecurityEventService) -> Self {
        Self { audit, security }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record_decision(&self, decision: &AccessDecision) -> anyhow::Result<()> {
        let (action, outcome) = if decision.granted() {
            ("access.granted", AuditOutcome::Success)
        } else {
            ("access.denied", AuditOutcome::Denied)
        };

        let required: Vec<String> = decision.required.iter().map(ToString::to_string).collect();
        let missing = decision.missing.map(|p| p.to_string());
        let details = json!({
            "method": decision.method,
            "path": decision.path,
            "role": decision.role,
            "required": required,
            "missing": missing,
        });

        self.audit
            .record(
                NewAuditEntry::new(action, decision.resource(), outcome)
                    .with_user(decision.user_id.clone())
                    .with_client(decision.ip_address.clone(), decision.user_agent.clone())
                    .with_details(details.clone()),
            )
            .await?;

        if !decision.granted() {
            self.security
                .record(
                    NewSecurityEvent::new(
                        event_types::ACCESS_DENIED,
                        Severity::Medium,
                        format!("{} {} denied for role {}", decision.method, decision.path, decision.role),
                    )
                    .with_user(decision.user_id.clone())
                    .with_ip(decision.ip_address.clone())
                    .with_details(details),
                )
                .await?;
        }

        Ok(())
    }
}
