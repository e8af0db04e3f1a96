use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};

lazy_static! {
    static ref GLOBAL: MetricsCollector =
        MetricsCollector::new().expect("metric names are static and registered once");
}

/// 进程级指标收集器
pub fn global() -> &'static MetricsCollector {
    &GLOBAL
}

/// 性能与安全指标收集器
pub struct MetricsCollector {
    // HTTP 指标
    http_requests_total: CounterVec,
    http_request_duration: HistogramVec,

    // 认证与授权指标
    auth_failures_total: CounterVec,
    access_decisions_total: CounterVec,
    login_attempts_total: CounterVec,
    sessions_created_total: IntCounter,

    // 审计与安全事件指标
    audit_records_total: CounterVec,
    security_events_total: CounterVec,

    registry: Registry,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // HTTP 指标
        let http_requests_total = CounterVec::new(
            Opts::new("cms_http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("cms_http_request_duration_seconds", "HTTP request duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method", "route"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        // 认证与授权指标
        let auth_failures_total = CounterVec::new(
            Opts::new(
                "cms_auth_failures_total",
                "Requests whose session could not be resolved",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(auth_failures_total.clone()))?;

        let access_decisions_total = CounterVec::new(
            Opts::new(
                "cms_access_decisions_total",
                "Permission evaluations by resource and decision",
            ),
            &["resource", "decision"],
        )?;
        registry.register(Box::new(access_decisions_total.clone()))?;

        let login_attempts_total = CounterVec::new(
            Opts::new("cms_login_attempts_total", "Login attempts by result"),
            &["result"],
        )?;
        registry.register(Box::new(login_attempts_total.clone()))?;

        let sessions_created_total =
            IntCounter::new("cms_sessions_created_total", "Total number of sessions created")?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        // 审计与安全事件指标
        let audit_records_total = CounterVec::new(
            Opts::new("cms_audit_records_total", "Audit records written by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(audit_records_total.clone()))?;

        let security_events_total = CounterVec::new(
            Opts::new(
                "cms_security_events_total",
                "Security events recorded by severity",
            ),
            &["severity"],
        )?;
        registry.register(Box::new(security_events_total.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration,
            auth_failures_total,
            access_decisions_total,
            login_attempts_total,
            sessions_created_total,
            audit_records_total,
            security_events_total,
            registry,
        })
    }

    // HTTP 指标记录
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration: f64) {
        self.http_requests_total
            .with_label_values(&[method, route, &status.to_string()])
            .inc();

        self.http_request_duration
            .with_label_values(&[method, route])
            .observe(duration);
    }

    // 认证与授权
    pub fn record_auth_failure(&self, reason: &str) {
        self.auth_failures_total.with_label_values(&[reason]).inc();
    }

    pub fn record_access_decision(&self, resource: &str, granted: bool) {
        let decision = if granted { "granted" } else { "denied" };
        self.access_decisions_total
            .with_label_values(&[resource, decision])
            .inc();
    }

    pub fn record_login_attempt(&self, result: &str) {
        self.login_attempts_total.with_label_values(&[result]).inc();
    }

    pub fn record_session_created(&self) {
        self.sessions_created_total.inc();
    }

    // 审计与安全事件
    pub fn record_audit(&self, outcome: &str) {
        self.audit_records_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_security_event(&self, severity: &str) {
        self.security_events_total
            .with_label_values(&[severity])
            .inc();
    }

    /// 以 Prometheus 文本格式导出
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
