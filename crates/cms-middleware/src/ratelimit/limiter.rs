use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{RateLimitStrategy, TokenBucket};

/// 被限流的主体
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitSubject<'a> {
    pub ip: Option<&'a str>,
    pub account: Option<&'a str>,
}

/// 限流器
///
/// 主体缺少某个维度（比如没有 IP）时，对应策略不参与判定。
#[derive(Clone)]
pub struct RateLimiter {
    strategies: Arc<Vec<RateLimitStrategy>>,
    buckets: Arc<RwLock<HashMap<String, Arc<TokenBucket>>>>,
}

impl RateLimiter {
    pub fn new(strategies: Vec<RateLimitStrategy>) -> Self {
        Self {
            strategies: Arc::new(strategies),
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 检查是否允许本次尝试，返回拒绝的策略名
    pub async fn check(&self, subject: &RateLimitSubject<'_>) -> Result<(), &'static str> {
        for strategy in self.strategies.iter() {
            let key = match strategy {
                RateLimitStrategy::ByIp { .. } => subject.ip.map(|ip| format!("ip:{}", ip)),
                RateLimitStrategy::ByAccount { .. } => {
                    subject.account.map(|account| format!("account:{}", account.to_lowercase()))
                }
                RateLimitStrategy::Global { .. } => Some("global".to_string()),
            };
            let Some(key) = key else { continue };

            if !self.check_token_bucket(key, strategy).await {
                warn!(
                    strategy = strategy.name(),
                    ip = ?subject.ip,
                    account = ?subject.account,
                    "Rate limit exceeded"
                );
                return Err(strategy.name());
            }
        }
        Ok(())
    }

    async fn check_token_bucket(&self, bucket_key: String, strategy: &RateLimitStrategy) -> bool {
        let bucket = {
            let mut buckets = self.buckets.write().await;
            buckets
                .entry(bucket_key)
                .or_insert_with(|| {
                    Arc::new(TokenBucket::new(strategy.capacity(), strategy.refill_rate()))
                })
                .clone()
        };

        bucket.try_acquire(1).await
    }

    /// 移除已补满的桶，返回移除数量
    pub async fn cleanup(&self) -> usize {
        let snapshot: Vec<(String, Arc<TokenBucket>)> = {
            let buckets = self.buckets.read().await;
            buckets.iter().map(|(k, b)| (k.clone(), b.clone())).collect()
        };

        let mut idle = Vec::new();
        for (key, bucket) in snapshot {
            if bucket.is_full().await {
                idle.push(key);
            }
        }

        let mut buckets = self.buckets.write().await;
        for key in &idle {
            buckets.remove(key);
        }
        debug!(removed = idle.len(), remaining = buckets.len(), "Cleaned up rate limiter buckets");
        idle.len()
    }

    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// 启动定期清理任务
    pub fn start_cleanup_task(&self, period: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject<'a>(ip: &'a str, account: &'a str) -> RateLimitSubject<'a> {
        RateLimitSubject {
            ip: Some(ip),
            account: Some(account),
        }
    }

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(vec![RateLimitStrategy::by_ip(5, 300)]);

        for i in 0..5 {
            assert!(limiter.check(&subject("192.168.1.1", "a")).await.is_ok(), "attempt {} should pass", i);
        }
        assert_eq!(limiter.check(&subject("192.168.1.1", "a")).await, Err("ip"));

        // 其他 IP 不受影响
        assert!(limiter.check(&subject("192.168.1.2", "a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_account_limit_across_ips() {
        let limiter = RateLimiter::new(vec![
            RateLimitStrategy::by_ip(5, 300),
            RateLimitStrategy::by_account(3, 300),
        ]);

        for i in 0..3 {
            let ip = format!("10.0.0.{}", i);
            assert!(limiter.check(&subject(&ip, "Admin@Example.com")).await.is_ok());
        }
        assert_eq!(
            limiter.check(&subject("10.0.0.9", "admin@example.com")).await,
            Err("account")
        );
    }

    #[tokio::test]
    async fn test_missing_dimension_is_skipped() {
        let limiter = RateLimiter::new(vec![RateLimitStrategy::by_ip(1, 300)]);
        let anonymous = RateLimitSubject::default();
        for _ in 0..3 {
            assert!(limiter.check(&anonymous).await.is_ok());
        }
        assert_eq!(limiter.bucket_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_full_buckets() {
        let limiter = RateLimiter::new(vec![RateLimitStrategy::global(2, 300)]);
        assert_eq!(limiter.cleanup().await, 0);

        limiter.check(&RateLimitSubject::default()).await.unwrap();
        assert_eq!(limiter.bucket_count().await, 1);
        // 刚消耗过，桶未满
        assert_eq!(limiter.cleanup().await, 0);

        let fast = RateLimiter::new(vec![RateLimitStrategy::global(100, 1)]);
        fast.check(&RateLimitSubject::default()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fast.cleanup().await, 1);
        assert_eq!(fast.bucket_count().await, 0);
    }
}
