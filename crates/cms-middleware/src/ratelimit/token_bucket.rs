use std::time::Instant;
use tokio::sync::Mutex;
use tracing::debug;

/// 令牌桶
///
/// 令牌按 `refill_rate`（每秒）连续补充，上限为 `capacity`。
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<TokenState>,
}

struct TokenState {
    current: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// 创建满桶
    pub fn new(capacity: u64, refill_rate: f64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_rate,
            state: Mutex::new(TokenState {
                current: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 尝试获取指定数量的令牌（非阻塞）
    pub async fn try_acquire(&self, tokens: u64) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        let wanted = tokens as f64;
        if state.current >= wanted {
            state.current -= wanted;
            debug!(tokens = tokens, remaining = state.current, "Tokens acquired");
            true
        } else {
            debug!(tokens = tokens, available = state.current, "Insufficient tokens");
            false
        }
    }

    fn refill(&self, state: &mut TokenState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.current = (state.current + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// 当前可用的整令牌数
    pub async fn available(&self) -> u64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.current.floor() as u64
    }

    /// 桶已补满，可以安全丢弃
    pub async fn is_full(&self) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.current >= self.capacity
    }
}
