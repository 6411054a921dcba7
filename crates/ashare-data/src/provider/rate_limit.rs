//! 슬라이딩 윈도우 호출 제한기.
//!
//! 최근 `period` 동안의 호출 시각을 기록하고, 한도에 도달하면 가장 오래된
//! 호출이 윈도우를 벗어날 때까지 대기합니다.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// 호출 시각 윈도우.
#[derive(Debug)]
struct CallWindow {
    calls: VecDeque<Instant>,
    max_calls: usize,
    period: Duration,
}

impl CallWindow {
    fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            calls: VecDeque::with_capacity(max_calls),
            max_calls,
            period,
        }
    }

    /// `now` 시점의 호출을 허용하면 기록 후 `None`, 아니면 대기 시간을 반환.
    fn try_acquire(&mut self, now: Instant) -> Option<Duration> {
        while let Some(oldest) = self.calls.front() {
            if now.saturating_duration_since(*oldest) >= self.period {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        if self.calls.len() < self.max_calls {
            self.calls.push_back(now);
            return None;
        }

        let oldest = self.calls.front().copied().unwrap_or(now);
        Some(self.period.saturating_sub(now.saturating_duration_since(oldest)))
    }
}

/// 비동기 호출 제한기. 여러 태스크가 공유합니다.
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<CallWindow>,
}

impl RateLimiter {
    /// `period` 동안 최대 `max_calls`회 허용. `max_calls == 0`이면 `None`.
    pub fn new(max_calls: usize, period: Duration) -> Option<Self> {
        if max_calls == 0 || period.is_zero() {
            return None;
        }
        Some(Self {
            window: Mutex::new(CallWindow::new(max_calls, period)),
        })
    }

    /// 분당 호출 수로 생성합니다.
    pub fn per_minute(calls: usize) -> Option<Self> {
        Self::new(calls, Duration::from_secs(60))
    }

    /// 호출 슬롯을 얻을 때까지 대기합니다.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                window.try_acquire(Instant::now())
            };
            match wait {
                None => return,
                Some(delay) => {
                    debug!(wait_ms = delay.as_millis() as u64, "호출 한도 도달, 대기");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
