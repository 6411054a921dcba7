//! 환경변수 기반 설정 모듈.
//!
//! `.env`를 먼저 읽고, CLI 플래그가 있으면 `main`에서 덮어씁니다.

use crate::error::CollectorError;
use crate::Result;
use ashare_data::{HttpConfig, ProxySource, RetryPolicy};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 저장소 DSN (`MYSQL_DSN` 또는 `APP_MYSQL_DSN`)
    pub dsn: Option<String>,
    pub bulk: BulkConfig,
    pub http: HttpSettings,
    pub proxy: ProxyConfig,
    /// 종목 코드 캐시 파일
    pub code_cache_path: PathBuf,
    pub schedule: ScheduleConfig,
}

/// 대량 수집 설정
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// 동시 작업 수
    pub workers: usize,
    /// 버퍼가 이 수에 도달하면 저장
    pub batch_size: usize,
    /// 종목당 최대 시도 횟수
    pub task_attempts: u32,
    /// 선형 백오프 단위 (밀리초)
    pub task_backoff_ms: u64,
    /// 진행 상황 출력 주기 (완료 종목 수)
    pub progress_every: usize,
}

/// HTTP 요청 설정
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    /// 분당 요청 한도 (0 = 무제한)
    pub requests_per_minute: usize,
}

/// 프록시 설정
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub source: Option<ProxySource>,
    /// 갱신 주기 (초, 0 = 갱신 안 함)
    pub refresh_interval_secs: u64,
}

/// 정기 실행 설정
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub timezone: Tz,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let dsn = ["MYSQL_DSN", "APP_MYSQL_DSN"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());

        let timezone_name = std::env::var("SCHEDULE_TZ").unwrap_or_else(|_| "Asia/Shanghai".into());
        let timezone: Tz = timezone_name.parse().map_err(|_| {
            CollectorError::Config(format!("알 수 없는 시간대: {timezone_name}"))
        })?;

        let hour: u32 = env_var_parse("SCHEDULE_HOUR", 16);
        if hour > 23 {
            return Err(CollectorError::Config(format!(
                "SCHEDULE_HOUR 범위 초과: {hour}"
            )));
        }

        Ok(Self {
            dsn,
            bulk: BulkConfig {
                workers: env_var_parse("BULK_WORKERS", 20),
                batch_size: env_var_parse("BULK_BATCH_SIZE", 2000),
                task_attempts: env_var_parse("BULK_TASK_ATTEMPTS", 3),
                task_backoff_ms: env_var_parse("BULK_TASK_BACKOFF_MS", 1000),
                progress_every: env_var_parse("PROGRESS_EVERY", 50),
            },
            http: HttpSettings {
                max_attempts: env_var_parse("HTTP_MAX_ATTEMPTS", 4),
                timeout_secs: env_var_parse("HTTP_TIMEOUT_SECS", 10),
                requests_per_minute: env_var_parse("HTTP_RPM", 0),
            },
            proxy: ProxyConfig {
                source: ProxySource::from_env(),
                refresh_interval_secs: env_var_parse("PROXY_REFRESH_INTERVAL", 0),
            },
            code_cache_path: std::env::var("CODE_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/all_codes.json")),
            schedule: ScheduleConfig { hour, timezone },
        })
    }

    /// DSN이 없으면 설정 에러.
    pub fn require_dsn(&self) -> Result<&str> {
        self.dsn.as_deref().ok_or_else(|| {
            CollectorError::Config(
                "MYSQL_DSN(또는 APP_MYSQL_DSN)이 설정되지 않았습니다. --dsn 또는 --dry-run을 사용하세요"
                    .to_string(),
            )
        })
    }

    /// HTTP 클라이언트 설정
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.http.timeout_secs.max(1)),
            retry: RetryPolicy::default().with_max_attempts(self.http.max_attempts),
            requests_per_minute: self.http.requests_per_minute,
            ..Default::default()
        }
    }
}

impl BulkConfig {
    pub fn task_backoff(&self) -> Duration {
        Duration::from_millis(self.task_backoff_ms)
    }
}

impl ProxyConfig {
    /// 주기 갱신이 켜져 있으면 주기를 반환
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.source.is_some() && self.refresh_interval_secs > 0)
            .then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_parse_fallback() {
        assert_eq!(env_var_parse("ASHARE_TEST_SURELY_UNSET_KEY", 7usize), 7);
    }

    #[test]
    fn test_proxy_refresh_requires_source() {
        let proxy = ProxyConfig {
            source: None,
            refresh_interval_secs: 30,
        };
        assert_eq!(proxy.refresh_interval(), None);

        let proxy = ProxyConfig {
            source: Some(ProxySource::new("http://proxy.local/get")),
            refresh_interval_secs: 30,
        };
        assert_eq!(proxy.refresh_interval(), Some(Duration::from_secs(30)));
    }
}
