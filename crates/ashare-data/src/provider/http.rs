//! 공유 HTTP 클라이언트.
//!
//! 프로세스 전체에서 하나의 [`HttpClient`]를 공유합니다. 프록시가 바뀌면
//! 새 `reqwest::Client` 스냅샷으로 교체하며, 진행 중인 요청은 자신이 읽은
//! 스냅샷을 그대로 사용합니다.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::proxy::ProxySource;
use super::rate_limit::RateLimiter;
use super::retry::{AttemptOutcome, RetryPolicy};
use crate::error::{DataError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// 오류 본문 로그 길이 상한.
const MAX_ERROR_BODY: usize = 200;

/// HTTP 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// 분당 호출 한도 (0 = 제한 없음)
    pub requests_per_minute: usize,
    pub referer: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            requests_per_minute: 0,
            referer: "https://data.eastmoney.com/".to_string(),
        }
    }
}

/// 특정 시점의 클라이언트와 프록시 조합.
#[derive(Debug)]
struct ClientSnapshot {
    client: reqwest::Client,
    proxy: Option<String>,
}

/// 재시도/프록시 전환/호출 제한을 갖춘 JSON GET 클라이언트.
#[derive(Debug)]
pub struct HttpClient {
    config: HttpConfig,
    snapshot: RwLock<Arc<ClientSnapshot>>,
    limiter: Option<RateLimiter>,
    proxy_source: Option<ProxySource>,
}

impl HttpClient {
    /// 프록시 없이 생성합니다.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = build_client(&config, None)?;
        let limiter = RateLimiter::per_minute(config.requests_per_minute);
        Ok(Self {
            config,
            snapshot: RwLock::new(Arc::new(ClientSnapshot {
                client,
                proxy: None,
            })),
            limiter,
            proxy_source: None,
        })
    }

    /// 프록시 공급원을 연결합니다. 실제 프록시는 [`refresh_proxy`](Self::refresh_proxy) 후 적용됩니다.
    pub fn with_proxy_source(mut self, source: Option<ProxySource>) -> Self {
        self.proxy_source = source;
        self
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// 현재 적용 중인 프록시 URL.
    pub async fn current_proxy(&self) -> Option<String> {
        self.snapshot.read().await.proxy.clone()
    }

    async fn load_snapshot(&self) -> Arc<ClientSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// 프록시 없는 클라이언트로 교체합니다.
    pub async fn disable_proxy(&self) -> Result<()> {
        let client = build_client(&self.config, None)?;
        *self.snapshot.write().await = Arc::new(ClientSnapshot {
            client,
            proxy: None,
        });
        Ok(())
    }

    /// 지정한 프록시로 교체합니다.
    pub async fn set_proxy(&self, proxy_url: &str) -> Result<()> {
        let client = build_client(&self.config, Some(proxy_url))?;
        *self.snapshot.write().await = Arc::new(ClientSnapshot {
            client,
            proxy: Some(proxy_url.to_string()),
        });
        Ok(())
    }

    /// 공급 API에서 새 프록시를 받아 적용합니다.
    ///
    /// 공급원이 없으면 아무것도 하지 않고 `Ok(false)`.
    pub async fn refresh_proxy(&self) -> Result<bool> {
        let Some(source) = &self.proxy_source else {
            return Ok(false);
        };
        // 공급 API는 항상 직접 연결로 호출
        let direct = build_client(&self.config, None)?;
        let proxy_url = source.fetch(&direct).await?;
        self.set_proxy(&proxy_url).await?;
        info!(proxy = %redact(&proxy_url), "프록시 갱신");
        Ok(true)
    }

    /// 주기적으로 프록시를 갱신하는 백그라운드 태스크를 시작합니다.
    pub fn spawn_proxy_refresher(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let client = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = client.refresh_proxy().await {
                    warn!(error = %e, "프록시 갱신 실패, 기존 설정 유지");
                }
            }
        })
    }

    /// GET 요청 후 JSON(또는 JSONP) 본문을 반환합니다.
    ///
    /// 재시도 가능한 오류는 정책에 따라 백오프 후 재시도하고, 프록시 경유
    /// 전송 오류는 직접 연결로 전환해 한 번 더 시도합니다.
    pub async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let policy = &self.config.retry;
        let mut attempt: u32 = 0;
        let mut proxy_fallback_used = false;

        loop {
            attempt += 1;
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            let snapshot = self.load_snapshot().await;
            let error = match send_once(&snapshot, url, query).await {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::Fatal(e) => {
                    warn!(url, attempt, error = %e, "요청 실패 (재시도 불가)");
                    return Err(e);
                }
                AttemptOutcome::Retryable(e) => e,
            };

            if matches!(error, DataError::Proxy(_)) && !proxy_fallback_used {
                proxy_fallback_used = true;
                warn!(url, error = %error, "프록시 요청 실패, 직접 연결로 전환");
                self.disable_proxy().await?;
                attempt -= 1;
                continue;
            }

            if !policy.should_retry(attempt) {
                warn!(url, attempts = attempt, error = %error, "요청 최종 실패");
                return Err(error);
            }

            let delay = policy.delay_for(attempt);
            debug!(
                url,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "요청 재시도 예정"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

async fn send_once(
    snapshot: &ClientSnapshot,
    url: &str,
    query: &[(&str, String)],
) -> AttemptOutcome<Value> {
    let transport_error = |e: reqwest::Error| {
        if snapshot.proxy.is_some() {
            DataError::Proxy(e.to_string())
        } else {
            DataError::Network(e.to_string())
        }
    };

    let response = match snapshot.client.get(url).query(query).send().await {
        Ok(r) => r,
        Err(e) => return AttemptOutcome::Retryable(transport_error(e)),
    };

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        truncate_utf8(&mut body, MAX_ERROR_BODY);
        return AttemptOutcome::from(Err::<Value, _>(DataError::HttpStatus {
            status: status.as_u16(),
            body,
        }));
    }

    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => return AttemptOutcome::Retryable(transport_error(e)),
    };

    match parse_body(&text) {
        Ok(value) => AttemptOutcome::Success(value),
        Err(e) => AttemptOutcome::Fatal(e),
    }
}

/// JSON 또는 `callback({...})` 형태의 JSONP 본문을 파싱합니다.
pub(crate) fn parse_body(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let payload = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed
    } else {
        extract_jsonp_payload(trimmed).unwrap_or(trimmed)
    };
    Ok(serde_json::from_str(payload)?)
}

fn extract_jsonp_payload(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close <= open {
        return None;
    }
    let payload = text[open + 1..close].trim();
    (!payload.is_empty()).then_some(payload)
}

fn build_client(config: &HttpConfig, proxy_url: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    let referer = HeaderValue::from_str(&config.referer)
        .map_err(|e| DataError::Config(format!("invalid referer: {e}")))?;
    headers.insert(REFERER, referer);

    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers);

    builder = match proxy_url {
        Some(url) => builder.proxy(
            reqwest::Proxy::all(url).map_err(|e| DataError::Config(format!("invalid proxy: {e}")))?,
        ),
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| DataError::Config(format!("failed to build HTTP client: {e}")))
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// 로그용으로 프록시 URL의 인증 정보를 가립니다.
fn redact(proxy_url: &str) -> String {
    match proxy_url.split_once('@') {
        Some((_, host)) => format!("http://***@{host}"),
        None => proxy_url.to_string(),
    }
}
