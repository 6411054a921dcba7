//! 데이터 모듈 오류 타입.

use ashare_core::CoreError;
use thiserror::Error;

/// 데이터 수집/저장 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 전송 계층 오류 (연결 실패, 타임아웃 등)
    #[error("Network error: {0}")]
    Network(String),

    /// 프록시 경유 요청 실패
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// 업스트림이 비정상 HTTP 상태를 반환
    #[error("Upstream returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 업스트림 응답을 해석할 수 없음
    #[error("Parse error: {0}")]
    Parse(String),

    /// 저장소 오류
    #[error("Store error: {0}")]
    Store(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    Config(String),

    /// 파일 입출력 오류 (코드 캐시 등)
    #[error("I/O error: {0}")]
    Io(String),

    /// 잘못된 종목 코드
    #[error(transparent)]
    InvalidCode(#[from] CoreError),
}

impl DataError {
    /// 재시도로 회복될 수 있는 오류인지 확인.
    ///
    /// 전송 오류, 429, 5xx만 재시도 대상입니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataError::Network(_) | DataError::Proxy(_) => true,
            DataError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DataError::Store(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DataError::Store("connection pool timed out".to_string()),
            other => DataError::Store(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
