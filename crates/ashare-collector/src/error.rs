//! 에러 타입 정의.

use ashare_data::DataError;
use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 저장소 에러 (flush 실패 등, 실행 중단)
    Database(DataError),
    /// 설정 에러 (네트워크/저장소 접근 전에 발생)
    Config(String),
    /// 데이터 소스 에러 (Eastmoney 등)
    DataSource(DataError),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::DataSource(e) => write!(f, "Data source error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) | Self::DataSource(e) => Some(e),
            Self::Config(_) => None,
        }
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Store(_) | DataError::Io(_) => Self::Database(err),
            DataError::Config(msg) => Self::Config(msg),
            other => Self::DataSource(other),
        }
    }
}

impl From<ashare_core::CoreError> for CollectorError {
    fn from(err: ashare_core::CoreError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_classification() {
        let store: CollectorError = DataError::Store("locked".into()).into();
        assert!(matches!(store, CollectorError::Database(_)));

        let net: CollectorError = DataError::Network("reset".into()).into();
        assert!(matches!(net, CollectorError::DataSource(_)));

        let cfg: CollectorError = DataError::Config("bad url".into()).into();
        assert_eq!(cfg.to_string(), "Configuration error: bad url");
    }
}
