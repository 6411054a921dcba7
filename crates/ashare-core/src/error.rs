//! 도메인 공통 에러 타입.
//!
//! 네트워크나 저장소에 닿기 전에 발생하는 입력 검증 에러만 다룹니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// 형식이 잘못되었거나 인식할 수 없는 종목 코드
    #[error("잘못된 종목 코드: {0}")]
    InvalidCode(String),

    /// 잘못된 입력 값 (주기, 복권 방식, 랭킹 구간 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
