//! A주 시장 데이터 수집과 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - Eastmoney 공급자 (일별/분 단위 자금 흐름, K선, 랭킹, 기본 정보, 종목 목록)
//! - 재시도/프록시 전환/호출 제한을 갖춘 HTTP 클라이언트
//! - 원본 행 → 타입 레코드 매퍼
//! - SQLite/MySQL upsert 저장소와 종목 코드 캐시

pub mod error;
pub mod labels;
pub mod mapper;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};
pub use mapper::{
    map_bars, map_fund_flow, map_minute_flow, map_profile, map_rank, parse_number, round_to,
    DateWindow,
};
pub use provider::{
    BarRequest, EastmoneyClient, HttpClient, HttpConfig, MarketDataSource, ProxySource,
    RateLimiter, RawRow, RetryPolicy,
};
pub use storage::{CodeCache, Dialect, StoreWriter};
