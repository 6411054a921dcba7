//! # A-Share Core
//!
//! A주 데이터 수집 파이프라인의 핵심 타입을 제공합니다.
//!
//! - 종목 코드 정규화 (`600519`, `sh600519`, `600519.SH` → `StockIdentifier`)
//! - 자금 흐름 / 가격 봉 / 기본 프로필 / 실시간 랭킹 레코드
//! - 거래일 캘린더 (요일 기반 근사)
//! - 로깅 인프라

pub mod calendar;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use calendar::{TradingCalendar, WeekdayCalendar};
pub use domain::*;
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use types::*;
