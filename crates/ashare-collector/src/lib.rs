//! A주 자금 흐름 대량 수집기.
//!
//! 이 crate는 수집 바이너리와 그 구성 요소를 제공합니다:
//! - 종목별 동시 수집 오케스트레이터 (재시도, 중간 저장, 진행 로그)
//! - 실행 모드: 단일 일자, 기간 채우기, 전체 이력, 정기 실행
//! - 부가 수집: 일/분봉, 실시간 랭킹, 최초 일자, 종목 목록 갱신

pub mod config;
pub mod error;
pub mod modules;
pub mod orchestrator;
pub mod sink;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use orchestrator::{run_batch, BatchOptions, BatchResult, SymbolFailure, TaskOutput};
pub use sink::{DryRunSink, RecordSink, StoreSink};
pub use stats::CollectionStats;
