//! 수집 실행 모드.

pub mod fund_flow;
pub mod price_bars;
pub mod rank;
pub mod scheduler;
pub mod universe;

pub use fund_flow::{FundFlowRun, RangeSummary};
pub use price_bars::{daily_request, minute_request, MinuteFlowRun, PriceBarRun};
pub use rank::{collect_and_persist, collect_rank, poll_rank, render_rank, RankOptions};
pub use scheduler::{next_run_at, run_daily};
pub use universe::{load_universe, refresh_universe, UniverseFilter};
