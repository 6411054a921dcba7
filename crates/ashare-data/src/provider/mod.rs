//! 시장 데이터 공급자.
//!
//! - [`HttpClient`]: 재시도/프록시/호출 제한을 갖춘 공유 HTTP 클라이언트
//! - [`EastmoneyClient`]: Eastmoney push2/push2his 엔드포인트
//! - [`MarketDataSource`]: 수집기가 의존하는 추상화

mod eastmoney;
mod http;
mod proxy;
mod rate_limit;
mod retry;

pub use eastmoney::{BarRequest, EastmoneyClient, MarketDataSource, RawRow};
pub use http::{HttpClient, HttpConfig};
pub use proxy::ProxySource;
pub use rate_limit::RateLimiter;
pub use retry::{AttemptOutcome, RetryPolicy};
