//! 종목 식별자와 코드 정규화.
//!
//! 입력 형식이 제각각인 종목 코드(`600519`, `sh600519`, `600519.SH`)를
//! 하나의 [`StockIdentifier`]로 정규화합니다. 네트워크 호출 전에
//! 잘못된 코드를 걸러내는 것이 목적입니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// 상하이 거래소 코드 접두사.
const SH_PREFIXES: &[&str] = &["600", "601", "603", "605", "688"];
/// 선전 거래소 코드 접두사.
const SZ_PREFIXES: &[&str] = &["000", "001", "002", "003", "300", "301"];
/// 베이징 거래소 코드 접두사.
const BJ_PREFIXES: &[&str] = &[
    "430", "830", "831", "833", "835", "836", "838", "839", "870", "871", "872",
];

const CODE_LEN: usize = 6;

/// A주 거래소.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// 상하이 증권거래소
    Sh,
    /// 선전 증권거래소
    Sz,
    /// 베이징 증권거래소
    Bj,
}

impl Exchange {
    pub const ALL: [Exchange; 3] = [Exchange::Sh, Exchange::Sz, Exchange::Bj];

    /// 대문자 거래소 코드 ("SH" / "SZ" / "BJ").
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Sh => "SH",
            Exchange::Sz => "SZ",
            Exchange::Bj => "BJ",
        }
    }

    /// Eastmoney `secid`의 시장 번호. 상하이만 1, 나머지는 0.
    pub fn market_id(&self) -> u8 {
        match self {
            Exchange::Sh => 1,
            Exchange::Sz | Exchange::Bj => 0,
        }
    }

    /// 숫자 접두사로 거래소를 추정합니다. 알 수 없는 접두사는 상하이로 봅니다.
    pub fn infer(code: &str) -> Self {
        let has_prefix = |table: &[&str]| table.iter().any(|p| code.starts_with(p));
        if has_prefix(SZ_PREFIXES) {
            Exchange::Sz
        } else if has_prefix(BJ_PREFIXES) {
            Exchange::Bj
        } else {
            Exchange::Sh
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SH" => Ok(Exchange::Sh),
            "SZ" => Ok(Exchange::Sz),
            "BJ" => Ok(Exchange::Bj),
            other => Err(CoreError::InvalidCode(format!("unknown exchange {other}"))),
        }
    }
}

/// 정규화된 종목 식별자.
///
/// 생성 후 변경할 수 없습니다. `code`는 항상 ASCII 숫자 6자리입니다.
/// 직렬화 형식은 `600519.SH`이며 역직렬화는 [`normalize`]를 거칩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StockIdentifier {
    code: String,
    exchange: Exchange,
}

impl StockIdentifier {
    /// 코드와 거래소로 식별자를 만듭니다.
    pub fn new(code: impl Into<String>, exchange: Exchange) -> CoreResult<Self> {
        let code = code.into();
        if !is_valid_code(&code) {
            return Err(CoreError::InvalidCode(code));
        }
        Ok(Self { code, exchange })
    }

    /// 6자리 종목 코드.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// `600519.SH` 형식.
    pub fn ts_code(&self) -> String {
        format!("{}.{}", self.code, self.exchange)
    }

    /// Eastmoney `secid` (`1.600519`, `0.000001`).
    pub fn secid(&self) -> String {
        format!("{}.{}", self.exchange.market_id(), self.code)
    }
}

impl fmt::Display for StockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.exchange)
    }
}

impl FromStr for StockIdentifier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

impl TryFrom<String> for StockIdentifier {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        normalize(&raw)
    }
}

impl From<StockIdentifier> for String {
    fn from(id: StockIdentifier) -> Self {
        id.ts_code()
    }
}

/// 임의 형식의 종목 코드를 정규화합니다.
///
/// - `600519.SH` → 점 기준으로 분리, 거래소는 SH/SZ/BJ 중 하나여야 함
/// - `sh600519` → 접두사 제거
/// - `600519` → 숫자 접두사로 거래소 추정
///
/// 코드 부분은 마지막 6글자만 사용합니다.
pub fn normalize(raw: &str) -> CoreResult<StockIdentifier> {
    let cleaned = raw.trim().to_uppercase();
    let invalid = || CoreError::InvalidCode(raw.to_string());

    if cleaned.is_empty() {
        return Err(invalid());
    }

    let (code, exchange) = if cleaned.contains('.') {
        let mut parts = cleaned.split('.');
        let (Some(code), Some(exchange), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let exchange = exchange.parse::<Exchange>().map_err(|_| invalid())?;
        (tail(code, CODE_LEN), Some(exchange))
    } else if let Some((exchange, rest)) = strip_exchange_prefix(&cleaned) {
        (tail(rest, CODE_LEN), Some(exchange))
    } else {
        (tail(&cleaned, CODE_LEN), None)
    };

    if !is_valid_code(code) {
        return Err(invalid());
    }

    let exchange = exchange.unwrap_or_else(|| Exchange::infer(code));
    Ok(StockIdentifier {
        code: code.to_string(),
        exchange,
    })
}

fn strip_exchange_prefix(s: &str) -> Option<(Exchange, &str)> {
    Exchange::ALL
        .iter()
        .find_map(|ex| s.strip_prefix(ex.as_str()).map(|rest| (*ex, rest)))
}

/// 문자 단위로 마지막 `n`글자를 잘라냅니다.
fn tail(s: &str, n: usize) -> &str {
    let len = s.chars().count();
    if len <= n {
        return s;
    }
    match s.char_indices().nth(len - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
