//! 가격 봉 주기, 복권 방식, 랭킹 구간.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 가격 봉 주기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarPeriod {
    Daily,
    Weekly,
    Monthly,
    /// 1분봉
    Min1,
    Min5,
    Min15,
    Min30,
    Min60,
}

impl BarPeriod {
    pub const MINUTES: [BarPeriod; 5] = [
        BarPeriod::Min1,
        BarPeriod::Min5,
        BarPeriod::Min15,
        BarPeriod::Min30,
        BarPeriod::Min60,
    ];

    /// Eastmoney `klt` 파라미터 값.
    pub fn klt(&self) -> u32 {
        match self {
            BarPeriod::Daily => 101,
            BarPeriod::Weekly => 102,
            BarPeriod::Monthly => 103,
            BarPeriod::Min1 => 1,
            BarPeriod::Min5 => 5,
            BarPeriod::Min15 => 15,
            BarPeriod::Min30 => 30,
            BarPeriod::Min60 => 60,
        }
    }

    /// 분봉이면 분 단위 간격.
    pub fn minutes(&self) -> Option<u32> {
        match self {
            BarPeriod::Daily | BarPeriod::Weekly | BarPeriod::Monthly => None,
            other => Some(other.klt()),
        }
    }

    pub fn is_intraday(&self) -> bool {
        self.minutes().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BarPeriod::Daily => "daily",
            BarPeriod::Weekly => "weekly",
            BarPeriod::Monthly => "monthly",
            BarPeriod::Min1 => "1",
            BarPeriod::Min5 => "5",
            BarPeriod::Min15 => "15",
            BarPeriod::Min30 => "30",
            BarPeriod::Min60 => "60",
        }
    }
}

impl fmt::Display for BarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let s = s.strip_suffix('m').unwrap_or(&s);
        match s {
            "daily" | "d" => Ok(BarPeriod::Daily),
            "weekly" | "w" => Ok(BarPeriod::Weekly),
            "monthly" => Ok(BarPeriod::Monthly),
            "1" => Ok(BarPeriod::Min1),
            "5" => Ok(BarPeriod::Min5),
            "15" => Ok(BarPeriod::Min15),
            "30" => Ok(BarPeriod::Min30),
            "60" => Ok(BarPeriod::Min60),
            _ => Err(CoreError::InvalidInput(format!("unknown bar period: {s}"))),
        }
    }
}

/// 복권(수정주가) 방식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjust {
    /// 원주가
    #[default]
    None,
    /// 전복권 (qfq)
    Qfq,
    /// 후복권 (hfq)
    Hfq,
}

impl Adjust {
    /// Eastmoney `fqt` 파라미터 값.
    pub fn fqt(&self) -> u8 {
        match self {
            Adjust::None => 0,
            Adjust::Qfq => 1,
            Adjust::Hfq => 2,
        }
    }

    /// DB `复权` 컬럼에 저장되는 라벨.
    pub fn label(&self) -> &'static str {
        match self {
            Adjust::None => "不复权",
            Adjust::Qfq => "前复权",
            Adjust::Hfq => "后复权",
        }
    }
}

impl FromStr for Adjust {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "不复权" => Ok(Adjust::None),
            "qfq" | "前复权" => Ok(Adjust::Qfq),
            "hfq" | "后复权" => Ok(Adjust::Hfq),
            other => Err(CoreError::InvalidInput(format!("unknown adjust: {other}"))),
        }
    }
}

/// 자금 흐름 랭킹 집계 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankWindow {
    Today,
    Days3,
    Days5,
    Days10,
}

impl RankWindow {
    pub const ALL: [RankWindow; 4] = [
        RankWindow::Today,
        RankWindow::Days3,
        RankWindow::Days5,
        RankWindow::Days10,
    ];

    /// DB `指标` 컬럼 및 출력용 라벨.
    pub fn label(&self) -> &'static str {
        match self {
            RankWindow::Today => "今日",
            RankWindow::Days3 => "3日",
            RankWindow::Days5 => "5日",
            RankWindow::Days10 => "10日",
        }
    }
}

impl fmt::Display for RankWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RankWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" | "今日" | "1d" => Ok(RankWindow::Today),
            "3d" | "3日" => Ok(RankWindow::Days3),
            "5d" | "5日" => Ok(RankWindow::Days5),
            "10d" | "10日" => Ok(RankWindow::Days10),
            other => Err(CoreError::InvalidInput(format!("unknown rank window: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_period_parse() {
        assert_eq!("daily".parse::<BarPeriod>().unwrap(), BarPeriod::Daily);
        assert_eq!("15m".parse::<BarPeriod>().unwrap(), BarPeriod::Min15);
        assert_eq!("60".parse::<BarPeriod>().unwrap(), BarPeriod::Min60);
        assert!("2".parse::<BarPeriod>().is_err());
    }

    #[test]
    fn test_bar_period_klt() {
        assert_eq!(BarPeriod::Weekly.klt(), 102);
        assert_eq!(BarPeriod::Min5.minutes(), Some(5));
        assert!(!BarPeriod::Monthly.is_intraday());
    }

    #[test]
    fn test_adjust_labels() {
        assert_eq!("".parse::<Adjust>().unwrap().label(), "不复权");
        assert_eq!("qfq".parse::<Adjust>().unwrap().label(), "前复权");
        assert_eq!("HFQ".parse::<Adjust>().unwrap().fqt(), 2);
        assert!("xfq".parse::<Adjust>().is_err());
    }

    #[test]
    fn test_rank_window_parse() {
        assert_eq!("3d".parse::<RankWindow>().unwrap(), RankWindow::Days3);
        assert_eq!("今日".parse::<RankWindow>().unwrap(), RankWindow::Today);
        assert_eq!(RankWindow::Days10.to_string(), "10日");
    }
}
