//! Eastmoney 시세/자금 흐름 공급자.
//!
//! push2his(일봉 자금 흐름, K선)와 push2(당일 분 단위 자금 흐름, 랭킹,
//! 종목 목록, 기본 정보) 엔드포인트를 호출해 라벨이 붙은 원본 행([`RawRow`])을 반환합니다.
//! 숫자 변환과 단위 환산은 [`crate::mapper`]가 담당합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::http::HttpClient;
use crate::error::{DataError, Result};
use crate::labels;
use ashare_core::{Adjust, BarPeriod, FlowTier, RankWindow, StockIdentifier};

/// 라벨 → 원본 문자열 값.
pub type RawRow = BTreeMap<&'static str, String>;

const PUSH2_BASE: &str = "https://push2.eastmoney.com";
const PUSH2HIS_BASE: &str = "https://push2his.eastmoney.com";

/// 종목 목록 한 페이지 크기.
const UNIVERSE_PAGE_SIZE: usize = 500;
/// 종목 목록 최대 페이지 수.
const UNIVERSE_MAX_PAGES: usize = 200;

/// 상하이/선전/베이징 A주 전체.
const A_SHARE_FILTER: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23,m:0+t:81+s:2048";

/// K선 조회 조건.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarRequest {
    pub period: BarPeriod,
    pub adjust: Adjust,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl BarRequest {
    pub fn new(period: BarPeriod, adjust: Adjust) -> Self {
        Self {
            period,
            adjust,
            start: None,
            end: None,
        }
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// 수집기가 의존하는 시장 데이터 공급자.
///
/// 업스트림이 성공했지만 데이터가 없으면 빈 결과를 반환하고, 오류로
/// 취급하지 않습니다.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 일별 자금 흐름 전체 이력.
    async fn fetch_fund_flow(&self, id: &StockIdentifier) -> Result<Vec<RawRow>>;

    /// 당일 1분 단위 자금 흐름.
    async fn fetch_minute_flow(&self, id: &StockIdentifier) -> Result<Vec<RawRow>>;

    /// 일/주/월봉 또는 분봉.
    async fn fetch_bars(&self, id: &StockIdentifier, request: &BarRequest) -> Result<Vec<RawRow>>;

    /// 기본 정보. 데이터가 없으면 빈 행.
    async fn fetch_profile(&self, id: &StockIdentifier) -> Result<RawRow>;

    /// 자금 흐름 순유입 상위 종목.
    async fn fetch_rank(&self, window: RankWindow, limit: usize) -> Result<Vec<RawRow>>;

    /// 전체 A주 종목 코드 (중복 제거).
    async fn fetch_code_universe(&self) -> Result<Vec<String>>;
}

/// Eastmoney 클라이언트.
#[derive(Debug, Clone)]
pub struct EastmoneyClient {
    http: Arc<HttpClient>,
    push2_base: String,
    push2his_base: String,
}

impl EastmoneyClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            push2_base: PUSH2_BASE.to_string(),
            push2his_base: PUSH2HIS_BASE.to_string(),
        }
    }

    /// 엔드포인트 호스트를 바꿉니다 (테스트용 목 서버 등).
    pub fn with_base_urls(mut self, push2: impl Into<String>, push2his: impl Into<String>) -> Self {
        self.push2_base = push2.into().trim_end_matches('/').to_string();
        self.push2his_base = push2his.into().trim_end_matches('/').to_string();
        self
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    async fn get_data(&self, url: String, query: &[(&str, String)]) -> Result<Option<Value>> {
        let body = self.http.get_json(&url, query).await?;
        match body.get("data") {
            Some(Value::Null) | None => Ok(None),
            Some(data) => Ok(Some(data.clone())),
        }
    }

    async fn fetch_universe_page(&self, page: usize) -> Result<(Vec<String>, Option<u64>)> {
        let url = format!("{}/api/qt/clist/get", self.push2_base);
        let query = [
            ("pn", page.to_string()),
            ("pz", UNIVERSE_PAGE_SIZE.to_string()),
            ("po", "1".to_string()),
            ("np", "1".to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fid", "f3".to_string()),
            ("fs", A_SHARE_FILTER.to_string()),
            ("fields", "f12".to_string()),
        ];
        let Some(data) = self.get_data(url, &query).await? else {
            return Ok((Vec::new(), None));
        };

        let total = data.get("total").and_then(Value::as_u64);
        let codes = diff_items(&data)
            .into_iter()
            .map(|item| value_text(item.get("f12").unwrap_or(&Value::Null)))
            .filter(|code| !code.is_empty())
            .collect();
        Ok((codes, total))
    }
}

#[async_trait]
impl MarketDataSource for EastmoneyClient {
    #[instrument(skip(self), fields(code = %id))]
    async fn fetch_fund_flow(&self, id: &StockIdentifier) -> Result<Vec<RawRow>> {
        let url = format!("{}/api/qt/stock/fflow/daykline/get", self.push2his_base);
        let query = [
            ("lmt", "0".to_string()),
            ("klt", "101".to_string()),
            ("secid", id.secid()),
            ("fields1", "f1,f2,f3,f7".to_string()),
            (
                "fields2",
                "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61,f62,f63,f64,f65".to_string(),
            ),
        ];

        let Some(data) = self.get_data(url, &query).await? else {
            debug!("자금 흐름 데이터 없음");
            return Ok(Vec::new());
        };
        let name = data.get("name").map(value_text).filter(|s| !s.is_empty());
        let rows = split_klines(&data, &labels::FUND_FLOW_COLUMNS, name.as_deref());
        debug!(rows = rows.len(), "자금 흐름 수신");
        Ok(rows)
    }

    #[instrument(skip(self), fields(code = %id))]
    async fn fetch_minute_flow(&self, id: &StockIdentifier) -> Result<Vec<RawRow>> {
        let url = format!("{}/api/qt/stock/fflow/kline/get", self.push2_base);
        let query = [
            ("lmt", "0".to_string()),
            ("klt", "1".to_string()),
            ("secid", id.secid()),
            ("fields1", "f1,f2,f3,f7".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57,f58".to_string()),
        ];

        let Some(data) = self.get_data(url, &query).await? else {
            debug!("분 단위 자금 흐름 없음");
            return Ok(Vec::new());
        };
        let rows = split_klines(&data, &labels::MINUTE_FLOW_COLUMNS, None);
        debug!(rows = rows.len(), "분 단위 자금 흐름 수신");
        Ok(rows)
    }

    #[instrument(skip(self), fields(code = %id, period = %request.period))]
    async fn fetch_bars(&self, id: &StockIdentifier, request: &BarRequest) -> Result<Vec<RawRow>> {
        let url = format!("{}/api/qt/stock/kline/get", self.push2his_base);
        let beg = request
            .start
            .map(|d| d.format("%Y%m%d").to_string())
            .unwrap_or_else(|| "0".to_string());
        let end = request
            .end
            .map(|d| d.format("%Y%m%d").to_string())
            .unwrap_or_else(|| "20500101".to_string());
        let query = [
            ("secid", id.secid()),
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            (
                "fields2",
                "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61".to_string(),
            ),
            ("klt", request.period.klt().to_string()),
            ("fqt", request.adjust.fqt().to_string()),
            ("beg", beg),
            ("end", end),
        ];

        let Some(data) = self.get_data(url, &query).await? else {
            return Ok(Vec::new());
        };
        let name = data.get("name").map(value_text).filter(|s| !s.is_empty());
        let mut columns = labels::KLINE_COLUMNS;
        if request.period.is_intraday() {
            columns[0] = labels::TIME;
        }
        Ok(split_klines(&data, &columns, name.as_deref()))
    }

    #[instrument(skip(self), fields(code = %id))]
    async fn fetch_profile(&self, id: &StockIdentifier) -> Result<RawRow> {
        let url = format!("{}/api/qt/stock/get", self.push2_base);
        let fields = labels::PROFILE_FIELDS
            .iter()
            .map(|(fid, _, _)| *fid)
            .collect::<Vec<_>>()
            .join(",");
        let query = [
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fields", fields),
            ("secid", id.secid()),
        ];

        let Some(data) = self.get_data(url, &query).await? else {
            return Ok(RawRow::new());
        };
        let row = labels::PROFILE_FIELDS
            .iter()
            .filter_map(|(fid, label, _)| data.get(*fid).map(|v| (*label, value_text(v))))
            .collect();
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn fetch_rank(&self, window: RankWindow, limit: usize) -> Result<Vec<RawRow>> {
        let rank_fields = RankFields::for_window(window);
        let url = format!("{}/api/qt/clist/get", self.push2_base);
        let query = [
            ("fid", rank_fields.sort_field.to_string()),
            ("po", "1".to_string()),
            ("pz", limit.max(1).to_string()),
            ("pn", "1".to_string()),
            ("np", "1".to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fs", A_SHARE_FILTER.to_string()),
            ("fields", rank_fields.field_list()),
        ];

        let Some(data) = self.get_data(url, &query).await? else {
            return Ok(Vec::new());
        };
        let rows = diff_items(&data)
            .into_iter()
            .enumerate()
            .map(|(idx, item)| rank_fields.label_row(idx + 1, item))
            .collect::<Vec<_>>();
        debug!(rows = rows.len(), window = %window, "랭킹 수신");
        Ok(rows)
    }

    async fn fetch_code_universe(&self) -> Result<Vec<String>> {
        let mut seen = BTreeSet::new();
        let mut codes = Vec::new();

        for page in 1..=UNIVERSE_MAX_PAGES {
            let (page_codes, total) = self.fetch_universe_page(page).await?;
            if page_codes.is_empty() {
                break;
            }
            for code in page_codes {
                if seen.insert(code.clone()) {
                    codes.push(code);
                }
            }
            if total.is_some_and(|t| seen.len() as u64 >= t) {
                break;
            }
        }

        if codes.is_empty() {
            return Err(DataError::Parse("empty code universe".to_string()));
        }
        info!(count = codes.len(), "종목 목록 수신");
        Ok(codes)
    }
}

/// 랭킹 구간별 Eastmoney 필드 ID.
struct RankFields {
    sort_field: &'static str,
    pct_field: &'static str,
    tiers: [(FlowTier, &'static str, &'static str); 5],
}

impl RankFields {
    fn for_window(window: RankWindow) -> Self {
        use FlowTier::*;
        match window {
            RankWindow::Today => Self {
                sort_field: "f62",
                pct_field: "f3",
                tiers: [
                    (Main, "f62", "f184"),
                    (UltraLarge, "f66", "f69"),
                    (Large, "f72", "f75"),
                    (Medium, "f78", "f81"),
                    (Small, "f84", "f87"),
                ],
            },
            RankWindow::Days3 => Self {
                sort_field: "f267",
                pct_field: "f127",
                tiers: [
                    (Main, "f267", "f268"),
                    (UltraLarge, "f269", "f270"),
                    (Large, "f271", "f272"),
                    (Medium, "f273", "f274"),
                    (Small, "f275", "f276"),
                ],
            },
            RankWindow::Days5 => Self {
                sort_field: "f164",
                pct_field: "f109",
                tiers: [
                    (Main, "f164", "f165"),
                    (UltraLarge, "f166", "f167"),
                    (Large, "f168", "f169"),
                    (Medium, "f170", "f171"),
                    (Small, "f172", "f173"),
                ],
            },
            RankWindow::Days10 => Self {
                sort_field: "f174",
                pct_field: "f160",
                tiers: [
                    (Main, "f174", "f175"),
                    (UltraLarge, "f176", "f177"),
                    (Large, "f178", "f179"),
                    (Medium, "f180", "f181"),
                    (Small, "f182", "f183"),
                ],
            },
        }
    }

    fn field_list(&self) -> String {
        let mut fields = vec!["f12", "f13", "f14", "f2", self.pct_field];
        for (_, amount, ratio) in self.tiers {
            fields.push(amount);
            fields.push(ratio);
        }
        fields.join(",")
    }

    fn label_row(&self, rank: usize, item: &Value) -> RawRow {
        let text = |fid: &str| value_text(item.get(fid).unwrap_or(&Value::Null));
        let mut row = RawRow::new();
        row.insert(labels::RANK, rank.to_string());
        row.insert(labels::CODE, text("f12"));
        row.insert(labels::NAME, text("f14"));
        row.insert(labels::LATEST_PRICE, text("f2"));
        row.insert(labels::PCT_CHANGE, text(self.pct_field));
        for (tier, amount_fid, ratio_fid) in &self.tiers {
            let (amount_label, ratio_label) = labels::tier_labels(*tier);
            row.insert(amount_label, text(amount_fid));
            row.insert(ratio_label, text(ratio_fid));
        }
        row
    }
}

/// `data.klines`의 콤마 구분 문자열을 라벨 행으로 변환합니다.
fn split_klines(data: &Value, columns: &[&'static str], name: Option<&str>) -> Vec<RawRow> {
    let Some(lines) = data.get("klines").and_then(Value::as_array) else {
        return Vec::new();
    };

    lines
        .iter()
        .filter_map(Value::as_str)
        .map(|line| {
            let mut row: RawRow = columns
                .iter()
                .zip(line.split(','))
                .map(|(label, value)| (*label, value.trim().to_string()))
                .collect();
            if let Some(name) = name {
                row.insert(labels::NAME, name.to_string());
            }
            row
        })
        .collect()
}

/// `data.diff`는 배열(np=1) 또는 인덱스 키 객체(np=0)로 옵니다.
fn diff_items(data: &Value) -> Vec<&Value> {
    match data.get("diff") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// JSON 값을 원본 문자열로. null은 빈 문자열.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{HttpConfig, RetryPolicy};
    use ashare_core::normalize;
    use mockito::Matcher;
    use std::time::Duration;

    fn client_for(server: &mockito::ServerGuard) -> EastmoneyClient {
        let config = HttpConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                max_jitter: Duration::ZERO,
            },
            ..Default::default()
        };
        let http = Arc::new(HttpClient::new(config).unwrap());
        EastmoneyClient::new(http).with_base_urls(server.url(), server.url())
    }

    #[tokio::test]
    async fn test_fund_flow_rows_are_labelled() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"rc":0,"data":{"code":"600519","market":1,"name":"贵州茅台","klines":[
            "2024-03-01,123456789.0,-1000.0,-2000.0,50000000.0,73456789.0,12.345,-0.01,-0.02,5.0,7.35,1700.00,1.23,0.00,0.00"
        ]}}"#;
        let mock = server
            .mock("GET", "/api/qt/stock/fflow/daykline/get")
            .match_query(Matcher::UrlEncoded("secid".into(), "1.600519".into()))
            .with_body(body)
            .create_async()
            .await;

        let client = client_for(&server);
        let rows = client
            .fetch_fund_flow(&normalize("600519").unwrap())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row[labels::DATE], "2024-03-01");
        assert_eq!(row["主力净流入-净额"], "123456789.0");
        assert_eq!(row["超大单净流入-净占比"], "7.35");
        assert_eq!(row[labels::CLOSE], "1700.00");
        assert_eq!(row[labels::NAME], "贵州茅台");
    }

    #[tokio::test]
    async fn test_null_data_is_empty_not_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/qt/stock/fflow/daykline/get")
            .match_query(Matcher::Any)
            .with_body(r#"{"rc":0,"data":null}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let rows = client
            .fetch_fund_flow(&normalize("000001").unwrap())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_minute_bars_use_time_label() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/qt/stock/kline/get")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("klt".into(), "5".into()),
                Matcher::UrlEncoded("fqt".into(), "0".into()),
                Matcher::UrlEncoded("beg".into(), "20240301".into()),
            ]))
            .with_body(
                r#"{"data":{"name":"平安银行","klines":["2024-03-01 09:35,10.1,10.2,10.3,10.0,1200,1224000.0,2.97,0.99,0.10,0.01"]}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let request = BarRequest::new(BarPeriod::Min5, Adjust::None)
            .between(NaiveDate::from_ymd_opt(2024, 3, 1), None);
        let rows = client
            .fetch_bars(&normalize("000001").unwrap(), &request)
            .await
            .unwrap();

        assert_eq!(rows[0][labels::TIME], "2024-03-01 09:35");
        assert!(!rows[0].contains_key(labels::DATE));
        assert_eq!(rows[0][labels::TURNOVER], "0.01");
    }

    #[tokio::test]
    async fn test_minute_flow_rows_are_labelled() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/qt/stock/fflow/kline/get")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("klt".into(), "1".into()),
                Matcher::UrlEncoded("secid".into(), "0.000001".into()),
            ]))
            .with_body(
                r#"{"data":{"code":"000001","name":"平安银行","klines":[
                "2024-03-01 09:31,1200000.0,-300000.0,-100000.0,400000.0,800000.0,0.0,0.0",
                "2024-03-01 09:32,-50000.0,20000.0,10000.0,-20000.0,-30000.0,0.0,0.0"]}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let rows = client
            .fetch_minute_flow(&normalize("000001").unwrap())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][labels::TIME], "2024-03-01 09:31");
        assert_eq!(rows[0]["主力净流入-净额"], "1200000.0");
        assert_eq!(rows[0]["小单净流入-净额"], "-300000.0");
        assert_eq!(rows[0]["超大单净流入-净额"], "800000.0");
        assert!(!rows[0].contains_key(labels::NAME));
    }

    #[tokio::test]
    async fn test_rank_rows_follow_window_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/qt/clist/get")
            .match_query(Matcher::UrlEncoded("fid".into(), "f164".into()))
            .with_body(
                r#"{"data":{"total":1,"diff":[{"f12":"600519","f13":1,"f14":"贵州茅台","f2":1700.5,"f109":3.21,
                "f164":250000000.0,"f165":8.1,"f166":1,"f167":2,"f168":3,"f169":4,"f170":"-","f171":6,"f172":7,"f173":8}]}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let rows = client.fetch_rank(RankWindow::Days5, 10).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][labels::RANK], "1");
        assert_eq!(rows[0][labels::PCT_CHANGE], "3.21");
        assert_eq!(rows[0]["主力净流入-净额"], "250000000.0");
        assert_eq!(rows[0]["中单净流入-净额"], "-");
    }

    #[tokio::test]
    async fn test_code_universe_pages_and_dedups() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/qt/clist/get")
            .match_query(Matcher::UrlEncoded("pn".into(), "1".into()))
            .with_body(r#"{"data":{"total":3,"diff":[{"f12":"600519"},{"f12":"000001"}]}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/qt/clist/get")
            .match_query(Matcher::UrlEncoded("pn".into(), "2".into()))
            .with_body(r#"{"data":{"total":3,"diff":[{"f12":"000001"},{"f12":"830799"}]}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let codes = client.fetch_code_universe().await.unwrap();
        assert_eq!(codes, vec!["600519", "000001", "830799"]);
    }

    #[tokio::test]
    async fn test_profile_labels() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/qt/stock/get")
            .match_query(Matcher::Any)
            .with_body(r#"{"data":{"f57":"600519","f58":"贵州茅台","f127":"酿酒行业","f84":1256197800.0,"f189":20010827}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let row = client
            .fetch_profile(&normalize("600519").unwrap())
            .await
            .unwrap();
        assert_eq!(row["股票简称"], "贵州茅台");
        assert_eq!(row["上市时间"], "20010827");
        assert!(!row.contains_key("总市值"));
    }
}
