//! 수집 대상 종목 목록.

use tracing::{info, warn};

use crate::Result;
use ashare_core::{normalize, StockIdentifier};
use ashare_data::{CodeCache, MarketDataSource};

/// 대상 종목 선택 조건.
#[derive(Debug, Clone, Default)]
pub struct UniverseFilter {
    /// 명시적 종목 코드 (쉼표 구분 입력을 나눈 것)
    pub codes: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl UniverseFilter {
    /// `"600519, sz000001"` 형식 파싱
    pub fn with_codes_arg(mut self, codes: Option<&str>) -> Self {
        self.codes = codes.map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        });
        self
    }
}

/// 수집 대상 종목 로드.
///
/// 코드가 명시되면 그대로 정규화하고, 아니면 캐시 파일을 읽습니다. 캐시가
/// 없거나 깨져 있으면 전체 목록을 새로 받아 캐시에 씁니다. 잘못된 코드는
/// 경고 후 건너뜁니다.
pub async fn load_universe(
    source: &dyn MarketDataSource,
    cache: &CodeCache,
    filter: &UniverseFilter,
) -> Result<Vec<StockIdentifier>> {
    let raw = match &filter.codes {
        Some(codes) => codes.clone(),
        None => match cache.load() {
            Some(codes) => {
                info!(count = codes.len(), path = %cache.path().display(), "코드 캐시 사용");
                codes
            }
            None => refresh_universe(source, cache).await?,
        },
    };

    let mut identifiers = Vec::with_capacity(raw.len());
    for code in &raw {
        match normalize(code) {
            Ok(id) => {
                if !identifiers.contains(&id) {
                    identifiers.push(id);
                }
            }
            Err(e) => warn!(code = %code, error = %e, "잘못된 종목 코드, 건너뜀"),
        }
    }

    let selected: Vec<StockIdentifier> = identifiers
        .into_iter()
        .skip(filter.skip)
        .take(filter.limit.unwrap_or(usize::MAX))
        .collect();

    info!(count = selected.len(), "수집 대상 종목 확정");
    Ok(selected)
}

/// 전체 A주 코드 목록을 새로 받아 캐시에 저장합니다.
pub async fn refresh_universe(source: &dyn MarketDataSource, cache: &CodeCache) -> Result<Vec<String>> {
    let codes = source.fetch_code_universe().await?;
    info!(count = codes.len(), "종목 목록 조회 완료");

    if let Err(e) = cache.save(&codes) {
        warn!(path = %cache.path().display(), error = %e, "코드 캐시 저장 실패");
    }
    Ok(codes)
}
