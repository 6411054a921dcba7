//! 종목 기본 정보 (희소 키-값).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::StockIdentifier;

/// 종목 약칭으로 쓸 필드 후보 (우선순위 순).
pub const NAME_FIELDS: &[&str] = &["short_name", "name", "long_name"];

/// 종목 기본 정보.
///
/// 필드마다 (code, exchange, 필드명) 키로 독립적으로 upsert됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBasicProfile {
    pub identifier: StockIdentifier,
    pub fields: BTreeMap<String, String>,
    pub fetched_at: NaiveDateTime,
}

impl StockBasicProfile {
    pub fn new(identifier: StockIdentifier, fetched_at: NaiveDateTime) -> Self {
        Self {
            identifier,
            fields: BTreeMap::new(),
            fetched_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// 비어 있지 않은 첫 번째 이름 필드.
    pub fn display_name(&self) -> Option<&str> {
        NAME_FIELDS
            .iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::normalize;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_display_name_prefers_short_name() {
        let mut profile = StockBasicProfile::new(normalize("600519").unwrap(), at());
        assert_eq!(profile.display_name(), None);

        profile.fields.insert("long_name".into(), "贵州茅台酒股份有限公司".into());
        assert_eq!(profile.display_name(), Some("贵州茅台酒股份有限公司"));

        profile.fields.insert("short_name".into(), " ".into());
        assert_eq!(profile.display_name(), Some("贵州茅台酒股份有限公司"));

        profile.fields.insert("short_name".into(), "贵州茅台".into());
        assert_eq!(profile.display_name(), Some("贵州茅台"));
    }
}
