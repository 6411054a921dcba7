//! 종목 코드 캐시 파일 (`data/all_codes.json`).
//!
//! 코드 문자열의 JSON 배열입니다. 파일이 없거나 깨져 있으면 `None`을 반환하고
//! 호출자가 종목 목록을 다시 받아옵니다.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CodeCache {
    path: PathBuf,
}

impl CodeCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 캐시된 코드 목록. 없거나 비어 있거나 깨진 경우 `None`.
    pub fn load(&self) -> Option<Vec<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "코드 캐시 없음");
                return None;
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(codes) if !codes.is_empty() => Some(codes),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "코드 캐시 파싱 실패");
                None
            }
        }
    }

    /// 코드 목록을 저장합니다. 상위 디렉터리가 없으면 만듭니다.
    pub fn save(&self, codes: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(codes)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), count = codes.len(), "코드 캐시 저장");
        Ok(())
    }
}
