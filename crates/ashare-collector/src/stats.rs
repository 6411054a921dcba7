//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리한 종목 수
    pub total: usize,
    /// 성공 종목 수
    pub success: usize,
    /// 최종 실패 종목 수
    pub errors: usize,
    /// 조회는 성공했지만 데이터가 없던 종목 수
    pub empty: usize,
    /// 수집한 총 레코드 수
    pub records: usize,
    /// 저장소에 기록한 레코드 수
    pub written: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 다른 실행 결과를 합산 (기간 수집의 일자별 배치)
    pub fn merge(&mut self, other: &CollectionStats) {
        self.total += other.total;
        self.success += other.success;
        self.errors += other.errors;
        self.empty += other.empty;
        self.records += other.records;
        self.written += other.written;
        self.elapsed += other.elapsed;
    }

    /// stdout 요약 한 줄
    pub fn summary_line(&self) -> String {
        format!(
            "Done. symbols={} ok={} failed={} empty={} records={} written={} elapsed={:.1}s",
            self.total,
            self.success,
            self.errors,
            self.empty,
            self.records,
            self.written,
            self.elapsed.as_secs_f64()
        )
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            empty = self.empty,
            records = self.records,
            written = self.written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_rate() {
        let mut a = CollectionStats {
            total: 3,
            success: 2,
            errors: 1,
            records: 10,
            ..Default::default()
        };
        let b = CollectionStats {
            total: 1,
            success: 1,
            records: 5,
            written: 15,
            ..Default::default()
        };
        a.merge(&b);

        assert_eq!(a.total, 4);
        assert_eq!(a.records, 15);
        assert_eq!(a.written, 15);
        assert!((a.success_rate() - 75.0).abs() < f64::EPSILON);
        assert!(a.summary_line().starts_with("Done. symbols=4 ok=3 failed=1"));
    }
}
