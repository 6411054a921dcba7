//! 매일 정해진 시각에 실행하는 스케줄러.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::future::Future;
use tracing::{error, info};

use crate::config::ScheduleConfig;
use crate::{CollectorError, Result};
use ashare_core::TradingCalendar;

/// `now` 이후 처음 오는 `hour`시 정각.
pub fn next_run_at(now: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    (0..=2)
        .filter_map(|offset| {
            let date = now.date_naive() + Duration::days(offset);
            let local = date.and_hms_opt(hour, 0, 0)?;
            tz.from_local_datetime(&local).earliest()
        })
        .find(|at| *at > now)
        .unwrap_or_else(|| now + Duration::days(1))
}

/// 매일 `schedule.hour`시에 `job(오늘)`을 실행합니다.
///
/// 휴장일은 건너뜁니다. 데이터 소스 실패는 로그만 남기고 다음 날을
/// 기다리지만, 저장소 실패는 그대로 반환해 프로세스가 비정상 종료하게
/// 합니다. Ctrl-C를 받으면 대기 중에 `Ok(())`로 종료합니다.
pub async fn run_daily<F, Fut>(
    schedule: &ScheduleConfig,
    calendar: &dyn TradingCalendar,
    mut job: F,
) -> Result<()>
where
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(
        hour = schedule.hour,
        timezone = %schedule.timezone,
        "=== 정기 실행 모드 시작 ==="
    );

    loop {
        let now = Utc::now().with_timezone(&schedule.timezone);
        let next = next_run_at(now, schedule.hour);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next, "다음 실행 예약");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("종료 신호 수신, 스케줄러 종료");
                break;
            }
            _ = tokio::time::sleep(wait) => {
                let today = next.date_naive();
                if !calendar.is_trading_day(today) {
                    info!(date = %today, "휴장일, 건너뜀");
                    continue;
                }
                match job(today).await {
                    Ok(()) => info!(date = %today, "정기 실행 완료"),
                    Err(e @ CollectorError::Database(_)) => {
                        error!(date = %today, error = %e, "저장 실패, 스케줄러 중단");
                        return Err(e);
                    }
                    Err(e) => error!("정기 실행 실패: {}", e),
                }
            }
        }
    }

    Ok(())
}
