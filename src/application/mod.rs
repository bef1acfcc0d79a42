pub mod conversation;
pub mod model_gateway;
pub mod notifications;
pub mod order_service;
pub mod replies;
pub mod turn_locks;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::domain::errors::DomainError;

/// Runs a blocking repository call on tokio's blocking pool.
pub(crate) async fn run_blocking<R, T, F>(repo: &Arc<R>, f: F) -> Result<T, DomainError>
where
    R: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&R) -> Result<T, DomainError> + Send + 'static,
{
    let repo = Arc::clone(repo);
    tokio::task::spawn_blocking(move || f(&repo)).await?
}

/// Quarter-hour steps tried when a wall-clock time falls in a DST gap.
const GAP_SEARCH_STEPS: i64 = 12;

/// `date` at `time` in `tz`, as UTC. A wall-clock time skipped by a DST
/// change resolves to the first valid quarter hour after it, so a midnight
/// that never happens starts the day at the end of the gap.
pub(crate) fn local_instant<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let local = date.and_time(time);
    (0..=GAP_SEARCH_STEPS)
        .find_map(|step| {
            tz.from_local_datetime(&(local + Duration::minutes(15 * step)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| {
            let offset = tz.offset_from_utc_datetime(&local).fix();
            log::warn!("no valid local time near {} in offset {}", local, offset);
            Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset.local_minus_utc()))))
        })
}

/// Local midnight of the day `now` falls on.
pub(crate) fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    local_instant(&now.timezone(), now.date_naive(), NaiveTime::MIN)
}
