//! Keeps the dashboard's trend aggregator current.
//!
//! At startup the aggregator is seeded from the runs inside its window;
//! afterwards every committed run arrives as an event carrying its trend
//! sample.

use std::sync::Arc;

use chrono::{Duration, Utc};
use pqa_core::trends::{TrendAggregator, TrendSample};
use pqa_core::types::Timestamp;
use pqa_db::repositories::DashboardRepo;
use pqa_events::bus::{ANALYSIS_COMPLETED, ANALYSIS_ERRORED};
use pqa_events::PqaEvent;
use sqlx::PgPool;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

/// Load the runs inside the aggregator's window. Returns how many were
/// recorded.
pub async fn seed(pool: &PgPool, trends: &RwLock<TrendAggregator>) -> Result<usize, sqlx::Error> {
    let now = Utc::now();
    let window = trends.read().await.window_days();
    let rows = DashboardRepo::samples_since(pool, now - Duration::days(i64::from(window))).await?;

    let mut trends = trends.write().await;
    let mut recorded = 0;
    for sample in rows.iter().filter_map(|row| row.to_sample()) {
        trends.record(sample, now);
        recorded += 1;
    }
    Ok(recorded)
}

/// Record the sample carried by a run event. Returns `false` for events that
/// carry none.
pub fn apply_event(trends: &mut TrendAggregator, event: &PqaEvent, now: Timestamp) -> bool {
    if event.event_type != ANALYSIS_COMPLETED && event.event_type != ANALYSIS_ERRORED {
        return false;
    }
    match serde_json::from_value::<Option<TrendSample>>(event.payload["sample"].clone()) {
        Ok(Some(sample)) => {
            trends.record(sample, now);
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(event_type = %event.event_type, error = %e, "Malformed trend sample");
            false
        }
    }
}

/// Consume run events until the bus closes or `cancel` is triggered.
pub async fn run(
    mut events: broadcast::Receiver<PqaEvent>,
    trends: Arc<RwLock<TrendAggregator>>,
    cancel: CancellationToken,
) {
    tracing::info!("Trends updater started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => {
                    apply_event(&mut *trends.write().await, &event, Utc::now());
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Trends updater lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    tracing::info!("Trends updater stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqa_core::quality_gate::RunStatus;
    use uuid::Uuid;

    fn run_event(event_type: &str, sample: Option<TrendSample>) -> PqaEvent {
        PqaEvent::new(event_type)
            .with_target(1, "eds")
            .with_run(Uuid::now_v7())
            .with_payload(serde_json::json!({ "sample": sample, "status": "pass" }))
    }

    #[test]
    fn completed_and_errored_events_are_recorded() {
        let now = Utc::now();
        let mut agg = TrendAggregator::new(30);
        let pass = TrendSample {
            recorded_at: now,
            status: RunStatus::Pass,
            overall_score: Some(100.0),
        };
        let error = TrendSample {
            recorded_at: now,
            status: RunStatus::Error,
            overall_score: None,
        };

        assert!(apply_event(&mut agg, &run_event(ANALYSIS_COMPLETED, Some(pass)), now));
        assert!(apply_event(&mut agg, &run_event(ANALYSIS_ERRORED, Some(error)), now));

        let summary = agg.summary(now);
        assert_eq!(summary.total_analyses, 2);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.average_overall_score, Some(100.0));
    }

    #[test]
    fn other_events_are_ignored() {
        let now = Utc::now();
        let mut agg = TrendAggregator::new(30);
        assert!(!apply_event(
            &mut agg,
            &PqaEvent::new("remediation.dispatched"),
            now
        ));
        assert!(!apply_event(&mut agg, &run_event(ANALYSIS_COMPLETED, None), now));
        assert_eq!(agg.summary(now).total_analyses, 0);
    }

    #[tokio::test]
    async fn updater_stops_when_cancelled() {
        let bus = pqa_events::EventBus::default();
        let trends = Arc::new(RwLock::new(TrendAggregator::new(30)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(bus.subscribe(), Arc::clone(&trends), cancel.clone()));

        let sample = TrendSample {
            recorded_at: Utc::now(),
            status: RunStatus::Fail,
            overall_score: Some(80.0),
        };
        bus.publish(run_event(ANALYSIS_COMPLETED, Some(sample)));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(trends.write().await.summary(Utc::now()).failed, 1);
    }
}
