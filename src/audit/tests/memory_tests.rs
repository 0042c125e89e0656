//! Tests for the in-memory audit log and filter semantics.

use crate::audit::{
    adapters::InMemoryAuditLog,
    domain::{AuditEntry, AuditEventType, AuditFilter},
    ports::AuditSink,
};
use crate::task::domain::{SpecId, TaskKey};
use chrono::{Duration, TimeZone, Utc};
use eyre::ensure;
use rstest::{fixture, rstest};
use serde_json::json;

fn key(spec: &str, task: &str) -> TaskKey {
    TaskKey::from_parts(spec, task).expect("valid task key")
}

#[fixture]
async fn populated_log() -> InMemoryAuditLog {
    let log = InMemoryAuditLog::new();
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid time");
    let entries = [
        AuditEntry::new(AuditEventType::RecommendationIssued, base).for_task(&key("S1", "T1")),
        // Timestamps run backwards to show they never drive ordering.
        AuditEntry::new(AuditEventType::TransitionCommitted, base - Duration::minutes(5))
            .for_task(&key("S1", "T1"))
            .with_payload(json!({"to": "in_progress"})),
        AuditEntry::new(AuditEventType::TransitionFailed, base - Duration::minutes(10))
            .for_task(&key("S2", "T4")),
        AuditEntry::new(AuditEventType::LockStolen, base)
            .for_spec(&SpecId::new("S2").expect("valid spec id")),
    ];
    for entry in entries {
        log.record(entry).await.expect("record should succeed");
    }
    log
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn events_keep_insertion_order(#[future] populated_log: InMemoryAuditLog) -> eyre::Result<()> {
    let log = populated_log.await;
    let events = log.export().await?;
    let sequences: Vec<u64> = events.iter().map(|event| event.sequence).collect();
    ensure!(sequences == vec![1, 2, 3, 4], "unexpected order {sequences:?}");
    ensure!(events.first().map(|event| event.event_type) == Some(AuditEventType::RecommendationIssued));
    Ok(())
}

#[rstest]
#[case::by_type(AuditFilter::all().of_type(AuditEventType::TransitionFailed), vec![3])]
#[case::by_spec(AuditFilter::all().for_spec(SpecId::new("S2").expect("valid spec id")), vec![3, 4])]
#[case::by_task(AuditFilter::all().for_task(key("S1", "T1")), vec![1, 2])]
#[case::after_sequence(AuditFilter::all().after(2), vec![3, 4])]
#[case::limited(AuditFilter::all().limit(2), vec![1, 2])]
#[case::combined(
    AuditFilter::all()
        .of_type(AuditEventType::TransitionCommitted)
        .of_type(AuditEventType::TransitionFailed)
        .limit(1),
    vec![2]
)]
#[tokio::test(flavor = "multi_thread")]
async fn query_applies_filters(
    #[future] populated_log: InMemoryAuditLog,
    #[case] filter: AuditFilter,
    #[case] expected: Vec<u64>,
) -> eyre::Result<()> {
    let log = populated_log.await;
    let events = log.query(&filter).await?;
    let sequences: Vec<u64> = events.iter().map(|event| event.sequence).collect();
    ensure!(sequences == expected, "expected {expected:?}, got {sequences:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn clones_share_one_log() -> eyre::Result<()> {
    let log = InMemoryAuditLog::new();
    let clone = log.clone();
    clone
        .record(AuditEntry::new(AuditEventType::NoEligibleTask, Utc::now()))
        .await?;
    ensure!(log.export().await?.len() == 1);
    Ok(())
}
