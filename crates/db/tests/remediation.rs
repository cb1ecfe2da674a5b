use pqa_db::models::analysis_run::NewAnalysisRun;
use pqa_db::models::remediation::ClaimRemediation;
use pqa_db::repositories::{AnalysisRunRepo, RemediationRepo};
use sqlx::PgPool;
use uuid::Uuid;

async fn insert_fail_run(pool: &PgPool) -> Uuid {
    let input = NewAnalysisRun {
        id: Uuid::now_v7(),
        device_id: 3,
        file_type: "xdd".to_string(),
        archived_file_id: None,
        overall_score: Some(70.0),
        structural_score: Some(80.0),
        data_loss_percentage: Some(20.0),
        critical_data_loss: false,
        reduced_confidence: false,
        status: "fail".to_string(),
        cosmetic_count: 0,
        minor_count: 0,
        major_count: 2,
        critical_count: 0,
        threshold_results: serde_json::json!([]),
        error_kind: None,
        error_message: None,
        findings: Vec::new(),
    };
    AnalysisRunRepo::create_with_findings(pool, &input)
        .await
        .unwrap()
        .id
}

fn claim(run_id: Uuid) -> ClaimRemediation {
    ClaimRemediation {
        run_id,
        device_id: 3,
        file_type: "xdd".to_string(),
        threshold_name: "standard".to_string(),
        cooldown_secs: 3600,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_second_claim_within_cooldown_is_suppressed(pool: PgPool) {
    let first = insert_fail_run(&pool).await;
    let second = insert_fail_run(&pool).await;

    let record = RemediationRepo::claim(&pool, &claim(first)).await.unwrap();
    assert!(record.is_some());
    assert_eq!(record.unwrap().dispatch_status, "pending");

    assert!(RemediationRepo::claim(&pool, &claim(second)).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_dispatch_releases_cooldown(pool: PgPool) {
    let first = insert_fail_run(&pool).await;
    let second = insert_fail_run(&pool).await;

    let record = RemediationRepo::claim(&pool, &claim(first)).await.unwrap().unwrap();
    let failed = RemediationRepo::mark_failed(&pool, record.id, "ticket service down", 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.dispatch_status, "failed");
    assert_eq!(failed.attempts, 3);

    assert!(RemediationRepo::claim(&pool, &claim(second)).await.unwrap().is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_zero_cooldown_allows_repeat(pool: PgPool) {
    let first = insert_fail_run(&pool).await;
    let second = insert_fail_run(&pool).await;
    let mut c = claim(first);
    c.cooldown_secs = 0;
    assert!(RemediationRepo::claim(&pool, &c).await.unwrap().is_some());
    c.run_id = second;
    assert!(RemediationRepo::claim(&pool, &c).await.unwrap().is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_claims_yield_one_record(pool: PgPool) {
    let run_id = insert_fail_run(&pool).await;
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { RemediationRepo::claim(&pool, &claim(run_id)).await })
        })
        .collect();

    let mut claimed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 1);

    let dispatched = RemediationRepo::list_for_run(&pool, run_id).await.unwrap();
    assert_eq!(dispatched.len(), 1);
    let updated = RemediationRepo::mark_dispatched(&pool, dispatched[0].id, "TICKET-1", 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.ticket_ref.as_deref(), Some("TICKET-1"));
}
