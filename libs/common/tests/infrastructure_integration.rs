//! Integration tests for the database layer
//!
//! These need a reachable PostgreSQL (see `DATABASE_URL`).

use common::{
    database::{DatabaseConfig, health_check, init_pool, requeue_stale_jobs, run_migrations},
    records::{ATTENDANCE_COLUMNS, EVENT_COLUMNS, attendance_from_row, event_from_row},
};
use sqlx::Row;
use std::time::Duration;

#[tokio::test]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");
    run_migrations(&pool).await?;

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    // Event layout survives the JSONB round trip
    let event_id = format!("it-{}", uuid::Uuid::new_v4());
    sqlx::query(
        r#"
        INSERT INTO events (id, name, date, qr_position, name_position)
        VALUES ($1, 'Integration', '2026-03-14', $2, $3)
        "#,
    )
    .bind(&event_id)
    .bind(serde_json::json!({"x": 10.0, "y": 20.0, "size": 120.0, "rotation": 15.0}))
    .bind(serde_json::json!({"x": 5.0, "y": 6.0, "size": 24.0, "color": "#112233"}))
    .execute(&pool)
    .await?;

    let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
        .bind(&event_id)
        .fetch_one(&pool)
        .await?;
    let event = event_from_row(&row)?;
    assert_eq!(event.qr_position.rotation(), 15.0);
    assert_eq!(event.name_position.as_ref().map(|n| n.font()), Some("Arial"));
    assert!(!event.has_template());

    // Attendance rows are kept without a matching attendee
    sqlx::query(
        r#"
        INSERT INTO attendance (event_id, attendee_id, check_out_time, name)
        VALUES ($1, 'gone', NOW(), 'Former Attendee')
        "#,
    )
    .bind(&event_id)
    .execute(&pool)
    .await?;
    let row = sqlx::query(&format!(
        "SELECT {} FROM attendance WHERE event_id = $1",
        ATTENDANCE_COLUMNS
    ))
    .bind(&event_id)
    .fetch_one(&pool)
    .await?;
    let record = attendance_from_row(&row);
    assert!(record.check_in_time.is_none());
    assert_eq!(record.profile.name, "Former Attendee");

    sqlx::query("DELETE FROM attendance WHERE event_id = $1")
        .bind(&event_id)
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(&event_id)
        .execute(&pool)
        .await?;

    Ok(())
}

#[tokio::test]
async fn test_abandoned_running_jobs_are_requeued() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let event_id = format!("it-{}", uuid::Uuid::new_v4());
    sqlx::query(
        "INSERT INTO events (id, name, date, qr_position) VALUES ($1, 'Lease', '2026-03-14', $2)",
    )
    .bind(&event_id)
    .bind(serde_json::json!({"x": 50.0, "y": 50.0, "size": 250.0, "rotation": 0.0}))
    .execute(&pool)
    .await?;

    let abandoned = uuid::Uuid::new_v4();
    let active = uuid::Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO pass_jobs (id, event_id, kind, status, updated_at)
        VALUES ($1, $3, 'generate', 'running', NOW() - INTERVAL '2 hours'),
               ($2, $3, 'email', 'running', NOW())
        "#,
    )
    .bind(abandoned)
    .bind(active)
    .bind(&event_id)
    .execute(&pool)
    .await?;

    let requeued = requeue_stale_jobs(&pool, Duration::from_secs(3600)).await?;
    assert!(requeued >= 1);

    assert_eq!(job_status(&pool, abandoned).await?, "queued");
    assert_eq!(job_status(&pool, active).await?, "running");

    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(&event_id)
        .execute(&pool)
        .await?;

    Ok(())
}

async fn job_status(pool: &sqlx::PgPool, id: uuid::Uuid) -> Result<String, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM pass_jobs WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("status"))
}
