//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL is reachable and that the transaction
//! helpers apply the isolation level they promise. They need a running
//! database, so they are ignored by default:
//!
//! ```text
//! DATABASE_URL=postgresql://... cargo test -p common -- --ignored
//! ```

use common::database::{
    DatabaseConfig, begin_read_committed, begin_serializable, health_check, init_pool,
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    Ok(())
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_transaction_isolation_levels() -> Result<(), Box<dyn std::error::Error>> {
    let pool = init_pool(&DatabaseConfig::from_env()?).await?;

    let mut tx = begin_serializable(&pool).await?;
    let row = sqlx::query("SHOW transaction_isolation")
        .fetch_one(&mut *tx)
        .await?;
    let level: String = row.get(0);
    assert_eq!(level, "serializable");
    tx.rollback().await?;

    let mut tx = begin_read_committed(&pool).await?;
    let row = sqlx::query("SHOW transaction_isolation")
        .fetch_one(&mut *tx)
        .await?;
    let level: String = row.get(0);
    assert_eq!(level, "read committed");
    tx.rollback().await?;

    Ok(())
}
