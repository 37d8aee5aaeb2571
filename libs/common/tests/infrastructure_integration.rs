//! Live checks against the PostgreSQL and Redis instances the gallery runs on
//!
//! Run with `cargo test -- --ignored` once both services are up.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
};

#[tokio::test]
#[ignore = "requires running PostgreSQL"]
async fn test_postgres_pool_answers() -> Result<(), Box<dyn std::error::Error>> {
    let pool = init_pool(&DatabaseConfig::from_env()?).await?;
    assert!(health_check(&pool).await?);

    let server_version: String = sqlx::query_scalar("SHOW server_version")
        .fetch_one(&pool)
        .await?;
    assert!(!server_version.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore = "requires running Redis"]
async fn test_session_keys_expire() -> Result<(), Box<dyn std::error::Error>> {
    let redis = RedisPool::new(&RedisConfig::from_env()?)?;
    assert!(redis.ping().await?);

    let key = "session:integration";
    redis.put_field(key, "demo_likes_1", "[3,14]", 1).await?;
    assert_eq!(
        redis.get_field(key, "demo_likes_1").await?.as_deref(),
        Some("[3,14]")
    );

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert_eq!(redis.get_field(key, "demo_likes_1").await?, None, "TTL was not applied");

    redis.put_field(key, "auth_user_id", "1", 10).await?;
    assert!(redis.touch(key, 10).await?);
    assert!(redis.remove(key).await?);
    assert!(!redis.touch(key, 10).await?);
    Ok(())
}
