use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use gatehouse_core::SubjectId;

use crate::MIGRATOR;

/// Connects to `DATABASE_URL` and migrates; `None` skips the calling test.
pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres tests: {error}");
    }

    Some(pool)
}

pub(crate) async fn insert_subject(pool: &PgPool, login: &str, password_hash: Option<&str>) -> SubjectId {
    let subject_id = SubjectId::new();
    let insert = sqlx::query(
        r#"
        INSERT INTO subjects (id, login, display_name, password_hash)
        VALUES ($1, $2, $2, $3)
        "#,
    )
    .bind(subject_id.as_uuid())
    .bind(format!("{login}-{subject_id}"))
    .bind(password_hash)
    .execute(pool)
    .await;
    assert!(insert.is_ok());

    subject_id
}
