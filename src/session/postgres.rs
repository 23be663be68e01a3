use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::{info, Instrument};

use super::{SessionData, SessionError, SessionKey, SessionStore};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS "session" (
        "sid" varchar NOT NULL PRIMARY KEY,
        "sess" json NOT NULL,
        "expire" timestamp(6) NOT NULL
    )
"#;

const CREATE_INDEX: &str =
    r#"CREATE INDEX IF NOT EXISTS "IDX_session_expire" ON "session" ("expire")"#;

fn db_span(operation: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation
    )
}

/// Sessions persisted in PostgreSQL, shared by every gateway instance.
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the session table exists.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or the schema cannot be created.
    pub async fn connect(dsn: &str) -> Result<Self, SessionError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(dsn)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        info!("PostgreSQL session store ready");
        Ok(store)
    }

    /// # Errors
    /// Returns an error if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), SessionError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .instrument(db_span("CREATE"))
            .await?;
        sqlx::query(CREATE_INDEX)
            .execute(&self.pool)
            .instrument(db_span("CREATE"))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionData>, SessionError> {
        let query = r#"SELECT "sess" FROM "session" WHERE "sid" = $1 AND "expire" > now()"#;
        let row: Option<(Json<SessionData>,)> = sqlx::query_as(query)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT"))
            .await?;
        Ok(row.map(|(Json(data),)| data))
    }

    async fn save(
        &self,
        key: &SessionKey,
        data: &SessionData,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let query = r#"
            INSERT INTO "session" ("sid", "sess", "expire")
            VALUES ($1, $2::json, now() + make_interval(secs => $3))
            ON CONFLICT ("sid") DO UPDATE
            SET "sess" = EXCLUDED."sess", "expire" = EXCLUDED."expire"
        "#;
        sqlx::query(query)
            .bind(key.as_str())
            .bind(Json(data))
            .bind(ttl.as_secs_f64())
            .execute(&self.pool)
            .instrument(db_span("INSERT"))
            .await?;
        Ok(())
    }

    async fn destroy(&self, key: &SessionKey) -> Result<(), SessionError> {
        sqlx::query(r#"DELETE FROM "session" WHERE "sid" = $1"#)
            .bind(key.as_str())
            .execute(&self.pool)
            .instrument(db_span("DELETE"))
            .await?;
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64, SessionError> {
        let result = sqlx::query(r#"DELETE FROM "session" WHERE "expire" <= now()"#)
            .execute(&self.pool)
            .instrument(db_span("DELETE"))
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), SessionError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(db_span("SELECT"))
            .await?;
        Ok(())
    }
}
