//! Diesel-based artifact repository for SQLite.
//!
//! A repository is opened per pass and owns one connection for the whole
//! pass. The connection is behind an async mutex so concurrent workers
//! serialize their statements instead of contending for SQLite's write lock.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tokio::sync::Mutex;

use super::models::{ArtifactRow, NewArtifact};
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::store::{ArtifactStore, StoreError};
use crate::models::ArtifactRecord;
use crate::schema::artifacts;

/// Artifact repository scoped to one crawl target.
pub struct DieselArtifactRepository {
    crawl_target: String,
    conn: Mutex<SqliteConn>,
}

impl DieselArtifactRepository {
    /// Open a repository for `crawl_target`, establishing its connection.
    pub async fn open(pool: &SqlitePool, crawl_target: &str) -> Result<Self, DbError> {
        let mut conn = pool.get().await?;
        conn.batch_execute("PRAGMA busy_timeout = 5000;").await?;

        Ok(Self {
            crawl_target: crawl_target.to_string(),
            conn: Mutex::new(conn),
        })
    }

    /// Number of records in this target.
    pub async fn count(&self) -> Result<i64, DbError> {
        use diesel::dsl::count_star;

        let mut conn = self.conn.lock().await;
        artifacts::table
            .filter(artifacts::crawl_target.eq(&self.crawl_target))
            .select(count_star())
            .first(&mut *conn)
            .await
    }
}

#[async_trait]
impl ArtifactStore for DieselArtifactRepository {
    fn crawl_target(&self) -> &str {
        &self.crawl_target
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.count().await.map(|_| ()).map_err(StoreError::target_wide)
    }

    async fn get(&self, identity: &str) -> Result<Option<ArtifactRecord>, StoreError> {
        let mut conn = self.conn.lock().await;

        artifacts::table
            .find((self.crawl_target.as_str(), identity))
            .first::<ArtifactRow>(&mut *conn)
            .await
            .optional()
            .map(|opt| opt.map(ArtifactRecord::from))
            .map_err(|e| StoreError::new(identity, e))
    }

    async fn list_all(&self) -> Result<Vec<ArtifactRecord>, StoreError> {
        let mut conn = self.conn.lock().await;

        artifacts::table
            .filter(artifacts::crawl_target.eq(&self.crawl_target))
            .order(artifacts::identity.asc())
            .load::<ArtifactRow>(&mut *conn)
            .await
            .map(|rows| rows.into_iter().map(ArtifactRecord::from).collect())
            .map_err(StoreError::target_wide)
    }

    async fn upsert(&self, record: &ArtifactRecord) -> Result<(), StoreError> {
        let row = NewArtifact::from_record(&self.crawl_target, record);
        let mut conn = self.conn.lock().await;

        diesel::insert_into(artifacts::table)
            .values(&row)
            .on_conflict((artifacts::crawl_target, artifacts::identity))
            .do_update()
            .set((
                artifacts::source_url.eq(excluded(artifacts::source_url)),
                artifacts::content_fingerprint.eq(excluded(artifacts::content_fingerprint)),
                artifacts::retrieval_method.eq(excluded(artifacts::retrieval_method)),
                artifacts::last_seen_at.eq(excluded(artifacts::last_seen_at)),
            ))
            .execute(&mut *conn)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::new(record.identity.as_str(), e))
    }

    async fn delete(&self, identity: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;

        diesel::delete(artifacts::table.find((self.crawl_target.as_str(), identity)))
            .execute(&mut *conn)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::new(identity, e))
    }
}
