//! Database context for managing connections and repository access.
//!
//! The DbContext is the entry point for all database operations. It holds
//! the connection factory and hands out per-target artifact repositories.

use std::path::Path;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use serde::Serialize;

use super::diesel_artifact::DieselArtifactRepository;
use super::pool::{DbError, SqlitePool};
use super::util::parse_datetime;
use crate::schema::artifacts;

/// Record count and freshness of one crawl target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStats {
    pub crawl_target: String,
    pub artifacts: i64,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Database context that manages the connection factory and provides repository access.
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL (file path or `sqlite:` URL).
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        Ok(Self {
            pool: SqlitePool::from_url(url)?,
        })
    }

    /// Get the underlying connection factory.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open an artifact repository scoped to one crawl target.
    pub async fn artifacts(&self, crawl_target: &str) -> Result<DieselArtifactRepository, DbError> {
        DieselArtifactRepository::open(&self.pool, crawl_target).await
    }

    /// Initialize database schema.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(include_str!("schema_sqlite.sql")).await
    }

    /// Per-target record counts, ordered by target name.
    pub async fn target_stats(&self) -> Result<Vec<TargetStats>, DbError> {
        use diesel::dsl::{count_star, max};

        let mut conn = self.pool.get().await?;
        let rows: Vec<(String, i64, Option<String>)> = artifacts::table
            .group_by(artifacts::crawl_target)
            .select((
                artifacts::crawl_target,
                count_star(),
                max(artifacts::last_seen_at),
            ))
            .load(&mut conn)
            .await?;

        let mut stats: Vec<TargetStats> = rows
            .into_iter()
            .map(|(crawl_target, artifacts, last_seen)| TargetStats {
                crawl_target,
                artifacts,
                last_seen_at: last_seen.as_deref().map(parse_datetime),
            })
            .collect();
        stats.sort_by(|a, b| a.crawl_target.cmp(&b.crawl_target));
        Ok(stats)
    }

    /// Names of all crawl targets that have at least one record.
    pub async fn list_targets(&self) -> Result<Vec<String>, DbError> {
        let mut conn = self.pool.get().await?;
        artifacts::table
            .select(artifacts::crawl_target)
            .distinct()
            .order(artifacts::crawl_target.asc())
            .load(&mut conn)
            .await
    }
}
