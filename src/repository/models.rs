//! Diesel row types for the `artifacts` table.

use diesel::prelude::*;

use super::util::{format_datetime, parse_datetime};
use crate::models::{ArtifactRecord, Fingerprint, RetrievalMethod};
use crate::schema;

/// Artifact row from the database.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::artifacts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArtifactRow {
    pub crawl_target: String,
    pub identity: String,
    pub source_url: String,
    pub content_fingerprint: String,
    pub retrieval_method: String,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

/// New artifact row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::artifacts)]
pub struct NewArtifact<'a> {
    pub crawl_target: &'a str,
    pub identity: &'a str,
    pub source_url: &'a str,
    pub content_fingerprint: &'a str,
    pub retrieval_method: &'a str,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

impl<'a> NewArtifact<'a> {
    pub fn from_record(crawl_target: &'a str, record: &'a ArtifactRecord) -> Self {
        Self {
            crawl_target,
            identity: &record.identity,
            source_url: &record.source_url,
            content_fingerprint: record.fingerprint.as_str(),
            retrieval_method: record.retrieval_method.as_str(),
            first_seen_at: format_datetime(&record.first_seen_at),
            last_seen_at: format_datetime(&record.last_seen_at),
        }
    }
}

impl From<ArtifactRow> for ArtifactRecord {
    fn from(row: ArtifactRow) -> Self {
        ArtifactRecord {
            crawl_target: row.crawl_target,
            identity: row.identity,
            source_url: row.source_url,
            fingerprint: Fingerprint::from_stored(row.content_fingerprint),
            retrieval_method: RetrievalMethod::from_str(&row.retrieval_method)
                .unwrap_or(RetrievalMethod::HtmlLink),
            first_seen_at: parse_datetime(&row.first_seen_at),
            last_seen_at: parse_datetime(&row.last_seen_at),
        }
    }
}
