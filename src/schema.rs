// Mirrors src/repository/schema_sqlite.sql.

diesel::table! {
    artifacts (crawl_target, identity) {
        crawl_target -> Text,
        identity -> Text,
        source_url -> Text,
        content_fingerprint -> Text,
        retrieval_method -> Text,
        first_seen_at -> Text,
        last_seen_at -> Text,
    }
}
