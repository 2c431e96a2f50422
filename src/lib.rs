//! sitemirror - keeps a local mirror of remote files and listings in sync.
//!
//! Each crawl pass enumerates what a target currently exposes, fingerprints
//! every payload, and reconciles the result against the persisted record and
//! the on-disk mirror: new artifacts are added, changed ones replaced,
//! vanished ones removed, and unchanged ones left alone.

pub mod cli;
pub mod config;
pub mod models;
pub mod reconcile;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod storage;

#[cfg(test)]
mod testing;
