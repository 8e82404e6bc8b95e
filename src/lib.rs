//! Newsdesk - A Categorized News Aggregator
//!
//! This crate aggregates articles from category-grouped RSS feeds into a
//! SQLite store and serves them through a small JSON API with per-article
//! view tracking.

pub mod config;
pub mod db;
pub mod fetcher;
pub mod routes;
