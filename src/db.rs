use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::config::SortTiebreak;

/// A stored article row. `link` is the identity: the store never holds two
/// rows with the same link, and a re-fetch never overwrites an existing row.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub published_at: Option<String>,
    pub source_name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub image_url: Option<String>,
    pub view_count: i64,
}

/// A normalized article produced by the fetcher, not yet stored.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub link: String,
    pub title: String,
    pub published_at: Option<String>,
    pub source_name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub image_url: Option<String>,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                published_at TEXT,
                source_name TEXT NOT NULL,
                category TEXT NOT NULL,
                sub_category TEXT,
                image_url TEXT,
                view_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_view_count
            ON articles(view_count DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert an article unless a row with the same link already exists.
    /// Returns whether a new row was inserted. Existing rows are left
    /// untouched, so view counts survive re-fetches.
    pub async fn insert_if_absent(&self, article: &NewArticle) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles
                (link, title, published_at, source_name, category, sub_category, image_url, view_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(link) DO NOTHING
            "#,
        )
        .bind(&article.link)
        .bind(&article.title)
        .bind(&article.published_at)
        .bind(&article.source_name)
        .bind(&article.category)
        .bind(&article.sub_category)
        .bind(&article.image_url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every stored article, most viewed first. Ties are broken by the
    /// configured secondary key and finally by row id so the order is
    /// deterministic either way.
    pub async fn list_articles(&self, tiebreak: SortTiebreak) -> anyhow::Result<Vec<Article>> {
        let query = match tiebreak {
            SortTiebreak::None => {
                "SELECT * FROM articles ORDER BY view_count DESC, id ASC"
            }
            SortTiebreak::PublishedAt => {
                "SELECT * FROM articles ORDER BY view_count DESC, published_at DESC NULLS LAST, id ASC"
            }
        };

        let articles = sqlx::query_as::<_, Article>(query)
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    /// Atomically bump the view count of the article with the given link.
    /// Returns false when no such article exists.
    pub async fn increment_view(&self, link: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET view_count = view_count + 1 WHERE link = ?",
        )
        .bind(link)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_articles(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
