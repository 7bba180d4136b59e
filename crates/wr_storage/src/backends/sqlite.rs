use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wr_core::{Article, ArticleStorage, Error, Result, DEFAULT_TOPIC};
use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        author TEXT,
        content TEXT,
        url TEXT,
        topic TEXT,
        publish_time TEXT,
        create_time TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_create_time ON articles (create_time)",
    "CREATE INDEX IF NOT EXISTS idx_articles_topic ON articles (topic)",
];

// Timestamps are stored as fixed-width RFC 3339 so text order matches time order.
const SELECT_ARTICLES: &str = r#"
    SELECT id, title,
           COALESCE(author, '') AS author,
           COALESCE(content, '') AS content,
           COALESCE(url, '') AS url,
           COALESCE(topic, ?) AS topic,
           publish_time, create_time
    FROM articles
"#;

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be writable at ./data.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new("data.db")).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self { pool: Arc::new(pool), db_path: db_path.to_path_buf() })
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(value: Option<String>) -> Result<DateTime<Utc>> {
    match value {
        Some(value) => DateTime::parse_from_rfc3339(&value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::Database(format!("Failed to parse date '{}': {}", value, e))),
        None => Ok(Utc::now()),
    }
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        content: row.get("content"),
        url: row.get("url"),
        topic: row.get("topic"),
        publish_time: parse_time(row.get("publish_time"))?,
        create_time: parse_time(row.get("create_time"))?,
    })
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn upsert_articles(&self, articles: &[Article]) -> Result<()> {
        let mut tx = self.pool.begin().await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        for article in articles {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO articles
                (id, title, author, content, url, topic, publish_time, create_time)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.id)
            .bind(&article.title)
            .bind(&article.author)
            .bind(&article.content)
            .bind(&article.url)
            .bind(&article.topic)
            .bind(format_time(&article.publish_time))
            .bind(format_time(&article.create_time))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to store article {}: {}", article.id, e)))?;
        }

        tx.commit().await
            .map_err(|e| Error::Database(format!("Failed to commit articles: {}", e)))?;
        tracing::debug!("💾 Stored {} articles in {}", articles.len(), self.db_path.display());
        Ok(())
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query(&format!("{} ORDER BY create_time DESC", SELECT_ARTICLES))
            .bind(DEFAULT_TOPIC)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list articles: {}", e)))?;

        rows.iter().map(row_to_article).collect()
    }

    async fn list_by_topic(&self, topic: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query(&format!(
            "{} WHERE COALESCE(topic, ?) = ? ORDER BY create_time DESC",
            SELECT_ARTICLES
        ))
        .bind(DEFAULT_TOPIC)
        .bind(DEFAULT_TOPIC)
        .bind(topic)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list articles for topic {}: {}", topic, e)))?;

        rows.iter().map(row_to_article).collect()
    }

    async fn list_topics(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT topic FROM articles
            WHERE topic IS NOT NULL AND topic != ''
            ORDER BY topic
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list topics: {}", e)))?;

        Ok(rows.iter().map(|row| row.get::<String, _>("topic")).collect())
    }
}
