use crate::ledger::reliability_score;
use crate::schema::{
    Article, Assessment, Rating, Report, Source, SourceType, Verdict, VerdictRecord, VerdictStatus,
};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database at {db_path}"))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          body TEXT NOT NULL,
          location TEXT,
          author TEXT NOT NULL,
          created_at TEXT NOT NULL,
          verdict_status TEXT NOT NULL DEFAULT 'Pending',
          verdict_explanation TEXT NOT NULL DEFAULT '',
          verdict_reports_json TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at);

        CREATE TABLE IF NOT EXISTS sources (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL UNIQUE,
          source_type TEXT NOT NULL,
          reliable_count INTEGER NOT NULL DEFAULT 0,
          unreliable_count INTEGER NOT NULL DEFAULT 0,
          misleading_count INTEGER NOT NULL DEFAULT 0,
          reliability_score INTEGER NOT NULL DEFAULT 50,
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
        "#,
    )?;
    Ok(())
}

const ARTICLE_COLUMNS: &str = "id, title, body, location, author, created_at, \
     verdict_status, verdict_explanation, verdict_reports_json";

const SOURCE_COLUMNS: &str = "name, source_type, reliable_count, unreliable_count, \
     misleading_count, reliability_score, created_at";

struct ArticleRow {
    id: String,
    title: String,
    body: String,
    location: Option<String>,
    author: String,
    created_at: String,
    verdict_status: String,
    verdict_explanation: String,
    verdict_reports_json: String,
}

impl ArticleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            location: row.get(3)?,
            author: row.get(4)?,
            created_at: row.get(5)?,
            verdict_status: row.get(6)?,
            verdict_explanation: row.get(7)?,
            verdict_reports_json: row.get(8)?,
        })
    }

    fn into_article(self) -> Result<Article> {
        let status = VerdictStatus::parse(&self.verdict_status).ok_or_else(|| {
            anyhow!(
                "article {} has unknown verdict status {:?}",
                self.id,
                self.verdict_status
            )
        })?;
        let reports: Vec<Report> = serde_json::from_str(&self.verdict_reports_json)
            .with_context(|| format!("article {} has malformed verdict reports", self.id))?;
        let verdict = Verdict::try_from(VerdictRecord {
            status,
            explanation: self.verdict_explanation,
            reports,
        })
        .map_err(|reason| anyhow!("article {} has an invalid verdict: {reason}", self.id))?;

        Ok(Article {
            id: self.id,
            title: self.title,
            body: self.body,
            location: self.location,
            author: self.author,
            created_at: self.created_at,
            verdict,
        })
    }
}

struct SourceRow {
    name: String,
    source_type: String,
    reliable_count: i64,
    unreliable_count: i64,
    misleading_count: i64,
    reliability_score: i64,
    created_at: String,
}

impl SourceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            source_type: row.get(1)?,
            reliable_count: row.get(2)?,
            unreliable_count: row.get(3)?,
            misleading_count: row.get(4)?,
            reliability_score: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_source(self) -> Result<Source> {
        let source_type = SourceType::parse(&self.source_type).ok_or_else(|| {
            anyhow!(
                "source {} has unknown type {:?}",
                self.name,
                self.source_type
            )
        })?;
        Ok(Source {
            source_type,
            reliable_count: u64::try_from(self.reliable_count)?,
            unreliable_count: u64::try_from(self.unreliable_count)?,
            misleading_count: u64::try_from(self.misleading_count)?,
            reliability_score: u8::try_from(self.reliability_score)?,
            name: self.name,
            created_at: self.created_at,
        })
    }
}

pub fn insert_article(conn: &Connection, article: &Article) -> Result<()> {
    let reports_json = serde_json::to_string(article.verdict.reports())?;

    conn.execute(
        r#"
        INSERT INTO articles (
          id, title, body, location, author, created_at,
          verdict_status, verdict_explanation, verdict_reports_json
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            article.id,
            article.title,
            article.body,
            article.location,
            article.author,
            article.created_at,
            article.verdict.status().as_str(),
            article.verdict.explanation(),
            reports_json
        ],
    )?;

    Ok(())
}

pub fn get_article(conn: &Connection, id: &str) -> Result<Option<Article>> {
    let row = conn
        .query_row(
            &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
            params![id],
            ArticleRow::from_row,
        )
        .optional()?;
    row.map(ArticleRow::into_article).transpose()
}

/// Newest first.
pub fn list_articles(conn: &Connection) -> Result<Vec<Article>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], ArticleRow::from_row)?;

    let mut articles = Vec::new();
    for r in rows {
        articles.push(r?.into_article()?);
    }
    Ok(articles)
}

pub fn delete_article(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM articles WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Writes a terminal verdict only while the stored status is still Pending.
/// Returns `false` when another writer resolved the article first.
pub fn resolve_verdict(conn: &Connection, id: &str, assessment: &Assessment) -> Result<bool> {
    assessment.validate().map_err(|e| anyhow!(e))?;
    let reports_json = serde_json::to_string(&assessment.reports)?;
    let status = VerdictStatus::from(assessment.rating);

    let changed = conn.execute(
        r#"
        UPDATE articles
        SET verdict_status = ?2,
            verdict_explanation = ?3,
            verdict_reports_json = ?4
        WHERE id = ?1 AND verdict_status = 'Pending'
        "#,
        params![id, status.as_str(), assessment.explanation, reports_json],
    )?;
    Ok(changed == 1)
}

pub fn reset_verdict(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        r#"
        UPDATE articles
        SET verdict_status = 'Pending',
            verdict_explanation = '',
            verdict_reports_json = '[]'
        WHERE id = ?1
        "#,
        params![id],
    )?;
    Ok(changed > 0)
}

fn counter_column(rating: Rating) -> &'static str {
    match rating {
        Rating::Reliable => "reliable_count",
        Rating::Unreliable => "unreliable_count",
        Rating::Misleading => "misleading_count",
    }
}

/// Increment-or-initialize for one source, serialized by an IMMEDIATE
/// transaction so concurrent writers never lose a count.
pub fn record_verdict(
    conn: &mut Connection,
    name: &str,
    source_type: SourceType,
    rating: Rating,
) -> Result<Source> {
    let column = counter_column(rating);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        "INSERT INTO sources (name, source_type) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![name, source_type.as_str()],
    )?;
    tx.execute(
        &format!("UPDATE sources SET {column} = {column} + 1 WHERE name = ?1"),
        params![name],
    )?;

    let (reliable, unreliable, misleading): (i64, i64, i64) = tx.query_row(
        "SELECT reliable_count, unreliable_count, misleading_count FROM sources WHERE name = ?1",
        params![name],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    let score = reliability_score(
        u64::try_from(reliable)?,
        u64::try_from(unreliable)?,
        u64::try_from(misleading)?,
    );
    tx.execute(
        "UPDATE sources SET reliability_score = ?2 WHERE name = ?1",
        params![name, i64::from(score)],
    )?;

    let source = get_source(&tx, name)?
        .ok_or_else(|| anyhow!("source {name} vanished inside its own transaction"))?;
    tx.commit()?;
    Ok(source)
}

pub fn get_source(conn: &Connection, name: &str) -> Result<Option<Source>> {
    let row = conn
        .query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE name = ?1"),
            params![name],
            SourceRow::from_row,
        )
        .optional()?;
    row.map(SourceRow::into_source).transpose()
}

/// Highest score first; ties keep insertion order.
pub fn list_sources(conn: &Connection) -> Result<Vec<Source>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY reliability_score DESC, seq ASC"
    ))?;
    let rows = stmt.query_map([], SourceRow::from_row)?;

    let mut sources = Vec::new();
    for r in rows {
        sources.push(r?.into_source()?);
    }
    Ok(sources)
}

/// Shared handle over a single SQLite connection.
///
/// The mutex is only held for the duration of one storage call, never across
/// an `.await`.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::from_connection(open(db_path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))?;
        f(&mut conn)
    }

    /// Runs one storage call on the blocking pool so async callers never
    /// hold the runtime while SQLite works.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .context("storage task panicked")?
    }

    pub fn insert_article(&self, article: &Article) -> Result<()> {
        self.with_conn(|conn| insert_article(conn, article))
    }

    pub fn article(&self, id: &str) -> Result<Option<Article>> {
        self.with_conn(|conn| get_article(conn, id))
    }

    pub fn articles(&self) -> Result<Vec<Article>> {
        self.with_conn(|conn| list_articles(conn))
    }

    pub fn delete_article(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| delete_article(conn, id))
    }

    pub fn resolve_verdict(&self, id: &str, assessment: &Assessment) -> Result<bool> {
        self.with_conn(|conn| resolve_verdict(conn, id, assessment))
    }

    pub fn reset_verdict(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| reset_verdict(conn, id))
    }

    pub fn record_verdict(
        &self,
        name: &str,
        source_type: SourceType,
        rating: Rating,
    ) -> Result<Source> {
        self.with_conn(|conn| record_verdict(conn, name, source_type, rating))
    }

    pub fn source(&self, name: &str) -> Result<Option<Source>> {
        self.with_conn(|conn| get_source(conn, name))
    }

    pub fn sources(&self) -> Result<Vec<Source>> {
        self.with_conn(|conn| list_sources(conn))
    }
}
