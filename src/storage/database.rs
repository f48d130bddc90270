//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite persistence for books, outlines, interview history, chapters and
//! QA reports:
//! - Connection pooling via r2d2 for concurrent request handlers
//! - Panic-safe transactions with automatic rollback
//! - Version-tracked migrations
//! - WAL mode for concurrent readers during long generations
//!
//! Every `load_*` that takes a [`UserId`] enforces ownership: an entity that
//! exists but belongs to someone else is reported exactly like a missing one.

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use crate::types::{
    Book, BookError, Chapter, ConversationMessage, Outline, OutlineSection, QaAnalysisResult,
    Result, ResultExt, UserId, log_filter_error,
};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 2;

struct Migration {
    version: u32,
    description: &'static str,
    up: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Add chapter ordering index",
        up: "CREATE INDEX IF NOT EXISTS idx_chapters_book_order ON chapters(book_id, order_index)",
    },
    Migration {
        version: 2,
        description: "Track conversation update time",
        up: "ALTER TABLE conversations ADD COLUMN updated_at TEXT NOT NULL DEFAULT ''",
    },
];

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: u32,
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 4;
    const MAX_POOL_SIZE: u32 = 32;

    /// clamp(cores * 2, MIN, MAX)
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        (cores * 2).clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }

    pub fn auto() -> Self {
        let max_size = Self::optimal_pool_size();
        Self {
            max_size,
            min_idle: (max_size / 4).max(2),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| BookError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| BookError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        Ok(Self { pool })
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA wal_autocheckpoint = 1000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            BookError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if current_version == 0 {
            // Fresh database: schema.sql already contains every migration
            conn.execute_batch(SCHEMA)
                .with_context("Failed to initialize database schema")?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to set schema version")?;
            return Ok(());
        }

        drop(conn);
        self.migrate(current_version)
    }

    fn migrate(&self, current_version: u32) -> Result<()> {
        let conn = self.conn()?;

        for migration in MIGRATIONS {
            if migration.version > current_version {
                conn.execute_batch(migration.up).with_context_fn(|| {
                    format!(
                        "Failed to apply migration {}: {}",
                        migration.version, migration.description
                    )
                })?;

                tracing::info!(
                    "Applied migration {}: {}",
                    migration.version,
                    migration.description
                );
            }
        }

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to update schema version")?;
        }

        Ok(())
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// If the closure errors or panics the transaction is rolled back and the
    /// pool stays usable.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(BookError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Books
    // =========================================================================

    pub fn insert_book(&self, book: &Book) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT INTO books (id, user_id, title, topic, audience, expertise_level, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    book.id,
                    book.user_id,
                    book.title,
                    book.topic,
                    book.audience,
                    book.expertise_level,
                    now
                ],
            )
            .with_context("Failed to insert book")?;
        Ok(())
    }

    /// Load a book owned by `user`
    pub fn load_book(&self, user: &UserId, book_id: &str) -> Result<Book> {
        let conn = self.conn()?;
        let book = conn
            .query_row(
                "SELECT id, user_id, title, topic, audience, expertise_level
                 FROM books WHERE id = ?1",
                params![book_id],
                |row| {
                    Ok(Book {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        title: row.get(2)?,
                        topic: row.get(3)?,
                        audience: row.get(4)?,
                        expertise_level: row.get(5)?,
                    })
                },
            )
            .optional()?;

        match book {
            Some(book) if book.user_id == user.as_str() => Ok(book),
            _ => Err(BookError::not_found("book", book_id)),
        }
    }

    /// Load a book without an ownership check (CLI use)
    pub fn load_book_unchecked(&self, book_id: &str) -> Result<Book> {
        let owner: Option<String> = self
            .conn()?
            .query_row(
                "SELECT user_id FROM books WHERE id = ?1",
                params![book_id],
                |row| row.get(0),
            )
            .optional()?;
        match owner {
            Some(owner) => self.load_book(&UserId::new(owner), book_id),
            None => Err(BookError::not_found("book", book_id)),
        }
    }

    // =========================================================================
    // Outlines
    // =========================================================================

    /// Insert or replace an outline with all of its sections
    pub fn save_outline(&self, outline: &Outline) -> Result<()> {
        let outline = outline.clone();
        self.transaction(move |conn| {
            let now = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO outlines (id, book_id, title, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET title = excluded.title, updated_at = excluded.updated_at",
                params![outline.id, outline.book_id, outline.title, now],
            )
            .with_context("Failed to save outline")?;

            conn.execute(
                "DELETE FROM outline_sections WHERE outline_id = ?1",
                params![outline.id],
            )
            .with_context("Failed to clear outline sections")?;

            let mut stmt = conn
                .prepare(
                    "INSERT INTO outline_sections (id, outline_id, title, description, order_index)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .with_context("Failed to prepare section insert")?;
            for section in &outline.sections {
                stmt.execute(params![
                    section.id,
                    outline.id,
                    section.title,
                    section.description,
                    section.order_index as i64
                ])
                .with_context("Failed to insert outline section")?;
            }
            Ok(())
        })
    }

    /// Load an outline and its book, both owned by `user`
    pub fn load_outline(&self, user: &UserId, outline_id: &str) -> Result<(Outline, Book)> {
        let header: Option<(String, String)> = self
            .conn()?
            .query_row(
                "SELECT book_id, title FROM outlines WHERE id = ?1",
                params![outline_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((book_id, title)) = header else {
            return Err(BookError::not_found("outline", outline_id));
        };

        let book = self
            .load_book(user, &book_id)
            .map_err(|_| BookError::not_found("outline", outline_id))?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, order_index FROM outline_sections
             WHERE outline_id = ?1 ORDER BY order_index",
        )?;
        let sections = stmt
            .query_map(params![outline_id], |row| {
                Ok(OutlineSection {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    order_index: row.get::<_, i64>(3)? as usize,
                })
            })?
            .filter_map(|r| log_filter_error(r, "Skipping unreadable outline section"))
            .collect();

        Ok((
            Outline {
                id: outline_id.to_string(),
                book_id,
                title,
                sections,
            },
            book,
        ))
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    pub fn load_conversation(&self, outline_id: &str) -> Result<Vec<ConversationMessage>> {
        let json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT messages_json FROM conversations WHERE outline_id = ?1",
                params![outline_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_conversation(
        &self,
        outline_id: &str,
        messages: &[ConversationMessage],
    ) -> Result<()> {
        let json = serde_json::to_string(messages)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT INTO conversations (outline_id, messages_json, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(outline_id) DO UPDATE SET
                    messages_json = excluded.messages_json, updated_at = excluded.updated_at",
                params![outline_id, json, now],
            )
            .with_context("Failed to save conversation")?;
        Ok(())
    }

    // =========================================================================
    // Chapters
    // =========================================================================

    pub fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT INTO chapters
                 (id, book_id, section_id, title, content, word_count, order_index, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    chapter.id,
                    chapter.book_id,
                    chapter.section_id,
                    chapter.title,
                    chapter.content,
                    chapter.word_count as i64,
                    chapter.order_index as i64,
                    now
                ],
            )
            .with_context("Failed to insert chapter")?;
        Ok(())
    }

    fn map_chapter_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chapter> {
        Ok(Chapter {
            id: row.get(0)?,
            book_id: row.get(1)?,
            section_id: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            word_count: row.get::<_, i64>(5)? as usize,
            order_index: row.get::<_, i64>(6)? as usize,
        })
    }

    /// Load a chapter that belongs to `book_id`, itself owned by `user`
    pub fn load_chapter(&self, user: &UserId, book_id: &str, chapter_id: &str) -> Result<Chapter> {
        self.load_book(user, book_id)?;

        let chapter = self
            .conn()?
            .query_row(
                "SELECT id, book_id, section_id, title, content, word_count, order_index
                 FROM chapters WHERE id = ?1 AND book_id = ?2",
                params![chapter_id, book_id],
                Self::map_chapter_row,
            )
            .optional()?;

        chapter.ok_or_else(|| BookError::not_found("chapter", chapter_id))
    }

    /// All chapters of a book in reading order
    pub fn list_chapters(&self, book_id: &str) -> Result<Vec<Chapter>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, book_id, section_id, title, content, word_count, order_index
             FROM chapters WHERE book_id = ?1 ORDER BY order_index",
        )?;
        let chapters = stmt
            .query_map(params![book_id], Self::map_chapter_row)?
            .filter_map(|r| log_filter_error(r, "Skipping unreadable chapter"))
            .collect();
        Ok(chapters)
    }

    /// Description of the outline section a chapter was created from
    pub fn section_description(&self, section_id: &str) -> Result<Option<String>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT description FROM outline_sections WHERE id = ?1",
                params![section_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Outline of a book, if one exists
    pub fn outline_for_book(&self, user: &UserId, book_id: &str) -> Result<Option<Outline>> {
        let outline_id: Option<String> = self
            .conn()?
            .query_row(
                "SELECT id FROM outlines WHERE book_id = ?1 ORDER BY updated_at DESC LIMIT 1",
                params![book_id],
                |row| row.get(0),
            )
            .optional()?;
        match outline_id {
            Some(id) => Ok(Some(self.load_outline(user, &id)?.0)),
            None => Ok(None),
        }
    }

    pub fn update_chapter_content(
        &self,
        chapter_id: &str,
        title: Option<&str>,
        content: &str,
        word_count: usize,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let updated = self
            .conn()?
            .execute(
                "UPDATE chapters SET title = COALESCE(?2, title), content = ?3, word_count = ?4,
                 updated_at = ?5 WHERE id = ?1",
                params![chapter_id, title, content, word_count as i64, now],
            )
            .with_context("Failed to update chapter")?;

        if updated == 0 {
            return Err(BookError::not_found("chapter", chapter_id));
        }
        Ok(())
    }

    // =========================================================================
    // QA Reports
    // =========================================================================

    pub fn save_qa_analysis(&self, book_id: &str, result: &QaAnalysisResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.conn()?
            .execute(
                "INSERT INTO qa_analyses (book_id, result_json, analyzed_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(book_id) DO UPDATE SET
                    result_json = excluded.result_json, analyzed_at = excluded.analyzed_at",
                params![book_id, json, result.analyzed_at],
            )
            .with_context("Failed to save QA analysis")?;
        Ok(())
    }

    pub fn load_qa_analysis(&self, book_id: &str) -> Result<Option<QaAnalysisResult>> {
        let json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT result_json FROM qa_analyses WHERE book_id = ?1",
                params![book_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).map_err(BookError::from))
            .transpose()
    }
}
