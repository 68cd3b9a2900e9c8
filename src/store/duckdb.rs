use super::traits::{DocumentStore, PoemStream, StoreError};
use crate::record::Poem;
use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use futures::StreamExt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Rows buffered ahead of the consumer while streaming a dataset
const CURSOR_BUFFER: usize = 256;

const SELECT_POEM_COLUMNS: &str =
    "SELECT id, dataset, dataset_id, title, poem, poet, tags, language FROM poems";

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock()
        .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
}

fn row_to_poem(row: &Row<'_>) -> Result<Poem, StoreError> {
    let tags_json: String = row.get(6)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| StoreError::Decode(format!("tags column: {}", e)))?;

    Ok(Poem {
        id: Some(row.get(0)?),
        dataset: row.get(1)?,
        dataset_id: row.get(2)?,
        title: row.get(3)?,
        poem: row.get(4)?,
        poet: row.get(5)?,
        tags,
        language: row.get(7)?,
    })
}

fn insert_poem(stmt: &mut duckdb::Statement<'_>, poem: &Poem) -> Result<String, StoreError> {
    let id = poem
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let tags = serde_json::to_string(&poem.tags)?;

    stmt.execute(params![
        id,
        poem.dataset,
        poem.dataset_id,
        poem.title,
        poem.poem,
        poem.poet,
        tags,
        poem.language,
    ])?;
    Ok(id)
}

const INSERT_POEM: &str =
    "INSERT INTO poems (id, dataset, dataset_id, title, poem, poet, tags, language)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

/// Walk every row of `dataset`, pushing poems into `tx` until the consumer hangs up
fn stream_dataset(
    conn: &Connection,
    dataset: &str,
    tx: &mpsc::Sender<Result<Poem, StoreError>>,
) -> Result<(), StoreError> {
    let sql = format!("{} WHERE dataset = ? ORDER BY seq", SELECT_POEM_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![dataset])?;

    while let Some(row) = rows.next()? {
        let poem = row_to_poem(row)?;
        if tx.blocking_send(Ok(poem)).is_err() {
            tracing::debug!(dataset = %dataset, "Cursor consumer dropped, stopping scan");
            return Ok(());
        }
    }
    Ok(())
}

/// DuckDB-backed document store
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStore {
    /// Open (or create) a database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!(
                        "failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the configured location; `:memory:` selects an in-memory store
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if path.as_os_str() == ":memory:" {
            Self::in_memory()
        } else {
            Self::new(path)
        }
    }
}

#[async_trait]
impl DocumentStore for DuckDbStore {
    async fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;

            conn.execute("CREATE SEQUENCE IF NOT EXISTS poems_seq START 1", [])?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS poems (
                    seq BIGINT NOT NULL DEFAULT nextval('poems_seq'),
                    id VARCHAR PRIMARY KEY,
                    dataset VARCHAR NOT NULL,
                    dataset_id VARCHAR NOT NULL,
                    title VARCHAR NOT NULL,
                    poem VARCHAR NOT NULL,
                    poet VARCHAR NOT NULL,
                    tags VARCHAR NOT NULL,
                    language VARCHAR NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_poems_dataset ON poems(dataset)",
                [],
            )?;

            Ok::<(), StoreError>(())
        })
        .await?
    }

    async fn insert_one(&self, poem: &Poem) -> Result<String, StoreError> {
        let conn = self.conn.clone();
        let poem = poem.clone();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let mut stmt = conn.prepare(INSERT_POEM)?;
            insert_poem(&mut stmt, &poem)
        })
        .await?
    }

    async fn insert_many(&self, poems: &[Poem]) -> Result<usize, StoreError> {
        if poems.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.clone();
        let poems = poems.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(INSERT_POEM)?;
                for poem in &poems {
                    insert_poem(&mut stmt, poem)?;
                }
            }
            tx.commit()?;
            Ok::<usize, StoreError>(poems.len())
        })
        .await?
    }

    async fn find_by_dataset(&self, dataset: &str) -> Result<PoemStream, StoreError> {
        // The scan runs on its own connection so writers are not blocked for its duration.
        let cursor_conn = {
            let conn = lock(&self.conn)?;
            conn.try_clone()?
        };
        let dataset = dataset.to_string();
        let (tx, rx) = mpsc::channel(CURSOR_BUFFER);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = stream_dataset(&cursor_conn, &dataset, &tx) {
                let _ = tx.blocking_send(Err(e));
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    async fn datasets(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let mut stmt = conn.prepare("SELECT DISTINCT dataset FROM poems ORDER BY dataset")?;
            let datasets = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<Vec<String>, StoreError>(datasets)
        })
        .await?
    }

    async fn count(&self, dataset: Option<&str>) -> Result<u64, StoreError> {
        let conn = self.conn.clone();
        let dataset = dataset.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let count: i64 = match dataset {
                Some(dataset) => conn.query_row(
                    "SELECT COUNT(*) FROM poems WHERE dataset = ?",
                    params![dataset],
                    |row| row.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM poems", [], |row| row.get(0))?,
            };
            Ok::<u64, StoreError>(count.max(0) as u64)
        })
        .await?
    }
}
