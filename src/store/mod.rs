//! Table-oriented access to the hosted database.
//!
//! The importer only needs four calls: a plain select, a select filtered by a
//! set of values, a batched insert and an update filtered by equality. Anything
//! that can answer those (the PostgREST client in [`supabase`], or an in-memory
//! double in tests) can drive an import run.
use async_trait::async_trait;
use serde_json::Value;

pub mod supabase;

pub use supabase::SupabaseStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request to {table} failed: {source}")]
    Transport {
        table: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{table}: HTTP {status}: {message}")]
    Status {
        table: String,
        status: u16,
        message: String,
    },

    #[error("{table}: could not decode response: {message}")]
    Decode { table: String, message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TableStore: Send + Sync {
    /// All rows of `table`, projected to `columns` (comma separated).
    async fn select(&self, table: &str, columns: &str) -> StoreResult<Vec<Value>>;

    /// Rows of `table` whose `column` is one of `values`.
    async fn select_in(
        &self,
        table: &str,
        columns: &str,
        column: &str,
        values: &[String],
    ) -> StoreResult<Vec<Value>>;

    /// Insert `rows` in one call; returns the inserted rows projected to `returning`.
    async fn insert(&self, table: &str, rows: &[Value], returning: &str)
        -> StoreResult<Vec<Value>>;

    /// Apply `patch` to every row of `table` where `column` equals `value`.
    async fn update_eq(
        &self,
        table: &str,
        patch: &Value,
        column: &str,
        value: &str,
    ) -> StoreResult<()>;
}
