//! Bulk import of Atlas articles from CSV into the hosted `atlas_articles` table.
pub mod article;
pub mod categories;
pub mod config;
pub mod importer;
pub mod parse;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use pipeline::{run_import, ImportOptions, ImportSummary};
