use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::article::ArticleRecord;
use crate::store::{StoreError, StoreResult, TableStore};

pub const ARTICLES_TABLE: &str = "atlas_articles";

/// Slugs among `slugs` that already have a row. One query for the whole set.
pub async fn find_existing(
    store: &dyn TableStore,
    slugs: &[String],
) -> StoreResult<HashSet<String>> {
    let unique: Vec<String> = slugs
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if unique.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = store.select_in(ARTICLES_TABLE, "slug", "slug", &unique).await?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get("slug").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// Parsed articles split by whether their slug is already stored.
#[derive(Debug, Default)]
pub struct ImportPlan {
    pub new: Vec<ArticleRecord>,
    pub existing: Vec<ArticleRecord>,
}

impl ImportPlan {
    pub fn partition(articles: Vec<ArticleRecord>, existing: &HashSet<String>) -> Self {
        let (existing, new) = articles
            .into_iter()
            .partition(|a| existing.contains(&a.slug));
        Self { new, existing }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Nothing,
    Inserted(usize),
    Failed(String),
}

/// Give every record an id and creation/publication time, then insert them
/// in a single call. A failed call fails the whole batch.
pub async fn insert_new(
    store: &dyn TableStore,
    records: &mut [ArticleRecord],
    now: DateTime<Utc>,
) -> InsertOutcome {
    if records.is_empty() {
        return InsertOutcome::Nothing;
    }
    for r in records.iter_mut() {
        r.prepare_insert(now);
    }
    let rows = match records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(rows) => rows,
        Err(e) => return InsertOutcome::Failed(format!("could not serialize articles: {e}")),
    };
    match store.insert(ARTICLES_TABLE, &rows, "slug").await {
        Ok(inserted) => {
            info!(requested = rows.len(), inserted = inserted.len(), "batch insert done");
            InsertOutcome::Inserted(inserted.len())
        }
        Err(e) => {
            warn!(error = %e, rows = rows.len(), "batch insert failed");
            InsertOutcome::Failed(e.to_string())
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub updated: usize,
    /// (slug, error message) for every record whose update failed.
    pub failures: Vec<(String, String)>,
}

/// One update call per record, filtered by slug. Failures are collected and
/// never stop the remaining updates; nothing is rolled back.
pub async fn update_existing(store: &dyn TableStore, records: &[ArticleRecord]) -> UpdateOutcome {
    let mut outcome = UpdateOutcome::default();
    for r in records {
        let result = match r.update_payload() {
            Ok(patch) => store
                .update_eq(ARTICLES_TABLE, &patch, "slug", &r.slug)
                .await
                .map_err(|e: StoreError| e.to_string()),
            Err(e) => Err(format!("could not serialize article: {e}")),
        };
        match result {
            Ok(()) => outcome.updated += 1,
            Err(msg) => {
                warn!(slug = %r.slug, error = %msg, "update failed");
                outcome.failures.push((r.slug.clone(), msg));
            }
        }
    }
    outcome
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// In-memory `TableStore` that records every write.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub categories: Vec<Value>,
        pub articles: Mutex<Vec<Value>>,
        pub fail_categories: bool,
        pub fail_insert: bool,
        pub fail_update_slugs: Vec<String>,
        pub inserts: Mutex<Vec<Vec<Value>>>,
        pub updates: Mutex<Vec<(String, Value)>>,
        pub select_in_calls: Mutex<Vec<Vec<String>>>,
    }

    impl MemoryStore {
        pub fn with_categories(pairs: &[(&str, &str)]) -> Self {
            Self {
                categories: pairs
                    .iter()
                    .map(|(slug, id)| json!({"id": id, "slug": slug}))
                    .collect(),
                ..Self::default()
            }
        }

        pub fn with_article(self, slug: &str) -> Self {
            self.articles.lock().unwrap().push(json!({"slug": slug}));
            self
        }

        pub fn write_count(&self) -> usize {
            self.inserts.lock().unwrap().len() + self.updates.lock().unwrap().len()
        }

        fn failure(table: &str) -> StoreError {
            StoreError::Status {
                table: table.to_string(),
                status: 500,
                message: "boom".to_string(),
            }
        }
    }

    #[async_trait]
    impl TableStore for MemoryStore {
        async fn select(&self, table: &str, _columns: &str) -> StoreResult<Vec<Value>> {
            if self.fail_categories {
                return Err(Self::failure(table));
            }
            Ok(self.categories.clone())
        }

        async fn select_in(
            &self,
            _table: &str,
            _columns: &str,
            column: &str,
            values: &[String],
        ) -> StoreResult<Vec<Value>> {
            self.select_in_calls.lock().unwrap().push(values.to_vec());
            Ok(self
                .articles
                .lock()
                .unwrap()
                .iter()
                .filter(|r| {
                    r.get(column)
                        .and_then(Value::as_str)
                        .is_some_and(|v| values.iter().any(|x| x == v))
                })
                .cloned()
                .collect())
        }

        async fn insert(
            &self,
            table: &str,
            rows: &[Value],
            _returning: &str,
        ) -> StoreResult<Vec<Value>> {
            if self.fail_insert {
                return Err(Self::failure(table));
            }
            self.inserts.lock().unwrap().push(rows.to_vec());
            self.articles.lock().unwrap().extend(rows.iter().cloned());
            Ok(rows.to_vec())
        }

        async fn update_eq(
            &self,
            table: &str,
            patch: &Value,
            _column: &str,
            value: &str,
        ) -> StoreResult<()> {
            if self.fail_update_slugs.iter().any(|s| s == value) {
                return Err(Self::failure(table));
            }
            self.updates
                .lock()
                .unwrap()
                .push((value.to_string(), patch.clone()));
            Ok(())
        }
    }

    fn article(slug: &str) -> ArticleRecord {
        ArticleRecord {
            id: None,
            title: slug.to_uppercase(),
            slug: slug.to_string(),
            excerpt: String::new(),
            content: String::new(),
            content_blocks: vec![json!({"type": "divider"})],
            section_images: None,
            author_name: "Team".into(),
            category_id: None,
            read_time_minutes: 1,
            article_template_type: "city_guide".into(),
            cover_image_url: None,
            seo_meta_description: None,
            seo_keywords: None,
            is_featured: false,
            status: "published".into(),
            updated_at: Utc::now(),
            created_at: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn find_existing_queries_unique_slugs_once() {
        let store = MemoryStore::default().with_article("b");
        let slugs = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let found = find_existing(&store, &slugs).await.unwrap();
        assert_eq!(found, HashSet::from(["b".to_string()]));
        assert_eq!(
            *store.select_in_calls.lock().unwrap(),
            vec![vec!["a".to_string(), "b".to_string()]]
        );
    }

    #[tokio::test]
    async fn find_existing_skips_query_for_empty_input() {
        let store = MemoryStore::default();
        assert!(find_existing(&store, &[]).await.unwrap().is_empty());
        assert!(store.select_in_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn partition_routes_by_slug() {
        let existing = HashSet::from(["b".to_string()]);
        let plan = ImportPlan::partition(vec![article("a"), article("b"), article("c")], &existing);
        let new: Vec<_> = plan.new.iter().map(|a| a.slug.as_str()).collect();
        let old: Vec<_> = plan.existing.iter().map(|a| a.slug.as_str()).collect();
        assert_eq!(new, vec!["a", "c"]);
        assert_eq!(old, vec!["b"]);
    }

    #[tokio::test]
    async fn insert_stamps_and_sends_one_batch() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let mut records = vec![article("a"), article("b")];
        let outcome = insert_new(&store, &mut records, now).await;
        assert_eq!(outcome, InsertOutcome::Inserted(2));

        let inserts = store.inserts.lock().unwrap();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].len(), 2);
        for row in &inserts[0] {
            assert!(row["id"].is_string());
            assert!(row["created_at"].is_string());
            assert!(row["published_at"].is_string());
        }
        assert_ne!(inserts[0][0]["id"], inserts[0][1]["id"]);
        assert!(records.iter().all(|r| r.created_at == Some(now)));
    }

    #[tokio::test]
    async fn insert_failure_fails_the_batch() {
        let store = MemoryStore {
            fail_insert: true,
            ..MemoryStore::default()
        };
        let outcome = insert_new(&store, &mut [article("a")], Utc::now()).await;
        assert!(matches!(outcome, InsertOutcome::Failed(m) if m.contains("boom")));
        assert_eq!(
            insert_new(&store, &mut [], Utc::now()).await,
            InsertOutcome::Nothing
        );
    }

    #[tokio::test]
    async fn update_failures_do_not_stop_the_rest() {
        let store = MemoryStore {
            fail_update_slugs: vec!["b".to_string()],
            ..MemoryStore::default()
        };
        let outcome = update_existing(&store, &[article("a"), article("b"), article("c")]).await;
        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "b");

        let updates = store.updates.lock().unwrap();
        let slugs: Vec<_> = updates.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(slugs, vec!["a", "c"]);
        assert!(updates.iter().all(|(_, p)| p.get("slug").is_none()));
        assert!(updates.iter().all(|(_, p)| p.get("id").is_none()));
    }
}
