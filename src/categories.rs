use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{info, warn};

use crate::store::TableStore;

pub const CATEGORIES_TABLE: &str = "atlas_categories";

/// Category slug -> id in the order the store returned them, loaded once per
/// run and read-only afterwards. Ids keep their JSON type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    by_slug: IndexMap<String, Value>,
}

impl CategoryMap {
    /// Fetch every category in one query. Any store failure aborts the run.
    pub async fn load(store: &dyn TableStore) -> Result<Self> {
        let rows = store
            .select(CATEGORIES_TABLE, "id,slug")
            .await
            .context("failed to load categories")?;
        let map = Self::from_rows(&rows);
        info!(categories = map.len(), "category map loaded");
        Ok(map)
    }

    /// Later rows win on duplicate slugs but the slug keeps its first position.
    /// Rows without a slug or a string/integer id are ignored.
    pub fn from_rows(rows: &[Value]) -> Self {
        let by_slug = rows.iter().fold(IndexMap::new(), |mut acc, row| {
            let slug = row.get("slug").and_then(Value::as_str);
            let id = row.get("id").filter(|v| is_id(v)).cloned();
            match (slug, id) {
                (Some(slug), Some(id)) => {
                    if acc.insert(slug.to_string(), id).is_some() {
                        warn!(slug, "duplicate category slug; keeping the later row");
                    }
                }
                _ => warn!(row = %row, "category row without slug or id skipped"),
            }
            acc
        });
        Self { by_slug }
    }

    pub fn get(&self, slug: &str) -> Option<&Value> {
        self.by_slug.get(slug)
    }

    pub fn len(&self) -> usize {
        self.by_slug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.by_slug.keys().map(String::as_str)
    }
}

impl<S: Into<String>, I: Into<Value>> FromIterator<(S, I)> for CategoryMap {
    fn from_iter<T: IntoIterator<Item = (S, I)>>(iter: T) -> Self {
        Self {
            by_slug: iter
                .into_iter()
                .map(|(s, i)| (s.into(), i.into()))
                .collect(),
        }
    }
}

/// Ids are uuids in practice, but integer keys are accepted too.
fn is_id(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Number(_))
}
