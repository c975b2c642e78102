//! Company directory backing the ticker search box.
//!
//! The list is read from a JSON file on first use and served from memory
//! afterwards. The cache is never refreshed implicitly: callers use
//! [`CompanyDirectory::reload`] or [`CompanyDirectory::invalidate`] when the
//! file changes.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_SEARCH_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub code: String,
}

#[derive(Debug)]
pub struct CompanyDirectory {
    path: PathBuf,
    cache: RwLock<Option<Arc<Vec<Company>>>>,
}

impl CompanyDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached list, reading the file if nothing is cached yet.
    pub async fn load(&self) -> anyhow::Result<Arc<Vec<Company>>> {
        if let Some(companies) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(companies));
        }

        let mut cache = self.cache.write().await;
        // Another task may have filled the cache while we waited for the lock.
        if let Some(companies) = cache.as_ref() {
            return Ok(Arc::clone(companies));
        }
        let companies = Arc::new(read_companies(&self.path).await?);
        *cache = Some(Arc::clone(&companies));
        Ok(companies)
    }

    /// Re-reads the file and replaces the cache. On failure the previous
    /// cache is left untouched.
    pub async fn reload(&self) -> anyhow::Result<Arc<Vec<Company>>> {
        let companies = Arc::new(read_companies(&self.path).await?);
        *self.cache.write().await = Some(Arc::clone(&companies));
        tracing::info!(path = %self.path.display(), count = companies.len(), "company directory reloaded");
        Ok(companies)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Company>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let companies = self.load().await?;
        Ok(rank_matches(&companies, query, limit))
    }
}

async fn read_companies(path: &Path) -> anyhow::Result<Vec<Company>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read company directory {}", path.display()))?;
    let parsed = serde_json::from_str::<Value>(&raw)
        .with_context(|| format!("company directory is not valid JSON: {}", path.display()))?;
    Ok(parse_companies(parsed))
}

// Entries without string `name` and `code` are skipped; a non-array is empty.
fn parse_companies(value: Value) -> Vec<Company> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.to_string();
            let code = item.get("code")?.as_str()?.to_string();
            Some(Company { name, code })
        })
        .collect()
}

fn compact_upper(s: &str) -> String {
    s.to_uppercase().split_whitespace().collect()
}

/// Lower is better: code prefix, code substring, name prefix, anything else.
fn match_score(company: &Company, q_upper: &str, q_compact: &str) -> Option<u8> {
    let code = company.code.to_uppercase();
    let name = company.name.to_uppercase();

    let code_starts = code.starts_with(q_upper);
    let code_includes = code.contains(q_upper);
    let name_starts = name.starts_with(q_upper);
    let name_includes = name.contains(q_upper);
    let compact_includes =
        compact_upper(&code).contains(q_compact) || compact_upper(&name).contains(q_compact);

    if !(code_includes || name_includes || compact_includes) {
        return None;
    }

    Some(if code_starts {
        0
    } else if code_includes {
        1
    } else if name_starts {
        2
    } else {
        3
    })
}

pub fn rank_matches(companies: &[Company], query: &str, limit: usize) -> Vec<Company> {
    let q_upper = query.trim().to_uppercase();
    if q_upper.is_empty() {
        return Vec::new();
    }
    let q_compact = compact_upper(&q_upper);

    let mut scored: Vec<(u8, &Company)> = companies
        .iter()
        .filter_map(|c| match_score(c, &q_upper, &q_compact).map(|s| (s, c)))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sa.cmp(sb)
            .then_with(|| a.code.len().cmp(&b.code.len()))
            .then_with(|| match a.code.cmp(&b.code) {
                Ordering::Equal => a.name.cmp(&b.name),
                other => other,
            })
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(_, c)| c.clone())
        .collect()
}
