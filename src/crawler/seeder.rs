//! Queue seeding from MediaWiki category listings
//!
//! Each configured category is listed through the `categorymembers` API,
//! following the continuation object until the listing ends or enough new
//! jobs were inserted.

use crate::config::{SeedConfig, SeedKind, SourceConfig};
use crate::queue::QueueManager;
use crate::storage::Storage;
use crate::url::{is_valid_title, title_to_path};
use crate::{HarvestError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One page of a `list=categorymembers` response
#[derive(Debug, Deserialize)]
struct CategoryMembersResponse {
    #[serde(default)]
    query: Option<CategoryMembersQuery>,

    /// Parameters to merge into the next request; absent on the last page
    #[serde(default, rename = "continue")]
    continuation: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct CategoryMembersQuery {
    #[serde(default)]
    categorymembers: Vec<CategoryMember>,
}

#[derive(Debug, Deserialize)]
struct CategoryMember {
    #[serde(default)]
    title: String,
}

/// Populates the queue from a source's seed listing
pub struct Seeder<'a> {
    client: &'a Client,
}

impl<'a> Seeder<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Seeds one source
    ///
    /// # Arguments
    ///
    /// * `manager` - Queue manager used for every enqueue
    /// * `source` - The source to seed; sources without a seed section are skipped
    /// * `cap` - Stop once this many jobs were newly inserted
    ///
    /// # Returns
    ///
    /// The number of newly inserted jobs. URLs already queued or stored do not
    /// count toward `cap`.
    pub async fn seed<S: Storage>(
        &self,
        manager: &mut QueueManager<S>,
        source: &SourceConfig,
        cap: u64,
    ) -> Result<u64> {
        let Some(seed) = &source.seed else {
            return Ok(0);
        };

        let inserted = match seed.kind {
            SeedKind::MediaWikiCategory => {
                self.seed_categories(manager, source, seed, cap).await?
            }
        };

        tracing::info!("Seeded {}: {} new jobs", source.name, inserted);
        Ok(inserted)
    }

    async fn seed_categories<S: Storage>(
        &self,
        manager: &mut QueueManager<S>,
        source: &SourceConfig,
        seed: &SeedConfig,
        cap: u64,
    ) -> Result<u64> {
        let mut inserted = 0;

        for category in &seed.categories {
            if inserted >= cap {
                break;
            }

            let mut continuation = BTreeMap::new();

            while inserted < cap {
                let mut params = base_params(seed);
                params.insert("cmtitle".to_string(), category.clone());
                params.extend(continuation.clone());

                let page = self.fetch_listing(source, &seed.api_url, &params).await?;

                let titles = page
                    .query
                    .map(|q| q.categorymembers)
                    .unwrap_or_default();

                for member in titles {
                    if !is_valid_title(&member.title) {
                        continue;
                    }

                    let url = format!("{}{}", source.url_base, title_to_path(&member.title));
                    if manager.enqueue(&source.name, &url, source.priority)? {
                        inserted += 1;
                        if inserted >= cap {
                            break;
                        }
                    }
                }

                match page.continuation {
                    Some(next) if !next.is_empty() => continuation = continuation_params(next),
                    _ => break,
                }
            }

            tracing::debug!(
                "Listed {} for {}: {} new jobs so far",
                category,
                source.name,
                inserted
            );
        }

        Ok(inserted)
    }

    async fn fetch_listing(
        &self,
        source: &SourceConfig,
        api_url: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<CategoryMembersResponse> {
        let response = self
            .client
            .get(api_url)
            .query(params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HarvestError::Http {
                url: api_url.to_string(),
                source: e,
            })?;

        response
            .json::<CategoryMembersResponse>()
            .await
            .map_err(|e| HarvestError::Seed {
                source_name: source.name.clone(),
                message: format!("unexpected listing response: {}", e),
            })
    }
}

/// Fixed listing parameters; configured params override them
fn base_params(seed: &SeedConfig) -> BTreeMap<String, String> {
    let mut params = BTreeMap::from([
        ("action".to_string(), "query".to_string()),
        ("format".to_string(), "json".to_string()),
        ("list".to_string(), "categorymembers".to_string()),
    ]);
    params.extend(seed.params.clone());
    params
}

fn continuation_params(continuation: Map<String, Value>) -> BTreeMap<String, String> {
    continuation
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}
