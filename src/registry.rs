use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{PipelineError, Result};
use crate::records::{MenuItem, PriceBucket};

const MENU_ITEMS_CONFLICT: &str = "restaurant_id,item_name,price,source_url";
const MAX_ERROR_BODY: usize = 200;

/// Registry primary key; integer or text depending on the table definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RestaurantId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RestaurantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestaurantId::Int(n) => write!(f, "{}", n),
            RestaurantId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantRow {
    pub id: RestaurantId,
    pub website: Option<String>,
}

/// Row exported for manual website enrichment.
#[derive(Debug, Clone, Deserialize)]
pub struct MissingWebsiteRow {
    pub id: RestaurantId,
    #[serde(default)]
    pub name: serde_json::Value,
    #[serde(default)]
    pub addr: serde_json::Value,
    #[serde(default)]
    pub city: serde_json::Value,
    #[serde(default)]
    pub state: serde_json::Value,
    #[serde(default)]
    pub postcode: serde_json::Value,
}

/// One `menu_items_v2` row: an extracted item assigned to one restaurant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItemRow {
    pub restaurant_id: RestaurantId,
    pub item_name: String,
    pub item_desc: Option<String>,
    pub price: f64,
    pub currency: &'static str,
    pub category: Option<String>,
    pub source_url: String,
    pub calories_kcal: Option<u32>,
    pub calories_text: Option<String>,
}

impl MenuItemRow {
    pub fn assign(restaurant_id: RestaurantId, item: &MenuItem) -> Self {
        Self {
            restaurant_id,
            item_name: item.item_name.clone(),
            item_desc: item.item_desc.clone(),
            price: item.price,
            currency: "USD",
            category: None,
            source_url: item.source_url.clone(),
            calories_kcal: item.calories_kcal,
            calories_text: item.calories_text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebsiteUpdate {
    pub id: String,
    pub website: String,
}

/// The restaurant store: filtered reads, conflict-key upserts, per-row patches.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn restaurants_with_website(&self) -> Result<Vec<RestaurantRow>>;

    async fn restaurants_missing_website(&self) -> Result<Vec<MissingWebsiteRow>>;

    /// Upsert on `(restaurant_id, item_name, price, source_url)`; re-sending is a no-op.
    async fn upsert_menu_items(&self, rows: &[MenuItemRow]) -> Result<()>;

    async fn patch_price_bucket(&self, id: &RestaurantId, bucket: PriceBucket) -> Result<()>;

    async fn upsert_websites(&self, rows: &[WebsiteUpdate]) -> Result<()>;

    /// `content-range` of an exact count over rows with a website.
    async fn website_count(&self) -> Result<String>;
}

/// PostgREST-style registry (`/rest/v1/<table>`).
pub struct RestRegistry {
    client: Client,
    base: String,
}

impl RestRegistry {
    pub fn new(cfg: &RegistryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&cfg.key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", cfg.key))?);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self {
            client,
            base: format!("{}/rest/v1", cfg.base_url),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    async fn read<T: for<'de> Deserialize<'de>>(&self, req: RequestBuilder) -> Result<Vec<T>> {
        let resp = check(req.send().await?).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Registry for RestRegistry {
    async fn restaurants_with_website(&self) -> Result<Vec<RestaurantRow>> {
        let req = self
            .client
            .get(self.table("restaurants"))
            .query(&[("select", "id,website"), ("website", "not.is.null")]);
        let rows: Vec<RestaurantRow> = self.read(req).await?;
        debug!(rows = rows.len(), "Fetched restaurants with website");
        Ok(rows)
    }

    async fn restaurants_missing_website(&self) -> Result<Vec<MissingWebsiteRow>> {
        let req = self.client.get(self.table("restaurants")).query(&[
            ("select", "id,name,addr,city,state,postcode,website"),
            ("website", "is.null"),
            ("order", "name.asc"),
        ]);
        self.read(req).await
    }

    async fn upsert_menu_items(&self, rows: &[MenuItemRow]) -> Result<()> {
        let resp = self
            .client
            .post(self.table("menu_items_v2"))
            .query(&[("on_conflict", MENU_ITEMS_CONFLICT)])
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn patch_price_bucket(&self, id: &RestaurantId, bucket: PriceBucket) -> Result<()> {
        let resp = self
            .client
            .patch(self.table("restaurants"))
            .query(&[("id", format!("eq.{}", id))])
            .json(&json!({ "price_bucket": bucket }))
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn upsert_websites(&self, rows: &[WebsiteUpdate]) -> Result<()> {
        let resp = self
            .client
            .post(self.table("restaurants"))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn website_count(&self) -> Result<String> {
        let resp = self
            .client
            .get(self.table("restaurants"))
            .query(&[("select", "id"), ("website", "not.is.null"), ("limit", "1")])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let resp = check(resp).await?;
        Ok(resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("0/0")
            .to_string())
    }
}

fn header_value(s: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(s).map_err(|e| PipelineError::Config(format!("invalid credential header: {}", e)))
}

/// Pass 2xx through; turn anything else into [`PipelineError::Rejected`].
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PipelineError::Rejected {
        status: status.as_u16(),
        body: truncate(&body, MAX_ERROR_BODY),
    })
}

pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
pub mod testing {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    /// In-memory registry keyed like the real conflict constraints.
    #[derive(Default)]
    pub struct FakeRegistry {
        pub rows: Vec<RestaurantRow>,
        pub missing: Vec<MissingWebsiteRow>,
        /// Upsert calls whose 0-based index is listed here are rejected.
        pub reject_batches: HashSet<usize>,
        pub reject_ids: HashSet<RestaurantId>,
        pub menu_items: Mutex<BTreeMap<String, MenuItemRow>>,
        pub batch_calls: Mutex<usize>,
        pub patches: Mutex<Vec<(RestaurantId, PriceBucket)>>,
        pub websites: Mutex<Vec<WebsiteUpdate>>,
    }

    impl FakeRegistry {
        pub fn with_sites(sites: &[(i64, &str)]) -> Self {
            Self {
                rows: sites
                    .iter()
                    .map(|(id, w)| RestaurantRow {
                        id: RestaurantId::Int(*id),
                        website: Some(w.to_string()),
                    })
                    .collect(),
                ..Self::default()
            }
        }

        pub fn item_count(&self) -> usize {
            self.menu_items.lock().unwrap().len()
        }

        pub fn patched(&self) -> Vec<(RestaurantId, PriceBucket)> {
            self.patches.lock().unwrap().clone()
        }
    }

    fn rejected() -> PipelineError {
        PipelineError::Rejected {
            status: 400,
            body: "rejected by fake".into(),
        }
    }

    #[async_trait]
    impl Registry for FakeRegistry {
        async fn restaurants_with_website(&self) -> Result<Vec<RestaurantRow>> {
            Ok(self.rows.clone())
        }

        async fn restaurants_missing_website(&self) -> Result<Vec<MissingWebsiteRow>> {
            Ok(self.missing.clone())
        }

        async fn upsert_menu_items(&self, rows: &[MenuItemRow]) -> Result<()> {
            let call = {
                let mut calls = self.batch_calls.lock().unwrap();
                *calls += 1;
                *calls - 1
            };
            if self.reject_batches.contains(&call) {
                return Err(rejected());
            }
            let mut table = self.menu_items.lock().unwrap();
            for r in rows {
                let key = format!("{}|{}|{}|{}", r.restaurant_id, r.item_name, r.price, r.source_url);
                table.insert(key, r.clone());
            }
            Ok(())
        }

        async fn patch_price_bucket(&self, id: &RestaurantId, bucket: PriceBucket) -> Result<()> {
            if self.reject_ids.contains(id) {
                return Err(rejected());
            }
            self.patches.lock().unwrap().push((id.clone(), bucket));
            Ok(())
        }

        async fn upsert_websites(&self, rows: &[WebsiteUpdate]) -> Result<()> {
            self.websites.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }

        async fn website_count(&self) -> Result<String> {
            Ok(format!("0-0/{}", self.rows.len()))
        }
    }
}
