//! Join extracted records to registry rows by registrable domain and write
//! the results back.
//!
//! Records whose URL has no registrable domain are dropped; a domain shared by
//! several restaurants (multi-location chains) gives every one of them the same
//! data.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::domain;
use crate::error::Result;
use crate::records::{MenuItem, PriceBucket, PriceObservation};
use crate::registry::{MenuItemRow, Registry, RestaurantId, RestaurantRow};

#[derive(Debug, Default, PartialEq)]
pub struct ItemUpsertStats {
    pub domains: usize,
    pub matched_domains: usize,
    pub prepared: usize,
    pub accepted: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Default, PartialEq)]
pub struct BucketPatchStats {
    pub domains: usize,
    pub attempted: usize,
    pub updated: usize,
}

/// Group items under the registrable domain of their `source_url`.
pub fn items_by_domain(items: Vec<MenuItem>) -> BTreeMap<String, Vec<MenuItem>> {
    let mut grouped: BTreeMap<String, Vec<MenuItem>> = BTreeMap::new();
    for item in items {
        match domain::registrable_of_url(&item.source_url) {
            Some(d) => grouped.entry(d).or_default().push(item),
            None => debug!(url = %item.source_url, "Dropping item without a domain"),
        }
    }
    grouped
}

/// Group registry ids under the registrable domain of their `website`.
pub fn ids_by_domain(rows: &[RestaurantRow]) -> BTreeMap<String, Vec<RestaurantId>> {
    let mut grouped: BTreeMap<String, Vec<RestaurantId>> = BTreeMap::new();
    for row in rows {
        let Some(d) = row.website.as_deref().and_then(domain::registrable_of_url) else {
            continue;
        };
        grouped.entry(d).or_default().push(row.id.clone());
    }
    grouped
}

/// Most frequent bucket; ties go to the cheapest tier.
pub fn majority_bucket(counts: &BTreeMap<PriceBucket, usize>) -> Option<PriceBucket> {
    let mut best: Option<(PriceBucket, usize)> = None;
    for (&bucket, &n) in counts {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((bucket, n));
        }
    }
    best.map(|(b, _)| b)
}

/// Majority-vote bucket for every domain that has observations.
pub fn buckets_by_domain(observations: &[PriceObservation]) -> BTreeMap<String, PriceBucket> {
    let mut votes: BTreeMap<String, BTreeMap<PriceBucket, usize>> = BTreeMap::new();
    for obs in observations {
        let Some(d) = domain::registrable_of_url(&obs.menu_url) else {
            continue;
        };
        *votes.entry(d).or_default().entry(obs.price_bucket).or_default() += 1;
    }
    votes
        .into_iter()
        .filter_map(|(d, counts)| majority_bucket(&counts).map(|b| (d, b)))
        .collect()
}

/// Assign every item of a domain to every registry id of that domain, then
/// upsert in batches. A rejected batch is logged and skipped.
pub async fn assign_items<R: Registry + ?Sized>(
    registry: &R,
    items: Vec<MenuItem>,
    batch_size: usize,
) -> Result<ItemUpsertStats> {
    let by_domain = items_by_domain(items);
    let ids = ids_by_domain(&registry.restaurants_with_website().await?);
    let mut stats = ItemUpsertStats {
        domains: by_domain.len(),
        ..Default::default()
    };

    for (host, items) in &by_domain {
        let Some(rids) = ids.get(host) else {
            continue;
        };
        stats.matched_domains += 1;

        let rows: Vec<MenuItemRow> = rids
            .iter()
            .flat_map(|rid| items.iter().map(move |it| MenuItemRow::assign(rid.clone(), it)))
            .collect();
        stats.prepared += rows.len();

        for chunk in rows.chunks(batch_size.max(1)) {
            match registry.upsert_menu_items(chunk).await {
                Ok(()) => stats.accepted += chunk.len(),
                Err(e) => {
                    warn!(host = %host, rows = chunk.len(), error = %e, "Menu item batch rejected");
                    stats.failed_batches += 1;
                }
            }
        }
    }

    info!(
        domains = stats.domains,
        matched = stats.matched_domains,
        prepared = stats.prepared,
        accepted = stats.accepted,
        failed_batches = stats.failed_batches,
        "Menu item upsert finished"
    );
    Ok(stats)
}

/// Patch each matching restaurant with its domain's majority bucket, one row at a time.
pub async fn assign_buckets<R: Registry + ?Sized>(
    registry: &R,
    observations: &[PriceObservation],
) -> Result<BucketPatchStats> {
    let buckets = buckets_by_domain(observations);
    let mut stats = BucketPatchStats {
        domains: buckets.len(),
        ..Default::default()
    };
    if buckets.is_empty() {
        return Ok(stats);
    }

    let ids = ids_by_domain(&registry.restaurants_with_website().await?);
    for (host, bucket) in &buckets {
        for rid in ids.get(host).into_iter().flatten() {
            stats.attempted += 1;
            match registry.patch_price_bucket(rid, *bucket).await {
                Ok(()) => stats.updated += 1,
                Err(e) => warn!(id = %rid, host = %host, error = %e, "Price bucket patch failed"),
            }
        }
    }

    info!(
        domains = stats.domains,
        attempted = stats.attempted,
        updated = stats.updated,
        "Price bucket patch finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::FakeRegistry;

    fn item(name: &str, price: f64, url: &str) -> MenuItem {
        MenuItem {
            item_name: name.to_string(),
            item_desc: None,
            price,
            calories_kcal: None,
            calories_text: None,
            source_url: url.to_string(),
        }
    }

    fn obs(url: &str, bucket: PriceBucket) -> PriceObservation {
        PriceObservation {
            menu_url: url.to_string(),
            median_price: 0.0,
            price_bucket: bucket,
        }
    }

    #[test]
    fn subdomains_group_together() {
        let grouped = items_by_domain(vec![
            item("A", 1.0, "https://www.bistro.com/menu"),
            item("B", 2.0, "https://order.bistro.com/food"),
            item("C", 3.0, "https://other.co.uk/menu"),
            item("D", 4.0, ""),
        ]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["bistro.com"].len(), 2);
        assert_eq!(grouped["other.co.uk"].len(), 1);
    }

    #[test]
    fn ids_group_by_website_domain() {
        let reg = FakeRegistry::with_sites(&[(1, "bistro.com"), (2, "https://www.bistro.com/loc2"), (3, "  ")]);
        let grouped = ids_by_domain(&reg.rows);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["bistro.com"], vec![RestaurantId::Int(1), RestaurantId::Int(2)]);
    }

    #[test]
    fn majority_vote() {
        let observations = vec![
            obs("https://bistro.com/menu", PriceBucket::Moderate),
            obs("https://bistro.com/dinner", PriceBucket::Moderate),
            obs("https://www.bistro.com/brunch", PriceBucket::Pricey),
        ];
        let buckets = buckets_by_domain(&observations);
        assert_eq!(buckets["bistro.com"], PriceBucket::Moderate);
    }

    #[test]
    fn tie_goes_to_cheaper_bucket() {
        let counts = BTreeMap::from([(PriceBucket::Premium, 2), (PriceBucket::Moderate, 2)]);
        assert_eq!(majority_bucket(&counts), Some(PriceBucket::Moderate));
        assert_eq!(majority_bucket(&BTreeMap::new()), None);
    }

    #[tokio::test]
    async fn items_cross_product_with_chain_ids() {
        let reg = FakeRegistry::with_sites(&[(1, "https://bistro.com"), (2, "bistro.com/uptown"), (3, "cafe.org")]);
        let items = vec![
            item("Soup", 6.0, "https://bistro.com/menu"),
            item("Salad", 9.0, "https://bistro.com/menu"),
            item("Pie", 5.0, "https://unknown.net/menu"),
        ];
        let stats = assign_items(&reg, items, 500).await.unwrap();
        assert_eq!(stats.domains, 2);
        assert_eq!(stats.matched_domains, 1);
        assert_eq!(stats.prepared, 4);
        assert_eq!(stats.accepted, 4);
        assert_eq!(reg.item_count(), 4);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let reg = FakeRegistry::with_sites(&[(1, "bistro.com")]);
        let items = vec![
            item("Soup", 6.0, "https://bistro.com/menu"),
            item("Soup", 6.0, "https://bistro.com/menu"),
            item("Salad", 9.0, "https://bistro.com/menu"),
        ];
        assign_items(&reg, items.clone(), 500).await.unwrap();
        let once = reg.item_count();
        assign_items(&reg, items, 500).await.unwrap();
        assert_eq!(reg.item_count(), once);
        assert_eq!(once, 2);
    }

    #[tokio::test]
    async fn rejected_batch_is_skipped_not_fatal() {
        let mut reg = FakeRegistry::with_sites(&[(1, "bistro.com")]);
        reg.reject_batches.insert(0);
        let items: Vec<MenuItem> = (0..5)
            .map(|i| item(&format!("Dish {}", i), 10.0 + i as f64, "https://bistro.com/menu"))
            .collect();

        let stats = assign_items(&reg, items, 2).await.unwrap();
        assert_eq!(stats.prepared, 5);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.accepted, 3);
        assert_eq!(reg.item_count(), 3);
    }

    #[tokio::test]
    async fn buckets_patch_every_matching_id() {
        let mut reg = FakeRegistry::with_sites(&[(1, "bistro.com"), (2, "www.bistro.com"), (3, "cafe.org")]);
        reg.reject_ids.insert(RestaurantId::Int(2));
        let observations = vec![
            obs("https://bistro.com/menu", PriceBucket::Moderate),
            obs("https://bistro.com/dinner", PriceBucket::Moderate),
            obs("https://bistro.com/brunch", PriceBucket::Pricey),
            obs("https://nowhere.io/menu", PriceBucket::Cheap),
        ];

        let stats = assign_buckets(&reg, &observations).await.unwrap();
        assert_eq!(stats.domains, 2);
        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(reg.patched(), vec![(RestaurantId::Int(1), PriceBucket::Moderate)]);
    }

    #[tokio::test]
    async fn no_observations_touch_nothing() {
        let reg = FakeRegistry::with_sites(&[(1, "bistro.com")]);
        let stats = assign_buckets(&reg, &[]).await.unwrap();
        assert_eq!(stats, BucketPatchStats::default());
        assert!(reg.patched().is_empty());
    }
}
