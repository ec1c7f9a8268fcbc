use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::config::{FETCH_DELAY_MAX_MS, FETCH_DELAY_MIN_MS};
use crate::detector::discount::{discount_percentage, effective_price};
use crate::detector::throttle::should_notify;
use crate::fetcher::PageFetcher;
use crate::types::{format_timestamp, now_naive, SaleCandidate, WatchedItem};

/// Anti-detection behavior knobs. Production uses the default (shuffled order,
/// jittered inter-fetch delay); tests switch both off for determinism.
#[derive(Debug, Clone, Copy)]
pub struct ScanPacing {
    pub shuffle: bool,
    pub delay_ms: Option<(u64, u64)>,
}

impl Default for ScanPacing {
    fn default() -> Self {
        Self {
            shuffle: true,
            delay_ms: Some((FETCH_DELAY_MIN_MS, FETCH_DELAY_MAX_MS)),
        }
    }
}

impl ScanPacing {
    pub fn none() -> Self {
        Self { shuffle: false, delay_ms: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SaleThresholds {
    pub sale_percentage: f64,
    pub sale_price: f64,
    pub cooldown_days: i64,
}

/// Walks the watch list, classifies each item and collects the candidates
/// that survive the notification throttle. Mutates the in-memory items with
/// freshly scraped state; persisting them is the caller's job.
pub struct SaleScanner {
    fetcher: Arc<dyn PageFetcher>,
    thresholds: SaleThresholds,
    pacing: ScanPacing,
}

impl SaleScanner {
    pub fn new(fetcher: Arc<dyn PageFetcher>, thresholds: SaleThresholds, pacing: ScanPacing) -> Self {
        Self { fetcher, thresholds, pacing }
    }

    pub async fn scan(&self, items: &mut [WatchedItem]) -> Vec<SaleCandidate> {
        if self.pacing.shuffle {
            items.shuffle(&mut rand::rng());
        }

        let mut candidates = Vec::new();

        for item in items.iter_mut() {
            let page = match self.fetcher.fetch(&item.url).await {
                Ok(p) => p,
                Err(e) => {
                    // One bad page never aborts the batch.
                    warn!(item_id = %item.id, "fetch failed for {}: {e}", item.url);
                    continue;
                }
            };

            let (Some(current_price), Some(list_price)) = (page.current_price, page.list_price)
            else {
                info!(item_id = %item.id, "no price on page for \"{}\"", page.title);
                continue;
            };
            let point_value = page.point_value;

            let discount = discount_percentage(Some(current_price), Some(list_price), point_value);
            let has_sale = discount >= self.thresholds.sale_percentage
                || current_price <= self.thresholds.sale_price;

            if has_sale {
                info!(
                    item_id = %item.id,
                    "sale: \"{}\" at {current_price} ({discount:.1}% off, {point_value}pt)",
                    page.title,
                );
                if should_notify(
                    item,
                    current_price,
                    point_value,
                    now_naive(),
                    self.thresholds.cooldown_days,
                ) {
                    candidates.push(SaleCandidate {
                        id: item.id.clone(),
                        title: page.title.clone(),
                        current_price,
                        list_price,
                        point_value,
                        effective_price: effective_price(current_price, point_value),
                        discount_percentage: discount,
                        url: item.url.clone(),
                    });
                    item.last_notification = Some(format_timestamp(now_naive()));
                }
            } else {
                info!(item_id = %item.id, "no sale: \"{}\"", page.title);
            }

            // Refresh observed state regardless of the sale/notify outcome.
            item.current_price = Some(current_price);
            item.description = page.title;
            item.has_sale = has_sale;
            item.points = Some(point_value);

            if let Some((min_ms, max_ms)) = self.pacing.delay_ms {
                let wait = rand::rng().random_range(min_ms..max_ms);
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::types::PageInfo;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockFetcher {
        pages: Mutex<HashMap<String, PageInfo>>,
    }

    impl MockFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self { pages: Mutex::new(HashMap::new()) })
        }

        fn set(&self, url: &str, page: PageInfo) {
            self.pages.lock().unwrap().insert(url.to_string(), page);
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<PageInfo> {
            self.pages
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::PageParse(format!("no page for {url}")))
        }
    }

    fn page(title: &str, current: f64, list: f64, points: f64) -> PageInfo {
        PageInfo {
            title: title.to_string(),
            current_price: Some(current),
            list_price: Some(list),
            point_value: points,
        }
    }

    fn watched(id: &str, url: &str) -> WatchedItem {
        WatchedItem {
            id: id.to_string(),
            url: url.to_string(),
            description: String::new(),
            current_price: None,
            points: None,
            has_sale: false,
            last_notification: None,
            updated_at: None,
        }
    }

    fn thresholds() -> SaleThresholds {
        SaleThresholds { sale_percentage: 20.0, sale_price: 500.0, cooldown_days: 7 }
    }

    fn scanner(fetcher: Arc<MockFetcher>) -> SaleScanner {
        SaleScanner::new(fetcher, thresholds(), ScanPacing::none())
    }

    #[tokio::test]
    async fn first_detection_emits_a_candidate() {
        // Scenario A: 25% off clears the 20% threshold, no prior notification.
        let fetcher = MockFetcher::new();
        fetcher.set("u1", page("Book A", 750.0, 1000.0, 0.0));
        let mut items = vec![watched("a", "u1")];

        let candidates = scanner(fetcher).scan(&mut items).await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].effective_price, 750.0);
        assert!((candidates[0].discount_percentage - 25.0).abs() < 1e-9);
        assert!(items[0].has_sale);
        assert!(items[0].last_notification.is_some());
        assert_eq!(items[0].current_price, Some(750.0));
        assert_eq!(items[0].description, "Book A");
    }

    #[tokio::test]
    async fn repeat_within_cooldown_is_suppressed_but_state_refreshes() {
        // Scenario B: second scan 2 days later, 760 >= 675 → suppressed.
        let fetcher = MockFetcher::new();
        fetcher.set("u1", page("Book A", 760.0, 1000.0, 0.0));
        let mut items = vec![watched("a", "u1")];
        let stamp = format_timestamp(now_naive() - Duration::days(2));
        items[0].current_price = Some(750.0);
        items[0].points = Some(0.0);
        items[0].last_notification = Some(stamp.clone());

        let candidates = scanner(fetcher).scan(&mut items).await;

        assert!(candidates.is_empty());
        assert!(items[0].has_sale, "sale detected even though suppressed");
        assert_eq!(items[0].current_price, Some(760.0));
        // The stamp was not touched.
        assert_eq!(items[0].last_notification.as_deref(), Some(stamp.as_str()));
    }

    #[tokio::test]
    async fn cooldown_expiry_renotifies() {
        // Scenario C: 10 days after the first notification, any price re-notifies.
        let fetcher = MockFetcher::new();
        fetcher.set("u1", page("Book A", 770.0, 1000.0, 0.0));
        let mut items = vec![watched("a", "u1")];
        items[0].current_price = Some(750.0);
        items[0].points = Some(0.0);
        items[0].last_notification = Some(format_timestamp(now_naive() - Duration::days(10)));

        let candidates = scanner(fetcher).scan(&mut items).await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].current_price, 770.0);
    }

    #[tokio::test]
    async fn absolute_price_ceiling_qualifies_independently() {
        // 10% off misses the percentage threshold but 450 <= 500.
        let fetcher = MockFetcher::new();
        fetcher.set("u1", page("Cheap", 450.0, 500.0, 0.0));
        let mut items = vec![watched("a", "u1")];

        let candidates = scanner(fetcher).scan(&mut items).await;

        assert_eq!(candidates.len(), 1);
        assert!(items[0].has_sale);
    }

    #[tokio::test]
    async fn fetch_failure_skips_the_item_and_continues() {
        let fetcher = MockFetcher::new();
        fetcher.set("u2", page("Book B", 300.0, 1000.0, 0.0));
        let mut items = vec![watched("a", "u1-missing"), watched("b", "u2")];

        let candidates = scanner(fetcher).scan(&mut items).await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "b");
        // The failed item keeps its previous (empty) state.
        assert!(items[0].current_price.is_none());
        assert!(!items[0].has_sale);
    }

    #[tokio::test]
    async fn priceless_page_is_skipped() {
        let fetcher = MockFetcher::new();
        fetcher.set(
            "u1",
            PageInfo {
                title: "No price".to_string(),
                current_price: None,
                list_price: None,
                point_value: 0.0,
            },
        );
        let mut items = vec![watched("a", "u1")];

        let candidates = scanner(fetcher).scan(&mut items).await;
        assert!(candidates.is_empty());
        assert!(items[0].current_price.is_none());
    }

    #[tokio::test]
    async fn non_sale_clears_has_sale() {
        let fetcher = MockFetcher::new();
        fetcher.set("u1", page("Full price", 950.0, 1000.0, 0.0));
        let mut items = vec![watched("a", "u1")];
        items[0].has_sale = true;

        let candidates = scanner(fetcher).scan(&mut items).await;
        assert!(candidates.is_empty());
        assert!(!items[0].has_sale);
        assert_eq!(items[0].current_price, Some(950.0));
    }
}
