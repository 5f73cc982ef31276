use tracing::{debug, info};

use crate::bing::BingClient;
use crate::domain::Category;
use crate::error::AvisetError;
use crate::store::Store;

/// Tunables for the collection loop. The defaults match the dataset this
/// tool was built for: at most 1950 URLs per species, fetched 150 at a time.
#[derive(Debug, Clone, Copy)]
pub struct CollectorOptions {
    pub page_size: u64,
    pub max_per_category: u64,
    pub min_dimension: u32,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            page_size: 150,
            max_per_category: 1950,
            min_dimension: 240,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectReport {
    pub category: Category,
    pub declared_max: u64,
    pub collected: u64,
    pub calls: usize,
}

pub struct Collector<B: BingClient> {
    store: Store,
    client: B,
    options: CollectorOptions,
}

impl<B: BingClient> Collector<B> {
    pub fn new(store: Store, client: B, options: CollectorOptions) -> Self {
        Self {
            store,
            client,
            options,
        }
    }

    /// Collect URLs for one category, resuming from the ledger if one
    /// exists. Progress is appended after every provider call, so an
    /// interruption loses at most one page. Any provider error aborts this
    /// category's loop; the ledger keeps whatever was already appended and
    /// the next invocation picks up from there.
    pub fn collect(&self, category: &Category) -> Result<CollectReport, AvisetError> {
        let page_size = self.options.page_size;
        let mut calls = 0usize;

        let (declared_max, mut current, mut next_offset) =
            match self.store.read_ledger(category)? {
                Some(ledger) => {
                    // Resume: the URL count is both cursor and next offset.
                    let current = ledger.current();
                    (ledger.declared_max, current, current)
                }
                None => {
                    let page =
                        self.client
                            .search(category, 0, page_size, self.options.min_dimension)?;
                    calls += 1;
                    // The estimated total is fixed into the ledger on first
                    // query and never revised upward afterwards.
                    let declared_max = page.estimated_total.min(self.options.max_per_category);
                    self.store
                        .append_urls(category, &page.urls, Some(declared_max))?;
                    (declared_max, page.returned as u64, page.next_offset)
                }
            };

        info!(category = %category, current, declared_max, "collecting");

        // Within one page of the cap: nothing left worth querying.
        if current as i64 > declared_max as i64 - page_size as i64 {
            debug!(category = %category, "cap satisfied, skipping");
            return Ok(CollectReport {
                category: category.clone(),
                declared_max,
                collected: current,
                calls,
            });
        }

        let deficit = declared_max - current;
        let runs = deficit / page_size;
        let remainder = deficit % page_size;

        for _ in 0..runs {
            let page = self.client.search(
                category,
                next_offset,
                page_size,
                self.options.min_dimension,
            )?;
            calls += 1;
            self.store.append_urls(category, &page.urls, None)?;
            current += page.returned as u64;
            next_offset = page.next_offset;
            info!(category = %category, current, declared_max, "page appended");
        }

        if remainder > 0 {
            let page = self.client.search(
                category,
                next_offset,
                remainder,
                self.options.min_dimension,
            )?;
            calls += 1;
            self.store.append_urls(category, &page.urls, None)?;
            current += page.returned as u64;
        }

        Ok(CollectReport {
            category: category.clone(),
            declared_max,
            collected: current,
            calls,
        })
    }
}
