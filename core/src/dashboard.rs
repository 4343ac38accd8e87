//! Read-only overview: one count per resource collection.

use crate::cache::{QueryCache, SubscriberId};
use crate::resource::CacheKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub title: &'static str,
    pub value: usize,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    /// True while any of the three collections has not loaded yet.
    pub loading: bool,
    pub stats: Vec<Stat>,
}

const STATS: [(CacheKey, &str, &str); 3] = [
    (CacheKey::Materials, "Total Materials", "Available construction materials"),
    (CacheKey::BuildingTypes, "Building Types", "Different types of buildings"),
    (CacheKey::Projects, "Active Projects", "Ongoing estimation projects"),
];

#[derive(Debug)]
pub struct Dashboard {
    subscriber: SubscriberId,
}

impl Dashboard {
    pub fn new(cache: &mut QueryCache) -> Self {
        Self {
            subscriber: cache.subscribe(),
        }
    }

    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    pub fn view(&self, cache: &mut QueryCache) -> DashboardView {
        let mut loading = false;
        let stats = STATS
            .iter()
            .map(|&(key, title, description)| {
                let (is_loading, len) = cache.watch(key, self.subscriber);
                loading |= is_loading;
                Stat {
                    title,
                    value: len,
                    description,
                }
            })
            .collect();
        DashboardView { loading, stats }
    }
}
