//! Client-side cache of remote collections, one entry per [`CacheKey`].
//!
//! # Design
//! The cache never talks to the network. `read` and `invalidate` only
//! *schedule* fetches; [`QueryCache::take_scheduled`] hands them to the app,
//! which builds the list requests, and [`QueryCache::resolve`] stores the
//! outcome. A resolved fetch replaces the whole list; there is no merging of
//! individual records and no expiry other than explicit invalidation.
//!
//! Several fetches for the same key may be in flight at once (an invalidation
//! during a refetch issues another one). Whichever resolves last determines
//! the stored list.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::resource::{CacheKey, Resource, SelectOption};
use crate::types::{BuildingType, Id, Material, Project};

/// Handle of a view that re-renders when a collection it read changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Identifies one list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchId(u64);

/// One cached collection.
#[derive(Debug)]
pub struct Collection<R> {
    data: Option<Vec<R>>,
    stale: bool,
    scheduled: bool,
    in_flight: Vec<FetchId>,
    revision: u64,
    error: Option<String>,
    subscribers: BTreeSet<SubscriberId>,
}

impl<R> Default for Collection<R> {
    fn default() -> Self {
        Self {
            data: None,
            stale: false,
            scheduled: false,
            in_flight: Vec::new(),
            revision: 0,
            error: None,
            subscribers: BTreeSet::new(),
        }
    }
}

impl<R: Resource> Collection<R> {
    pub fn data(&self) -> Option<&[R]> {
        self.data.as_deref()
    }

    pub fn find(&self, id: &Id) -> Option<&R> {
        self.data.as_ref()?.iter().find(|r| r.id() == id)
    }

    /// True until the first list arrives.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching()
    }

    pub fn is_fetching(&self) -> bool {
        self.scheduled || !self.in_flight.is_empty()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Bumped on every successful fetch.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn subscribe_and_schedule(&mut self, subscriber: SubscriberId) {
        self.subscribers.insert(subscriber);
        // A failed first load is not retried on every render; only an
        // explicit invalidation fetches again.
        if self.data.is_none() && self.error.is_none() && !self.is_fetching() {
            debug!(key = %R::KEY, "no cached entry, scheduling fetch");
            self.scheduled = true;
        }
    }

    fn options(&self) -> Vec<SelectOption> {
        self.data
            .iter()
            .flatten()
            .map(|r| SelectOption {
                value: r.id().to_string(),
                label: r.label().to_string(),
            })
            .collect()
    }
}

/// Borrowed view of a collection returned by [`QueryCache::read`].
#[derive(Debug)]
pub struct Snapshot<'a, R> {
    /// Empty until the first successful fetch.
    pub data: &'a [R],
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub error: Option<&'a str>,
    pub revision: u64,
}

/// Key-erased operations shared by every collection.
trait Entry {
    fn invalidate(&mut self);
    fn start_fetch(&mut self, id: FetchId) -> bool;
    fn subscribe_and_schedule_dyn(&mut self, subscriber: SubscriberId);
    fn unsubscribe(&mut self, subscriber: SubscriberId);
    fn is_loading_dyn(&self) -> bool;
    fn len(&self) -> usize;
    fn options_dyn(&self) -> Vec<SelectOption>;
}

impl<R: Resource> Entry for Collection<R> {
    fn invalidate(&mut self) {
        self.stale = true;
        self.scheduled = true;
    }

    fn start_fetch(&mut self, id: FetchId) -> bool {
        if !self.scheduled {
            return false;
        }
        self.scheduled = false;
        self.in_flight.push(id);
        true
    }

    fn subscribe_and_schedule_dyn(&mut self, subscriber: SubscriberId) {
        self.subscribe_and_schedule(subscriber);
    }

    fn unsubscribe(&mut self, subscriber: SubscriberId) {
        self.subscribers.remove(&subscriber);
    }

    fn is_loading_dyn(&self) -> bool {
        self.is_loading()
    }

    fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    fn options_dyn(&self) -> Vec<SelectOption> {
        self.options()
    }
}

/// The three cached collections plus subscriber bookkeeping.
#[derive(Debug, Default)]
pub struct QueryCache {
    pub(crate) building_types: Collection<BuildingType>,
    pub(crate) materials: Collection<Material>,
    pub(crate) projects: Collection<Project>,
    next_subscriber: u64,
    next_fetch: u64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: CacheKey) -> &dyn Entry {
        match key {
            CacheKey::BuildingTypes => &self.building_types,
            CacheKey::Materials => &self.materials,
            CacheKey::Projects => &self.projects,
        }
    }

    fn entry_mut(&mut self, key: CacheKey) -> &mut dyn Entry {
        match key {
            CacheKey::BuildingTypes => &mut self.building_types,
            CacheKey::Materials => &mut self.materials,
            CacheKey::Projects => &mut self.projects,
        }
    }

    pub fn subscribe(&mut self) -> SubscriberId {
        self.next_subscriber += 1;
        SubscriberId(self.next_subscriber)
    }

    /// Drop `subscriber` from every collection.
    pub fn unsubscribe(&mut self, subscriber: SubscriberId) {
        for key in CacheKey::ALL {
            self.entry_mut(key).unsubscribe(subscriber);
        }
    }

    /// Read a collection and subscribe to its changes. Schedules a fetch when
    /// nothing is cached yet.
    pub fn read<R: Resource>(&mut self, subscriber: SubscriberId) -> Snapshot<'_, R> {
        let collection = R::collection_mut(self);
        collection.subscribe_and_schedule(subscriber);
        let collection = R::collection(self);
        Snapshot {
            data: collection.data().unwrap_or(&[]),
            is_loading: collection.is_loading(),
            is_fetching: collection.is_fetching(),
            is_stale: collection.is_stale(),
            error: collection.error(),
            revision: collection.revision(),
        }
    }

    /// Untyped read: subscribes and reports `(is_loading, len)`.
    pub fn watch(&mut self, key: CacheKey, subscriber: SubscriberId) -> (bool, usize) {
        let entry = self.entry_mut(key);
        entry.subscribe_and_schedule_dyn(subscriber);
        (entry.is_loading_dyn(), entry.len())
    }

    /// Select options (id, label) built from the cached list of `key`.
    pub fn options(&self, key: CacheKey) -> Vec<SelectOption> {
        self.entry(key).options_dyn()
    }

    pub fn collection<R: Resource>(&self) -> &Collection<R> {
        R::collection(self)
    }

    /// Mark `key` stale and schedule a background refetch.
    pub fn invalidate(&mut self, key: CacheKey) {
        debug!(%key, "invalidating");
        self.entry_mut(key).invalidate();
    }

    /// Move every scheduled fetch to in-flight and return them.
    pub fn take_scheduled(&mut self) -> Vec<(CacheKey, FetchId)> {
        let mut started = Vec::new();
        for key in CacheKey::ALL {
            let id = FetchId(self.next_fetch + 1);
            if self.entry_mut(key).start_fetch(id) {
                self.next_fetch += 1;
                started.push((key, id));
            }
        }
        started
    }

    /// Store the outcome of fetch `id` and return the subscribers to notify.
    /// Outcomes of fetches this cache never started are ignored.
    pub fn resolve<R: Resource>(
        &mut self,
        id: FetchId,
        result: Result<Vec<R>, ApiError>,
    ) -> Vec<SubscriberId> {
        let collection = R::collection_mut(self);
        let Some(pos) = collection.in_flight.iter().position(|f| *f == id) else {
            warn!(key = %R::KEY, ?id, "ignoring result of unknown fetch");
            return Vec::new();
        };
        collection.in_flight.remove(pos);

        match result {
            Ok(list) => {
                debug!(key = %R::KEY, len = list.len(), "fetch resolved");
                collection.data = Some(list);
                collection.error = None;
                collection.revision += 1;
                if !collection.scheduled && collection.in_flight.is_empty() {
                    collection.stale = false;
                }
            }
            Err(err) => {
                warn!(key = %R::KEY, error = %err, "fetch failed");
                collection.error = Some(err.to_string());
            }
        }
        collection.subscribers.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(name: &str) -> Material {
        Material {
            id: Id::new(name.to_lowercase()),
            name: name.to_string(),
            unit: "bag".to_string(),
            price_per_unit: 1.0,
            description: String::new(),
        }
    }

    #[test]
    fn first_read_schedules_exactly_one_fetch() {
        let mut cache = QueryCache::new();
        let sub = cache.subscribe();

        let snap = cache.read::<Material>(sub);
        assert!(snap.is_loading);
        assert!(snap.data.is_empty());

        // A second render before the fetch starts does not double-schedule.
        cache.read::<Material>(sub);
        let started = cache.take_scheduled();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].0, CacheKey::Materials);

        // Nor does a render while it is in flight.
        cache.read::<Material>(sub);
        assert!(cache.take_scheduled().is_empty());
    }

    #[test]
    fn resolve_replaces_list_and_notifies_subscribers() {
        let mut cache = QueryCache::new();
        let a = cache.subscribe();
        let b = cache.subscribe();
        cache.read::<Material>(a);
        cache.read::<Material>(b);
        let (_, fetch) = cache.take_scheduled()[0];

        let notified = cache.resolve(fetch, Ok(vec![material("Cement")]));
        assert_eq!(notified, vec![a, b]);

        let snap = cache.read::<Material>(a);
        assert!(!snap.is_loading);
        assert_eq!(snap.data.len(), 1);
        assert_eq!(snap.revision, 1);
        assert!(cache.take_scheduled().is_empty());
    }

    #[test]
    fn invalidate_keeps_data_while_refetching() {
        let mut cache = QueryCache::new();
        let sub = cache.subscribe();
        cache.read::<Material>(sub);
        let (_, first) = cache.take_scheduled()[0];
        cache.resolve(first, Ok(vec![material("Cement")]));

        cache.invalidate(CacheKey::Materials);
        let snap = cache.read::<Material>(sub);
        assert!(snap.is_stale);
        assert!(snap.is_fetching);
        assert!(!snap.is_loading);
        assert_eq!(snap.data.len(), 1);

        let (_, second) = cache.take_scheduled()[0];
        cache.resolve::<Material>(second, Ok(vec![]));
        let snap = cache.read::<Material>(sub);
        assert!(!snap.is_stale);
        assert!(snap.data.is_empty());
    }

    #[test]
    fn invalidation_only_touches_its_key() {
        let mut cache = QueryCache::new();
        cache.invalidate(CacheKey::Projects);
        let started = cache.take_scheduled();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].0, CacheKey::Projects);
    }

    #[test]
    fn last_resolving_fetch_wins() {
        let mut cache = QueryCache::new();
        cache.invalidate(CacheKey::Materials);
        let (_, older) = cache.take_scheduled()[0];
        cache.invalidate(CacheKey::Materials);
        let (_, newer) = cache.take_scheduled()[0];

        cache.resolve(newer, Ok(vec![material("New")]));
        cache.resolve(older, Ok(vec![material("Old")]));

        let data = cache.collection::<Material>().data().unwrap();
        assert_eq!(data[0].name, "Old");
    }

    #[test]
    fn failed_refetch_keeps_previous_data() {
        let mut cache = QueryCache::new();
        let sub = cache.subscribe();
        cache.read::<Material>(sub);
        let (_, first) = cache.take_scheduled()[0];
        cache.resolve(first, Ok(vec![material("Cement")]));

        cache.invalidate(CacheKey::Materials);
        let (_, second) = cache.take_scheduled()[0];
        let notified = cache.resolve::<Material>(second, Err(ApiError::Transport("refused".into())));
        assert_eq!(notified, vec![sub]);

        let snap = cache.read::<Material>(sub);
        assert_eq!(snap.data.len(), 1);
        assert_eq!(snap.error, Some("transport failed: refused"));
    }

    #[test]
    fn failed_first_load_is_not_retried_by_reading() {
        let mut cache = QueryCache::new();
        let sub = cache.subscribe();
        cache.read::<Material>(sub);
        let (_, fetch) = cache.take_scheduled()[0];
        cache.resolve::<Material>(fetch, Err(ApiError::NotFound));

        let snap = cache.read::<Material>(sub);
        assert!(!snap.is_loading);
        assert!(cache.take_scheduled().is_empty());

        cache.invalidate(CacheKey::Materials);
        assert_eq!(cache.take_scheduled().len(), 1);
    }

    #[test]
    fn unknown_fetch_results_are_ignored() {
        let mut cache = QueryCache::new();
        let notified = cache.resolve::<Material>(FetchId(99), Ok(vec![material("Ghost")]));
        assert!(notified.is_empty());
        assert!(cache.collection::<Material>().data().is_none());
    }

    #[test]
    fn unsubscribed_views_are_not_notified() {
        let mut cache = QueryCache::new();
        let sub = cache.subscribe();
        cache.read::<Material>(sub);
        cache.unsubscribe(sub);
        let (_, fetch) = cache.take_scheduled()[0];
        assert!(cache.resolve(fetch, Ok(vec![material("Cement")])).is_empty());
    }

    #[test]
    fn watch_and_options_work_without_type() {
        let mut cache = QueryCache::new();
        let sub = cache.subscribe();
        assert_eq!(cache.watch(CacheKey::BuildingTypes, sub), (true, 0));
        let (_, fetch) = cache.take_scheduled()[0];
        let bt = BuildingType {
            id: Id::from("bt-1"),
            name: "Warehouse".to_string(),
            description: String::new(),
            estimation_formula: "area * 1200".to_string(),
        };
        cache.resolve(fetch, Ok(vec![bt]));

        assert_eq!(cache.watch(CacheKey::BuildingTypes, sub), (false, 1));
        let options = cache.options(CacheKey::BuildingTypes);
        assert_eq!(options[0].label, "Warehouse");
        assert_eq!(options[0].value, "bt-1");
    }
}
