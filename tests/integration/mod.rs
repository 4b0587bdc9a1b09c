// Integration tests for Restock Watcher
// These tests drive whole cycles through Monitor with in-process collaborators

pub mod failure_tests;
pub mod scraping_tests;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use restock_watcher::models::{
    Candidate, IdentityResolver, Notification, Observation, ProductIdentity, ProductRecord,
    ProductState, TransitionLogEntry,
};
use restock_watcher::plugins::traits::NotificationResult;
use restock_watcher::plugins::{DiscoverySurface, NotifierPlugin, PluginManager, ProductValidator};
use restock_watcher::store::CycleChanges;
use restock_watcher::{AppError, CycleSummary, MemoryStore, Monitor, SqliteStore, StateStore};

pub const ID_PATTERN: &str = r"/(\d+)/product-detail";
pub const SURFACES: [&str; 2] = ["brand_listing", "search_results"];

pub fn product_url(id: u32) -> String {
    format!("https://shop.example.com/hot-wheels/car-{id}/{id}/product-detail")
}

pub fn identity(id: u32) -> ProductIdentity {
    ProductIdentity::from_catalog_id(&id.to_string()).unwrap()
}

/// How a product page reads this cycle.
#[derive(Debug, Clone, Copy)]
pub enum Page {
    Buyable(Option<i64>),
    SoldOut,
    /// Not a watched product.
    Rejected,
    /// Fetch fails.
    Broken,
}

#[derive(Default)]
struct CatalogState {
    listings: HashMap<String, Option<Vec<u32>>>,
    pages: HashMap<String, Page>,
}

/// Scriptable stand-in for the shop: what each surface lists and how each
/// product page reads.
#[derive(Clone, Default)]
pub struct Catalog {
    inner: Arc<Mutex<CatalogState>>,
}

impl Catalog {
    pub fn list(&self, surface: &str, ids: &[u32]) {
        let mut state = self.inner.lock().unwrap();
        state.listings.insert(surface.to_string(), Some(ids.to_vec()));
    }

    pub fn fail_surface(&self, surface: &str) {
        let mut state = self.inner.lock().unwrap();
        state.listings.insert(surface.to_string(), None);
    }

    pub fn page(&self, id: u32, page: Page) {
        let mut state = self.inner.lock().unwrap();
        state.pages.insert(product_url(id), page);
    }

    /// Lists `id` on `surface` only, reading as `page`.
    pub fn only(&self, surface: &str, entries: &[(u32, Page)]) {
        for s in SURFACES {
            self.list(s, &[]);
        }
        let ids: Vec<u32> = entries.iter().map(|(id, _)| *id).collect();
        self.list(surface, &ids);
        for (id, page) in entries {
            self.page(*id, *page);
        }
    }

    pub fn clear(&self) {
        for s in SURFACES {
            self.list(s, &[]);
        }
    }
}

pub struct CatalogSurface {
    name: String,
    catalog: Catalog,
}

#[async_trait]
impl DiscoverySurface for CatalogSurface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(&self) -> restock_watcher::Result<HashSet<String>> {
        let state = self.catalog.inner.lock().unwrap();
        match state.listings.get(&self.name) {
            Some(Some(ids)) => Ok(ids.iter().map(|id| product_url(*id)).collect()),
            Some(None) => Err(AppError::Scraping(format!("{} returned 503", self.name))),
            None => Ok(HashSet::new()),
        }
    }
}

pub struct CatalogValidator {
    catalog: Catalog,
    resolver: IdentityResolver,
}

#[async_trait]
impl ProductValidator for CatalogValidator {
    async fn validate(&self, candidate: &Candidate) -> restock_watcher::Result<Option<Observation>> {
        let page = self.catalog.inner.lock().unwrap().pages.get(&candidate.url).copied();
        let (buyable, price) = match page {
            Some(Page::Buyable(price)) => (true, price),
            Some(Page::SoldOut) => (false, None),
            Some(Page::Rejected) | None => return Ok(None),
            Some(Page::Broken) => {
                return Err(AppError::Scraping(format!("timeout fetching {}", candidate.url)));
            }
        };

        Ok(Some(Observation {
            identity: self.resolver.resolve(&candidate.url)?,
            name: format!("Hot Wheels {}", candidate.url.rsplit('/').nth(2).unwrap_or("car")),
            url: candidate.url.clone(),
            price,
            buyable,
            source: candidate.primary_surface().to_string(),
            observed_at: Utc::now(),
        }))
    }
}

/// Notifier that records what it was asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    pub fail: bool,
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "Recording Notifier"
    }

    fn plugin_type(&self) -> &str {
        "recording"
    }

    fn description(&self) -> &str {
        "Records notifications in memory"
    }

    async fn send(&self, notification: &Notification) -> restock_watcher::Result<NotificationResult> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            Err(AppError::Notification("connection reset".to_string()))
        } else {
            Ok(NotificationResult::delivered(None))
        }
    }
}

/// Store whose commit always fails; reads go to the wrapped memory store.
#[derive(Default)]
pub struct FailingStore {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl StateStore for FailingStore {
    async fn get(&self, identity: &ProductIdentity) -> restock_watcher::Result<Option<ProductRecord>> {
        self.inner.get(identity).await
    }

    async fn upsert(&self, record: &ProductRecord) -> restock_watcher::Result<()> {
        self.inner.upsert(record).await
    }

    async fn append_transition(&self, entry: &TransitionLogEntry) -> restock_watcher::Result<()> {
        self.inner.append_transition(entry).await
    }

    async fn all_known_identities(&self) -> restock_watcher::Result<HashSet<ProductIdentity>> {
        self.inner.all_known_identities().await
    }

    async fn commit(&self, _changes: &CycleChanges) -> restock_watcher::Result<()> {
        Err(AppError::Store("disk I/O error".to_string()))
    }

    async fn records(&self) -> restock_watcher::Result<Vec<ProductRecord>> {
        self.inner.records().await
    }

    async fn transitions_for(&self, identity: &ProductIdentity) -> restock_watcher::Result<Vec<TransitionLogEntry>> {
        self.inner.transitions_for(identity).await
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sqlite,
}

/// A monitor wired to a scripted catalog and a recording notifier.
pub struct Harness {
    pub catalog: Catalog,
    pub store: Arc<dyn StateStore>,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub async fn new(backend: Backend) -> Self {
        let store: Arc<dyn StateStore> = match backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Sqlite => Arc::new(SqliteStore::in_memory().await.unwrap()),
        };
        Self::with_store(store)
    }

    pub fn with_store(store: Arc<dyn StateStore>) -> Self {
        let catalog = Catalog::default();
        catalog.clear();
        Self {
            catalog,
            store,
            notifier: RecordingNotifier::default(),
        }
    }

    pub async fn monitor(&self) -> Monitor {
        let surfaces = SURFACES
            .iter()
            .map(|name| {
                Box::new(CatalogSurface {
                    name: name.to_string(),
                    catalog: self.catalog.clone(),
                }) as Box<dyn DiscoverySurface>
            })
            .collect();
        let validator = CatalogValidator {
            catalog: self.catalog.clone(),
            resolver: IdentityResolver::new(ID_PATTERN).unwrap(),
        };

        let notifiers = PluginManager::new();
        notifiers
            .register_notifier(Box::new(self.notifier.clone()))
            .await
            .unwrap();

        Monitor::new(
            surfaces,
            Box::new(validator),
            Arc::clone(&self.store),
            notifiers,
            IdentityResolver::new(ID_PATTERN).unwrap(),
            Duration::ZERO,
        )
    }

    pub async fn run(&self) -> restock_watcher::Result<CycleSummary> {
        self.monitor().await.run_cycle().await
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.notifier.sent.lock().unwrap().clone()
    }

    pub async fn state_of(&self, id: u32) -> Option<ProductState> {
        self.store.get(&identity(id)).await.unwrap().map(|r| r.state)
    }

    pub async fn record(&self, id: u32) -> ProductRecord {
        self.store.get(&identity(id)).await.unwrap().unwrap()
    }
}
