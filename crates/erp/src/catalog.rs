//! Status catalog resolver.
//!
//! The ERP's status taxonomy is merchant-configurable: numeric ids are not
//! portable across tenants and names get renamed in the ERP UI. This module
//! discovers and caches the taxonomy (24h TTL, explicit invalidation) and maps
//! it onto the closed canonical [`OrderStatus`] set. A direct id map from
//! configuration overrides the name heuristic, so renaming a standard status
//! does not misclassify it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use orderbridge_core::OrderStatus;

use crate::gateway::ErpGateway;
use crate::payload::ErpStatusEntry;

/// Configured mapping of well-known ERP status ids to canonical states.
///
/// These ids are merchant/tenant-specific defaults, never a stable contract,
/// which is why they live in configuration rather than in the code.
pub type DirectStatusMap = BTreeMap<u32, OrderStatus>;

/// Resolver configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CatalogConfig {
    /// Direct id -> canonical overrides (tenant configuration).
    #[serde(default)]
    pub direct_map: DirectStatusMap,
    /// Substrings identifying the sales module in "list modules".
    #[serde(default = "CatalogConfig::default_sales_aliases")]
    pub sales_module_aliases: Vec<String>,
}

impl CatalogConfig {
    fn default_sales_aliases() -> Vec<String> {
        vec!["sales".to_string(), "vendas".to_string()]
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            direct_map: DirectStatusMap::new(),
            sales_module_aliases: Self::default_sales_aliases(),
        }
    }
}

/// Cache seam for the resolved taxonomy.
///
/// Injected so tests can substitute a deterministic fake; the shared in-memory
/// implementation is read-mostly and explicitly invalidated. Staleness up to
/// the TTL is an accepted tradeoff.
pub trait CatalogCache: Send + Sync {
    fn get_module_id(&self) -> Option<u32>;
    fn put_module_id(&self, module_id: u32);
    fn get_catalog(&self) -> Option<Vec<ErpStatusEntry>>;
    fn put_catalog(&self, entries: Vec<ErpStatusEntry>);
    fn clear(&self);
}

/// In-memory TTL cache.
#[derive(Debug)]
pub struct InMemoryCatalogCache {
    ttl: Duration,
    module_id: Mutex<Option<(u32, Instant)>>,
    catalog: Mutex<Option<(Vec<ErpStatusEntry>, Instant)>>,
}

impl InMemoryCatalogCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            module_id: Mutex::new(None),
            catalog: Mutex::new(None),
        }
    }

    fn fresh<T: Clone>(&self, slot: &Mutex<Option<(T, Instant)>>) -> Option<T> {
        let guard = slot.lock().unwrap();
        match guard.as_ref() {
            Some((value, stored)) if stored.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }
}

impl Default for InMemoryCatalogCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl CatalogCache for InMemoryCatalogCache {
    fn get_module_id(&self) -> Option<u32> {
        self.fresh(&self.module_id)
    }

    fn put_module_id(&self, module_id: u32) {
        *self.module_id.lock().unwrap() = Some((module_id, Instant::now()));
    }

    fn get_catalog(&self) -> Option<Vec<ErpStatusEntry>> {
        self.fresh(&self.catalog)
    }

    fn put_catalog(&self, entries: Vec<ErpStatusEntry>) {
        *self.catalog.lock().unwrap() = Some((entries, Instant::now()));
    }

    fn clear(&self) {
        *self.module_id.lock().unwrap() = None;
        *self.catalog.lock().unwrap() = None;
    }
}

/// Fixed vocabulary for the name-based heuristic, checked in lifecycle order.
const NAME_VOCABULARY: &[(&[&str], OrderStatus)] = &[
    (
        &["open", "pending", "waiting", "aberto", "pendente", "aguardando"],
        OrderStatus::Pending,
    ),
    (
        &["in-progress", "in progress", "processing", "andamento"],
        OrderStatus::Processing,
    ),
    (
        &["invoiced", "billing", "faturad", "faturamento"],
        OrderStatus::Invoiced,
    ),
    (
        &["shipped", "shipping", "transport", "enviado", "despachado"],
        OrderStatus::Shipped,
    ),
    (
        &[
            "fulfilled", "completed", "finished", "delivered", "entregue", "concluido", "atendido",
        ],
        OrderStatus::Delivered,
    ),
    (&["cancelled", "canceled", "cancelad"], OrderStatus::Cancelled),
];

/// Map a raw ERP status name onto a canonical state by substring matching.
pub fn canonical_from_status_name(name: &str) -> Option<OrderStatus> {
    let normalized = name.trim().to_lowercase();
    for (keywords, status) in NAME_VOCABULARY {
        if keywords.iter().any(|k| normalized.contains(k)) {
            return Some(*status);
        }
    }
    None
}

/// Resolves the ERP's dynamic status vocabulary into canonical order states.
pub struct StatusCatalogResolver {
    gateway: Arc<dyn ErpGateway>,
    cache: Arc<dyn CatalogCache>,
    config: CatalogConfig,
}

impl StatusCatalogResolver {
    pub fn new(
        gateway: Arc<dyn ErpGateway>,
        cache: Arc<dyn CatalogCache>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            gateway,
            cache,
            config,
        }
    }

    /// Discover the sales module id.
    ///
    /// Soft failure: `None` means the caller falls back to the static default
    /// mapping instead of erroring.
    pub fn resolve_sales_module_id(&self) -> Option<u32> {
        if let Some(id) = self.cache.get_module_id() {
            return Some(id);
        }

        let modules = match self.gateway.list_modules() {
            Ok(modules) => modules,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list ERP modules");
                return None;
            }
        };

        let found = modules.iter().find(|m| {
            let name = m.name.to_lowercase();
            self.config
                .sales_module_aliases
                .iter()
                .any(|alias| name.contains(alias.as_str()))
        });

        match found {
            Some(module) => {
                self.cache.put_module_id(module.id);
                Some(module.id)
            }
            None => {
                tracing::warn!("no sales module found in ERP module list");
                None
            }
        }
    }

    /// Fetch (or serve from cache) the status catalog for the sales module.
    ///
    /// On a missing module, an ERP failure, or an empty response this returns
    /// the generic fallback catalog rather than failing the caller.
    pub fn resolve_status_catalog(&self) -> Vec<ErpStatusEntry> {
        if let Some(entries) = self.cache.get_catalog() {
            return entries;
        }

        let Some(module_id) = self.resolve_sales_module_id() else {
            return Self::fallback_catalog();
        };

        match self.gateway.list_statuses(module_id) {
            Ok(entries) if !entries.is_empty() => {
                self.cache.put_catalog(entries.clone());
                entries
            }
            Ok(_) => {
                tracing::warn!(module_id, "ERP returned an empty status list, using fallback");
                Self::fallback_catalog()
            }
            Err(err) => {
                tracing::warn!(module_id, error = %err, "failed to list ERP statuses, using fallback");
                Self::fallback_catalog()
            }
        }
    }

    /// Six generic statuses (ids 0-5) mirroring the canonical states, served
    /// when the ERP taxonomy cannot be fetched.
    pub fn fallback_catalog() -> Vec<ErpStatusEntry> {
        OrderStatus::ALL
            .iter()
            .enumerate()
            .map(|(id, status)| ErpStatusEntry {
                id: id as u32,
                name: status.as_str().to_string(),
                color: None,
                is_inherited: false,
            })
            .collect()
    }

    /// Total mapping from an ERP status id to a canonical state.
    ///
    /// Direct configured ids win over the name heuristic; when neither rule
    /// matches the answer is `Pending`.
    pub fn map_erp_status_to_canonical(&self, status_id: u32) -> OrderStatus {
        if let Some(status) = self.config.direct_map.get(&status_id) {
            return *status;
        }

        let catalog = self.resolve_status_catalog();
        let by_name = catalog
            .iter()
            .find(|entry| entry.id == status_id)
            .and_then(|entry| canonical_from_status_name(&entry.name));

        match by_name {
            Some(status) => status,
            None => {
                tracing::debug!(status_id, "no mapping rule matched, defaulting to pending");
                OrderStatus::Pending
            }
        }
    }

    /// Reverse lookup: which id did this tenant assign to a status with this
    /// name? Exact (case-insensitive) match wins over substring match.
    pub fn find_status_id_by_name(&self, name: &str) -> Option<u32> {
        let needle = name.trim().to_lowercase();
        let catalog = self.resolve_status_catalog();

        if let Some(entry) = catalog
            .iter()
            .find(|e| e.name.trim().to_lowercase() == needle)
        {
            return Some(entry.id);
        }

        catalog
            .iter()
            .find(|e| e.name.to_lowercase().contains(&needle))
            .map(|e| e.id)
    }

    /// Reverse lookup over several candidate names; first hit wins.
    pub fn find_status_id_by_names(&self, names: &[&str]) -> Option<u32> {
        names.iter().find_map(|name| self.find_status_id_by_name(name))
    }

    /// Operator escape hatch for when the merchant reconfigures statuses in
    /// the ERP UI before the TTL expires.
    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("status catalog cache cleared");
    }
}
