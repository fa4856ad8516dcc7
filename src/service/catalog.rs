//! Product catalog lookups

use std::collections::HashMap;

use uuid::Uuid;

/// What the catalog knows about an application/SKU pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Application display name
    pub app_name: Option<String>,
    /// SKU display name
    pub sku_name: Option<String>,
    /// Minimum client count the SKU needs before it activates
    pub count_policy: Option<u32>,
}

/// Resolves display names and activation thresholds
///
/// A miss is not an error: callers fall back to the raw GUIDs and the
/// default threshold.
pub trait SkuCatalog: Send + Sync {
    /// Look up an application/SKU pair
    fn lookup(&self, application_id: &Uuid, sku_id: &Uuid) -> CatalogEntry;
}

#[derive(Debug, Clone)]
struct SkuItem {
    name: String,
    count_policy: Option<u32>,
}

/// In-memory catalog built at startup
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    applications: HashMap<Uuid, String>,
    skus: HashMap<Uuid, SkuItem>,
}

impl StaticCatalog {
    /// Empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an application
    #[must_use]
    pub fn with_application(mut self, id: Uuid, name: impl Into<String>) -> Self {
        self.applications.insert(id, name.into());
        self
    }

    /// Register a SKU with its optional activation threshold
    #[must_use]
    pub fn with_sku(mut self, id: Uuid, name: impl Into<String>, count_policy: Option<u32>) -> Self {
        self.skus.insert(
            id,
            SkuItem {
                name: name.into(),
                count_policy,
            },
        );
        self
    }

    /// Number of registered SKUs
    #[must_use]
    pub fn sku_count(&self) -> usize {
        self.skus.len()
    }
}

impl SkuCatalog for StaticCatalog {
    fn lookup(&self, application_id: &Uuid, sku_id: &Uuid) -> CatalogEntry {
        let sku = self.skus.get(sku_id);
        CatalogEntry {
            app_name: self.applications.get(application_id).cloned(),
            sku_name: sku.map(|item| item.name.clone()),
            count_policy: sku.and_then(|item| item.count_policy),
        }
    }
}
