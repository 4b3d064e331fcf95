//! Cluster registry
//!
//! The registry replaces ambient, module-level cluster lookup with an
//! explicit object. It is safe to share between threads: lookups take a read
//! lock, and a cluster is built at most once per name (the first one
//! inserted wins a race).
//!
//! Clusters can be registered directly, created through
//! [`ClusterRegistry::get_or_create`], or loaded lazily from manifests
//! attached with [`ClusterRegistry::with_manifests`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cluster::Cluster;
use crate::config::ClusterManifest;
use crate::error::{Error, Result};
use crate::role::RoleRegistry;

/// Anything that can hand out declared clusters by name.
///
/// [`Cluster::use_clusters`] depends only on this trait.
pub trait ClusterSource {
    fn load_cluster(&self, name: &str) -> Result<Arc<Cluster>>;
}

fn cluster_key(name: &str) -> String {
    name.to_lowercase()
}

/// Thread-safe registry of declared clusters and the roles they create.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    clusters: RwLock<HashMap<String, Arc<Cluster>>>,
    roles: Mutex<RoleRegistry>,
    manifests: HashMap<String, ClusterManifest>,
}

impl ClusterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach manifests that [`ClusterSource::load_cluster`] builds on demand.
    ///
    /// Names are compared case-insensitively; when two manifests declare the
    /// same cluster the first one is kept.
    pub fn with_manifests<I>(mut self, manifests: I) -> Self
    where
        I: IntoIterator<Item = ClusterManifest>,
    {
        for manifest in manifests {
            let key = cluster_key(manifest.name());
            self.manifests.entry(key).or_insert(manifest);
        }
        self
    }

    fn read_clusters(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Cluster>>> {
        // Entries are inserted whole; a poisoned map is still consistent.
        self.clusters.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_clusters(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Cluster>>> {
        self.clusters.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_roles(&self) -> MutexGuard<'_, RoleRegistry> {
        self.roles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the role registry.
    pub fn with_roles<R>(&self, f: impl FnOnce(&mut RoleRegistry) -> R) -> R {
        let mut roles = self.lock_roles();
        f(&mut *roles)
    }

    /// Create an unregistered cluster whose role lives in this registry.
    pub fn new_cluster(&self, name: &str) -> Cluster {
        let mut roles = self.lock_roles();
        Cluster::new(name, &mut *roles)
    }

    /// Register a fully declared cluster.
    ///
    /// Fails with [`Error::DuplicateClusterName`] if the name is taken.
    pub fn register_cluster(&self, cluster: Cluster) -> Result<Arc<Cluster>> {
        let key = cluster_key(cluster.name());
        let mut clusters = self.write_clusters();
        if clusters.contains_key(&key) {
            return Err(Error::DuplicateClusterName {
                cluster: cluster.name().to_string(),
            });
        }
        let cluster = Arc::new(cluster);
        clusters.insert(key, Arc::clone(&cluster));
        tracing::info!(cluster = %cluster.name(), "Registered cluster");
        Ok(cluster)
    }

    /// Return the cluster `name`, creating and configuring it if needed.
    ///
    /// `configure` runs outside any lock, so it may `use` other clusters
    /// from this registry. If another thread registers the same name first,
    /// that cluster is returned and this one is discarded.
    pub fn get_or_create<F>(&self, name: &str, configure: F) -> Result<Arc<Cluster>>
    where
        F: FnOnce(&mut Cluster) -> Result<()>,
    {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }
        let mut cluster = self.new_cluster(name);
        configure(&mut cluster)?;
        Ok(self.insert_first(cluster))
    }

    /// Look up an already built cluster without consulting manifests.
    pub fn get(&self, name: &str) -> Option<Arc<Cluster>> {
        self.read_clusters().get(&cluster_key(name)).cloned()
    }

    /// Check whether a cluster is built or can be built from a manifest.
    pub fn contains(&self, name: &str) -> bool {
        let key = cluster_key(name);
        self.manifests.contains_key(&key) || self.read_clusters().contains_key(&key)
    }

    /// Names of every known cluster, built or loadable (sorted).
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: BTreeMap<String, String> = self
            .manifests
            .iter()
            .map(|(key, manifest)| (key.clone(), manifest.name().to_string()))
            .collect();
        for (key, cluster) in self.read_clusters().iter() {
            names.insert(key.clone(), cluster.name().to_string());
        }
        names.into_values().collect()
    }

    /// Load a cluster, clone it, and resolve the clone.
    ///
    /// Registered clusters stay untouched, so independent clusters can be
    /// resolved in parallel from a shared registry.
    pub fn resolve_cluster(&self, name: &str) -> Result<Cluster> {
        let mut cluster = Cluster::clone(&*self.load_cluster(name)?);
        cluster.resolve()?;
        Ok(cluster)
    }

    fn insert_first(&self, cluster: Cluster) -> Arc<Cluster> {
        let key = cluster_key(cluster.name());
        let mut clusters = self.write_clusters();
        let entry = clusters.entry(key).or_insert_with(|| {
            tracing::info!(cluster = %cluster.name(), "Registered cluster");
            Arc::new(cluster)
        });
        Arc::clone(entry)
    }

    fn load_in_scope(&self, name: &str, chain: &[String]) -> Result<Arc<Cluster>> {
        let key = cluster_key(name);
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }
        if chain.contains(&key) {
            let mut cycle = chain.to_vec();
            cycle.push(key);
            return Err(Error::CircularUse {
                chain: cycle.join(" -> "),
            });
        }
        let manifest = self.manifests.get(&key).ok_or_else(|| Error::ClusterNotFound {
            cluster: name.to_string(),
        })?;

        let mut next = chain.to_vec();
        next.push(key);
        let scope = LoadScope {
            registry: self,
            chain: next,
        };
        // Build dependencies first so the role lock below is never held
        // while another manifest is being built.
        for used in manifest.uses() {
            scope.load_cluster(used)?;
        }

        tracing::debug!(cluster = %manifest.name(), "Building cluster from manifest");
        let cluster = {
            let mut roles = self.lock_roles();
            manifest.build(&mut *roles, &scope)?
        };
        Ok(self.insert_first(cluster))
    }
}

impl ClusterSource for ClusterRegistry {
    fn load_cluster(&self, name: &str) -> Result<Arc<Cluster>> {
        self.load_in_scope(name, &[])
    }
}

/// Tracks the chain of clusters being built so `use` cycles are reported.
struct LoadScope<'a> {
    registry: &'a ClusterRegistry,
    chain: Vec<String>,
}

impl ClusterSource for LoadScope<'_> {
    fn load_cluster(&self, name: &str) -> Result<Arc<Cluster>> {
        self.registry.load_in_scope(name, &self.chain)
    }
}
