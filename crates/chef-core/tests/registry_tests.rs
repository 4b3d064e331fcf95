//! Concurrent access to the cluster registry
//!
//! Verifies that clusters are created once per name and that independent
//! clusters can be resolved in parallel from one shared registry.

use chef_core::{ClusterManifest, ClusterRegistry, ClusterSource, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn manifest(name: &str, uses: &[&str]) -> ClusterManifest {
    let uses: Vec<String> = uses.iter().map(|u| format!("\"{u}\"")).collect();
    ClusterManifest::parse(&format!(
        "[cluster]\nname = \"{name}\"\nuse = [{}]\n\n[facets.web]\ninstances = 2\n",
        uses.join(", ")
    ))
    .unwrap()
}

#[test]
fn test_concurrent_get_or_create_yields_one_cluster() {
    let registry = Arc::new(ClusterRegistry::new());
    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry
                    .get_or_create("demo", |cluster| {
                        cluster.set("builder", thread_id as i64);
                        Ok(())
                    })
                    .unwrap()
            })
        })
        .collect();

    let clusters: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread should not panic"))
        .collect();

    // Every caller sees the first inserted cluster
    for cluster in &clusters[1..] {
        assert!(Arc::ptr_eq(&clusters[0], cluster));
    }
    assert_eq!(registry.cluster_names(), vec!["demo"]);
}

#[test]
fn test_concurrent_lazy_loading_builds_each_cluster() {
    let registry = ClusterRegistry::new().with_manifests([
        manifest("base", &[]),
        manifest("web", &["base"]),
        manifest("api", &["base"]),
    ]);
    let loaded = AtomicUsize::new(0);

    thread::scope(|scope| {
        for name in ["web", "api", "web", "api", "base"] {
            let registry = &registry;
            let loaded = &loaded;
            scope.spawn(move || {
                let cluster = registry.load_cluster(name).unwrap();
                assert_eq!(cluster.name(), name);
                loaded.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    assert_eq!(loaded.load(Ordering::SeqCst), 5);
    let base = registry.load_cluster("base").unwrap();
    assert!(Arc::ptr_eq(&base, &registry.load_cluster("BASE").unwrap()));
    // One role per cluster, created once even under contention
    assert_eq!(registry.with_roles(|roles| roles.len()), 3);
}

#[test]
fn test_parallel_resolution_of_independent_clusters() {
    let registry = ClusterRegistry::new().with_manifests([
        manifest("base", &[]),
        manifest("web", &["base"]),
        manifest("api", &["base"]),
    ]);

    let resolved = thread::scope(|scope| {
        let web = scope.spawn(|| registry.resolve_cluster("web"));
        let api = scope.spawn(|| registry.resolve_cluster("api"));
        (web.join().unwrap(), api.join().unwrap())
    });

    let (web, api) = (resolved.0.unwrap(), resolved.1.unwrap());
    assert!(web.is_resolved());
    assert!(api.is_resolved());
    assert_eq!(web.resolved_servers().len(), 2);
    // The shared copy stays unresolved
    assert!(!registry.load_cluster("web").unwrap().is_resolved());
}

#[test]
fn test_manifest_cycle_is_reported() {
    let registry = ClusterRegistry::new().with_manifests([
        manifest("alpha", &["beta"]),
        manifest("beta", &["gamma"]),
        manifest("gamma", &["alpha"]),
    ]);

    let err = registry.load_cluster("alpha").unwrap_err();
    match err {
        Error::CircularUse { chain } => assert_eq!(chain, "alpha -> beta -> gamma -> alpha"),
        other => panic!("expected CircularUse, got {other}"),
    }
    assert!(registry.get("alpha").is_none());
}

#[test]
fn test_cluster_names_merges_registered_and_loadable() {
    let registry = ClusterRegistry::new().with_manifests([manifest("base", &[])]);
    registry.register_cluster(registry.new_cluster("Adhoc")).unwrap();

    assert_eq!(registry.cluster_names(), vec!["Adhoc", "base"]);
    assert!(registry.contains("ADHOC"));
    assert!(registry.contains("base"));
    assert!(!registry.contains("ghost"));
}
