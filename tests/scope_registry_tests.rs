//! Integration Tests for the Scope Registry
//!
//! Drives the registry through its public API the way a view layer would:
//! views are opened, objects created, scopes ended or pushed out by newer
//! views.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};

use parking_lot::Mutex;
use scope_cache::{Config, ScopeRegistry};

// == Helper Functions ==

/// Object with a unique serial so destruction can be traced per instance.
#[derive(Debug)]
struct Tracked {
    serial: u64,
    label: String,
}

struct Harness {
    registry: ScopeRegistry<String, Arc<Tracked>>,
    serials: AtomicU64,
    destroyed: Arc<Mutex<Vec<(u64, String)>>>,
}

impl Harness {
    fn new(max_active_scopes: usize) -> Self {
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&destroyed);
        let registry = ScopeRegistry::new(
            NonZeroUsize::new(max_active_scopes).unwrap(),
            move |_: &str, object: &Arc<Tracked>| -> anyhow::Result<()> {
                sink.lock().push((object.serial, object.label.clone()));
                Ok(())
            },
        );
        Self {
            registry,
            serials: AtomicU64::new(0),
            destroyed,
        }
    }

    fn open(&self, view: &str, object_id: &str) -> Arc<Tracked> {
        self.registry.create_object(view, object_id, || {
            Arc::new(Tracked {
                serial: self.serials.fetch_add(1, Ordering::SeqCst),
                label: format!("{view}/{object_id}"),
            })
        })
    }

    fn destroyed_labels(&self) -> Vec<String> {
        self.destroyed.lock().iter().map(|(_, label)| label.clone()).collect()
    }

    fn created(&self) -> u64 {
        self.serials.load(Ordering::SeqCst)
    }
}

// == Capacity ==

#[test]
fn test_capacity_invariant_one_eviction_per_overflow() {
    let harness = Harness::new(3);

    for i in 0..10u64 {
        harness.open(&format!("view-{i}"), "bean");

        let stats = harness.registry.stats();
        assert!(stats.active_scopes <= 3);
        assert_eq!(stats.scopes_evicted, (i + 1).saturating_sub(3));
    }

    assert_eq!(harness.destroyed.lock().len(), 7);
}

#[test]
fn test_default_bound_is_twenty_five() {
    let registry: ScopeRegistry<u32, u32> =
        ScopeRegistry::from_config(&Config::default(), scope_cache::DropOnly);

    for holder in 0..40 {
        registry.create_object(&holder, "bean", || holder);
    }

    assert_eq!(registry.max_active_scopes(), 25);
    assert_eq!(registry.active_scopes(), 25);
    assert_eq!(registry.active_holders().first(), Some(&15));
}

// == LRU Order ==

#[test]
fn test_least_recently_used_view_is_evicted() {
    let harness = Harness::new(2);

    harness.open("A", "bean");
    harness.open("B", "bean");
    harness.open("A", "bean");
    harness.open("C", "bean");

    assert_eq!(harness.registry.active_holders(), vec!["A", "C"]);
    assert_eq!(harness.destroyed_labels(), vec!["B/bean"]);
}

#[test]
fn test_lookup_refreshes_recency() {
    let harness = Harness::new(2);
    harness.open("A", "bean");
    harness.open("B", "bean");

    assert!(harness.registry.get_object("A", "bean").is_some());
    harness.open("C", "bean");

    assert!(!harness.registry.is_active("B"));
    assert!(harness.registry.is_active("A"));
}

// == Destroy On Eviction ==

#[test]
fn test_evicted_objects_destroyed_once_and_recreated_fresh() {
    let harness = Harness::new(1);
    let first_form = harness.open("A", "form");
    let first_table = harness.open("A", "table");

    harness.open("B", "form");

    let mut destroyed = harness.destroyed_labels();
    destroyed.sort();
    assert_eq!(destroyed, vec!["A/form", "A/table"]);
    assert!(harness.registry.get_object("A", "form").is_none());

    let second_form = harness.open("A", "form");
    assert!(!Arc::ptr_eq(&first_form, &second_form));
    assert_ne!(first_form.serial, second_form.serial);
    assert_ne!(first_table.serial, second_form.serial);

    let stats = harness.registry.stats();
    assert_eq!(stats.objects_destroyed, 3);
    assert_eq!(stats.scopes_created, 3);
}

#[test]
fn test_failing_destroyer_does_not_block_eviction() {
    let registry: ScopeRegistry<String, u32> = ScopeRegistry::new(
        NonZeroUsize::new(1).unwrap(),
        |object_id: &str, _: &u32| -> anyhow::Result<()> {
            anyhow::ensure!(object_id != "fragile", "{object_id} refused to close");
            Ok(())
        },
    );

    registry.create_object("A", "fragile", || 1);
    registry.create_object("A", "sturdy", || 2);
    registry.create_object("B", "bean", || 3);

    let stats = registry.stats();
    assert_eq!(stats.objects_destroyed, 2);
    assert_eq!(stats.destroy_failures, 1);
    assert_eq!(registry.active_holders(), vec!["B"]);
}

// == End Of Scope ==

#[test]
fn test_end_scope_then_pressure_never_double_destroys() {
    let harness = Harness::new(2);
    harness.open("A", "bean");
    harness.open("B", "bean");

    assert!(harness.registry.end_scope("A"));
    harness.open("C", "bean");
    harness.open("D", "bean");
    harness.open("E", "bean");

    let destroyed = harness.destroyed_labels();
    assert_eq!(destroyed.iter().filter(|label| *label == "A/bean").count(), 1);
    assert_eq!(destroyed, vec!["A/bean", "B/bean", "C/bean"]);

    let stats = harness.registry.stats();
    assert_eq!(stats.scopes_ended, 1);
    assert_eq!(stats.scopes_evicted, 2);
}

#[test]
fn test_end_all_scopes_destroys_everything() {
    let harness = Harness::new(4);
    for view in ["A", "B", "C"] {
        harness.open(view, "form");
        harness.open(view, "table");
    }

    assert_eq!(harness.registry.end_all_scopes(), 3);
    assert_eq!(harness.destroyed.lock().len(), 6);
    assert_eq!(harness.registry.active_scopes(), 0);

    // A new request after the session ended starts from scratch
    harness.open("A", "form");
    assert_eq!(harness.registry.active_scopes(), 1);
    assert_eq!(harness.destroyed.lock().len(), 6);
}

// == Concurrency ==

#[test]
fn test_concurrent_views_destroy_every_object_exactly_once() {
    const THREADS: usize = 8;
    const REQUESTS: usize = 300;
    let harness = Harness::new(4);

    std::thread::scope(|scope| {
        for thread in 0..THREADS {
            let harness = &harness;
            scope.spawn(move || {
                for request in 0..REQUESTS {
                    let view = format!("view-{}", (thread * 3 + request) % 10);
                    let object_id = if request % 2 == 0 { "form" } else { "table" };
                    let object = harness.open(&view, object_id);
                    assert_eq!(object.label, format!("{view}/{object_id}"));
                    assert!(harness.registry.active_scopes() <= 4 + THREADS);
                    if request % 50 == 49 {
                        harness.registry.end_scope(view.as_str());
                    }
                }
            });
        }
    });

    assert!(harness.registry.active_scopes() <= 4);
    harness.registry.end_all_scopes();

    let mut serials: Vec<u64> = harness.destroyed.lock().iter().map(|(serial, _)| *serial).collect();
    serials.sort_unstable();
    serials.dedup();
    assert_eq!(serials.len(), harness.destroyed.lock().len(), "an object was destroyed twice");
    assert_eq!(serials.len() as u64, harness.created(), "an object was never destroyed");
}

#[test]
fn test_concurrent_first_requests_share_one_object() {
    let harness = Harness::new(4);

    let objects: Vec<Arc<Tracked>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| harness.open("shared", "bean")))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(harness.created(), 1);
    assert!(objects.iter().all(|object| Arc::ptr_eq(object, &objects[0])));
}

#[test]
fn test_blocked_destroyer_does_not_stall_other_views() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let destroyed = Arc::new(Mutex::new(Vec::new()));

    let registry: ScopeRegistry<String, String> = {
        let (entered, release, sink) = (
            Arc::clone(&entered),
            Arc::clone(&release),
            Arc::clone(&destroyed),
        );
        ScopeRegistry::new(
            NonZeroUsize::new(3).unwrap(),
            move |_: &str, object: &String| -> anyhow::Result<()> {
                if object == "B-1" {
                    entered.wait();
                    release.wait();
                }
                sink.lock().push(object.clone());
                Ok(())
            },
        )
    };

    registry.create_object("B", "bean", || "B-1".to_string());
    registry.create_object("A", "bean", || "A-1".to_string());
    registry.create_object("D", "bean", || "D-1".to_string());

    std::thread::scope(|scope| {
        // Opening C pushes out B, whose destroyer then blocks
        let opener = scope.spawn(|| registry.create_object("C", "bean", || "C-1".to_string()));
        entered.wait();

        assert_eq!(registry.create_object("A", "bean", || "A-2".to_string()), "A-1");
        assert_eq!(registry.get_object("A", "bean"), Some("A-1".to_string()));

        // B comes back with a fresh scope while its old one is still being torn down
        assert_eq!(registry.create_object("B", "bean", || "B-2".to_string()), "B-2");
        assert_eq!(registry.get_object("B", "bean"), Some("B-2".to_string()));
        assert_eq!(*destroyed.lock(), vec!["D-1".to_string()]);

        release.wait();
        assert_eq!(opener.join().unwrap(), "C-1");
    });

    let mut destroyed = destroyed.lock().clone();
    destroyed.sort();
    assert_eq!(destroyed, vec!["B-1".to_string(), "D-1".to_string()]);
    assert_eq!(registry.stats().scopes_evicted, 2);
    assert!(registry.is_active("B"));
    assert!(!registry.is_active("D"));
}
