// Races between activation, deactivation and shutdown on a real multi-threaded
// runtime. The host blocks inside `set_capability` to widen the windows in
// which the calls interleave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flytime_core::EntityId;
use flytime_scheduler::{
    Activation, DeactivateOptions, Deactivation, EntityHost, FlightScheduler, HostError,
};
use flytime_store::{DurationStore, MemoryStore};

/// Host that records the last flight state per entity and stalls on enable.
struct SlowHost {
    enable_delay: Duration,
    flying: Mutex<HashMap<EntityId, bool>>,
}

impl SlowHost {
    fn new(enable_delay: Duration) -> Self {
        Self {
            enable_delay,
            flying: Mutex::new(HashMap::new()),
        }
    }

    fn flying(&self, id: &EntityId) -> Option<bool> {
        self.flying.lock().unwrap().get(id).copied()
    }
}

impl EntityHost for SlowHost {
    fn is_reachable(&self, _id: &EntityId) -> bool {
        true
    }

    fn set_capability(&self, id: &EntityId, enabled: bool) -> Result<(), HostError> {
        if enabled {
            std::thread::sleep(self.enable_delay);
        }
        self.flying.lock().unwrap().insert(*id, enabled);
        Ok(())
    }

    fn notify(&self, _id: &EntityId, _message: &str) {}
}

async fn setup(enable_delay: Duration, secs: u64) -> (FlightScheduler, Arc<SlowHost>, EntityId) {
    let store = Arc::new(MemoryStore::new());
    let id = EntityId::new();
    store.set_remaining(&id, secs).await.unwrap();
    let host = Arc::new(SlowHost::new(enable_delay));
    let scheduler = FlightScheduler::new(store, host.clone(), Duration::from_secs(30));
    (scheduler, host, id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_during_enable_leaves_entity_grounded() {
    let (scheduler, host, id) = setup(Duration::from_millis(200), 1_000).await;

    let activation = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.activate(&id).await })
    };
    // Land in the middle of the host's enable call.
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.shutdown().await;

    assert!(matches!(activation.await.unwrap(), Activation::Activated { .. }));
    assert!(!scheduler.is_active(&id));
    assert_eq!(host.flying(&id), Some(false));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deactivate_during_enable_revokes_after_enable() {
    let (scheduler, host, id) = setup(Duration::from_millis(200), 1_000).await;

    let activation = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.activate(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let outcome = scheduler.deactivate(&id, DeactivateOptions::default()).await;

    assert!(matches!(activation.await.unwrap(), Activation::Activated { .. }));
    assert!(matches!(outcome, Deactivation::Stopped { .. }));
    assert!(!scheduler.is_active(&id));
    assert_eq!(host.flying(&id), Some(false));
}

/// Many tasks toggle the same entity while a watcher checks that at most one
/// session ever exists. Every activation must be matched by exactly one stop.
async fn toggle_storm(scheduler: &FlightScheduler, id: EntityId, shutdown_midway: bool) -> (usize, usize) {
    let activated = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let overlap = Arc::new(AtomicBool::new(false));

    let watcher = {
        let scheduler = scheduler.clone();
        let done = Arc::clone(&done);
        let overlap = Arc::clone(&overlap);
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                if scheduler.active_count() > 1 {
                    overlap.store(true, Ordering::SeqCst);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let scheduler = scheduler.clone();
            let activated = Arc::clone(&activated);
            let stopped = Arc::clone(&stopped);
            tokio::spawn(async move {
                for round in 0..40 {
                    if (worker + round) % 2 == 0 {
                        if let Activation::Activated { .. } = scheduler.activate(&id).await {
                            activated.fetch_add(1, Ordering::SeqCst);
                        }
                    } else if let Deactivation::Stopped { .. } =
                        scheduler.deactivate(&id, DeactivateOptions::default()).await
                    {
                        stopped.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    if shutdown_midway {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let swept = scheduler.shutdown().await;
        stopped.fetch_add(swept, Ordering::SeqCst);
    }
    for worker in workers {
        worker.await.unwrap();
    }
    done.store(true, Ordering::SeqCst);
    watcher.await.unwrap();

    assert!(!overlap.load(Ordering::SeqCst), "two sessions existed for one entity");
    (activated.load(Ordering::SeqCst), stopped.load(Ordering::SeqCst))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_toggles_keep_host_and_registry_in_step() {
    let (scheduler, host, id) = setup(Duration::from_millis(1), 1_000_000).await;

    let (activated, stopped) = toggle_storm(&scheduler, id, false).await;

    assert!(scheduler.active_count() <= 1);
    let active = scheduler.is_active(&id);
    assert_eq!(activated, stopped + usize::from(active));
    assert_eq!(host.flying(&id).unwrap_or(false), active);

    scheduler.shutdown().await;
    assert!(!scheduler.is_active(&id));
    assert_ne!(host.flying(&id), Some(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_toggles_with_shutdown_end_grounded() {
    let (scheduler, host, id) = setup(Duration::from_millis(1), 1_000_000).await;

    let (activated, stopped) = toggle_storm(&scheduler, id, true).await;

    assert_eq!(scheduler.active_count(), 0);
    assert_eq!(activated, stopped);
    assert_ne!(host.flying(&id), Some(true));
    assert_eq!(scheduler.activate(&id).await, Activation::ShuttingDown);
}
