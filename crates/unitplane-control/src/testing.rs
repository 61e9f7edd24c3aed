//! Shared fixtures for the crate's tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use unitplane_agent::{LifecycleManager, SimulatedWork, WorkDurations, Worker, WorkerHandle};
use unitplane_core::{HostId, UnitId};
use unitplane_mediator::{LocalMediator, Mediator};
use unitplane_store::{RocksStore, Unit, UnitState};

pub fn test_mediator() -> (Arc<dyn Mediator>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();
    (Arc::new(LocalMediator::new(Arc::new(store))), dir)
}

pub fn spawn_worker(mediator: Arc<dyn Mediator>, host: &str, work_ms: u64) -> WorkerHandle {
    let work = SimulatedWork::new(WorkDurations::uniform(Duration::from_millis(work_ms)));
    let manager = LifecycleManager::new(mediator, HostId::new(host).unwrap(), Arc::new(work));
    let (handle, _join) = Worker::spawn(Arc::new(manager), 64);
    handle
}

pub async fn wait_for_state(mediator: &Arc<dyn Mediator>, id: &UnitId, state: UnitState) -> Unit {
    for _ in 0..300 {
        let unit = mediator.get_by_id(id).await.unwrap();
        if unit.state == state && unit.task_state.is_none() {
            return unit;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("unit {id} never reached {state}");
}
