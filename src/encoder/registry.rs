use crate::utils::process::terminate;
use std::collections::HashMap;
use std::process::Child;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Shared handle to a running subprocess
pub type SharedChild = Arc<Mutex<Child>>;

/// Lock a shared child, recovering from a poisoned lock
pub fn lock_child(child: &SharedChild) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Encoder processes currently running, keyed by job id
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<HashMap<Uuid, SharedChild>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SharedChild>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: Uuid, child: Child) -> SharedChild {
        let child = Arc::new(Mutex::new(child));
        self.lock().insert(id, child.clone());
        child
    }

    pub fn unregister(&self, id: &Uuid) {
        self.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Terminate every registered process and empty the registry
    pub fn terminate_all(&self, grace: Duration) {
        let children: Vec<(Uuid, SharedChild)> = self.lock().drain().collect();
        if children.is_empty() {
            return;
        }

        info!("Terminating {} encoder process(es)", children.len());
        for (_, child) in children {
            terminate(&mut lock_child(&child), grace);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_terminate_all_kills_and_clears() {
        let registry = ProcessRegistry::new();
        let a = registry.register(Uuid::new_v4(), Command::new("sleep").arg("30").spawn().unwrap());
        let b = registry.register(Uuid::new_v4(), Command::new("sleep").arg("30").spawn().unwrap());
        assert_eq!(registry.len(), 2);

        registry.terminate_all(Duration::from_secs(1));

        assert!(registry.is_empty());
        assert!(lock_child(&a).try_wait().unwrap().is_some());
        assert!(lock_child(&b).try_wait().unwrap().is_some());
    }

    #[test]
    fn test_unregister_removes_entry() {
        let registry = ProcessRegistry::new();
        let id = Uuid::new_v4();
        let child = registry.register(id, Command::new("true").spawn().unwrap());
        registry.unregister(&id);
        assert!(registry.is_empty());
        let _ = lock_child(&child).wait();
    }
}
