//! # VM Registry
//!
//! Processes promoted to "virtual machines" are looked up by process id.
//! The registry only stores handles; it owns neither the processes nor
//! their address spaces.

use kernel_hashmap::KeyedMap;

/// Opaque reference to a process control block, owned by the scheduler.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProcessHandle(pub usize);

pub struct VmRegistry {
    processes: KeyedMap<ProcessHandle>,
}

impl VmRegistry {
    /// # Panics
    /// If `buckets` is zero.
    #[must_use]
    pub fn new(buckets: usize) -> Self {
        Self {
            processes: KeyedMap::named("vm registry", buckets),
        }
    }

    /// Register `pid`. Returns the handle it replaced, if any.
    pub fn promote(&self, pid: u64, handle: ProcessHandle) -> Option<ProcessHandle> {
        log::debug!("vm registry: promote pid {pid}");
        self.processes.put(pid, handle)
    }

    /// Unregister `pid`. Returns its handle, if it was registered.
    pub fn demote(&self, pid: u64) -> Option<ProcessHandle> {
        log::debug!("vm registry: demote pid {pid}");
        self.processes.delete(pid)
    }

    #[must_use]
    pub fn lookup(&self, pid: u64) -> Option<ProcessHandle> {
        self.processes.get(pid)
    }

    /// Visit every registered process under the registry lock.
    pub fn for_each(&self, mut visit: impl FnMut(u64, ProcessHandle)) {
        self.processes.for_each(|pid, handle| visit(pid, *handle));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}
