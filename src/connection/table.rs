//! Object table: two dense slot collections, one per id namespace.
//!
//! Slot index is `id - namespace base`. Freed ids queue up FIFO per
//! namespace and are handed out again before any fresh id. Destroyed
//! instances are parked in a recycle pool under the id they last held.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{Result, WaywireError};
use crate::object::Object;
use crate::protocol::Namespace;

/// Slots for one namespace.
struct Slots {
    namespace: Namespace,
    slots: Vec<Option<Arc<dyn Object>>>,
    free: VecDeque<u32>,
}

impl Slots {
    fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            slots: Vec::new(),
            free: VecDeque::new(),
        }
    }

    #[inline]
    fn index(&self, id: u32) -> usize {
        (id - self.namespace.base()) as usize
    }

    fn get(&self, id: u32) -> Option<&Arc<dyn Object>> {
        self.slots.get(self.index(id)).and_then(Option::as_ref)
    }

    fn is_live(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Next id: oldest freed first, else one past the highest slot.
    fn allocate(&mut self) -> Result<u32> {
        while let Some(id) = self.free.pop_front() {
            // A freed id may have been claimed through an explicit set
            if !self.is_live(id) {
                return Ok(id);
            }
        }

        let id = self.namespace.base() as u64 + self.slots.len() as u64;
        if id > self.namespace.max() as u64 {
            return Err(WaywireError::IdOutOfRange(id as u32));
        }
        Ok(id as u32)
    }

    /// The peer hands out its ids in order, so a remote id may land at most
    /// one past the highest remote slot.
    fn check_reach(&self, id: u32) -> Result<()> {
        if self.namespace == Namespace::Remote && self.index(id) > self.slots.len() {
            return Err(WaywireError::Protocol(format!(
                "remote id {:#x} skips past next remote id {:#x}",
                id,
                self.namespace.base() as u64 + self.slots.len() as u64
            )));
        }
        Ok(())
    }

    fn set(&mut self, id: u32, object: Option<Arc<dyn Object>>) -> Option<Arc<dyn Object>> {
        let index = self.index(id);
        if index >= self.slots.len() {
            // Ids skipped over by an explicit set stay allocatable
            if self.namespace == Namespace::Local {
                let first_skipped = self.namespace.base() + self.slots.len() as u32;
                self.free.extend(first_skipped..id);
            }
            self.slots.resize_with(index + 1, || None);
        }
        std::mem::replace(&mut self.slots[index], object)
    }

    fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Live objects of one connection, addressed by id.
pub struct ObjectTable {
    local: Slots,
    remote: Slots,
    pool: HashMap<u32, Arc<dyn Object>>,
    retired: HashSet<u32>,
}

impl ObjectTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            local: Slots::new(Namespace::Local),
            remote: Slots::new(Namespace::Remote),
            pool: HashMap::new(),
            retired: HashSet::new(),
        }
    }

    fn slots(&self, id: u32) -> Result<&Slots> {
        match Namespace::of(id) {
            Some(Namespace::Local) => Ok(&self.local),
            Some(Namespace::Remote) => Ok(&self.remote),
            None => Err(WaywireError::UnknownNamespace(id)),
        }
    }

    fn slots_mut(&mut self, id: u32) -> Result<&mut Slots> {
        match Namespace::of(id) {
            Some(Namespace::Local) => Ok(&mut self.local),
            Some(Namespace::Remote) => Ok(&mut self.remote),
            None => Err(WaywireError::UnknownNamespace(id)),
        }
    }

    /// Reserve the next local id. The caller must fill the slot.
    pub fn allocate_local(&mut self) -> Result<u32> {
        self.local.allocate()
    }

    /// Live object at `id`, if any. Ids in neither namespace yield `None`.
    pub fn get(&self, id: u32) -> Option<Arc<dyn Object>> {
        self.slots(id).ok()?.get(id).cloned()
    }

    /// Whether `id` holds a live object.
    pub fn is_live(&self, id: u32) -> bool {
        self.slots(id).map(|s| s.is_live(id)).unwrap_or(false)
    }

    /// Put `object` at `id`, returning whatever was there.
    pub fn set(&mut self, id: u32, object: Arc<dyn Object>) -> Result<Option<Arc<dyn Object>>> {
        let slots = self.slots_mut(id)?;
        slots.check_reach(id)?;
        Ok(slots.set(id, Some(object)))
    }

    /// Put `object` at `id`, failing if the slot is live.
    pub fn insert(&mut self, id: u32, object: Arc<dyn Object>) -> Result<()> {
        let slots = self.slots_mut(id)?;
        if slots.is_live(id) {
            return Err(WaywireError::SlotOccupied(id));
        }
        slots.check_reach(id)?;
        slots.set(id, Some(object));
        Ok(())
    }

    /// Empty the slot at `id`, free the id and pool the instance.
    pub fn remove(&mut self, id: u32) -> Result<()> {
        let slots = self.slots_mut(id)?;
        if !slots.is_live(id) {
            return Err(WaywireError::NotLive(id));
        }
        let index = slots.index(id);
        let Some(object) = slots.slots[index].take() else {
            return Err(WaywireError::NotLive(id));
        };
        // Only local ids are ever allocated here
        if slots.namespace == Namespace::Local {
            slots.free.push_back(id);
        }
        self.retired.remove(&id);
        self.pool.insert(id, object);
        Ok(())
    }

    /// Take the instance last destroyed at `id` out of the pool.
    pub fn take_pooled(&mut self, id: u32) -> Option<Arc<dyn Object>> {
        self.pool.remove(&id)
    }

    /// Mark a live object as awaiting the peer's delete acknowledgement.
    pub fn retire(&mut self, id: u32) -> Result<()> {
        if !self.slots(id)?.is_live(id) {
            return Err(WaywireError::NotLive(id));
        }
        self.retired.insert(id);
        Ok(())
    }

    /// Whether `id` was retired and still waits for its acknowledgement.
    pub fn is_retired(&self, id: u32) -> bool {
        self.retired.contains(&id)
    }

    /// Number of live objects across both namespaces.
    pub fn live(&self) -> usize {
        self.local.live() + self.remote.live()
    }

    /// Number of pooled instances.
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Number of freed ids waiting in `namespace`'s free list.
    pub fn free_ids(&self, namespace: Namespace) -> usize {
        match namespace {
            Namespace::Local => self.local.free.len(),
            Namespace::Remote => self.remote.free.len(),
        }
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectData, Proxy};
    use crate::protocol::{LOCAL_ID_BASE, REMOTE_ID_BASE, WL_CALLBACK};
    use std::sync::Weak;

    fn proxy(id: u32) -> Arc<dyn Object> {
        Arc::new(Proxy::new(
            ObjectData {
                id,
                version: 1,
                connection: Weak::new(),
            },
            &WL_CALLBACK,
        ))
    }

    fn fill(table: &mut ObjectTable, n: usize) -> Vec<u32> {
        (0..n)
            .map(|_| {
                let id = table.allocate_local().unwrap();
                table.insert(id, proxy(id)).unwrap();
                id
            })
            .collect()
    }

    #[test]
    fn test_sequential_allocation_starts_at_base() {
        let mut table = ObjectTable::new();
        assert_eq!(fill(&mut table, 3), vec![1, 2, 3]);
        assert_eq!(table.live(), 3);
    }

    #[test]
    fn test_freed_ids_are_reused_oldest_first() {
        let mut table = ObjectTable::new();
        fill(&mut table, 5);

        table.remove(4).unwrap();
        table.remove(2).unwrap();

        assert_eq!(fill(&mut table, 3), vec![4, 2, 6]);
    }

    #[test]
    fn test_remove_twice_is_not_live() {
        let mut table = ObjectTable::new();
        fill(&mut table, 1);

        table.remove(1).unwrap();
        assert!(matches!(table.remove(1), Err(WaywireError::NotLive(1))));

        // Freed once, handed out once
        assert_eq!(table.allocate_local().unwrap(), 1);
        assert_eq!(table.allocate_local().unwrap(), 2);
    }

    #[test]
    fn test_null_id_has_no_namespace() {
        let mut table = ObjectTable::new();
        assert!(table.get(0).is_none());
        assert!(matches!(
            table.remove(0),
            Err(WaywireError::UnknownNamespace(0))
        ));
        assert!(matches!(
            table.insert(0, proxy(0)),
            Err(WaywireError::UnknownNamespace(0))
        ));
    }

    #[test]
    fn test_remote_ids_live_in_their_own_slots() {
        let mut table = ObjectTable::new();
        fill(&mut table, 1);
        table.insert(REMOTE_ID_BASE, proxy(REMOTE_ID_BASE)).unwrap();

        assert_eq!(table.get(REMOTE_ID_BASE).unwrap().id(), REMOTE_ID_BASE);
        assert_eq!(table.get(LOCAL_ID_BASE).unwrap().id(), LOCAL_ID_BASE);
        assert!(table.get(REMOTE_ID_BASE + 1).is_none());
        assert_eq!(table.live(), 2);
    }

    #[test]
    fn test_insert_into_live_slot_fails() {
        let mut table = ObjectTable::new();
        table.insert(REMOTE_ID_BASE, proxy(REMOTE_ID_BASE)).unwrap();
        assert!(matches!(
            table.insert(REMOTE_ID_BASE, proxy(REMOTE_ID_BASE)),
            Err(WaywireError::SlotOccupied(id)) if id == REMOTE_ID_BASE
        ));
    }

    #[test]
    fn test_set_past_the_end_keeps_skipped_ids_allocatable() {
        let mut table = ObjectTable::new();
        table.set(3, proxy(3)).unwrap();
        assert_eq!(fill(&mut table, 3), vec![1, 2, 4]);
    }

    #[test]
    fn test_destroyed_instance_is_pooled_by_id() {
        let mut table = ObjectTable::new();
        fill(&mut table, 2);
        table.remove(2).unwrap();

        assert_eq!(table.pooled(), 1);
        assert!(table.take_pooled(1).is_none());
        assert_eq!(table.take_pooled(2).unwrap().id(), 2);
        assert_eq!(table.pooled(), 0);
    }

    #[test]
    fn test_retire_until_removed() {
        let mut table = ObjectTable::new();
        fill(&mut table, 1);

        table.retire(1).unwrap();
        assert!(table.is_retired(1));
        assert!(table.is_live(1));

        table.remove(1).unwrap();
        assert!(!table.is_retired(1));
        assert!(matches!(table.retire(1), Err(WaywireError::NotLive(1))));
    }

    #[test]
    fn test_remote_ids_are_not_queued_for_reuse() {
        let mut table = ObjectTable::new();
        for round in 0..3 {
            table.insert(REMOTE_ID_BASE, proxy(REMOTE_ID_BASE)).unwrap();
            table.insert(REMOTE_ID_BASE + 1, proxy(REMOTE_ID_BASE + 1)).unwrap();
            table.remove(REMOTE_ID_BASE).unwrap();
            table.remove(REMOTE_ID_BASE + 1).unwrap();
            assert_eq!(table.free_ids(Namespace::Remote), 0, "round {}", round);
        }
        assert_eq!(table.free_ids(Namespace::Local), 0);
    }

    #[test]
    fn test_remote_id_cannot_skip_ahead() {
        let mut table = ObjectTable::new();
        assert!(matches!(
            table.insert(REMOTE_ID_BASE + 1, proxy(REMOTE_ID_BASE + 1)),
            Err(WaywireError::Protocol(_))
        ));
        assert!(matches!(
            table.set(0xFFFF_FFFF, proxy(0xFFFF_FFFF)),
            Err(WaywireError::Protocol(_))
        ));
        assert_eq!(table.live(), 0);

        table.insert(REMOTE_ID_BASE, proxy(REMOTE_ID_BASE)).unwrap();
        table.insert(REMOTE_ID_BASE + 1, proxy(REMOTE_ID_BASE + 1)).unwrap();
        assert_eq!(table.live(), 2);
    }

    #[test]
    fn test_remove_unknown_id_does_not_grow_table() {
        let mut table = ObjectTable::new();
        assert!(matches!(table.remove(40), Err(WaywireError::NotLive(40))));
        assert_eq!(table.allocate_local().unwrap(), 1);
    }
}
