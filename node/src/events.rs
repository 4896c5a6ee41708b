//! The block lifecycle listener bus.
//!
//! Listeners subscribe per event and are dispatched synchronously, in
//! registration order, on the thread performing the chain transition.
//! Within a single block's application the order is fixed:
//! `BeforeBlockAccept` → store write → `BeforeBlockApply` → apply →
//! `AfterBlockApply` → `BlockPushed`.
//!
//! Subscriber lists are copy-on-write so listeners can be registered while
//! dispatch is in progress. A panicking listener propagates to the caller;
//! inside `push_block` the surrounding store transaction rolls back and the
//! head is restored, so a broken listener cannot corrupt an in-progress
//! transition.

use ignis_chain::Block;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Block lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockEvent {
    BlockPushed,
    BlockPopped,
    BlockGenerated,
    BlockScanned,
    BeforeBlockAccept,
    BeforeBlockApply,
    AfterBlockApply,
    RescanBegin,
    RescanEnd,
}

/// Handle returned by [`BlockListeners::add`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Block) + Send + Sync>;

#[derive(Default)]
pub struct BlockListeners {
    lists: RwLock<HashMap<BlockEvent, Arc<Vec<(u64, Listener)>>>>,
    next_id: AtomicU64,
}

impl BlockListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an event. Listeners fire in registration order.
    pub fn add(
        &self,
        event: BlockEvent,
        listener: impl Fn(&Block) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut lists = self.lists.write().unwrap();
        let entry = lists.entry(event).or_default();
        let mut next = (**entry).clone();
        next.push((id, Arc::new(listener)));
        *entry = Arc::new(next);
        ListenerId(id)
    }

    /// Unsubscribe. Returns `false` when the listener was not registered for
    /// the event.
    pub fn remove(&self, event: BlockEvent, id: ListenerId) -> bool {
        let mut lists = self.lists.write().unwrap();
        let Some(entry) = lists.get_mut(&event) else {
            return false;
        };
        if !entry.iter().any(|(lid, _)| *lid == id.0) {
            return false;
        }
        let next: Vec<_> = entry
            .iter()
            .filter(|(lid, _)| *lid != id.0)
            .cloned()
            .collect();
        *entry = Arc::new(next);
        true
    }

    /// Dispatch an event to its subscribers.
    pub fn notify(&self, event: BlockEvent, block: &Block) {
        let snapshot = self.lists.read().unwrap().get(&event).cloned();
        if let Some(listeners) = snapshot {
            for (_, listener) in listeners.iter() {
                listener(block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_chain::genesis::create_genesis_block;
    use ignis_types::ChainParams;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn block() -> Block {
        create_genesis_block(&ChainParams::dev()).unwrap()
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let bus = BlockListeners::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        bus.add(BlockEvent::BlockPushed, move |_| o1.lock().unwrap().push(1));
        let o2 = Arc::clone(&order);
        bus.add(BlockEvent::BlockPushed, move |_| o2.lock().unwrap().push(2));

        bus.notify(BlockEvent::BlockPushed, &block());
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn events_are_independent() {
        let bus = BlockListeners::new();
        let pushed = Arc::new(AtomicUsize::new(0));
        let popped = Arc::new(AtomicUsize::new(0));

        let p = Arc::clone(&pushed);
        bus.add(BlockEvent::BlockPushed, move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });
        let q = Arc::clone(&popped);
        bus.add(BlockEvent::BlockPopped, move |_| {
            q.fetch_add(1, Ordering::SeqCst);
        });

        bus.notify(BlockEvent::BlockPushed, &block());
        assert_eq!(pushed.load(Ordering::SeqCst), 1);
        assert_eq!(popped.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removal_by_id() {
        let bus = BlockListeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let id = bus.add(BlockEvent::BlockScanned, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.notify(BlockEvent::BlockScanned, &block());
        assert!(bus.remove(BlockEvent::BlockScanned, id));
        bus.notify(BlockEvent::BlockScanned, &block());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Second removal reports absence.
        assert!(!bus.remove(BlockEvent::BlockScanned, id));
    }

    #[test]
    fn registration_during_dispatch_does_not_deadlock() {
        let bus = Arc::new(BlockListeners::new());
        let bus_c = Arc::clone(&bus);
        bus.add(BlockEvent::RescanBegin, move |_| {
            bus_c.add(BlockEvent::RescanEnd, |_| {});
        });
        bus.notify(BlockEvent::RescanBegin, &block());
    }

    #[test]
    fn notify_without_listeners_is_noop() {
        let bus = BlockListeners::new();
        bus.notify(BlockEvent::RescanEnd, &block());
    }
}
