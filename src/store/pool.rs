use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

use super::StoreError;

/// Fixed set of client slots. A slot is opened the first time a caller finds
/// every opened slot busy, so the number of live clients follows actual
/// concurrency rather than the configured pool size.
pub(crate) struct LazyPool<C> {
    slots: Vec<Mutex<Option<C>>>,
    next: AtomicUsize,
}

impl<C> LazyPool<C> {
    /// Creates a pool of `size` slots with `first` already in slot 0.
    pub(crate) fn new(size: usize, first: C) -> Self {
        let mut slots = Vec::with_capacity(size.max(1));
        slots.push(Mutex::new(Some(first)));
        slots.resize_with(size.max(1), || Mutex::new(None));
        Self {
            slots,
            next: AtomicUsize::new(0),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn opened(&self) -> usize {
        self.slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    /// Runs `f` on a free client, calling `open` when the chosen slot is
    /// still empty.
    pub(crate) fn with<T>(
        &self,
        open: impl FnOnce() -> Result<C, StoreError>,
        f: impl FnOnce(&mut C) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.acquire();
        let mut client = match guard.take() {
            Some(client) => client,
            None => open()?,
        };
        let result = f(&mut client);
        *guard = Some(client);
        result
    }

    fn acquire(&self) -> MutexGuard<'_, Option<C>> {
        // Opened slots first, then empty ones, then wait on one in turn.
        if let Some(guard) = self
            .slots
            .iter()
            .filter_map(|slot| slot.try_lock())
            .find(|guard| guard.is_some())
        {
            return guard;
        }
        if let Some(guard) = self.slots.iter().find_map(|slot| slot.try_lock()) {
            return guard;
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        self.slots[slot].lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    fn counting_open(opened: &AtomicUsize) -> impl FnOnce() -> Result<usize, StoreError> + '_ {
        move || Ok(opened.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[test]
    fn sequential_use_never_opens_extra_clients() {
        let pool = LazyPool::new(16, 0usize);
        let opens = AtomicUsize::new(0);
        for _ in 0..50 {
            let id = pool
                .with(counting_open(&opens), |client| Ok(*client))
                .expect("run");
            assert_eq!(id, 0);
        }
        assert_eq!(opens.load(Ordering::SeqCst), 0);
        assert_eq!(pool.size(), 16);
        assert_eq!(pool.opened(), 1);
    }

    #[test]
    fn busy_slots_open_one_more_client() {
        let pool = LazyPool::new(4, 0usize);
        let opens = AtomicUsize::new(0);
        let (outer, inner) = pool
            .with(counting_open(&opens), |outer| {
                let inner = pool.with(counting_open(&opens), |inner| Ok(*inner))?;
                Ok((*outer, inner))
            })
            .expect("run");
        assert_eq!((outer, inner), (0, 1));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(pool.opened(), 2);
    }

    #[test]
    fn failed_open_leaves_slot_empty() {
        let pool = LazyPool::new(2, 0usize);
        let result = pool.with(counting_open(&AtomicUsize::new(0)), |_| {
            pool.with(
                || Err(StoreError::connect(Dialect::Postgres, "refused")),
                |_| Ok(()),
            )
        });
        assert!(matches!(result, Err(StoreError::Connect { .. })));
        assert_eq!(pool.opened(), 1);
    }
}
