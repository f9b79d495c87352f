// Double-buffered surface state. Protocol handlers mutate the `pending` half of a
// `CachedState<T>`; `wl_surface.commit` merges it into `current`. There is no transaction
// queue here: xdg-shell's own configure/ack handshake (in `wayland::shell::xdg`) is what
// defers when a *toplevel's* state change becomes visible to the client, not this cache.

use std::cell::{RefCell, RefMut};

use downcast_rs::{impl_downcast, Downcast};
use wayland_server::DisplayHandle;

/// Trait representing a value that can be used in double-buffered storage.
///
/// The type needs to implement [`Default`], used to initialize the storage, plus two
/// methods: [`Cacheable::commit`], invoked on `wl_surface.commit` to snapshot the pending
/// value, and [`Cacheable::merge_into`], invoked to fold that snapshot into the current
/// state.
pub trait Cacheable: Default {
    /// Produce a new state to be cached from the pending state.
    fn commit(&mut self, dh: &DisplayHandle) -> Self;
    /// Merge a state update into the current state.
    fn merge_into(self, into: &mut Self, dh: &DisplayHandle);
}

struct CachedState<T> {
    pending: T,
    current: T,
}

impl<T: Default> Default for CachedState<T> {
    fn default() -> Self {
        CachedState {
            pending: T::default(),
            current: T::default(),
        }
    }
}

trait Cache: Downcast {
    fn commit(&self, dh: &DisplayHandle);
}

impl_downcast!(Cache);

impl<T: Cacheable + 'static> Cache for RefCell<CachedState<T>> {
    fn commit(&self, dh: &DisplayHandle) {
        let mut guard = self.borrow_mut();
        let me = &mut *guard;
        let new_state = me.pending.commit(dh);
        new_state.merge_into(&mut me.current, dh);
    }
}

/// A typemap-like container for double-buffered values.
///
/// All values inserted into this container must implement [`Cacheable`], which defines
/// their buffering semantics. Consumers of surface state will mostly use
/// [`MultiCache::current`] to read the last-committed state of a surface; protocol handlers
/// will mostly use [`MultiCache::pending`] to stage new state from client requests.
///
/// This container has `RefCell`-like semantics: values of multiple stored types can be
/// accessed at the same time, and each is initialized lazily the first time `current()` or
/// `pending()` is invoked with that type as argument.
pub struct MultiCache {
    caches: appendlist::AppendList<Box<dyn Cache + Send>>,
}

impl std::fmt::Debug for MultiCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiCache").finish_non_exhaustive()
    }
}

impl MultiCache {
    pub(crate) fn new() -> Self {
        Self {
            caches: appendlist::AppendList::new(),
        }
    }

    fn find_or_insert<T: Cacheable + Send + 'static>(&self) -> &RefCell<CachedState<T>> {
        for cache in &self.caches {
            if let Some(v) = (**cache).as_any().downcast_ref() {
                return v;
            }
        }
        self.caches
            .push(Box::new(RefCell::new(CachedState::<T>::default())) as Box<_>);
        (*self.caches[self.caches.len() - 1])
            .as_any()
            .downcast_ref()
            .unwrap()
    }

    /// Access the pending state associated with type `T`.
    pub fn pending<T: Cacheable + Send + 'static>(&self) -> RefMut<'_, T> {
        RefMut::map(self.find_or_insert::<T>().borrow_mut(), |cs| &mut cs.pending)
    }

    /// Access the current state associated with type `T`.
    pub fn current<T: Cacheable + Send + 'static>(&self) -> RefMut<'_, T> {
        RefMut::map(self.find_or_insert::<T>().borrow_mut(), |cs| &mut cs.current)
    }

    /// Check if the container currently holds a value for type `T`.
    pub fn has<T: Cacheable + Send + 'static>(&self) -> bool {
        self.caches
            .iter()
            .any(|c| (**c).as_any().is::<RefCell<CachedState<T>>>())
    }

    /// Commit the pending state of every type stored in this container, merging each into
    /// its current state.
    pub(crate) fn commit(&self, dh: &DisplayHandle) {
        for cache in &self.caches {
            cache.commit(dh);
        }
    }
}
