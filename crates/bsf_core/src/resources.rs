//! # Resources
//!
//! Loadable assets (shaders, textures, buffers) are referenced through
//! handles. A handle exists before its resource is loaded; the sync layer
//! converts an unloaded handle into a null core pointer.
//!
//! The [`Resources`] registry is an explicit service passed to whoever needs
//! it. There is no global instance.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Identifier of a resource slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

struct Slot<R> {
    id: ResourceId,
    name: String,
    value: RwLock<Option<Arc<R>>>,
}

/// Shared handle to a resource that may or may not be loaded.
pub struct ResourceHandle<R> {
    slot: Arc<Slot<R>>,
}

impl<R> Clone for ResourceHandle<R> {
    fn clone(&self) -> Self {
        Self { slot: Arc::clone(&self.slot) }
    }
}

impl<R> PartialEq for ResourceHandle<R> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<R> Eq for ResourceHandle<R> {}

impl<R> fmt::Debug for ResourceHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.slot.id)
            .field("name", &self.slot.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<R> ResourceHandle<R> {
    fn new(id: ResourceId, name: String) -> Self {
        Self { slot: Arc::new(Slot { id, name, value: RwLock::new(None) }) }
    }

    /// Creates a handle that is already loaded and not tracked by a registry.
    #[must_use]
    pub fn loaded(name: impl Into<String>, value: R) -> Self {
        let handle = Self::new(ResourceId(0), name.into());
        *handle.slot.value.write() = Some(Arc::new(value));
        handle
    }

    /// Slot id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.slot.id
    }

    /// Resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Returns true if the resource is loaded. Never triggers a load.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.slot.value.read().is_some()
    }

    /// Returns the loaded resource, if any. Never triggers a load.
    #[must_use]
    pub fn get(&self) -> Option<Arc<R>> {
        self.slot.value.read().clone()
    }
}

type LoadListener = Box<dyn Fn(ResourceId) + Send + Sync>;

/// Registry of resource slots.
#[derive(Default)]
pub struct Resources {
    next_id: AtomicU64,
    by_name: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
    listeners: Mutex<Vec<LoadListener>>,
}

impl Resources {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle registered under `name`, creating an unloaded one
    /// if none exists.
    ///
    /// # Panics
    ///
    /// Panics if `name` was registered with a different resource type.
    pub fn handle<R: Send + Sync + 'static>(&self, name: &str) -> ResourceHandle<R> {
        if let Some(existing) = self.find::<R>(name) {
            return existing;
        }

        let mut by_name = self.by_name.write();
        let entry = by_name.entry(name.to_string()).or_insert_with(|| {
            let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
            let handle: Box<dyn Any + Send + Sync> =
                Box::new(ResourceHandle::<R>::new(id, name.to_string()));
            handle
        });
        match entry.downcast_ref::<ResourceHandle<R>>() {
            Some(handle) => handle.clone(),
            None => panic!("Resource '{name}' registered with a different type"),
        }
    }

    /// Returns the handle registered under `name`, if it has type `R`.
    #[must_use]
    pub fn find<R: Send + Sync + 'static>(&self, name: &str) -> Option<ResourceHandle<R>> {
        self.by_name
            .read()
            .get(name)
            .and_then(|entry| entry.downcast_ref::<ResourceHandle<R>>())
            .cloned()
    }

    /// Stores `value` in the handle's slot and notifies load listeners.
    pub fn load<R>(&self, handle: &ResourceHandle<R>, value: R) {
        *handle.slot.value.write() = Some(Arc::new(value));
        tracing::debug!("Resource '{}' loaded", handle.name());

        for listener in self.listeners.lock().iter() {
            listener(handle.id());
        }
    }

    /// Empties the handle's slot. Existing core pointers stay valid.
    pub fn unload<R>(&self, handle: &ResourceHandle<R>) {
        handle.slot.value.write().take();
    }

    /// Registers a callback fired after every `load`.
    ///
    /// Listeners run on the loading thread while the listener list is locked,
    /// so they must not register further listeners.
    pub fn on_loaded(&self, listener: impl Fn(ResourceId) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("resources", &self.by_name.read().len())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_handle_is_shared_by_name() {
        let resources = Resources::new();
        let a = resources.handle::<String>("brick.png");
        let b = resources.handle::<String>("brick.png");
        assert_eq!(a, b);
        assert!(!a.is_loaded());

        resources.load(&a, "pixels".to_string());
        assert_eq!(b.get().as_deref().map(String::as_str), Some("pixels"));
    }

    #[test]
    fn test_unload_keeps_existing_pointers() {
        let resources = Resources::new();
        let handle = resources.handle::<u32>("lut");
        resources.load(&handle, 5);
        let core = handle.get().unwrap();

        resources.unload(&handle);
        assert!(handle.get().is_none());
        assert_eq!(*core, 5);
    }

    #[test]
    fn test_listeners_fire_on_load() {
        let resources = Resources::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        resources.on_loaded(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let handle = resources.handle::<u8>("a");
        resources.load(&handle, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "different type")]
    fn test_type_mismatch_panics() {
        let resources = Resources::new();
        let _ = resources.handle::<u8>("x");
        let _ = resources.handle::<u16>("x");
    }
}
