//! Child Store Module
//!
//! Per-scope-holder object table. A store is created active and destroyed
//! exactly once; after that it rejects every lookup and creation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::scope::destroyer::{destroy_quietly, Destroyer};
use crate::scope::stats::ScopeCounters;

/// One object and whether its destroy callback has run.
struct ObjectSlot<T> {
    value: OnceLock<T>,
    destroyed: AtomicBool,
}

impl<T> ObjectSlot<T> {
    fn new() -> Self {
        Self {
            value: OnceLock::new(),
            destroyed: AtomicBool::new(false),
        }
    }
}

struct Objects<T> {
    slots: HashMap<String, Arc<ObjectSlot<T>>>,
    destroyed: bool,
}

// == Child Store ==
/// Objects owned by one scope holder.
///
/// The table lock is only held to find or add a slot. Objects are built
/// through the slot's own once-cell, so a factory may create other objects of
/// the same scope, and two callers asking for the same object get one build.
pub struct ChildStore<T> {
    objects: Mutex<Objects<T>>,
    destroyer: Arc<dyn Destroyer<T>>,
    counters: Arc<ScopeCounters>,
}

impl<T: Clone> ChildStore<T> {
    pub(crate) fn new(destroyer: Arc<dyn Destroyer<T>>, counters: Arc<ScopeCounters>) -> Self {
        Self {
            objects: Mutex::new(Objects {
                slots: HashMap::new(),
                destroyed: false,
            }),
            destroyer,
            counters,
        }
    }

    /// Returns the object if it exists and the store is still active.
    pub fn get(&self, object_id: &str) -> Option<T> {
        let objects = self.objects.lock();
        if objects.destroyed {
            return None;
        }
        objects
            .slots
            .get(object_id)
            .and_then(|slot| slot.value.get().cloned())
    }

    /// Returns the object, building it with `factory` on first request.
    ///
    /// Returns None if the store is destroyed before or while the object is
    /// built; an object finished after destruction is destroyed here.
    pub fn get_or_create<F>(&self, object_id: &str, factory: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        let slot = {
            let mut objects = self.objects.lock();
            if objects.destroyed {
                return None;
            }
            match objects.slots.get(object_id) {
                Some(slot) => Arc::clone(slot),
                None => {
                    let slot = Arc::new(ObjectSlot::new());
                    objects
                        .slots
                        .insert(object_id.to_string(), Arc::clone(&slot));
                    slot
                }
            }
        };

        let object = slot.value.get_or_init(factory).clone();

        if self.objects.lock().destroyed {
            // destroy_all may have run before the value was set
            self.destroy_slot(object_id, &slot);
            return None;
        }
        Some(object)
    }

    /// Runs the destroyer for a built object unless it already ran.
    fn destroy_slot(&self, object_id: &str, slot: &ObjectSlot<T>) -> bool {
        match slot.value.get() {
            Some(object) if !slot.destroyed.swap(true, Ordering::AcqRel) => {
                let succeeded = destroy_quietly(self.destroyer.as_ref(), object_id, object);
                self.counters.record_destroyed(succeeded);
                true
            }
            _ => false,
        }
    }

    /// Destroys every object and deactivates the store.
    ///
    /// Returns how many objects were handed to the destroyer by this call.
    /// Later calls are no-ops.
    pub fn destroy_all(&self) -> usize {
        let slots = {
            let mut objects = self.objects.lock();
            objects.destroyed = true;
            std::mem::take(&mut objects.slots)
        };

        slots
            .iter()
            .filter(|(object_id, slot)| self.destroy_slot(object_id, slot))
            .count()
    }

    pub fn is_destroyed(&self) -> bool {
        self.objects.lock().destroyed
    }

    /// Number of object slots, including objects still being built.
    pub fn len(&self) -> usize {
        self.objects.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for ChildStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let objects = self.objects.lock();
        f.debug_struct("ChildStore")
            .field("objects", &objects.slots.len())
            .field("destroyed", &objects.destroyed)
            .finish()
    }
}
