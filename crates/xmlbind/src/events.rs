//! Change and vetoable-change notification.
//!
//! Events originate at a binding slot, carry the full path name of the
//! element (or attribute) that changed, and propagate from the origin
//! property up through every ancestor bean to the graph root. A batch
//! scope ([`Graph::batch`]) queues events raised inside it and flushes
//! them in order when the outermost scope ends, so multi-step operations
//! (whole-array replace, merge application) never publish intermediate
//! states.

use std::mem;

use crate::graph::Graph;
use crate::value::{BeanId, Value};

/// A property (or attribute) change, named by its canonical path.
#[derive(Debug, Clone)]
pub struct PropertyChangeEvent {
    /// Canonical path name, e.g. `/Book/Chapter.1a/Line` or `/Book:lang`.
    pub path: String,
    /// Bean name of the changed property.
    pub property: String,
    /// Position in the sequence for indexed properties.
    pub index: Option<usize>,
    /// Permanent slot identity for indexed properties.
    pub slot_id: Option<u64>,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Handle returned by listener registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(pub(crate) u64);

pub(crate) type ChangeListener = Box<dyn FnMut(&PropertyChangeEvent)>;
pub(crate) type VetoListener = Box<dyn Fn(&PropertyChangeEvent) -> Result<(), String>>;

impl Graph {
    /// Run `f` with change notification delayed; queued events flush when
    /// the outermost batch ends.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Graph) -> R) -> R {
        self.delay += 1;
        let out = f(self);
        self.delay -= 1;
        if self.delay == 0 {
            self.flush_events();
        }
        out
    }

    pub(crate) fn emit(&mut self, origin: BeanId, prop_idx: Option<usize>, event: PropertyChangeEvent) {
        log::trace!("event {} ({:?} -> {:?})", event.path, event.old, event.new);
        if self.delay > 0 {
            self.queued.push((origin, prop_idx, event));
        } else {
            self.deliver(origin, prop_idx, &event);
        }
    }

    pub(crate) fn flush_events(&mut self) {
        let queued = mem::take(&mut self.queued);
        for (bean, prop_idx, event) in queued {
            self.deliver(bean, prop_idx, &event);
        }
    }

    /// Synchronous delivery: the origin property's listeners first, then
    /// each bean on the ancestor chain (its own listeners, then the
    /// listeners of the property anchoring it in its parent).
    fn deliver(&mut self, origin: BeanId, prop_idx: Option<usize>, event: &PropertyChangeEvent) {
        if let Some(prop_idx) = prop_idx {
            self.fire_prop_listeners(origin, prop_idx, event);
        }
        let mut cur = Some(origin);
        while let Some(bean) = cur {
            self.fire_bean_listeners(bean, event);
            let link = self.bean(bean).parent;
            if let Some(link) = link {
                self.fire_prop_listeners(link.bean, link.prop, event);
            }
            cur = link.map(|l| l.bean);
        }
    }

    fn fire_prop_listeners(&mut self, bean: BeanId, prop_idx: usize, event: &PropertyChangeEvent) {
        let mut taken = mem::take(&mut self.bean_mut(bean).props[prop_idx].change_listeners);
        for (_, listener) in taken.iter_mut() {
            listener(event);
        }
        // Listeners registered by a callback while we fired stay behind the
        // restored originals.
        let registry = &mut self.bean_mut(bean).props[prop_idx].change_listeners;
        let added = mem::replace(registry, taken);
        registry.extend(added);
    }

    fn fire_bean_listeners(&mut self, bean: BeanId, event: &PropertyChangeEvent) {
        let mut taken = mem::take(&mut self.bean_mut(bean).listeners);
        for (_, listener) in taken.iter_mut() {
            listener(event);
        }
        let registry = &mut self.bean_mut(bean).listeners;
        let added = mem::replace(registry, taken);
        registry.extend(added);
    }

    /// Ask every veto listener on the origin property and the ancestor
    /// chain whether the mutation may proceed. Nothing has been mutated
    /// when this is called.
    pub(crate) fn check_veto(
        &self,
        origin: BeanId,
        prop_idx: Option<usize>,
        event: &PropertyChangeEvent,
    ) -> Result<(), String> {
        if let Some(prop_idx) = prop_idx {
            for (_, veto) in &self.bean(origin).props[prop_idx].veto_listeners {
                veto(event)?;
            }
        }
        let mut cur = self.bean(origin).parent;
        while let Some(link) = cur {
            for (_, veto) in &self.bean(link.bean).props[link.prop].veto_listeners {
                veto(event)?;
            }
            cur = self.bean(link.bean).parent;
        }
        Ok(())
    }
}
