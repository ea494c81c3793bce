//! DOM binding slots and attach/detach synchronization.
//!
//! Every occurrence of a property is held by one [`DomBinding`] slot. The
//! slot owns a permanent identity (a graph-wide counter value that survives
//! reordering), an optional DOM node, and caches that carry the value and
//! attributes whenever the slot has no node: before the owning bean is
//! attached, and again after it has been detached. Attaching replays the
//! caches into fresh DOM nodes; detaching reads the DOM back into them, so
//! a removed subtree can be re-added without losing state.

use std::mem;

use xmlbind_dom::NodeId;

use crate::flags::ValueKind;
use crate::graph::Graph;
use crate::value::{BeanId, Value};

/// One occurrence of a property, bound to a DOM node when attached.
#[derive(Debug)]
pub(crate) struct DomBinding {
    /// Permanent identity, unique within the graph, hex-printed in paths.
    pub(crate) id: u64,
    pub(crate) node: Option<NodeId>,
    /// Cached value; authoritative while `node` is `None`, and the only
    /// storage for booleans and sub-bean links.
    pub(crate) value: Option<Value>,
    /// Attribute values waiting for a node to land on.
    pub(crate) attr_cache: Vec<(String, String)>,
}

impl DomBinding {
    pub(crate) fn new(id: u64) -> DomBinding {
        DomBinding {
            id,
            node: None,
            value: None,
            attr_cache: Vec::new(),
        }
    }

    pub(crate) fn cache_attr(&mut self, name: &str, value: Option<&str>) {
        self.attr_cache.retain(|(k, _)| k != name);
        if let Some(value) = value {
            self.attr_cache.push((name.to_string(), value.to_string()));
        }
    }
}

/// Replace characters XML cannot carry in attribute values. Markup
/// characters are escaped by the writer; this only strips raw controls.
pub(crate) fn sanitize_attr_value(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') {
                '?'
            } else {
                c
            }
        })
        .collect()
}

impl Graph {
    /// DOM element bound to a bean: the document root for the root bean,
    /// otherwise the node of the slot anchoring it in its parent.
    pub(crate) fn node_of(&self, bean: BeanId) -> Option<NodeId> {
        let data = self.bean(bean);
        if data.is_root {
            return self.doc.root();
        }
        let link = data.parent?;
        self.bean(link.bean).props[link.prop]
            .slots
            .iter()
            .flatten()
            .find(|s| s.id == link.slot)?
            .node
    }

    pub(crate) fn is_attached(&self, bean: BeanId) -> bool {
        self.node_of(bean).is_some()
    }

    // ── Attach ────────────────────────────────────────────────────────────

    /// Materialize every slot of `bean` into the DOM. No-op while the bean
    /// itself has no element yet.
    pub(crate) fn attach_bean(&mut self, bean: BeanId) {
        for prop_idx in 0..self.bean(bean).props.len() {
            for slot_idx in 0..self.bean(bean).props[prop_idx].slots.len() {
                self.attach_slot(bean, prop_idx, slot_idx);
            }
        }
    }

    /// Create (or refresh) the DOM node for one slot, keeping schema order,
    /// then recurse into a sub-bean value.
    pub(crate) fn attach_slot(&mut self, bean: BeanId, prop_idx: usize, slot_idx: usize) {
        let parent_el = match self.node_of(bean) {
            Some(n) => n,
            None => return,
        };
        let flags = self.bean(bean).props[prop_idx].flags;
        let (existing, value) = match &self.bean(bean).props[prop_idx].slots[slot_idx] {
            Some(s) => (s.node, s.value.clone()),
            None => return,
        };

        match flags.kind() {
            ValueKind::Bean => {
                let node = existing
                    .unwrap_or_else(|| self.place_slot_node(parent_el, bean, prop_idx, slot_idx, false));
                self.flush_slot_attrs(bean, prop_idx, slot_idx, node);
                if let Some(Value::Bean(sub)) = value {
                    self.flush_bean_attrs(sub, node);
                    self.harvest_bean_attrs(sub, node);
                    self.attach_bean(sub);
                }
            }
            ValueKind::Comment => {
                if existing.is_none() {
                    let node = self.place_slot_node(parent_el, bean, prop_idx, slot_idx, true);
                    if let Some(text) = value.as_ref().and_then(Value::as_text) {
                        self.doc.set_text(node, text);
                    }
                }
            }
            ValueKind::Boolean => {
                let set = value.as_ref().and_then(Value::as_bool).unwrap_or(false);
                if set || flags.always_present() {
                    let node = existing.unwrap_or_else(|| {
                        self.place_slot_node(parent_el, bean, prop_idx, slot_idx, false)
                    });
                    if flags.always_present() {
                        self.doc
                            .set_text_content(node, if set { "true" } else { "false" });
                    }
                    self.flush_slot_attrs(bean, prop_idx, slot_idx, node);
                } else if let Some(node) = existing {
                    self.remove_node(node);
                    if let Some(slot) = &mut self.bean_mut(bean).props[prop_idx].slots[slot_idx] {
                        slot.node = None;
                    }
                }
            }
            ValueKind::Text | ValueKind::Int | ValueKind::Float => {
                let node = existing
                    .unwrap_or_else(|| self.place_slot_node(parent_el, bean, prop_idx, slot_idx, false));
                if let Some(wire) = value.as_ref().and_then(Value::to_wire) {
                    self.doc.set_text_content(node, &wire);
                }
                self.flush_slot_attrs(bean, prop_idx, slot_idx, node);
            }
        }
    }

    /// Create the slot's node and insert it where schema order dictates:
    /// right before the first attached node of any later occurrence.
    fn place_slot_node(
        &mut self,
        parent_el: NodeId,
        bean: BeanId,
        prop_idx: usize,
        slot_idx: usize,
        comment: bool,
    ) -> NodeId {
        let node = if comment {
            self.doc.create_comment("")
        } else {
            let name = self.bean(bean).props[prop_idx].dtd_name.clone();
            self.doc.create_element(&name)
        };
        match self.anchor_after(bean, prop_idx, slot_idx) {
            Some(before) => self.doc.insert_before(parent_el, node, before),
            None => self.doc.append_child(parent_el, node),
        }
        if let Some(slot) = &mut self.bean_mut(bean).props[prop_idx].slots[slot_idx] {
            slot.node = Some(node);
        }
        node
    }

    /// First attached DOM node that must come after the given slot: a later
    /// slot of the same property, or any slot of a later property.
    fn anchor_after(&self, bean: BeanId, prop_idx: usize, slot_idx: usize) -> Option<NodeId> {
        let data = self.bean(bean);
        for slot in data.props[prop_idx].slots.iter().skip(slot_idx + 1).flatten() {
            if let Some(n) = slot.node {
                return Some(n);
            }
        }
        for prop in data.props.iter().skip(prop_idx + 1) {
            for slot in prop.slots.iter().flatten() {
                if let Some(n) = slot.node {
                    return Some(n);
                }
            }
        }
        None
    }

    // ── Detach ────────────────────────────────────────────────────────────

    /// Unbind one slot from the DOM: cache its state, remove its node (with
    /// surrounding indentation), and record its position for `i<n>` paths.
    pub(crate) fn detach_slot(&mut self, bean: BeanId, prop_idx: usize, slot_idx: usize) {
        let (id, node, value) = match &self.bean(bean).props[prop_idx].slots[slot_idx] {
            Some(s) => (s.id, s.node, s.value.clone()),
            None => return,
        };
        self.bean_mut(bean).props[prop_idx]
            .removed
            .insert(id, slot_idx);
        if let Some(node) = node {
            self.cache_slot_state(bean, prop_idx, slot_idx, node);
        }
        if let Some(Value::Bean(sub)) = value {
            self.unbind_bean(sub, node);
        }
        if let Some(node) = node {
            self.remove_node(node);
            if let Some(slot) = &mut self.bean_mut(bean).props[prop_idx].slots[slot_idx] {
                slot.node = None;
            }
        }
    }

    /// Read the DOM state of a subtree back into caches and drop all node
    /// references, so the bean survives as a detached value.
    fn unbind_bean(&mut self, bean: BeanId, element: Option<NodeId>) {
        if let Some(element) = element {
            let attrs: Vec<(String, String)> = self
                .doc
                .attribute_names(element)
                .into_iter()
                .filter_map(|k| {
                    self.doc
                        .attribute(element, &k)
                        .map(|v| (k.clone(), v.to_string()))
                })
                .collect();
            self.bean_mut(bean).attr_cache = attrs;
        }
        for prop_idx in 0..self.bean(bean).props.len() {
            for slot_idx in 0..self.bean(bean).props[prop_idx].slots.len() {
                let (node, value) = match &self.bean(bean).props[prop_idx].slots[slot_idx] {
                    Some(s) => (s.node, s.value.clone()),
                    None => continue,
                };
                if let Some(node) = node {
                    self.cache_slot_state(bean, prop_idx, slot_idx, node);
                }
                if let Some(Value::Bean(sub)) = value {
                    self.unbind_bean(sub, node);
                }
                if let Some(slot) = &mut self.bean_mut(bean).props[prop_idx].slots[slot_idx] {
                    slot.node = None;
                }
            }
        }
    }

    /// Copy a slot's DOM text and attributes into its caches.
    fn cache_slot_state(&mut self, bean: BeanId, prop_idx: usize, slot_idx: usize, node: NodeId) {
        let (kind, name) = {
            let p = &self.bean(bean).props[prop_idx];
            (p.flags.kind(), p.bean_name.clone())
        };
        let cached = match kind {
            ValueKind::Bean => None,
            ValueKind::Comment => self
                .doc
                .text(node)
                .map(|t| Value::Comment(t.to_string())),
            _ => self
                .doc
                .text_content(node)
                .and_then(|t| Value::from_wire(kind, &t, &name).ok()),
        };
        let attrs: Vec<(String, String)> = self
            .doc
            .attribute_names(node)
            .into_iter()
            .filter_map(|k| self.doc.attribute(node, &k).map(|v| (k.clone(), v.to_string())))
            .collect();
        if let Some(slot) = &mut self.bean_mut(bean).props[prop_idx].slots[slot_idx] {
            if cached.is_some() {
                slot.value = cached;
            }
            slot.attr_cache = attrs;
        }
    }

    /// Detach a node and the whitespace-only text node preceding it.
    pub(crate) fn remove_node(&mut self, node: NodeId) {
        if let Some(prev) = self.doc.prev_sibling(node) {
            if self.doc.is_whitespace(prev) {
                self.doc.detach(prev);
            }
        }
        self.doc.detach(node);
    }

    // ── Attribute caches ──────────────────────────────────────────────────

    fn flush_slot_attrs(&mut self, bean: BeanId, prop_idx: usize, slot_idx: usize, node: NodeId) {
        let cached = match &mut self.bean_mut(bean).props[prop_idx].slots[slot_idx] {
            Some(s) => mem::take(&mut s.attr_cache),
            None => return,
        };
        for (name, value) in cached {
            self.doc.set_attribute(node, &name, Some(&value));
        }
    }

    fn flush_bean_attrs(&mut self, bean: BeanId, node: NodeId) {
        let cached = mem::take(&mut self.bean_mut(bean).attr_cache);
        for (name, value) in cached {
            self.doc.set_attribute(node, &name, Some(&value));
        }
    }

    /// Register a transient descriptor for every attribute present on the
    /// element but missing from the bean's declarations.
    pub(crate) fn harvest_bean_attrs(&mut self, bean: BeanId, node: NodeId) {
        for name in self.doc.attribute_names(node) {
            let data = self.bean_mut(bean);
            if !data.own_attrs.iter().any(|a| a.has_name(&name)) {
                log::debug!("registering transient attribute `{name}`");
                data.own_attrs.push(crate::attr::AttrProp::transient(&name));
            }
        }
    }

    /// Same, for the scalar-property descriptors.
    pub(crate) fn harvest_prop_attrs(&mut self, bean: BeanId, prop_idx: usize, node: NodeId) {
        for name in self.doc.attribute_names(node) {
            let prop = &mut self.bean_mut(bean).props[prop_idx];
            if !prop.attrs.iter().any(|a| a.has_name(&name)) {
                log::debug!("registering transient attribute `{name}`");
                prop.attrs.push(crate::attr::AttrProp::transient(&name));
            }
        }
    }
}
