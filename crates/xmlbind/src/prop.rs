//! Property containers and the property-level API.
//!
//! A [`BeanProp`] is one declared property of a bean: flags, attribute
//! descriptors, its listeners, and the ordered slot sequence. The `Graph`
//! methods here are the main mutation surface: typed get/set/add/remove,
//! whole-array replacement, id/index mapping, attribute access and path
//! naming. Every mutation runs veto checks before touching anything and
//! raises change events afterwards.

use std::collections::HashMap;
use std::fmt;

use crate::attr::AttrProp;
use crate::binding::{sanitize_attr_value, DomBinding};
use crate::error::BindError;
use crate::events::{ChangeListener, PropertyChangeEvent, VetoListener};
use crate::flags::{TypeFlags, ValueKind};
use crate::graph::Graph;
use crate::value::{parse_bool_text, BeanId, Value};

pub(crate) struct BeanProp {
    pub(crate) dtd_name: String,
    pub(crate) bean_name: String,
    pub(crate) flags: TypeFlags,
    /// Registry key of the sub-bean type for bean-kind properties.
    pub(crate) bean_type: Option<String>,
    /// OR-group number shared with sibling choice properties.
    pub(crate) group: Option<u16>,
    pub(crate) attrs: Vec<AttrProp>,
    /// Occurrences in sequence order; `None` entries are declared-but-unset
    /// positions of an array being built.
    pub(crate) slots: Vec<Option<DomBinding>>,
    /// Slot id to the index it held when it was removed.
    pub(crate) removed: HashMap<u64, usize>,
    pub(crate) change_listeners: Vec<(crate::events::ListenerId, ChangeListener)>,
    pub(crate) veto_listeners: Vec<(crate::events::ListenerId, VetoListener)>,
}

impl BeanProp {
    pub(crate) fn new(
        dtd_name: &str,
        bean_name: &str,
        flags: TypeFlags,
        bean_type: Option<String>,
        group: Option<u16>,
        attrs: Vec<AttrProp>,
    ) -> BeanProp {
        BeanProp {
            dtd_name: dtd_name.to_string(),
            bean_name: bean_name.to_string(),
            flags,
            bean_type,
            group,
            attrs,
            slots: Vec::new(),
            removed: HashMap::new(),
            change_listeners: Vec::new(),
            veto_listeners: Vec::new(),
        }
    }

    pub(crate) fn find_attr(&self, name: &str) -> Option<&AttrProp> {
        self.attrs.iter().find(|a| a.has_name(name))
    }
}

impl fmt::Debug for BeanProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanProp")
            .field("dtd_name", &self.dtd_name)
            .field("flags", &self.flags)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl Graph {
    // ── Resolution and introspection ──────────────────────────────────────

    pub(crate) fn prop_idx(&self, bean: BeanId, name: &str) -> Result<usize, BindError> {
        let data = self.bean(bean);
        data.props
            .iter()
            .position(|p| p.bean_name == name || p.dtd_name == name)
            .ok_or_else(|| BindError::UnknownProperty(name.to_string()))
    }

    /// Bean names of all declared properties, in schema order.
    pub fn property_names(&self, bean: BeanId) -> Vec<String> {
        self.bean(bean)
            .props
            .iter()
            .map(|p| p.bean_name.clone())
            .collect()
    }

    pub fn is_array(&self, bean: BeanId, name: &str) -> Result<bool, BindError> {
        Ok(self.bean(bean).props[self.prop_idx(bean, name)?].flags.is_array())
    }

    pub fn is_bean_property(&self, bean: BeanId, name: &str) -> Result<bool, BindError> {
        Ok(self.bean(bean).props[self.prop_idx(bean, name)?].flags.is_bean())
    }

    pub fn property_flags(&self, bean: BeanId, name: &str) -> Result<TypeFlags, BindError> {
        Ok(self.bean(bean).props[self.prop_idx(bean, name)?].flags)
    }

    pub fn property_dtd_name(&self, bean: BeanId, name: &str) -> Result<String, BindError> {
        Ok(self.bean(bean).props[self.prop_idx(bean, name)?].dtd_name.clone())
    }

    /// Bean names of the other members of this property's OR group.
    pub fn choice_properties(&self, bean: BeanId, name: &str) -> Result<Vec<String>, BindError> {
        let idx = self.prop_idx(bean, name)?;
        let data = self.bean(bean);
        let group = match data.props[idx].group {
            Some(g) => g,
            None => return Ok(Vec::new()),
        };
        Ok(data
            .props
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != idx && p.group == Some(group))
            .map(|(_, p)| p.bean_name.clone())
            .collect())
    }

    /// Sequence length, counting unset positions.
    pub fn size(&self, bean: BeanId, name: &str) -> Result<usize, BindError> {
        Ok(self.bean(bean).props[self.prop_idx(bean, name)?].slots.len())
    }

    pub fn is_null(&self, bean: BeanId, name: &str) -> Result<bool, BindError> {
        Ok(self.get_value(bean, name)?.is_none())
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    pub fn get_value(&self, bean: BeanId, name: &str) -> Result<Option<Value>, BindError> {
        self.get_value_at(bean, name, 0)
    }

    pub fn get_value_at(
        &self,
        bean: BeanId,
        name: &str,
        index: usize,
    ) -> Result<Option<Value>, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let prop = &self.bean(bean).props[prop_idx];
        if !prop.flags.is_array() {
            if index > 0 {
                return Err(BindError::NotIndexed(name.to_string()));
            }
            // Index 0 on an unset single property reads as absent.
            if prop.slots.is_empty() {
                return Ok(None);
            }
        } else if index >= prop.slots.len() {
            return Err(BindError::IndexOutOfBounds {
                name: name.to_string(),
                index,
                size: prop.slots.len(),
            });
        }
        self.read_slot(bean, prop_idx, index)
    }

    /// The whole sequence, unset positions included.
    pub fn get_values(&self, bean: BeanId, name: &str) -> Result<Vec<Option<Value>>, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        (0..self.bean(bean).props[prop_idx].slots.len())
            .map(|i| self.read_slot(bean, prop_idx, i))
            .collect()
    }

    pub(crate) fn read_slot(
        &self,
        bean: BeanId,
        prop_idx: usize,
        slot_idx: usize,
    ) -> Result<Option<Value>, BindError> {
        let prop = &self.bean(bean).props[prop_idx];
        let slot = match prop.slots.get(slot_idx).and_then(Option::as_ref) {
            Some(s) => s,
            None => return Ok(None),
        };
        let kind = prop.flags.kind();
        match kind {
            ValueKind::Bean => Ok(slot.value.clone()),
            ValueKind::Boolean => match slot.node {
                Some(node) => {
                    let text = self.doc.text_content(node);
                    Ok(Some(Value::Bool(
                        text.map(|t| parse_bool_text(&t)).unwrap_or(true),
                    )))
                }
                None => Ok(slot.value.clone().or(Some(Value::Bool(false)))),
            },
            ValueKind::Comment => match slot.node {
                Some(node) => Ok(self.doc.text(node).map(|t| Value::Comment(t.to_string()))),
                None => Ok(slot.value.clone()),
            },
            ValueKind::Text | ValueKind::Int | ValueKind::Float => match slot.node {
                Some(node) => match self.doc.text_content(node) {
                    Some(text) => Value::from_wire(kind, &text, &prop.bean_name).map(Some),
                    // An empty element is a present occurrence; for text
                    // it reads as the empty string, numbers stay unset.
                    None if kind == ValueKind::Text => Ok(Some(Value::Text(String::new()))),
                    None => Ok(None),
                },
                None => Ok(slot.value.clone()),
            },
        }
    }

    // ── Identity mapping ──────────────────────────────────────────────────

    /// Permanent id of the element currently at `index`.
    pub fn index_to_id(&self, bean: BeanId, name: &str, index: usize) -> Result<u64, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let prop = &self.bean(bean).props[prop_idx];
        prop.slots
            .get(index)
            .and_then(Option::as_ref)
            .map(|s| s.id)
            .ok_or_else(|| BindError::IndexOutOfBounds {
                name: name.to_string(),
                index,
                size: prop.slots.len(),
            })
    }

    /// Current index of an id; `None` when the element has been removed.
    pub fn id_to_index(
        &self,
        bean: BeanId,
        name: &str,
        id: u64,
    ) -> Result<Option<usize>, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let prop = &self.bean(bean).props[prop_idx];
        if let Some(pos) = prop
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.id == id))
        {
            return Ok(Some(pos));
        }
        if prop.removed.contains_key(&id) {
            return Ok(None);
        }
        Err(BindError::UnknownId {
            name: name.to_string(),
            id,
        })
    }

    pub fn get_value_by_id(
        &self,
        bean: BeanId,
        name: &str,
        id: u64,
    ) -> Result<Option<Value>, BindError> {
        match self.id_to_index(bean, name, id)? {
            Some(index) => self.get_value_at(bean, name, index),
            None => Ok(None),
        }
    }

    // ── Writes ────────────────────────────────────────────────────────────

    /// Set a single (non-array) property. `None` unsets it.
    pub fn set_value(
        &mut self,
        bean: BeanId,
        name: &str,
        value: Option<Value>,
    ) -> Result<(), BindError> {
        if self.is_array(bean, name)? {
            return Err(BindError::Indexed(name.to_string()));
        }
        self.set_value_at(bean, name, 0, value)
    }

    /// Set one position of a property. The position must exist already for
    /// arrays; single properties materialize their slot on first set.
    pub fn set_value_at(
        &mut self,
        bean: BeanId,
        name: &str,
        index: usize,
        value: Option<Value>,
    ) -> Result<(), BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let flags = self.bean(bean).props[prop_idx].flags;
        if !flags.is_array() {
            if index > 0 {
                return Err(BindError::NotIndexed(name.to_string()));
            }
        } else if index >= self.bean(bean).props[prop_idx].slots.len() {
            return Err(BindError::IndexOutOfBounds {
                name: name.to_string(),
                index,
                size: self.bean(bean).props[prop_idx].slots.len(),
            });
        }
        if let Some(v) = &value {
            self.check_incoming(bean, prop_idx, v)?;
        }

        let old = self.read_slot(bean, prop_idx, index)?;
        let slot_id = self.bean(bean).props[prop_idx]
            .slots
            .get(index)
            .and_then(Option::as_ref)
            .map(|s| s.id);
        let event = self.make_event(bean, prop_idx, slot_id, Some(index), old, value.clone());
        if flags.is_vetoable() {
            self.veto_checked(bean, prop_idx, &event)?;
        }

        self.batch(|g| {
            match value {
                None => {
                    if g.bean(bean).props[prop_idx]
                        .slots
                        .get(index)
                        .is_some_and(Option::is_some)
                    {
                        g.clear_slot(bean, prop_idx, index);
                        g.bean_mut(bean).props[prop_idx].slots[index] = None;
                    }
                }
                Some(v) => {
                    let slots = &mut g.bean_mut(bean).props[prop_idx].slots;
                    if slots.len() <= index {
                        slots.resize_with(index + 1, || None);
                    }
                    g.write_slot(bean, prop_idx, index, v);
                }
            }
            g.emit(bean, Some(prop_idx), event);
        });
        Ok(())
    }

    /// Append to an array property, returning the new index.
    pub fn add_value(&mut self, bean: BeanId, name: &str, value: Value) -> Result<usize, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let flags = self.bean(bean).props[prop_idx].flags;
        if !flags.is_array() {
            return Err(BindError::NotIndexed(name.to_string()));
        }
        self.check_incoming(bean, prop_idx, &value)?;

        let index = self.bean(bean).props[prop_idx].slots.len();
        let event = self.make_event(bean, prop_idx, None, Some(index), None, Some(value.clone()));
        if flags.is_vetoable() {
            self.veto_checked(bean, prop_idx, &event)?;
        }

        self.batch(|g| {
            g.bean_mut(bean).props[prop_idx].slots.push(None);
            g.write_slot(bean, prop_idx, index, value);
            let slot_id = g.bean(bean).props[prop_idx].slots[index].as_ref().map(|s| s.id);
            let event = PropertyChangeEvent {
                path: g.path_of_slot(bean, prop_idx, slot_id),
                slot_id,
                ..event
            };
            g.emit(bean, Some(prop_idx), event);
        });
        Ok(index)
    }

    /// Remove one position of an array property, compacting the sequence.
    /// Returns the removed value.
    pub fn remove_value_at(
        &mut self,
        bean: BeanId,
        name: &str,
        index: usize,
    ) -> Result<Option<Value>, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let flags = self.bean(bean).props[prop_idx].flags;
        if !flags.is_array() {
            return Err(BindError::NotIndexed(name.to_string()));
        }
        if index >= self.bean(bean).props[prop_idx].slots.len() {
            return Err(BindError::IndexOutOfBounds {
                name: name.to_string(),
                index,
                size: self.bean(bean).props[prop_idx].slots.len(),
            });
        }

        let old = self.read_slot(bean, prop_idx, index)?;
        let slot_id = self.bean(bean).props[prop_idx].slots[index].as_ref().map(|s| s.id);
        if flags.is_vetoable() {
            let event = self.make_event(bean, prop_idx, slot_id, Some(index), old.clone(), None);
            self.veto_checked(bean, prop_idx, &event)?;
        }

        let removed = old.clone();
        self.batch(|g| {
            g.clear_slot(bean, prop_idx, index);
            g.bean_mut(bean).props[prop_idx].slots.remove(index);
            // Built after the removal so the path carries the positional
            // marker of a gone element.
            let event = g.make_event(bean, prop_idx, slot_id, Some(index), removed, None);
            g.emit(bean, Some(prop_idx), event);
        });
        Ok(old)
    }

    /// Position of the first occurrence holding `value`: bean identity
    /// for bean-kind properties, value equality otherwise.
    pub fn index_of(
        &self,
        bean: BeanId,
        name: &str,
        value: &Value,
    ) -> Result<Option<usize>, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let len = self.bean(bean).props[prop_idx].slots.len();
        for index in 0..len {
            let current = self.read_slot(bean, prop_idx, index)?;
            let matched = match (value, &current) {
                (Value::Bean(a), Some(Value::Bean(b))) => a == b,
                (v, Some(cur)) => v == cur,
                _ => false,
            };
            if matched {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Remove the first position whose value matches, as [`index_of`]
    /// finds it. Returns the index it occupied, or `None` when nothing
    /// matched.
    ///
    /// [`index_of`]: Graph::index_of
    pub fn remove_value(
        &mut self,
        bean: BeanId,
        name: &str,
        value: &Value,
    ) -> Result<Option<usize>, BindError> {
        match self.index_of(bean, name, value)? {
            Some(index) => {
                self.remove_value_at(bean, name, index)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Grow an array property to `size` with unset positions.
    pub fn set_size(&mut self, bean: BeanId, name: &str, size: usize) -> Result<(), BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        if !self.bean(bean).props[prop_idx].flags.is_array() {
            return Err(BindError::NotIndexed(name.to_string()));
        }
        let slots = &mut self.bean_mut(bean).props[prop_idx].slots;
        while slots.len() < size {
            slots.push(None);
        }
        Ok(())
    }

    // ── Whole-array replacement ───────────────────────────────────────────

    /// Replace the whole sequence of an array property.
    ///
    /// Existing elements are matched against the new values (bean identity
    /// first, then value equality); matched slots keep their id and DOM
    /// node, unmatched ones are removed, new values are appended, and the
    /// DOM children are reordered to the new sequence.
    pub fn set_values(&mut self, bean: BeanId, name: &str, values: &[Value]) -> Result<(), BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let flags = self.bean(bean).props[prop_idx].flags;
        if !flags.is_array() {
            return Err(BindError::NotIndexed(name.to_string()));
        }

        // Match current slots to new positions.
        let len = self.bean(bean).props[prop_idx].slots.len();
        let mut slot_target: Vec<Option<usize>> = vec![None; len];
        let mut taken = vec![false; values.len()];
        for i in 0..len {
            let Some(Value::Bean(cur)) = self.read_slot(bean, prop_idx, i)? else {
                continue;
            };
            for (j, v) in values.iter().enumerate() {
                if !taken[j] && *v == Value::Bean(cur) {
                    slot_target[i] = Some(j);
                    taken[j] = true;
                    break;
                }
            }
        }
        for i in 0..len {
            if slot_target[i].is_some() {
                continue;
            }
            let current = self.read_slot(bean, prop_idx, i)?;
            let Some(cur) = current else { continue };
            if cur.as_bean().is_some() {
                continue;
            }
            for (j, v) in values.iter().enumerate() {
                if !taken[j] && *v == cur {
                    slot_target[i] = Some(j);
                    taken[j] = true;
                    break;
                }
            }
        }

        // Validate incoming values that will actually be added.
        for (j, v) in values.iter().enumerate() {
            if !taken[j] {
                self.check_incoming(bean, prop_idx, v)?;
            }
        }

        // Veto pass: all removals and additions, before any mutation.
        if flags.is_vetoable() {
            for i in 0..len {
                if slot_target[i].is_none() {
                    let old = self.read_slot(bean, prop_idx, i)?;
                    if old.is_some() {
                        let id = self.bean(bean).props[prop_idx].slots[i].as_ref().map(|s| s.id);
                        let ev = self.make_event(bean, prop_idx, id, Some(i), old, None);
                        self.veto_checked(bean, prop_idx, &ev)?;
                    }
                }
            }
            for (j, v) in values.iter().enumerate() {
                if !taken[j] {
                    let ev =
                        self.make_event(bean, prop_idx, None, Some(j), None, Some(v.clone()));
                    self.veto_checked(bean, prop_idx, &ev)?;
                }
            }
        }

        self.batch(|g| -> Result<(), BindError> {
            // Remove unmatched slots, highest index first, raising events.
            let mut events = Vec::new();
            for i in (0..len).rev() {
                if slot_target[i].is_none() {
                    let old = g.read_slot(bean, prop_idx, i)?;
                    let id = g.bean(bean).props[prop_idx].slots[i].as_ref().map(|s| s.id);
                    g.clear_slot(bean, prop_idx, i);
                    if old.is_some() || id.is_some() {
                        events.push(g.make_event(bean, prop_idx, id, Some(i), old, None));
                    }
                }
            }

            // Rebuild the slot vector in target order.
            let old_slots = std::mem::take(&mut g.bean_mut(bean).props[prop_idx].slots);
            let mut rebuilt: Vec<Option<DomBinding>> =
                (0..values.len()).map(|_| None).collect();
            for (i, slot) in old_slots.into_iter().enumerate() {
                if let (Some(j), Some(slot)) = (slot_target[i], slot) {
                    rebuilt[j] = Some(slot);
                }
            }
            g.bean_mut(bean).props[prop_idx].slots = rebuilt;

            // Fill the added positions and raise their events.
            for (j, v) in values.iter().enumerate() {
                if !taken[j] {
                    g.write_slot(bean, prop_idx, j, v.clone());
                    let id = g.bean(bean).props[prop_idx].slots[j].as_ref().map(|s| s.id);
                    events.push(g.make_event(bean, prop_idx, id, Some(j), None, Some(v.clone())));
                }
            }

            g.reorder_dom(bean, prop_idx);
            for ev in events {
                g.emit(bean, Some(prop_idx), ev);
            }
            Ok(())
        })
    }

    /// Make the DOM order of a property's nodes follow slot order.
    fn reorder_dom(&mut self, bean: BeanId, prop_idx: usize) {
        let parent_el = match self.node_of(bean) {
            Some(n) => n,
            None => return,
        };
        let nodes: Vec<xmlbind_dom::NodeId> = self.bean(bean).props[prop_idx]
            .slots
            .iter()
            .flatten()
            .filter_map(|s| s.node)
            .collect();
        let mut prev: Option<xmlbind_dom::NodeId> = None;
        for node in nodes {
            if let Some(prev) = prev {
                let p0 = self.doc.position_in_parent(prev);
                let p1 = self.doc.position_in_parent(node);
                if let (Some(p0), Some(p1)) = (p0, p1) {
                    if p1 < p0 {
                        self.doc.insert_after(parent_el, node, prev);
                    }
                }
            }
            prev = Some(node);
        }
    }

    // ── Slot plumbing shared by the write paths ───────────────────────────

    /// Reject values a property cannot accept before anything mutates.
    fn check_incoming(&self, bean: BeanId, prop_idx: usize, value: &Value) -> Result<(), BindError> {
        let prop = &self.bean(bean).props[prop_idx];
        value.check_kind(prop.flags.kind(), &prop.bean_name)?;
        if let Value::Bean(sub) = value {
            let sub_data = self.bean(*sub);
            if sub_data.is_root || sub_data.parent.is_some() {
                return Err(BindError::AlreadyAttached);
            }
            if let Some(expected) = &prop.bean_type {
                if &sub_data.type_name != expected {
                    return Err(BindError::TypeMismatch {
                        name: prop.bean_name.clone(),
                        expected: expected.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Store `value` at an existing position, creating the binding if the
    /// position is unset, and sync the DOM.
    pub(crate) fn write_slot(&mut self, bean: BeanId, prop_idx: usize, index: usize, value: Value) {
        // Replacing a bean detaches the previous one first.
        let old_sub = self.bean(bean).props[prop_idx].slots[index]
            .as_ref()
            .and_then(|s| s.value.as_ref().and_then(Value::as_bean));
        if let Some(old_sub) = old_sub {
            if value.as_bean() != Some(old_sub) {
                self.clear_slot(bean, prop_idx, index);
                self.bean_mut(bean).props[prop_idx].slots[index] = None;
            }
        }

        if self.bean(bean).props[prop_idx].slots[index].is_none() {
            let id = self.alloc_slot_id();
            self.bean_mut(bean).props[prop_idx].slots[index] = Some(DomBinding::new(id));
        }
        let slot_id = self.bean(bean).props[prop_idx].slots[index]
            .as_ref()
            .map(|s| s.id)
            .unwrap_or(0);
        if let Value::Bean(sub) = &value {
            self.bean_mut(*sub).parent = Some(crate::bean::ParentLink {
                bean,
                prop: prop_idx,
                slot: slot_id,
            });
        }
        if let Some(slot) = &mut self.bean_mut(bean).props[prop_idx].slots[index] {
            slot.value = Some(value);
        }
        self.attach_slot(bean, prop_idx, index);
    }

    /// Detach a position from the DOM and unlink a bean value, keeping the
    /// position itself for the caller to drop or reuse.
    pub(crate) fn clear_slot(&mut self, bean: BeanId, prop_idx: usize, index: usize) {
        let sub = self.bean(bean).props[prop_idx].slots[index]
            .as_ref()
            .and_then(|s| s.value.as_ref().and_then(Value::as_bean));
        self.detach_slot(bean, prop_idx, index);
        if let Some(sub) = sub {
            self.bean_mut(sub).parent = None;
        }
    }

    // ── Attributes ────────────────────────────────────────────────────────

    /// Set an attribute on one occurrence of a property. For bean-kind
    /// properties this targets the sub-bean's element.
    pub fn set_attribute_value(
        &mut self,
        bean: BeanId,
        name: &str,
        index: usize,
        attr: &str,
        value: Option<&str>,
    ) -> Result<(), BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        if self.bean(bean).props[prop_idx].flags.is_bean() {
            let sub = self
                .read_slot(bean, prop_idx, index)?
                .and_then(|v| v.as_bean())
                .ok_or_else(|| BindError::IndexOutOfBounds {
                    name: name.to_string(),
                    index,
                    size: self.bean(bean).props[prop_idx].slots.len(),
                })?;
            return self.set_bean_attribute(sub, attr, value);
        }
        if self.bean(bean).props[prop_idx]
            .slots
            .get(index)
            .and_then(Option::as_ref)
            .is_none()
        {
            return Err(BindError::IndexOutOfBounds {
                name: name.to_string(),
                index,
                size: self.bean(bean).props[prop_idx].slots.len(),
            });
        }

        // Undeclared attributes become transient descriptors on first set.
        if self.bean(bean).props[prop_idx].find_attr(attr).is_none() {
            self.bean_mut(bean).props[prop_idx]
                .attrs
                .push(AttrProp::transient(attr));
        }
        let descr = self.bean(bean).props[prop_idx].find_attr(attr).cloned();
        let descr = descr.ok_or_else(|| BindError::UnknownAttribute(attr.to_string()))?;
        let clean = self.check_attr_write(&descr, value)?;

        let dtd = descr.dtd_name().to_string();
        let old = self.attr_of_slot(bean, prop_idx, index, &dtd);
        let slot_id = self.bean(bean).props[prop_idx].slots[index].as_ref().map(|s| s.id);
        let flags = self.bean(bean).props[prop_idx].flags;
        let mut event = self.make_event(bean, prop_idx, slot_id, Some(index), old.map(Value::Text), clean.clone().map(Value::Text));
        event.path = format!("{}:{}", event.path, dtd);
        if flags.is_vetoable() {
            self.veto_checked(bean, prop_idx, &event)?;
        }

        let node = self.bean(bean).props[prop_idx].slots[index].as_ref().and_then(|s| s.node);
        match node {
            Some(node) => self.doc.set_attribute(node, &dtd, clean.as_deref()),
            None => {
                if let Some(slot) = &mut self.bean_mut(bean).props[prop_idx].slots[index] {
                    slot.cache_attr(&dtd, clean.as_deref());
                }
            }
        }
        self.emit(bean, Some(prop_idx), event);
        Ok(())
    }

    pub fn get_attribute_value(
        &self,
        bean: BeanId,
        name: &str,
        index: usize,
        attr: &str,
    ) -> Result<Option<String>, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        if self.bean(bean).props[prop_idx].flags.is_bean() {
            let sub = self
                .read_slot(bean, prop_idx, index)?
                .and_then(|v| v.as_bean())
                .ok_or_else(|| BindError::IndexOutOfBounds {
                    name: name.to_string(),
                    index,
                    size: self.bean(bean).props[prop_idx].slots.len(),
                })?;
            return self.get_bean_attribute(sub, attr);
        }
        let descr = self.bean(bean).props[prop_idx]
            .find_attr(attr)
            .ok_or_else(|| BindError::UnknownAttribute(attr.to_string()))?;
        let dtd = descr.dtd_name().to_string();
        let default = descr.default_value().map(str::to_string);
        Ok(self.attr_of_slot(bean, prop_idx, index, &dtd).or(default))
    }

    /// Declared attribute names (schema spelling) of a property.
    pub fn attribute_names(&self, bean: BeanId, name: &str) -> Result<Vec<String>, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let prop = &self.bean(bean).props[prop_idx];
        if prop.flags.is_bean() {
            if let Some(Value::Bean(sub)) = self.read_slot(bean, prop_idx, 0)? {
                return Ok(self.bean_attribute_names(sub));
            }
        }
        Ok(prop.attrs.iter().map(|a| a.dtd_name().to_string()).collect())
    }

    /// Attribute on the element of the bean itself.
    pub fn set_bean_attribute(
        &mut self,
        bean: BeanId,
        attr: &str,
        value: Option<&str>,
    ) -> Result<(), BindError> {
        if self.bean(bean).find_own_attr(attr).is_none() {
            self.bean_mut(bean).own_attrs.push(AttrProp::transient(attr));
        }
        let descr = self
            .bean(bean)
            .find_own_attr(attr)
            .cloned()
            .ok_or_else(|| BindError::UnknownAttribute(attr.to_string()))?;
        let clean = self.check_attr_write(&descr, value)?;

        let dtd = descr.dtd_name().to_string();
        let old = self.get_bean_attribute(bean, attr)?;
        let link = self.bean(bean).parent;
        let event = PropertyChangeEvent {
            path: format!("{}:{}", self.full_name(bean), dtd),
            property: descr.name().to_string(),
            index: None,
            slot_id: link.map(|l| l.slot),
            old: old.map(Value::Text),
            new: clean.clone().map(Value::Text),
        };
        let origin_prop = link.map(|l| l.prop);
        let origin = link.map(|l| l.bean).unwrap_or(bean);
        let vetoable = origin_prop
            .map(|p| self.bean(origin).props[p].flags.is_vetoable())
            .unwrap_or(false);
        if vetoable {
            self.veto_checked(origin, origin_prop.unwrap_or(0), &event)?;
        }

        match self.node_of(bean) {
            Some(node) => self.doc.set_attribute(node, &dtd, clean.as_deref()),
            None => {
                let cache = &mut self.bean_mut(bean).attr_cache;
                cache.retain(|(k, _)| k != &dtd);
                if let Some(v) = &clean {
                    cache.push((dtd.clone(), v.clone()));
                }
            }
        }
        self.emit(origin, origin_prop, event);
        Ok(())
    }

    pub fn get_bean_attribute(&self, bean: BeanId, attr: &str) -> Result<Option<String>, BindError> {
        let descr = self
            .bean(bean)
            .find_own_attr(attr)
            .ok_or_else(|| BindError::UnknownAttribute(attr.to_string()))?;
        let dtd = descr.dtd_name().to_string();
        let default = descr.default_value().map(str::to_string);
        let stored = match self.node_of(bean) {
            Some(node) => self.doc.attribute(node, &dtd).map(str::to_string),
            None => self
                .bean(bean)
                .attr_cache
                .iter()
                .find(|(k, _)| k == &dtd)
                .map(|(_, v)| v.clone()),
        };
        Ok(stored.or(default))
    }

    pub fn bean_attribute_names(&self, bean: BeanId) -> Vec<String> {
        self.bean(bean)
            .own_attrs
            .iter()
            .map(|a| a.dtd_name().to_string())
            .collect()
    }

    /// Whether `name` is only known through a runtime-harvested descriptor.
    pub(crate) fn attr_is_transient(&self, bean: BeanId, name: &str) -> bool {
        self.bean(bean)
            .find_own_attr(name)
            .is_some_and(|a| a.is_transient())
    }

    fn check_attr_write(
        &self,
        descr: &AttrProp,
        value: Option<&str>,
    ) -> Result<Option<String>, BindError> {
        if descr.is_fixed() {
            // Writing the declared value back is a no-op, not an error.
            if value.is_some() && value == descr.default_value() {
                return Ok(value.map(str::to_string));
            }
            return Err(BindError::FixedAttribute(descr.dtd_name().to_string()));
        }
        match value {
            Some(v) => {
                descr.check_value(v)?;
                Ok(Some(sanitize_attr_value(v)))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn attr_of_slot(
        &self,
        bean: BeanId,
        prop_idx: usize,
        index: usize,
        dtd: &str,
    ) -> Option<String> {
        let slot = self.bean(bean).props[prop_idx]
            .slots
            .get(index)
            .and_then(Option::as_ref)?;
        match slot.node {
            Some(node) => self.doc.attribute(node, dtd).map(str::to_string),
            None => slot
                .attr_cache
                .iter()
                .find(|(k, _)| k == dtd)
                .map(|(_, v)| v.clone()),
        }
    }

    // ── Paths and events ──────────────────────────────────────────────────

    /// Absolute path of a bean, e.g. `/Book/Chapter.1a`.
    pub fn full_name(&self, bean: BeanId) -> String {
        let mut parts = Vec::new();
        let mut cur = bean;
        loop {
            let data = self.bean(cur);
            match data.parent {
                Some(link) => {
                    let prop = &self.bean(link.bean).props[link.prop];
                    parts.push(Self::slot_component(prop, link.slot));
                    cur = link.bean;
                }
                None => {
                    parts.push(data.name.clone());
                    break;
                }
            }
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Path of one position of a property, by index.
    pub fn full_prop_name(
        &self,
        bean: BeanId,
        name: &str,
        index: Option<usize>,
    ) -> Result<String, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let prop = &self.bean(bean).props[prop_idx];
        let id = match index {
            Some(i) => prop.slots.get(i).and_then(Option::as_ref).map(|s| s.id),
            None => None,
        };
        Ok(self.path_of_slot(bean, prop_idx, id))
    }

    /// Positional path of one occurrence in XPath syntax, e.g.
    /// `/Book/chapter[position()=1]`. Unlike [`full_prop_name`] this
    /// names the current index, so it goes stale when the sequence
    /// shifts.
    ///
    /// [`full_prop_name`]: Graph::full_prop_name
    pub fn indexed_prop_name(
        &self,
        bean: BeanId,
        name: &str,
        index: usize,
    ) -> Result<String, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let prop = &self.bean(bean).props[prop_idx];
        let base = self.full_name(bean);
        if prop.flags.is_array() {
            Ok(format!("{}/{}[position()={}]", base, prop.dtd_name, index))
        } else {
            Ok(format!("{}/{}", base, prop.dtd_name))
        }
    }

    /// Path component of one occurrence: the bean name, suffixed for
    /// arrays with the hex id (or `i<index>` once removed).
    fn slot_component(prop: &BeanProp, slot_id: u64) -> String {
        if prop.flags.is_array() {
            match prop.removed.get(&slot_id) {
                Some(last_index) => format!("{}.i{}", prop.bean_name, last_index),
                None => format!("{}.{:x}", prop.bean_name, slot_id),
            }
        } else {
            prop.bean_name.clone()
        }
    }

    pub(crate) fn path_of_slot(&self, bean: BeanId, prop_idx: usize, slot_id: Option<u64>) -> String {
        let prop = &self.bean(bean).props[prop_idx];
        let base = self.full_name(bean);
        match slot_id {
            Some(id) => format!("{}/{}", base, Self::slot_component(prop, id)),
            None => format!("{}/{}", base, prop.bean_name),
        }
    }

    pub(crate) fn make_event(
        &self,
        bean: BeanId,
        prop_idx: usize,
        slot_id: Option<u64>,
        index: Option<usize>,
        old: Option<Value>,
        new: Option<Value>,
    ) -> PropertyChangeEvent {
        PropertyChangeEvent {
            path: self.path_of_slot(bean, prop_idx, slot_id),
            property: self.bean(bean).props[prop_idx].bean_name.clone(),
            index,
            slot_id,
            old,
            new,
        }
    }

    pub(crate) fn veto_checked(
        &self,
        bean: BeanId,
        prop_idx: usize,
        event: &PropertyChangeEvent,
    ) -> Result<(), BindError> {
        self.check_veto(bean, Some(prop_idx), event)
            .map_err(|reason| BindError::Vetoed {
                path: event.path.clone(),
                reason,
            })
    }
}
