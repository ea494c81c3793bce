//! Bean containers and bean-level operations.
//!
//! A bean is a typed node of the property graph, stored in the graph's
//! arena and addressed by [`BeanId`]. This module holds the container
//! itself plus the operations that see a bean as a whole: tree walking,
//! search, comment handling, and deep cloning through an intermediate
//! snapshot (which is also how beans travel between graphs).

use std::fmt;

use crate::attr::AttrProp;
use crate::error::BindError;
use crate::events::{ChangeListener, ListenerId};
use crate::graph::Graph;
use crate::prop::BeanProp;
use crate::value::{BeanId, Value};

/// Where a bean hangs in its parent: the owning bean, the property index,
/// and the permanent slot id (indexes shift, the id does not).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParentLink {
    pub(crate) bean: BeanId,
    pub(crate) prop: usize,
    pub(crate) slot: u64,
}

pub(crate) struct BeanData {
    /// Schema name of the element this bean binds.
    pub(crate) type_name: String,
    /// Converted identifier name, used in paths.
    pub(crate) name: String,
    pub(crate) props: Vec<BeanProp>,
    /// Attribute descriptors of the element itself.
    pub(crate) own_attrs: Vec<AttrProp>,
    /// Attribute values held while the bean has no element.
    pub(crate) attr_cache: Vec<(String, String)>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) is_root: bool,
    pub(crate) listeners: Vec<(ListenerId, ChangeListener)>,
}

impl BeanData {
    pub(crate) fn find_own_attr(&self, name: &str) -> Option<&AttrProp> {
        self.own_attrs.iter().find(|a| a.has_name(name))
    }
}

impl fmt::Debug for BeanData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanData")
            .field("type_name", &self.type_name)
            .field("props", &self.props)
            .field("is_root", &self.is_root)
            .finish()
    }
}

// ── Snapshots ─────────────────────────────────────────────────────────────

/// Detached deep copy of a bean's state. The bridge for cloning and for
/// importing beans across graphs.
#[derive(Debug, Clone)]
pub(crate) struct BeanSnapshot {
    pub(crate) type_name: String,
    /// Element attribute values, fixed attributes excluded.
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) props: Vec<PropSnapshot>,
}

#[derive(Debug, Clone)]
pub(crate) struct PropSnapshot {
    pub(crate) name: String,
    pub(crate) slots: Vec<Option<SlotSnapshot>>,
}

#[derive(Debug, Clone)]
pub(crate) struct SlotSnapshot {
    pub(crate) value: Option<SnapValue>,
    pub(crate) attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub(crate) enum SnapValue {
    Scalar(Value),
    Bean(BeanSnapshot),
}

impl Graph {
    pub(crate) fn bean(&self, bean: BeanId) -> &BeanData {
        &self.beans[bean.index()]
    }

    pub(crate) fn bean_mut(&mut self, bean: BeanId) -> &mut BeanData {
        &mut self.beans[bean.index()]
    }

    // ── Navigation ────────────────────────────────────────────────────────

    pub fn parent_bean(&self, bean: BeanId) -> Option<BeanId> {
        self.bean(bean).parent.map(|l| l.bean)
    }

    /// Schema name of the bean's element type.
    pub fn bean_type(&self, bean: BeanId) -> &str {
        &self.bean(bean).type_name
    }

    /// Converted identifier name of the bean.
    pub fn bean_name(&self, bean: BeanId) -> &str {
        &self.bean(bean).name
    }

    /// Direct (or, recursively, all) sub-beans, in property then sequence
    /// order.
    pub fn child_beans(&self, bean: BeanId, recursive: bool) -> Vec<BeanId> {
        let mut out = Vec::new();
        self.collect_children(bean, recursive, &mut out);
        out
    }

    fn collect_children(&self, bean: BeanId, recursive: bool, out: &mut Vec<BeanId>) {
        for prop in &self.bean(bean).props {
            for slot in prop.slots.iter().flatten() {
                if let Some(Value::Bean(sub)) = &slot.value {
                    out.push(*sub);
                    if recursive {
                        self.collect_children(*sub, true, out);
                    }
                }
            }
        }
    }

    /// Path component naming `child` within `bean`, e.g. `Chapter.1a`.
    pub fn name_child(&self, bean: BeanId, child: BeanId) -> Option<String> {
        let link = self.bean(child).parent?;
        if link.bean != bean {
            return None;
        }
        let path = self.path_of_slot(link.bean, link.prop, Some(link.slot));
        path.rsplit('/').next().map(str::to_string)
    }

    // ── Search ────────────────────────────────────────────────────────────

    /// First bean in the subtree that declares a property named `name`.
    pub fn find_property(&self, from: BeanId, name: &str) -> Option<BeanId> {
        if self
            .bean(from)
            .props
            .iter()
            .any(|p| p.bean_name == name || p.dtd_name == name)
        {
            return Some(from);
        }
        self.child_beans(from, false)
            .into_iter()
            .find_map(|c| self.find_property(c, name))
    }

    /// Beans in the subtree whose property `name` holds `value`, compared
    /// as trimmed text.
    pub fn find_property_value(&self, from: BeanId, name: &str, value: &str) -> Vec<BeanId> {
        let mut out = Vec::new();
        self.find_value_rec(from, name, value, &mut out);
        out
    }

    fn find_value_rec(&self, bean: BeanId, name: &str, value: &str, out: &mut Vec<BeanId>) {
        if let Ok(prop_idx) = self.prop_idx(bean, name) {
            let len = self.bean(bean).props[prop_idx].slots.len();
            for i in 0..len {
                let matched = self
                    .read_slot(bean, prop_idx, i)
                    .ok()
                    .flatten()
                    .and_then(|v| v.to_wire())
                    .is_some_and(|w| w.trim() == value.trim());
                if matched {
                    out.push(bean);
                    break;
                }
            }
        }
        for child in self.child_beans(bean, false) {
            self.find_value_rec(child, name, value, out);
        }
    }

    /// Beans in the subtree carrying attribute `attr` with value `value`
    /// on their own element.
    pub fn find_attribute_value(&self, from: BeanId, attr: &str, value: &str) -> Vec<BeanId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(bean) = stack.pop() {
            if let Ok(Some(v)) = self.get_bean_attribute(bean, attr) {
                if v.trim() == value.trim() {
                    out.push(bean);
                }
            }
            stack.extend(self.child_beans(bean, false));
        }
        out
    }

    // ── Comments ──────────────────────────────────────────────────────────

    /// Free-standing XML comments directly under the bean's element, in
    /// document order. These are unbound content, distinct from properties
    /// of comment kind.
    pub fn comments(&self, bean: BeanId) -> Vec<String> {
        match self.node_of(bean) {
            Some(node) => self
                .doc
                .children(node)
                .iter()
                .filter(|&&c| self.doc.is_comment(c))
                .filter_map(|&c| self.doc.text(c).map(str::to_string))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Add a free-standing comment as the element's first child.
    pub fn add_comment(&mut self, bean: BeanId, text: &str) -> Result<(), BindError> {
        let node = self.node_of(bean).ok_or(BindError::NotAttached)?;
        let comment = self.doc.create_comment(text);
        match self.doc.children(node).first().copied() {
            Some(first) => self.doc.insert_before(node, comment, first),
            None => self.doc.append_child(node, comment),
        }
        Ok(())
    }

    /// Remove the first free-standing comment with exactly this text.
    pub fn remove_comment(&mut self, bean: BeanId, text: &str) -> Result<bool, BindError> {
        let node = self.node_of(bean).ok_or(BindError::NotAttached)?;
        let found = self
            .doc
            .children(node)
            .iter()
            .copied()
            .find(|&c| self.doc.is_comment(c) && self.doc.text(c) == Some(text));
        match found {
            Some(c) => {
                self.remove_node(c);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Cloning ───────────────────────────────────────────────────────────

    /// Deep copy of a bean as a new detached bean of this graph.
    ///
    /// Fixed attributes are not copied; they are derived from the
    /// declaration wherever the copy ends up.
    pub fn clone_bean(&mut self, bean: BeanId) -> Result<BeanId, BindError> {
        let snap = self.snapshot_bean(bean);
        self.materialize(&snap)
    }

    pub(crate) fn snapshot_bean(&self, bean: BeanId) -> BeanSnapshot {
        let data = self.bean(bean);
        let attrs = data
            .own_attrs
            .iter()
            .filter(|a| !a.is_fixed())
            .filter_map(|a| {
                self.get_bean_attribute(bean, a.dtd_name())
                    .ok()
                    .flatten()
                    .map(|v| (a.dtd_name().to_string(), v))
            })
            .collect();
        let mut props = Vec::with_capacity(data.props.len());
        for (prop_idx, prop) in data.props.iter().enumerate() {
            let mut slots = Vec::with_capacity(prop.slots.len());
            for (slot_idx, slot) in prop.slots.iter().enumerate() {
                if slot.is_none() {
                    slots.push(None);
                    continue;
                }
                let value = match self.read_slot(bean, prop_idx, slot_idx).ok().flatten() {
                    Some(Value::Bean(sub)) => Some(SnapValue::Bean(self.snapshot_bean(sub))),
                    Some(v) => Some(SnapValue::Scalar(v)),
                    None => None,
                };
                let attrs = prop
                    .attrs
                    .iter()
                    .filter(|a| !a.is_fixed())
                    .filter_map(|a| {
                        self.attr_of_slot(bean, prop_idx, slot_idx, a.dtd_name())
                            .map(|v| (a.dtd_name().to_string(), v))
                    })
                    .collect();
                slots.push(Some(SlotSnapshot { value, attrs }));
            }
            props.push(PropSnapshot {
                name: prop.bean_name.clone(),
                slots,
            });
        }
        BeanSnapshot {
            type_name: data.type_name.clone(),
            attrs,
            props,
        }
    }

    /// Build a detached bean from a snapshot.
    pub(crate) fn materialize(&mut self, snap: &BeanSnapshot) -> Result<BeanId, BindError> {
        let bean = self.create_bean(&snap.type_name)?;
        self.fill_from_snapshot(bean, snap)?;
        Ok(bean)
    }

    /// Replay a snapshot onto an existing (typically freshly created) bean.
    pub(crate) fn fill_from_snapshot(
        &mut self,
        bean: BeanId,
        snap: &BeanSnapshot,
    ) -> Result<(), BindError> {
        for (name, value) in &snap.attrs {
            self.set_bean_attribute(bean, name, Some(value))?;
        }
        for prop in &snap.props {
            let prop_idx = match self.prop_idx(bean, &prop.name) {
                Ok(i) => i,
                Err(_) => continue,
            };
            let is_array = self.bean(bean).props[prop_idx].flags.is_array();
            if is_array {
                self.set_size(bean, &prop.name, prop.slots.len())?;
            }
            for (i, slot) in prop.slots.iter().enumerate() {
                let Some(slot) = slot else { continue };
                let value = match &slot.value {
                    Some(SnapValue::Scalar(v)) => Some(v.clone()),
                    Some(SnapValue::Bean(sub)) => {
                        let sub = self.materialize(sub)?;
                        Some(Value::Bean(sub))
                    }
                    None => None,
                };
                if let Some(value) = value {
                    self.set_value_at(bean, &prop.name, i, Some(value))?;
                }
                for (attr, v) in &slot.attrs {
                    self.set_attribute_value(bean, &prop.name, i, attr, Some(v))?;
                }
            }
        }
        Ok(())
    }

    /// Copy a bean out of another graph into this one, as a detached bean.
    pub fn import_bean(&mut self, other: &Graph, bean: BeanId) -> Result<BeanId, BindError> {
        let snap = other.snapshot_bean(bean);
        self.materialize(&snap)
    }
}
