//! The graph context.
//!
//! A [`Graph`] owns everything one bound document needs: the DOM, the bean
//! arena, the type registry it was built from, the comparator chain used by
//! merge and compare, the listener id counter and the event queue. There is
//! no shared global state; two graphs never interact except through
//! explicit snapshot import.

use std::io::{BufRead, Write};
use std::rc::Rc;

use xmlbind_dom::{io, Document, NodeId};

use crate::bean::{BeanData, ParentLink};
use crate::binding::DomBinding;
use crate::comparator::{BeanComparator, DefaultComparator};
use crate::decl::{AttrDecl, NodeDecl, PropertyDecl, TypeRegistry};
use crate::error::BindError;
use crate::events::{ListenerId, PropertyChangeEvent};
use crate::flags::ValueKind;
use crate::prop::BeanProp;
use crate::value::{BeanId, Value};

const DEFAULT_INDENT: &str = "  ";

pub struct Graph {
    pub(crate) doc: Document,
    pub(crate) beans: Vec<BeanData>,
    pub(crate) registry: TypeRegistry,
    pub(crate) comparators: Vec<Rc<dyn BeanComparator>>,
    root: BeanId,
    pub(crate) delay: u32,
    pub(crate) queued: Vec<(BeanId, Option<usize>, PropertyChangeEvent)>,
    next_slot_id: u64,
    next_listener_id: u64,
}

impl Graph {
    /// Create an empty graph: a document holding just the root element,
    /// with the root bean's properties declared but unset.
    pub fn new(registry: TypeRegistry) -> Result<Graph, BindError> {
        let root_decl = registry.get(registry.root_type())?.clone();
        let (doc, _) = Document::with_root(&root_decl.dtd_name);
        let mut graph = Graph::empty(doc, registry);
        let root = graph.instantiate(&root_decl)?;
        graph.bean_mut(root).is_root = true;
        graph.root = root;
        Ok(graph)
    }

    /// Parse a document and bind it: every recognized element becomes a
    /// bean or a slot, unrecognized content stays in the DOM untouched.
    pub fn from_reader<R: BufRead>(registry: TypeRegistry, reader: R) -> Result<Graph, BindError> {
        let doc = io::parse_document(reader)?;
        let root_el = doc.root().ok_or(xmlbind_dom::XmlError::NoRoot)?;
        let root_name = doc
            .element_name(root_el)
            .unwrap_or_default()
            .to_string();
        let root_decl = registry.get(&root_name)?.clone();
        let mut graph = Graph::empty(doc, registry);
        let root = graph.instantiate(&root_decl)?;
        graph.bean_mut(root).is_root = true;
        graph.root = root;
        graph.bind_element(root, root_el)?;
        Ok(graph)
    }

    pub fn parse(registry: TypeRegistry, xml: &str) -> Result<Graph, BindError> {
        Graph::from_reader(registry, xml.as_bytes())
    }

    fn empty(doc: Document, registry: TypeRegistry) -> Graph {
        Graph {
            doc,
            beans: Vec::new(),
            registry,
            comparators: vec![Rc::new(DefaultComparator::default())],
            root: BeanId(0),
            delay: 0,
            queued: Vec::new(),
            next_slot_id: 0,
            next_listener_id: 0,
        }
    }

    pub fn root(&self) -> BeanId {
        self.root
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn alloc_slot_id(&mut self) -> u64 {
        self.next_slot_id += 1;
        self.next_slot_id
    }

    fn alloc_listener_id(&mut self) -> ListenerId {
        self.next_listener_id += 1;
        ListenerId(self.next_listener_id)
    }

    // ── Declaration ───────────────────────────────────────────────────────

    /// Create a detached bean of a registered type.
    pub fn create_bean(&mut self, type_name: &str) -> Result<BeanId, BindError> {
        let decl = self.registry.get(type_name)?.clone();
        self.instantiate(&decl)
    }

    fn instantiate(&mut self, decl: &NodeDecl) -> Result<BeanId, BindError> {
        let bean = BeanId(self.beans.len() as u32);
        self.beans.push(BeanData {
            type_name: decl.dtd_name.clone(),
            name: decl.name.clone(),
            props: Vec::new(),
            own_attrs: decl.attrs.iter().map(AttrDecl::build).collect(),
            attr_cache: Vec::new(),
            parent: None,
            is_root: false,
            listeners: Vec::new(),
        });
        for prop in &decl.props {
            self.create_property(bean, prop)?;
        }
        Ok(bean)
    }

    /// Declare one more property on a bean. Fails on a duplicate name.
    pub fn create_property(&mut self, bean: BeanId, decl: &PropertyDecl) -> Result<(), BindError> {
        if self
            .bean(bean)
            .props
            .iter()
            .any(|p| p.dtd_name == decl.dtd_name || p.bean_name == decl.name)
        {
            return Err(BindError::DuplicateProperty(decl.dtd_name.clone()));
        }
        let attrs = decl.attrs.iter().map(AttrDecl::build).collect();
        self.bean_mut(bean).props.push(BeanProp::new(
            &decl.dtd_name,
            &decl.name,
            decl.flags,
            decl.bean_type.clone(),
            decl.group,
            attrs,
        ));
        Ok(())
    }

    /// Declare an attribute after the fact: on a property when `prop` is
    /// given, on the bean's own element otherwise.
    pub fn create_attribute(
        &mut self,
        bean: BeanId,
        prop: Option<&str>,
        decl: &AttrDecl,
    ) -> Result<(), BindError> {
        match prop {
            Some(name) => {
                let prop_idx = self.prop_idx(bean, name)?;
                self.bean_mut(bean).props[prop_idx].attrs.push(decl.build());
            }
            None => self.bean_mut(bean).own_attrs.push(decl.build()),
        }
        Ok(())
    }

    // ── Binding a parsed document ─────────────────────────────────────────

    /// Walk the children of `element` and bind each one to a slot of
    /// `bean`. Elements with no declared property are left as plain DOM
    /// content and survive rewrites.
    fn bind_element(&mut self, bean: BeanId, element: NodeId) -> Result<(), BindError> {
        self.harvest_bean_attrs(bean, element);
        let children = self.doc.children(element).to_vec();
        for child in children {
            if self.doc.is_comment(child) {
                self.bind_comment(bean, child);
                continue;
            }
            if !self.doc.is_element(child) {
                continue;
            }
            let name = match self.doc.element_name(child) {
                Some(n) => n.to_string(),
                None => continue,
            };
            let prop_idx = self
                .bean(bean)
                .props
                .iter()
                .position(|p| p.dtd_name == name);
            let Some(prop_idx) = prop_idx else {
                log::warn!("element `{name}` has no declared property, leaving it unbound");
                continue;
            };
            let flags = self.bean(bean).props[prop_idx].flags;
            if !flags.is_array() && !self.bean(bean).props[prop_idx].slots.is_empty() {
                log::warn!("duplicate element `{name}` for single property, keeping the first");
                continue;
            }

            let id = self.alloc_slot_id();
            let mut slot = DomBinding::new(id);
            slot.node = Some(child);
            if flags.is_bean() {
                let sub_decl = self.registry.get(&name)?.clone();
                let sub = self.instantiate(&sub_decl)?;
                slot.value = Some(Value::Bean(sub));
                self.bean_mut(sub).parent = Some(ParentLink {
                    bean,
                    prop: prop_idx,
                    slot: id,
                });
                self.bean_mut(bean).props[prop_idx].slots.push(Some(slot));
                self.bind_element(sub, child)?;
            } else {
                self.bean_mut(bean).props[prop_idx].slots.push(Some(slot));
                self.harvest_prop_attrs(bean, prop_idx, child);
            }
        }
        Ok(())
    }

    /// A comment binds to a comment-kind property when the bean declares
    /// one; otherwise it stays free-standing.
    fn bind_comment(&mut self, bean: BeanId, node: NodeId) {
        let prop_idx = self
            .bean(bean)
            .props
            .iter()
            .position(|p| p.flags.kind() == ValueKind::Comment);
        let Some(prop_idx) = prop_idx else { return };
        let flags = self.bean(bean).props[prop_idx].flags;
        if !flags.is_array() && !self.bean(bean).props[prop_idx].slots.is_empty() {
            return;
        }
        let id = self.alloc_slot_id();
        let mut slot = DomBinding::new(id);
        slot.node = Some(node);
        self.bean_mut(bean).props[prop_idx].slots.push(Some(slot));
    }

    // ── Output ────────────────────────────────────────────────────────────

    /// Reindent the document and write it out.
    pub fn write<W: Write>(&mut self, writer: W) -> Result<(), BindError> {
        self.doc.reindent(DEFAULT_INDENT);
        io::write_document(&self.doc, writer)?;
        Ok(())
    }

    /// Write the document exactly as it stands, whitespace included.
    pub fn write_no_reindent<W: Write>(&self, writer: W) -> Result<(), BindError> {
        io::write_document(&self.doc, writer)?;
        Ok(())
    }

    pub fn to_xml_string(&mut self) -> Result<String, BindError> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Default namespace declared on the root element.
    pub fn default_namespace(&self) -> Option<String> {
        let root = self.doc.root()?;
        self.doc.attribute(root, "xmlns").map(str::to_string)
    }

    pub fn set_default_namespace(&mut self, namespace: Option<&str>) {
        if let Some(root) = self.doc.root() {
            self.doc.set_attribute(root, "xmlns", namespace);
        }
    }

    // ── Cloning ───────────────────────────────────────────────────────────

    /// Deep copy of the whole graph: same registry, fresh DOM and arena,
    /// no listeners carried over.
    pub fn clone_graph(&self) -> Result<Graph, BindError> {
        let snap = self.snapshot_bean(self.root);
        let mut copy = Graph::new(self.registry.clone())?;
        copy.doc.set_doctype(self.doc.doctype().map(str::to_string));
        copy.comparators = self.comparators.clone();
        let root = copy.root;
        copy.fill_from_snapshot(root, &snap)?;
        Ok(copy)
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    /// Listen to every change within the bean's subtree.
    pub fn add_change_listener(
        &mut self,
        bean: BeanId,
        listener: impl FnMut(&PropertyChangeEvent) + 'static,
    ) -> ListenerId {
        let id = self.alloc_listener_id();
        self.bean_mut(bean).listeners.push((id, Box::new(listener)));
        id
    }

    /// Listen to changes of one property only.
    pub fn add_property_change_listener(
        &mut self,
        bean: BeanId,
        name: &str,
        listener: impl FnMut(&PropertyChangeEvent) + 'static,
    ) -> Result<ListenerId, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let id = self.alloc_listener_id();
        self.bean_mut(bean).props[prop_idx]
            .change_listeners
            .push((id, Box::new(listener)));
        Ok(id)
    }

    pub fn remove_change_listener(&mut self, bean: BeanId, id: ListenerId) {
        let data = self.bean_mut(bean);
        data.listeners.retain(|(l, _)| *l != id);
        for prop in &mut data.props {
            prop.change_listeners.retain(|(l, _)| *l != id);
        }
    }

    /// Register a veto listener on one property. The listener runs before
    /// any mutation of the property; returning an error cancels it.
    pub fn add_veto_listener(
        &mut self,
        bean: BeanId,
        name: &str,
        listener: impl Fn(&PropertyChangeEvent) -> Result<(), String> + 'static,
    ) -> Result<ListenerId, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        let id = self.alloc_listener_id();
        self.bean_mut(bean).props[prop_idx]
            .veto_listeners
            .push((id, Box::new(listener)));
        Ok(id)
    }

    pub fn remove_veto_listener(&mut self, bean: BeanId, id: ListenerId) {
        for prop in &mut self.bean_mut(bean).props {
            prop.veto_listeners.retain(|(l, _)| *l != id);
        }
    }

    // ── Comparators ───────────────────────────────────────────────────────

    /// Prepend a comparator; the most recently added one runs first.
    pub fn add_comparator(&mut self, comparator: Rc<dyn BeanComparator>) {
        self.comparators.insert(0, comparator);
    }

    pub fn remove_comparator(&mut self, comparator: &Rc<dyn BeanComparator>) {
        self.comparators.retain(|c| !Rc::ptr_eq(c, comparator));
    }
}
