//! Declaration registry.
//!
//! The schema parser / code generator (an external collaborator) hands the
//! runtime one [`NodeDecl`] per non-final element: the ordered property
//! list with type flags plus the attribute declarations. A [`TypeRegistry`]
//! collects these and is supplied at graph construction, replacing any kind
//! of reflective "instantiate by class name" machinery with plain lookups.

use indexmap::IndexMap;

use crate::attr::{AttrKind, AttrOption, AttrProp};
use crate::error::BindError;
use crate::flags::TypeFlags;

/// Convert a schema name into an identifier-style bean name:
/// `my-element.name` becomes `MyElementName`.
pub fn convert_name(dtd_name: &str) -> String {
    let mut out = String::with_capacity(dtd_name.len());
    let mut upper_next = true;
    for ch in dtd_name.chars() {
        if matches!(ch, '-' | '_' | ':' | '.') {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Declaration of one attribute of a property.
#[derive(Debug, Clone)]
pub struct AttrDecl {
    pub dtd_name: String,
    pub kind: AttrKind,
    pub option: AttrOption,
    pub values: Vec<String>,
    pub default: Option<String>,
}

impl AttrDecl {
    pub fn new(dtd_name: &str, kind: AttrKind, option: AttrOption) -> AttrDecl {
        AttrDecl {
            dtd_name: dtd_name.to_string(),
            kind,
            option,
            values: Vec::new(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: &str) -> AttrDecl {
        self.default = Some(default.to_string());
        self
    }

    pub fn with_values(mut self, values: &[&str]) -> AttrDecl {
        self.values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub(crate) fn build(&self) -> AttrProp {
        AttrProp::new(
            &self.dtd_name,
            self.kind,
            self.option,
            self.values.clone(),
            self.default.clone(),
        )
    }
}

/// Declaration of one property of a node type, in schema order.
#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub dtd_name: String,
    pub name: String,
    pub flags: TypeFlags,
    /// Registry key of the sub-bean type, for bean-kind properties.
    pub bean_type: Option<String>,
    /// Choice-group number shared by contiguous OR-declared siblings.
    pub group: Option<u16>,
    pub attrs: Vec<AttrDecl>,
}

impl PropertyDecl {
    pub fn new(dtd_name: &str, flags: TypeFlags) -> PropertyDecl {
        PropertyDecl {
            dtd_name: dtd_name.to_string(),
            name: convert_name(dtd_name),
            flags,
            bean_type: None,
            group: None,
            attrs: Vec::new(),
        }
    }

    pub fn bean(dtd_name: &str, flags: TypeFlags, bean_type: &str) -> PropertyDecl {
        let mut p = PropertyDecl::new(dtd_name, flags | TypeFlags::BEAN);
        p.bean_type = Some(bean_type.to_string());
        p
    }

    pub fn in_group(mut self, group: u16) -> PropertyDecl {
        self.group = Some(group);
        self.flags = self.flags | TypeFlags::CHOICE;
        self
    }

    pub fn with_attr(mut self, attr: AttrDecl) -> PropertyDecl {
        self.attrs.push(attr);
        self
    }
}

/// Declaration of one node (bean) type.
#[derive(Debug, Clone)]
pub struct NodeDecl {
    pub dtd_name: String,
    pub name: String,
    /// Attributes of the element itself.
    pub attrs: Vec<AttrDecl>,
    pub props: Vec<PropertyDecl>,
}

impl NodeDecl {
    pub fn new(dtd_name: &str) -> NodeDecl {
        NodeDecl {
            dtd_name: dtd_name.to_string(),
            name: convert_name(dtd_name),
            attrs: Vec::new(),
            props: Vec::new(),
        }
    }

    pub fn with_attr(mut self, attr: AttrDecl) -> NodeDecl {
        self.attrs.push(attr);
        self
    }

    pub fn with_prop(mut self, prop: PropertyDecl) -> NodeDecl {
        self.props.push(prop);
        self
    }
}

/// All node types of one schema, plus the designated root type.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, NodeDecl>,
    root: String,
}

impl TypeRegistry {
    pub fn new(root_type: &str) -> TypeRegistry {
        TypeRegistry {
            types: IndexMap::new(),
            root: root_type.to_string(),
        }
    }

    pub fn insert(&mut self, decl: NodeDecl) {
        self.types.insert(decl.dtd_name.clone(), decl);
    }

    pub fn with(mut self, decl: NodeDecl) -> TypeRegistry {
        self.insert(decl);
        self
    }

    pub fn root_type(&self) -> &str {
        &self.root
    }

    /// Look a type up by schema name or converted bean name.
    pub fn get(&self, name: &str) -> Result<&NodeDecl, BindError> {
        self.types
            .get(name)
            .or_else(|| self.types.values().find(|d| d.name == name))
            .ok_or_else(|| BindError::UnknownType(name.to_string()))
    }
}
