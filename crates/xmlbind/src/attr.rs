//! Attribute descriptors.
//!
//! An [`AttrProp`] captures the declaration of one XML attribute: its kind
//! (`CDATA`, an enumeration, ...), its option (`#REQUIRED` / `#IMPLIED` /
//! `#FIXED`), an optional default and the legal enumerated values. It is
//! either built incrementally from a DTD-style declaration tail, or
//! synthesized as *transient* the first time an undeclared attribute shows
//! up on a DOM element at runtime.

use crate::decl::convert_name;
use crate::error::BindError;

/// The nine XML attribute kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Cdata,
    Enumerated,
    Nmtoken,
    Nmtokens,
    Id,
    Idref,
    Idrefs,
    Entity,
    Entities,
}

impl AttrKind {
    fn from_token(tok: &str) -> Option<AttrKind> {
        Some(match tok {
            "CDATA" => AttrKind::Cdata,
            "NMTOKEN" => AttrKind::Nmtoken,
            "NMTOKENS" => AttrKind::Nmtokens,
            "ID" => AttrKind::Id,
            "IDREF" => AttrKind::Idref,
            "IDREFS" => AttrKind::Idrefs,
            "ENTITY" => AttrKind::Entity,
            "ENTITIES" => AttrKind::Entities,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOption {
    Required,
    Implied,
    Fixed,
}

/// Internal builder state while consuming declaration tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    ExpectKind,
    ExpectOptionOrDefault,
    ExpectDefault,
    Complete,
}

#[derive(Debug, Clone)]
pub struct AttrProp {
    dtd_name: String,
    name: String,
    kind: AttrKind,
    option: AttrOption,
    values: Vec<String>,
    default: Option<String>,
    transient: bool,
    state: BuildState,
}

impl AttrProp {
    /// A fully-specified descriptor, as produced by generated code.
    pub fn new(
        dtd_name: &str,
        kind: AttrKind,
        option: AttrOption,
        values: Vec<String>,
        default: Option<String>,
    ) -> AttrProp {
        AttrProp {
            dtd_name: dtd_name.to_string(),
            name: convert_name(dtd_name),
            kind,
            option,
            values,
            default,
            transient: false,
            state: BuildState::Complete,
        }
    }

    /// Descriptor for an attribute discovered on a DOM element at runtime
    /// without any declaration backing it.
    pub fn transient(dtd_name: &str) -> AttrProp {
        let mut a = AttrProp::new(dtd_name, AttrKind::Cdata, AttrOption::Implied, Vec::new(), None);
        a.transient = true;
        a
    }

    /// Parse the declaration tail of one ATTLIST entry, e.g.
    /// `CDATA #REQUIRED`, `(a|b|c) "a"` or `CDATA #FIXED "1.0"`.
    pub fn parse(dtd_name: &str, decl: &str) -> Result<AttrProp, BindError> {
        let mut a = AttrProp::new(dtd_name, AttrKind::Cdata, AttrOption::Implied, Vec::new(), None);
        a.state = BuildState::ExpectKind;
        for tok in tokenize(decl) {
            a.push_token(&tok)?;
        }
        a.finish()?;
        Ok(a)
    }

    /// Feed the next declaration token into the builder.
    pub fn push_token(&mut self, tok: &str) -> Result<(), BindError> {
        match self.state {
            BuildState::ExpectKind => {
                if let Some(stripped) = tok.strip_prefix('(') {
                    let body = stripped.trim_end_matches(')');
                    self.kind = AttrKind::Enumerated;
                    self.values = body
                        .split('|')
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                        .collect();
                    if self.values.is_empty() {
                        return Err(BindError::MalformedAttrDecl(format!(
                            "empty enumeration for `{}`",
                            self.dtd_name
                        )));
                    }
                } else {
                    self.kind = AttrKind::from_token(tok).ok_or_else(|| {
                        BindError::MalformedAttrDecl(format!(
                            "`{tok}` is not an attribute kind"
                        ))
                    })?;
                }
                self.state = BuildState::ExpectOptionOrDefault;
            }
            BuildState::ExpectOptionOrDefault => match tok {
                "#REQUIRED" => {
                    self.option = AttrOption::Required;
                    self.state = BuildState::Complete;
                }
                "#IMPLIED" => {
                    self.option = AttrOption::Implied;
                    self.state = BuildState::Complete;
                }
                "#FIXED" => {
                    self.option = AttrOption::Fixed;
                    self.state = BuildState::ExpectDefault;
                }
                quoted if quoted.starts_with('"') => {
                    self.default = Some(unquote(quoted));
                    self.state = BuildState::Complete;
                }
                other => {
                    return Err(BindError::MalformedAttrDecl(format!(
                        "unexpected token `{other}` after attribute kind"
                    )))
                }
            },
            BuildState::ExpectDefault => {
                if !tok.starts_with('"') {
                    return Err(BindError::MalformedAttrDecl(format!(
                        "#FIXED `{}` needs a quoted default",
                        self.dtd_name
                    )));
                }
                self.default = Some(unquote(tok));
                self.state = BuildState::Complete;
            }
            BuildState::Complete => {
                return Err(BindError::MalformedAttrDecl(format!(
                    "trailing token `{tok}` in declaration of `{}`",
                    self.dtd_name
                )))
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BindError> {
        match self.state {
            BuildState::Complete => Ok(()),
            _ => Err(BindError::MalformedAttrDecl(format!(
                "incomplete declaration for `{}`",
                self.dtd_name
            ))),
        }
    }

    pub fn dtd_name(&self) -> &str {
        &self.dtd_name
    }

    /// Converted identifier name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    pub fn option(&self) -> AttrOption {
        self.option
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn enum_values(&self) -> &[String] {
        &self.values
    }

    pub fn is_fixed(&self) -> bool {
        self.option == AttrOption::Fixed
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_enum(&self) -> bool {
        self.kind == AttrKind::Enumerated
    }

    /// Matches either the declared or the converted name.
    pub fn has_name(&self, name: &str) -> bool {
        name == self.name || name == self.dtd_name
    }

    /// Enumerated-value membership check; other kinds accept anything.
    pub fn check_value(&self, value: &str) -> Result<(), BindError> {
        if self.is_enum() && !self.values.iter().any(|v| v == value) {
            return Err(BindError::EnumViolation {
                name: self.dtd_name.clone(),
                value: value.to_string(),
            });
        }
        Ok(())
    }
}

/// Split a declaration tail into tokens, keeping `(...)` groups and quoted
/// strings intact.
fn tokenize(decl: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = decl.trim();
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('(') {
            let end = stripped.find(')').map(|i| i + 1).unwrap_or(stripped.len());
            out.push(format!("({}", &stripped[..end]));
            rest = stripped[end..].trim_start();
        } else if let Some(stripped) = rest.strip_prefix('"') {
            let end = stripped.find('"').map(|i| i + 1).unwrap_or(stripped.len());
            out.push(format!("\"{}", &stripped[..end]));
            rest = stripped[end..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            out.push(rest[..end].to_string());
            rest = rest[end..].trim_start();
        }
    }
    out
}

fn unquote(tok: &str) -> String {
    tok.trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_required_cdata() {
        let a = AttrProp::parse("version", "CDATA #REQUIRED").unwrap();
        assert_eq!(a.kind(), AttrKind::Cdata);
        assert_eq!(a.option(), AttrOption::Required);
        assert_eq!(a.default_value(), None);
        assert!(!a.is_transient());
    }

    #[test]
    fn parse_enumeration_with_default() {
        let a = AttrProp::parse("color", "( red | green | blue ) \"red\"").unwrap();
        assert!(a.is_enum());
        assert_eq!(a.enum_values(), ["red", "green", "blue"]);
        assert_eq!(a.default_value(), Some("red"));
        assert!(a.check_value("green").is_ok());
        assert!(matches!(
            a.check_value("mauve"),
            Err(BindError::EnumViolation { .. })
        ));
    }

    #[test]
    fn parse_fixed_needs_default() {
        let a = AttrProp::parse("version", "CDATA #FIXED \"1.0\"").unwrap();
        assert!(a.is_fixed());
        assert_eq!(a.default_value(), Some("1.0"));
        assert!(AttrProp::parse("version", "CDATA #FIXED").is_err());
    }

    #[test]
    fn malformed_kind_is_rejected() {
        assert!(matches!(
            AttrProp::parse("a", "PCDATA #IMPLIED"),
            Err(BindError::MalformedAttrDecl(_))
        ));
        assert!(AttrProp::parse("a", "() #IMPLIED").is_err());
    }

    #[test]
    fn converted_name_and_matching() {
        let a = AttrProp::parse("xml-lang", "NMTOKEN #IMPLIED").unwrap();
        assert_eq!(a.name(), "XmlLang");
        assert!(a.has_name("xml-lang"));
        assert!(a.has_name("XmlLang"));
        assert!(!a.has_name("Lang"));
    }

    #[test]
    fn transient_descriptor() {
        let a = AttrProp::transient("added-at-runtime");
        assert!(a.is_transient());
        assert_eq!(a.kind(), AttrKind::Cdata);
        assert_eq!(a.option(), AttrOption::Implied);
    }
}
