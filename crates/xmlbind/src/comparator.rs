//! Bean equivalence for merge and compare.
//!
//! When a merge walks two graphs it has to decide which elements of a
//! bean-array on one side correspond to which on the other. That decision
//! is delegated to the graph's comparator chain: the first comparator that
//! reports a match wins. The default comparator matches on declared key
//! properties when the type has any, and on full scalar content otherwise.

use crate::graph::Graph;
use crate::value::{BeanId, Value};

/// Outcome of one equivalence check.
///
/// `used_key` records whether the verdict rests on key properties alone;
/// a key-based match may still differ in non-key content, so merge
/// recurses into such pairs.
#[derive(Debug, Clone, Copy)]
pub struct Comparison {
    pub equal: bool,
    pub used_key: bool,
}

impl Comparison {
    pub fn matched(used_key: bool) -> Comparison {
        Comparison {
            equal: true,
            used_key,
        }
    }

    pub fn different() -> Comparison {
        Comparison {
            equal: false,
            used_key: false,
        }
    }
}

/// Pluggable bean equivalence.
pub trait BeanComparator {
    /// Decide whether `a` (in `cur`) and `b` (in `other`) denote the same
    /// logical element.
    fn compare_bean(&self, cur: &Graph, a: BeanId, other: &Graph, b: BeanId) -> Comparison;
}

/// Key-based equivalence with a full-content fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComparator {
    match_all: bool,
}

impl DefaultComparator {
    pub fn new() -> DefaultComparator {
        DefaultComparator::default()
    }

    /// Ignore key declarations and always compare full scalar content.
    pub fn match_all() -> DefaultComparator {
        DefaultComparator { match_all: true }
    }
}

impl BeanComparator for DefaultComparator {
    fn compare_bean(&self, cur: &Graph, a: BeanId, other: &Graph, b: BeanId) -> Comparison {
        if cur.bean_type(a) != other.bean_type(b) {
            return Comparison::different();
        }
        let names = cur.property_names(a);
        let key_names: Vec<&String> = names
            .iter()
            .filter(|n| {
                cur.property_flags(a, n)
                    .map(|f| f.is_key())
                    .unwrap_or(false)
            })
            .collect();

        if !self.match_all && !key_names.is_empty() {
            // Keyed type: key properties decide, everything else is
            // content that a merge may still have to update. Two beans
            // with all keys unset compare equal on purpose.
            for name in key_names {
                if !self.property_matches(cur, a, other, b, name) {
                    return Comparison::different();
                }
            }
            return Comparison::matched(true);
        }

        // No keys: full scalar content plus element attributes.
        for name in &names {
            let is_bean = cur.is_bean_property(a, name).unwrap_or(false);
            if is_bean {
                continue;
            }
            if !self.property_matches(cur, a, other, b, name) {
                return Comparison::different();
            }
        }
        if !attrs_match(cur, a, other, b) {
            return Comparison::different();
        }
        Comparison::matched(false)
    }
}

impl DefaultComparator {
    /// One property, every occurrence: wire-value sequences must be equal.
    /// Bean-kind key properties recurse.
    fn property_matches(
        &self,
        cur: &Graph,
        a: BeanId,
        other: &Graph,
        b: BeanId,
        name: &str,
    ) -> bool {
        let is_bean = cur.is_bean_property(a, name).unwrap_or(false);
        if is_bean {
            let va = cur.get_value(a, name).ok().flatten();
            let vb = other.get_value(b, name).ok().flatten();
            return match (va, vb) {
                (Some(Value::Bean(sa)), Some(Value::Bean(sb))) => {
                    self.compare_bean(cur, sa, other, sb).equal
                }
                (None, None) => true,
                _ => false,
            };
        }
        let wa = wire_values(cur, a, name);
        let wb = wire_values(other, b, name);
        wa == wb
    }
}

fn wire_values(graph: &Graph, bean: BeanId, name: &str) -> Vec<Option<String>> {
    graph
        .get_values(bean, name)
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.and_then(|v| v.to_wire()))
        .collect()
}

/// Element attributes, compared over the union of both sides' declared
/// names. Transient descriptors (attributes harvested at runtime rather
/// than declared) stay out of the verdict, as does `xmlns`.
pub(crate) fn attrs_match(cur: &Graph, a: BeanId, other: &Graph, b: BeanId) -> bool {
    let mut names = cur.bean_attribute_names(a);
    for n in other.bean_attribute_names(b) {
        if !names.contains(&n) {
            names.push(n);
        }
    }
    names.retain(|n| {
        n != "xmlns"
            && !cur.attr_is_transient(a, n)
            && !other.attr_is_transient(b, n)
    });
    for name in names {
        let va = cur.get_bean_attribute(a, &name).ok().flatten();
        let vb = other.get_bean_attribute(b, &name).ok().flatten();
        if va != vb {
            return false;
        }
    }
    true
}
