//! Structural merge and compare between two graphs.
//!
//! Merge walks both trees in parallel from the roots. The mode is a pair
//! of bits: INTERSECT removes what the other graph lacks, UNION adds what
//! it has extra, and UPDATE (both bits) additionally overwrites scalar
//! content, which makes the receiver equal to the argument. COMPARE
//! mutates nothing and reports the first difference. Bean-array elements
//! are paired by the graph's comparator chain; matched pairs are recursed
//! into, since a pair matched on keys may still differ in other content.
//! Unpaired elements are removed, added or reported only when the array's
//! bean type declares key properties; without keys they have no identity
//! to track across graphs.

use std::ops::BitOr;

use xmlbind_dom::NodeId;

use crate::comparator::{attrs_match, Comparison};
use crate::error::BindError;
use crate::graph::Graph;
use crate::value::{BeanId, Value};

/// Merge behavior bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeMode(u32);

impl MergeMode {
    /// Walk without changing anything.
    pub const NONE: MergeMode = MergeMode(0);
    /// Remove elements the other graph does not have.
    pub const INTERSECT: MergeMode = MergeMode(0x01);
    /// Add elements the other graph has extra.
    pub const UNION: MergeMode = MergeMode(0x02);
    /// Make the receiver equal to the other graph.
    pub const UPDATE: MergeMode = MergeMode(0x03);
    /// Report the first difference as an error, mutating nothing.
    pub const COMPARE: MergeMode = MergeMode(0x04);

    fn removes(self) -> bool {
        self.0 & 0x01 != 0
    }

    fn adds(self) -> bool {
        self.0 & 0x02 != 0
    }

    fn updates(self) -> bool {
        self.0 & 0x03 == 0x03
    }

    fn compares(self) -> bool {
        self.0 & 0x04 != 0
    }
}

impl BitOr for MergeMode {
    type Output = MergeMode;

    fn bitor(self, rhs: MergeMode) -> MergeMode {
        MergeMode(self.0 | rhs.0)
    }
}

impl Graph {
    /// Merge another graph into this one.
    pub fn merge(&mut self, other: &Graph, mode: MergeMode) -> Result<(), BindError> {
        let (a, b) = (self.root(), other.root());
        if self.bean_type(a) != other.bean_type(b) {
            return Err(BindError::MergeMismatch {
                left: self.bean_type(a).to_string(),
                right: other.bean_type(b).to_string(),
            });
        }
        if mode.compares() {
            return self.compare_bean_pair(a, other, b);
        }
        if mode == MergeMode::NONE {
            return Ok(());
        }
        log::debug!("merging {:?} into {}", mode, self.full_name(a));
        self.batch(|g| {
            g.merge_bean(a, other, b, mode)?;
            if mode.updates() {
                // Elements no property binds live only in the DOM; UPDATE
                // reconciles them at the root so the receiver carries the
                // other side's versions.
                g.merge_unbound(a, other, b)?;
            }
            Ok(())
        })
    }

    /// Read-only structural equality, using the comparator chain for
    /// bean-array pairing.
    pub fn is_equal_to(&self, other: &Graph) -> bool {
        self.bean_type(self.root()) == other.bean_type(other.root())
            && self
                .compare_bean_pair(self.root(), other, other.root())
                .is_ok()
    }

    pub(crate) fn beans_match(&self, a: BeanId, other: &Graph, b: BeanId) -> Comparison {
        for comparator in &self.comparators {
            let result = comparator.compare_bean(self, a, other, b);
            if result.equal {
                return result;
            }
        }
        Comparison::different()
    }

    // ── Mutating walk ─────────────────────────────────────────────────────

    fn merge_bean(
        &mut self,
        a: BeanId,
        other: &Graph,
        b: BeanId,
        mode: MergeMode,
    ) -> Result<(), BindError> {
        self.merge_attrs(a, other, b, mode)?;
        for name in self.property_names(a) {
            if other.prop_idx(b, &name).is_err() {
                continue;
            }
            if self.is_bean_property(a, &name)? {
                if self.is_array(a, &name)? {
                    self.merge_bean_array(a, other, b, &name, mode)?;
                } else {
                    self.merge_bean_single(a, other, b, &name, mode)?;
                }
            } else if self.is_array(a, &name)? {
                self.merge_scalar_array(a, other, b, &name, mode)?;
            } else {
                self.merge_scalar_single(a, other, b, &name, mode)?;
            }
        }
        if mode.updates() {
            self.merge_comments(a, other, b)?;
        }
        Ok(())
    }

    /// Bring differing element attributes over from the other side.
    /// Fixed and transient descriptors stay out; only modes with the
    /// UNION bit write.
    fn merge_attrs(
        &mut self,
        a: BeanId,
        other: &Graph,
        b: BeanId,
        mode: MergeMode,
    ) -> Result<(), BindError> {
        let mut names = self.bean_attribute_names(a);
        for n in other.bean_attribute_names(b) {
            if !names.contains(&n) {
                names.push(n);
            }
        }
        for name in names {
            let skip = self
                .bean(a)
                .find_own_attr(&name)
                .map(|d| d.is_fixed() || d.is_transient())
                .unwrap_or(false)
                || other.attr_is_transient(b, &name);
            if skip {
                continue;
            }
            let va = self.get_bean_attribute(a, &name).ok().flatten();
            let vb = other.get_bean_attribute(b, &name).ok().flatten();
            if va != vb && mode.adds() {
                self.set_bean_attribute(a, &name, vb.as_deref())?;
            }
        }
        Ok(())
    }

    fn merge_bean_single(
        &mut self,
        a: BeanId,
        other: &Graph,
        b: BeanId,
        name: &str,
        mode: MergeMode,
    ) -> Result<(), BindError> {
        let sa = self.get_value(a, name)?.and_then(|v| v.as_bean());
        let sb = other.get_value(b, name)?.and_then(|v| v.as_bean());
        match (sa, sb) {
            (Some(sa), Some(sb)) => self.merge_bean(sa, other, sb, mode),
            (Some(_), None) if mode.removes() => self.set_value(a, name, None),
            (None, Some(sb)) if mode.adds() => {
                let imported = self.import_bean(other, sb)?;
                self.set_value(a, name, Some(Value::Bean(imported)))
            }
            _ => Ok(()),
        }
    }

    fn merge_bean_array(
        &mut self,
        a: BeanId,
        other: &Graph,
        b: BeanId,
        name: &str,
        mode: MergeMode,
    ) -> Result<(), BindError> {
        let a_items = bean_items(self, a, name)?;
        let b_items = bean_items(other, b, name)?;

        let mut b_taken = vec![false; b_items.len()];
        // (self bean, other bean, matched on keys)
        let mut pairs: Vec<(BeanId, BeanId, bool)> = Vec::new();
        let mut unmatched_a: Vec<usize> = Vec::new();
        for (i, &(_, sa)) in a_items.iter().enumerate() {
            let mut matched = false;
            for (j, &(_, sb)) in b_items.iter().enumerate() {
                if b_taken[j] {
                    continue;
                }
                let result = self.beans_match(sa, other, sb);
                if result.equal {
                    b_taken[j] = true;
                    pairs.push((sa, sb, result.used_key));
                    matched = true;
                    break;
                }
            }
            if !matched {
                unmatched_a.push(i);
            }
        }

        // Removals and additions only make sense when the type has keys
        // to pair by; without keys an unmatched element carries no
        // identity, so both sides keep what they have.
        let keyed =
            self.keyed_bean_type(a, name)? || pairs.iter().any(|&(_, _, used_key)| used_key);

        // A matched pair may still differ in non-key content.
        for (sa, sb, _) in pairs {
            self.merge_bean(sa, other, sb, mode)?;
        }
        if mode.removes() && keyed {
            for &i in unmatched_a.iter().rev() {
                self.remove_value_at(a, name, a_items[i].0)?;
            }
        }
        if mode.adds() && keyed {
            for (j, taken) in b_taken.iter().enumerate() {
                if !taken {
                    let imported = self.import_bean(other, b_items[j].1)?;
                    self.add_value(a, name, Value::Bean(imported))?;
                }
            }
        }
        Ok(())
    }

    /// Whether the sub-bean type of an array property declares any key
    /// property.
    fn keyed_bean_type(&self, bean: BeanId, name: &str) -> Result<bool, BindError> {
        let prop_idx = self.prop_idx(bean, name)?;
        match &self.bean(bean).props[prop_idx].bean_type {
            Some(type_name) => {
                let decl = self.registry.get(type_name)?;
                Ok(decl.props.iter().any(|p| p.flags.is_key()))
            }
            None => Ok(false),
        }
    }

    fn merge_scalar_single(
        &mut self,
        a: BeanId,
        other: &Graph,
        b: BeanId,
        name: &str,
        mode: MergeMode,
    ) -> Result<(), BindError> {
        let va = self.get_value(a, name)?;
        let vb = other.get_value(b, name)?;
        if wire(&va) == wire(&vb) {
            return Ok(());
        }
        if mode.updates() {
            self.set_value(a, name, vb)
        } else if mode.adds() && va.is_none() {
            self.set_value(a, name, vb)
        } else {
            // Differing set scalars are left alone outside UPDATE.
            Ok(())
        }
    }

    fn merge_scalar_array(
        &mut self,
        a: BeanId,
        other: &Graph,
        b: BeanId,
        name: &str,
        mode: MergeMode,
    ) -> Result<(), BindError> {
        let vb: Vec<Value> = other
            .get_values(b, name)?
            .into_iter()
            .flatten()
            .collect();
        if mode.updates() {
            return self.set_values(a, name, &vb);
        }
        if mode.removes() {
            let mut remaining: Vec<Option<String>> =
                vb.iter().map(|v| v.to_wire()).collect();
            for i in (0..self.size(a, name)?).rev() {
                let w = self.get_value_at(a, name, i)?.and_then(|v| v.to_wire());
                match remaining.iter().position(|r| *r == w) {
                    Some(pos) => {
                        remaining.remove(pos);
                    }
                    None => {
                        self.remove_value_at(a, name, i)?;
                    }
                }
            }
        }
        if mode.adds() {
            let mut have: Vec<Option<String>> = self
                .get_values(a, name)?
                .into_iter()
                .map(|v| v.and_then(|v| v.to_wire()))
                .collect();
            for v in vb {
                let w = v.to_wire();
                match have.iter().position(|h| *h == w) {
                    Some(pos) => {
                        have.remove(pos);
                    }
                    None => {
                        self.add_value(a, name, v)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Child elements of the bean's node that no slot binds.
    fn unbound_children(&self, bean: BeanId) -> Vec<NodeId> {
        let Some(node) = self.node_of(bean) else {
            return Vec::new();
        };
        let bound: Vec<NodeId> = self
            .bean(bean)
            .props
            .iter()
            .flat_map(|p| p.slots.iter().flatten())
            .filter_map(|s| s.node)
            .collect();
        self.doc
            .child_elements(node)
            .into_iter()
            .filter(|n| !bound.contains(n))
            .collect()
    }

    /// Replace unbound child elements with the other side's versions:
    /// structurally equal subtrees stay, the rest are swapped out.
    fn merge_unbound(&mut self, a: BeanId, other: &Graph, b: BeanId) -> Result<(), BindError> {
        let Some(node_a) = self.node_of(a) else {
            return Ok(());
        };
        let mine = self.unbound_children(a);
        let theirs = other.unbound_children(b);

        let mut kept = vec![false; mine.len()];
        let mut to_add: Vec<NodeId> = Vec::new();
        for &tn in &theirs {
            let found = mine
                .iter()
                .enumerate()
                .position(|(i, &mn)| !kept[i] && self.doc.deep_eq(mn, &other.doc, tn));
            match found {
                Some(i) => kept[i] = true,
                None => to_add.push(tn),
            }
        }
        for (i, &mn) in mine.iter().enumerate() {
            if !kept[i] {
                self.remove_node(mn);
            }
        }
        for tn in to_add {
            let copy = self.doc.import_node(&other.doc, tn);
            self.doc.append_child(node_a, copy);
        }
        Ok(())
    }

    /// Bring over free-standing comments present only on the other side.
    fn merge_comments(&mut self, a: BeanId, other: &Graph, b: BeanId) -> Result<(), BindError> {
        if !self.is_attached(a) {
            return Ok(());
        }
        let mine = self.comments(a);
        for text in other.comments(b) {
            if !mine.contains(&text) {
                self.add_comment(a, &text)?;
            }
        }
        Ok(())
    }

    // ── Read-only walk ────────────────────────────────────────────────────

    fn compare_bean_pair(&self, a: BeanId, other: &Graph, b: BeanId) -> Result<(), BindError> {
        let mismatch = || BindError::MergeMismatch {
            left: self.full_name(a),
            right: other.full_name(b),
        };
        if self.bean_type(a) != other.bean_type(b) {
            return Err(mismatch());
        }
        if !attrs_match(self, a, other, b) {
            return Err(mismatch());
        }
        for name in self.property_names(a) {
            if other.prop_idx(b, &name).is_err() {
                continue;
            }
            if self.is_bean_property(a, &name)? {
                if self.is_array(a, &name)? {
                    let a_items = bean_items(self, a, &name)?;
                    let b_items = bean_items(other, b, &name)?;
                    let mut b_taken = vec![false; b_items.len()];
                    let mut used_key = false;
                    let mut pairs: Vec<(BeanId, BeanId)> = Vec::new();
                    let mut a_unmatched = 0usize;
                    for &(_, sa) in &a_items {
                        let mut matched = false;
                        for (j, &(_, sb)) in b_items.iter().enumerate() {
                            if b_taken[j] {
                                continue;
                            }
                            let result = self.beans_match(sa, other, sb);
                            if result.equal {
                                b_taken[j] = true;
                                used_key |= result.used_key;
                                pairs.push((sa, sb));
                                matched = true;
                                break;
                            }
                        }
                        if !matched {
                            a_unmatched += 1;
                        }
                    }
                    // Unpaired elements are a difference only when the
                    // type has keys to pair by; without keys they carry
                    // no identity to miss.
                    let keyed = self.keyed_bean_type(a, &name)? || used_key;
                    if keyed && (a_unmatched > 0 || b_taken.iter().any(|t| !t)) {
                        return Err(mismatch());
                    }
                    // A key match is not yet full equality.
                    for (sa, sb) in pairs {
                        self.compare_bean_pair(sa, other, sb)?;
                    }
                } else {
                    let sa = self.get_value(a, &name)?.and_then(|v| v.as_bean());
                    let sb = other.get_value(b, &name)?.and_then(|v| v.as_bean());
                    match (sa, sb) {
                        (Some(sa), Some(sb)) => self.compare_bean_pair(sa, other, sb)?,
                        (None, None) => {}
                        _ => return Err(mismatch()),
                    }
                }
            } else {
                let wa: Vec<Option<String>> = self
                    .get_values(a, &name)?
                    .into_iter()
                    .map(|v| v.and_then(|v| v.to_wire()))
                    .collect();
                let wb: Vec<Option<String>> = other
                    .get_values(b, &name)?
                    .into_iter()
                    .map(|v| v.and_then(|v| v.to_wire()))
                    .collect();
                if wa != wb {
                    return Err(mismatch());
                }
            }
        }
        Ok(())
    }
}

/// (index, bean) pairs of a bean-array property.
fn bean_items(graph: &Graph, bean: BeanId, name: &str) -> Result<Vec<(usize, BeanId)>, BindError> {
    let mut out = Vec::new();
    for i in 0..graph.size(bean, name)? {
        if let Some(Value::Bean(sub)) = graph.get_value_at(bean, name, i)? {
            out.push((i, sub));
        }
    }
    Ok(out)
}

fn wire(v: &Option<Value>) -> Option<String> {
    v.as_ref().and_then(|v| v.to_wire())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_is_both_bits() {
        assert_eq!(MergeMode::INTERSECT | MergeMode::UNION, MergeMode::UPDATE);
        assert!(MergeMode::UPDATE.updates());
        assert!(MergeMode::UPDATE.adds());
        assert!(MergeMode::UPDATE.removes());
    }

    #[test]
    fn partial_modes() {
        assert!(MergeMode::INTERSECT.removes());
        assert!(!MergeMode::INTERSECT.adds());
        assert!(MergeMode::UNION.adds());
        assert!(!MergeMode::UNION.removes());
        assert!(!MergeMode::NONE.adds());
        assert!(MergeMode::COMPARE.compares());
    }
}
