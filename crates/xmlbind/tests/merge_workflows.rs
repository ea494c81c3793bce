mod common;

use common::{add_chapter, book_registry, chapter_titles, empty_book};
use xmlbind::{BindError, Graph, MergeMode, NodeDecl, PropertyDecl, TypeFlags, TypeRegistry, Value};

fn book_with(titles: &[(&str, &[&str])]) -> Graph {
    let mut g = empty_book();
    let root = g.root();
    g.set_value(root, "Title", Some(Value::Text("Guide".into())))
        .unwrap();
    for (title, lines) in titles {
        add_chapter(&mut g, title, lines);
    }
    g
}

#[test]
fn union_adds_what_is_missing_keyed_on_title() {
    let mut left = book_with(&[("A", &["a1"]), ("B", &[])]);
    let right = book_with(&[("B", &[]), ("C", &["c1"])]);
    left.merge(&right, MergeMode::UNION).unwrap();
    assert_eq!(chapter_titles(&left), ["A", "B", "C"]);

    // The imported chapter came over with its content.
    let root = left.root();
    let c = left
        .get_value_at(root, "Chapter", 2)
        .unwrap()
        .unwrap()
        .as_bean()
        .unwrap();
    assert_eq!(
        left.get_value_at(c, "Line", 0).unwrap(),
        Some(Value::Text("c1".into()))
    );
}

#[test]
fn union_merges_matched_pairs_recursively() {
    let mut left = book_with(&[("A", &["a1"])]);
    let right = book_with(&[("A", &["a1", "a2"])]);
    left.merge(&right, MergeMode::UNION).unwrap();
    assert_eq!(chapter_titles(&left), ["A"]);
    let root = left.root();
    let a = left
        .get_value_at(root, "Chapter", 0)
        .unwrap()
        .unwrap()
        .as_bean()
        .unwrap();
    assert_eq!(left.size(a, "Line").unwrap(), 2);
}

#[test]
fn intersect_keeps_only_common_chapters() {
    let mut left = book_with(&[("A", &[]), ("B", &[])]);
    let right = book_with(&[("B", &[]), ("C", &[])]);
    left.merge(&right, MergeMode::INTERSECT).unwrap();
    assert_eq!(chapter_titles(&left), ["B"]);
}

#[test]
fn update_makes_the_receiver_equal() {
    let mut left = book_with(&[("A", &["a1"]), ("B", &[])]);
    let right = book_with(&[("B", &["b1"]), ("C", &[])]);
    left.merge(&right, MergeMode::UPDATE).unwrap();
    assert!(left.is_equal_to(&right));
    assert_eq!(chapter_titles(&left), ["B", "C"]);

    // Idempotent: merging again changes nothing.
    left.merge(&right, MergeMode::UPDATE).unwrap();
    assert!(left.is_equal_to(&right));
}

#[test]
fn update_copies_scalars_and_attributes() {
    let mut left = book_with(&[]);
    let mut right = book_with(&[]);
    let r = right.root();
    right
        .set_value(r, "Title", Some(Value::Text("Second".into())))
        .unwrap();
    right.set_bean_attribute(r, "lang", Some("fr")).unwrap();
    right
        .set_value(r, "Paperback", Some(Value::Bool(true)))
        .unwrap();

    left.merge(&right, MergeMode::UPDATE).unwrap();
    let l = left.root();
    assert_eq!(
        left.get_value(l, "Title").unwrap(),
        Some(Value::Text("Second".into()))
    );
    assert_eq!(left.get_bean_attribute(l, "lang").unwrap().as_deref(), Some("fr"));
    assert_eq!(
        left.get_value(l, "Paperback").unwrap(),
        Some(Value::Bool(true))
    );
}

// Keyless fixture: log entries declare no key property.
fn log_registry() -> TypeRegistry {
    TypeRegistry::new("log")
        .with(NodeDecl::new("log").with_prop(PropertyDecl::bean(
            "entry",
            TypeFlags::OPTIONAL_ARRAY,
            "entry",
        )))
        .with(NodeDecl::new("entry").with_prop(PropertyDecl::new(
            "line",
            TypeFlags::OPTIONAL | TypeFlags::TEXT,
        )))
}

fn log_with(lines: &[&str]) -> Graph {
    let mut g = Graph::new(log_registry()).unwrap();
    let root = g.root();
    for line in lines {
        let e = g.create_bean("entry").unwrap();
        g.set_value(e, "Line", Some(Value::Text((*line).into())))
            .unwrap();
        g.add_value(root, "Entry", Value::Bean(e)).unwrap();
    }
    g
}

fn entry_lines(g: &Graph) -> Vec<String> {
    let root = g.root();
    g.get_values(root, "Entry")
        .unwrap()
        .into_iter()
        .flatten()
        .map(|v| {
            let e = v.as_bean().unwrap();
            g.get_value(e, "Line")
                .unwrap()
                .and_then(|v| v.as_text().map(str::to_string))
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn keyless_arrays_keep_unmatched_elements() {
    let mut left = log_with(&["one", "two"]);
    let right = log_with(&["two", "three"]);
    // Without keys an unmatched entry has no identity to pair by, so
    // neither side treats the other's extras as a difference.
    assert!(left.is_equal_to(&right));
    assert!(left.merge(&right, MergeMode::COMPARE).is_ok());

    left.merge(&right, MergeMode::INTERSECT).unwrap();
    assert_eq!(entry_lines(&left), ["one", "two"]);
    left.merge(&right, MergeMode::UNION).unwrap();
    assert_eq!(entry_lines(&left), ["one", "two"]);
}

#[test]
fn union_copies_attributes_but_not_differing_scalars() {
    let mut left = book_with(&[]);
    let mut right = book_with(&[]);
    let r = right.root();
    right.set_bean_attribute(r, "lang", Some("fr")).unwrap();
    right
        .set_value(r, "Title", Some(Value::Text("Second".into())))
        .unwrap();

    left.merge(&right, MergeMode::UNION).unwrap();
    let l = left.root();
    assert_eq!(left.get_bean_attribute(l, "lang").unwrap().as_deref(), Some("fr"));
    // A scalar set on both sides keeps the receiver's value outside UPDATE.
    assert_eq!(
        left.get_value(l, "Title").unwrap(),
        Some(Value::Text("Guide".into()))
    );

    left.merge(&right, MergeMode::INTERSECT).unwrap();
    assert_eq!(
        left.get_value(l, "Title").unwrap(),
        Some(Value::Text("Guide".into()))
    );
}

#[test]
fn update_reconciles_unbound_elements() {
    let mut left = Graph::parse(
        book_registry(),
        "<book><title>T</title><index>old</index></book>",
    )
    .unwrap();
    let right = Graph::parse(
        book_registry(),
        "<book><title>T</title><index>new</index></book>",
    )
    .unwrap();
    left.merge(&right, MergeMode::UPDATE).unwrap();
    let out = left.to_xml_string().unwrap();
    assert!(out.contains("<index>new</index>"), "got: {out}");
    assert!(!out.contains("old"), "got: {out}");
}

#[test]
fn transient_attributes_stay_out_of_compare_and_merge() {
    let mut left = book_with(&[]);
    let right = book_with(&[]);
    let l = left.root();
    left.set_bean_attribute(l, "trace-id", Some("t1")).unwrap();
    assert!(left.is_equal_to(&right));

    left.merge(&right, MergeMode::UPDATE).unwrap();
    // The runtime-only attribute survives an update from a side
    // that never carried it.
    assert_eq!(
        left.get_bean_attribute(l, "trace-id").unwrap().as_deref(),
        Some("t1")
    );
}

#[test]
fn compare_reports_the_first_difference() {
    let mut left = book_with(&[("A", &[])]);
    let right = book_with(&[("A", &[])]);
    assert!(left.merge(&right, MergeMode::COMPARE).is_ok());
    assert!(left.is_equal_to(&right));

    let root = left.root();
    let a = left
        .get_value_at(root, "Chapter", 0)
        .unwrap()
        .unwrap()
        .as_bean()
        .unwrap();
    left.add_value(a, "Line", Value::Text("extra".into()))
        .unwrap();
    let err = left.merge(&right, MergeMode::COMPARE).unwrap_err();
    assert!(matches!(err, BindError::MergeMismatch { .. }));
    assert!(!left.is_equal_to(&right));
    // Compare never mutates.
    assert_eq!(left.size(a, "Line").unwrap(), 1);
}

#[test]
fn compare_matches_reordered_keyed_arrays() {
    let left = book_with(&[("A", &[]), ("B", &[])]);
    let right = book_with(&[("B", &[]), ("A", &[])]);
    assert!(left.is_equal_to(&right));
}

#[test]
fn none_walks_without_changing_anything() {
    let mut left = book_with(&[("A", &[])]);
    let right = book_with(&[("B", &[])]);
    left.merge(&right, MergeMode::NONE).unwrap();
    assert_eq!(chapter_titles(&left), ["A"]);
}

#[test]
fn mismatched_root_types_refuse_to_merge() {
    let mut left = book_with(&[]);
    let chapter_reg = xmlbind::TypeRegistry::new("chapter").with(
        xmlbind::NodeDecl::new("chapter").with_prop(xmlbind::PropertyDecl::new(
            "title",
            xmlbind::TypeFlags::OPTIONAL | xmlbind::TypeFlags::TEXT,
        )),
    );
    let right = Graph::new(chapter_reg).unwrap();
    let err = left.merge(&right, MergeMode::UPDATE).unwrap_err();
    assert!(matches!(err, BindError::MergeMismatch { .. }));
}
