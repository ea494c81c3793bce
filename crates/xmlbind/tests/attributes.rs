mod common;

use common::{book_registry, empty_book, sample_book};
use xmlbind::{BindError, Graph};

#[test]
fn bean_attribute_roundtrip() {
    let mut g = empty_book();
    let root = g.root();
    assert_eq!(g.get_bean_attribute(root, "lang").unwrap(), None);
    g.set_bean_attribute(root, "lang", Some("en")).unwrap();
    assert_eq!(g.get_bean_attribute(root, "lang").unwrap().as_deref(), Some("en"));
    g.set_bean_attribute(root, "lang", None).unwrap();
    assert_eq!(g.get_bean_attribute(root, "lang").unwrap(), None);
}

#[test]
fn enumerated_attribute_rejects_illegal_values() {
    let mut g = empty_book();
    let root = g.root();
    let err = g.set_bean_attribute(root, "cover", Some("paper")).unwrap_err();
    assert!(matches!(err, BindError::EnumViolation { .. }));
    // Nothing was written; the declared default still shows through.
    assert_eq!(
        g.get_bean_attribute(root, "cover").unwrap().as_deref(),
        Some("soft")
    );
    g.set_bean_attribute(root, "cover", Some("hard")).unwrap();
    assert_eq!(
        g.get_bean_attribute(root, "cover").unwrap().as_deref(),
        Some("hard")
    );
}

#[test]
fn fixed_attribute_is_immutable() {
    let mut g = empty_book();
    let root = g.root();
    assert_eq!(
        g.get_bean_attribute(root, "version").unwrap().as_deref(),
        Some("1.0")
    );
    let err = g.set_bean_attribute(root, "version", Some("2.0")).unwrap_err();
    assert!(matches!(err, BindError::FixedAttribute(_)));
    let err = g.set_bean_attribute(root, "version", None).unwrap_err();
    assert!(matches!(err, BindError::FixedAttribute(_)));
    // Writing the declared value back is accepted as a no-op.
    g.set_bean_attribute(root, "version", Some("1.0")).unwrap();
    assert_eq!(
        g.get_bean_attribute(root, "version").unwrap().as_deref(),
        Some("1.0")
    );
}

#[test]
fn control_characters_are_sanitized() {
    let mut g = empty_book();
    let root = g.root();
    g.set_bean_attribute(root, "lang", Some("\u{1}en\u{2}"))
        .unwrap();
    assert_eq!(g.get_bean_attribute(root, "lang").unwrap().as_deref(), Some("?en?"));
}

#[test]
fn undeclared_attributes_become_transient_descriptors() {
    let xml = r#"<book data-rev="7"><title>X</title></book>"#;
    let g = Graph::parse(book_registry(), xml).unwrap();
    let root = g.root();
    assert!(g.bean_attribute_names(root).contains(&"data-rev".to_string()));
    assert_eq!(
        g.get_bean_attribute(root, "data-rev").unwrap().as_deref(),
        Some("7")
    );
}

#[test]
fn setting_an_unknown_attribute_declares_it_on_the_fly() {
    let mut g = empty_book();
    let root = g.root();
    g.set_bean_attribute(root, "custom", Some("x")).unwrap();
    assert_eq!(g.get_bean_attribute(root, "custom").unwrap().as_deref(), Some("x"));
    // Reading a never-declared name is still an error.
    let err = g.get_bean_attribute(root, "other").unwrap_err();
    assert!(matches!(err, BindError::UnknownAttribute(_)));
}

#[test]
fn property_attributes_address_one_occurrence() {
    let mut g = sample_book();
    let root = g.root();
    g.set_attribute_value(root, "Title", 0, "xml:lang", Some("fr"))
        .unwrap();
    assert_eq!(
        g.get_attribute_value(root, "Title", 0, "xml:lang")
            .unwrap()
            .as_deref(),
        Some("fr")
    );
    let out = g.to_xml_string().unwrap();
    assert!(out.contains(r#"<title xml:lang="fr">"#), "got: {out}");
}

#[test]
fn bean_property_attributes_delegate_to_the_sub_bean() {
    let mut g = sample_book();
    let root = g.root();
    g.set_attribute_value(root, "Chapter", 1, "draft", Some("yes"))
        .unwrap();
    assert_eq!(
        g.get_attribute_value(root, "Chapter", 1, "draft")
            .unwrap()
            .as_deref(),
        Some("yes")
    );
    let chapter = g
        .get_value_at(root, "Chapter", 1)
        .unwrap()
        .unwrap()
        .as_bean()
        .unwrap();
    assert_eq!(
        g.get_bean_attribute(chapter, "draft").unwrap().as_deref(),
        Some("yes")
    );
}

#[test]
fn cached_attributes_flush_on_attach() {
    let mut g = sample_book();
    let root = g.root();
    let chapter = g.create_bean("chapter").unwrap();
    g.set_bean_attribute(chapter, "draft", Some("yes")).unwrap();
    g.add_value(root, "Chapter", xmlbind::Value::Bean(chapter))
        .unwrap();
    let out = g.to_xml_string().unwrap();
    assert!(out.contains(r#"<chapter draft="yes""#), "got: {out}");
}

#[test]
fn default_namespace_lives_on_the_root_element() {
    let mut g = empty_book();
    assert_eq!(g.default_namespace(), None);
    g.set_default_namespace(Some("urn:books"));
    assert_eq!(g.default_namespace().as_deref(), Some("urn:books"));
    let out = g.to_xml_string().unwrap();
    assert!(out.contains(r#"xmlns="urn:books""#));
}
