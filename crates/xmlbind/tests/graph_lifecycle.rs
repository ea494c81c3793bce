mod common;

use common::{add_chapter, book_registry, chapter_titles, empty_book, sample_book};
use xmlbind::{BindError, Graph, Value};

#[test]
fn scalar_set_and_get() {
    let mut g = empty_book();
    let root = g.root();
    assert_eq!(g.get_value(root, "Title").unwrap(), None);
    g.set_value(root, "Title", Some(Value::Text("Guide".into())))
        .unwrap();
    assert_eq!(
        g.get_value(root, "Title").unwrap(),
        Some(Value::Text("Guide".into()))
    );
    g.set_value(root, "Title", None).unwrap();
    assert_eq!(g.get_value(root, "Title").unwrap(), None);
}

#[test]
fn add_value_grows_array_and_dom() {
    let mut g = empty_book();
    let root = g.root();
    assert_eq!(g.size(root, "Chapter").unwrap(), 0);
    add_chapter(&mut g, "A", &["a1", "a2"]);
    add_chapter(&mut g, "B", &[]);
    assert_eq!(g.size(root, "Chapter").unwrap(), 2);
    assert_eq!(chapter_titles(&g), ["A", "B"]);

    let doc = g.document();
    let root_el = doc.root().unwrap();
    let names: Vec<_> = doc
        .child_elements(root_el)
        .into_iter()
        .map(|e| doc.element_name(e).unwrap().to_string())
        .collect();
    assert_eq!(names, ["chapter", "chapter"]);
}

#[test]
fn schema_order_wins_over_insertion_order() {
    // Chapters first, title afterwards: the title element still lands
    // before the chapter elements because the schema declares it first.
    let mut g = empty_book();
    let root = g.root();
    add_chapter(&mut g, "A", &[]);
    g.set_value(root, "Title", Some(Value::Text("T".into())))
        .unwrap();
    let doc = g.document();
    let names: Vec<_> = doc
        .child_elements(doc.root().unwrap())
        .into_iter()
        .map(|e| doc.element_name(e).unwrap().to_string())
        .collect();
    assert_eq!(names, ["title", "chapter"]);
}

#[test]
fn boolean_presence_semantics() {
    let mut g = empty_book();
    let root = g.root();
    assert_eq!(g.get_value(root, "Paperback").unwrap(), None);

    g.set_value(root, "Paperback", Some(Value::Bool(true)))
        .unwrap();
    assert_eq!(
        g.get_value(root, "Paperback").unwrap(),
        Some(Value::Bool(true))
    );
    let doc = g.document();
    let has_el = doc
        .child_elements(doc.root().unwrap())
        .into_iter()
        .any(|e| doc.element_name(e) == Some("paperback"));
    assert!(has_el);

    // False removes the element but the slot remembers.
    g.set_value(root, "Paperback", Some(Value::Bool(false)))
        .unwrap();
    assert_eq!(
        g.get_value(root, "Paperback").unwrap(),
        Some(Value::Bool(false))
    );
    let doc = g.document();
    let has_el = doc
        .child_elements(doc.root().unwrap())
        .into_iter()
        .any(|e| doc.element_name(e) == Some("paperback"));
    assert!(!has_el);
}

#[test]
fn parse_binds_recognized_content() {
    let xml = r#"<book lang="en"><title>X</title><paperback/><chapter><title>C1</title><line>l1</line><line>l2</line></chapter></book>"#;
    let g = Graph::parse(book_registry(), xml).unwrap();
    let root = g.root();
    assert_eq!(g.get_bean_attribute(root, "lang").unwrap().as_deref(), Some("en"));
    assert_eq!(
        g.get_value(root, "Title").unwrap(),
        Some(Value::Text("X".into()))
    );
    // Empty element reads as true.
    assert_eq!(
        g.get_value(root, "Paperback").unwrap(),
        Some(Value::Bool(true))
    );
    assert_eq!(chapter_titles(&g), ["C1"]);
    let chapter = g.get_value(root, "Chapter").unwrap().unwrap().as_bean().unwrap();
    assert_eq!(g.size(chapter, "Line").unwrap(), 2);
    assert_eq!(
        g.get_value_at(chapter, "Line", 1).unwrap(),
        Some(Value::Text("l2".into()))
    );
}

#[test]
fn false_text_parses_as_false() {
    let xml = "<book><title>X</title><paperback>false</paperback></book>";
    let g = Graph::parse(book_registry(), xml).unwrap();
    assert_eq!(
        g.get_value(g.root(), "Paperback").unwrap(),
        Some(Value::Bool(false))
    );
}

#[test]
fn unbound_elements_survive_a_rewrite() {
    let xml = "<book><title>X</title><index>keep me</index></book>";
    let mut g = Graph::parse(book_registry(), xml).unwrap();
    let root = g.root();
    g.set_value(root, "Title", Some(Value::Text("Y".into())))
        .unwrap();
    let out = g.to_xml_string().unwrap();
    assert!(out.contains("<index>keep me</index>"), "got: {out}");
    assert!(out.contains("<title>Y</title>"));
}

#[test]
fn write_emits_declaration_and_doctype() {
    let xml = "<!DOCTYPE book SYSTEM \"book.dtd\"><book><title>X</title></book>";
    let mut g = Graph::parse(book_registry(), xml).unwrap();
    let out = g.to_xml_string().unwrap();
    assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(out.contains("<!DOCTYPE book SYSTEM \"book.dtd\">"));
}

#[test]
fn wrong_kind_is_rejected() {
    let mut g = empty_book();
    let root = g.root();
    let err = g
        .set_value(root, "Title", Some(Value::Int(3)))
        .unwrap_err();
    assert!(matches!(err, BindError::TypeMismatch { .. }));
    let err = g.get_value(root, "Nope").unwrap_err();
    assert!(matches!(err, BindError::UnknownProperty(_)));
}

#[test]
fn adding_an_attached_bean_is_rejected() {
    let mut g = sample_book();
    let root = g.root();
    let attached = g.get_value_at(root, "Chapter", 0).unwrap().unwrap();
    let err = g.add_value(root, "Chapter", attached).unwrap_err();
    assert!(matches!(err, BindError::AlreadyAttached));
}

#[test]
fn removed_bean_can_be_added_back() {
    let mut g = sample_book();
    let root = g.root();
    let chapter = g
        .get_value_at(root, "Chapter", 0)
        .unwrap()
        .unwrap()
        .as_bean()
        .unwrap();
    g.remove_value_at(root, "Chapter", 0).unwrap();
    assert_eq!(chapter_titles(&g), ["B"]);

    // Detached state survived the round trip through the caches.
    assert_eq!(
        g.get_value(chapter, "Title").unwrap(),
        Some(Value::Text("A".into()))
    );
    g.add_value(root, "Chapter", Value::Bean(chapter)).unwrap();
    assert_eq!(chapter_titles(&g), ["B", "A"]);
    assert_eq!(
        g.get_value_at(chapter, "Line", 0).unwrap(),
        Some(Value::Text("a1".into()))
    );
}

#[test]
fn clone_graph_is_equal_but_independent() {
    let g = sample_book();
    let mut copy = g.clone_graph().unwrap();
    assert!(g.is_equal_to(&copy));
    let copy_root = copy.root();
    copy.set_value(copy_root, "Title", Some(Value::Text("Other".into())))
        .unwrap();
    assert!(!g.is_equal_to(&copy));
    assert_eq!(
        g.get_value(g.root(), "Title").unwrap(),
        Some(Value::Text("Guide".into()))
    );
}

#[test]
fn empty_elements_read_as_empty_text_and_clone() {
    let xml = r#"<book><title/><chapter><title note="x"/></chapter></book>"#;
    let g = Graph::parse(book_registry(), xml).unwrap();
    let root = g.root();
    // A present element with no text child is an empty string, not unset.
    assert_eq!(
        g.get_value(root, "Title").unwrap(),
        Some(Value::Text(String::new()))
    );

    let copy = g.clone_graph().unwrap();
    assert!(g.is_equal_to(&copy));
    let chapter = copy
        .get_value(copy.root(), "Chapter")
        .unwrap()
        .unwrap()
        .as_bean()
        .unwrap();
    assert_eq!(
        copy.get_value(chapter, "Title").unwrap(),
        Some(Value::Text(String::new()))
    );
    // The attribute of the empty occurrence came over with it.
    assert_eq!(
        copy.get_attribute_value(chapter, "Title", 0, "note")
            .unwrap()
            .as_deref(),
        Some("x")
    );
}

#[test]
fn serialized_graph_parses_back_equal() {
    let mut g = sample_book();
    let root = g.root();
    g.set_value(root, "Paperback", Some(Value::Bool(true)))
        .unwrap();
    g.set_bean_attribute(root, "lang", Some("en")).unwrap();

    let xml = g.to_xml_string().unwrap();
    let back = Graph::parse(book_registry(), &xml).unwrap();
    assert!(g.is_equal_to(&back));
    assert!(back.is_equal_to(&g));
}

#[test]
fn comments_are_tracked_per_bean() {
    let mut g = sample_book();
    let root = g.root();
    g.add_comment(root, " draft ").unwrap();
    assert_eq!(g.comments(root), [" draft "]);

    // The comment lands before the existing content.
    let doc = g.document();
    let first = doc.children(doc.root().unwrap())[0];
    assert!(doc.is_comment(first));

    assert!(g.remove_comment(root, " draft ").unwrap());
    assert!(g.comments(root).is_empty());
}

#[test]
fn index_of_finds_beans_and_scalars() {
    let mut g = sample_book();
    let root = g.root();
    let b = g.get_value_at(root, "Chapter", 1).unwrap().unwrap();
    assert_eq!(g.index_of(root, "Chapter", &b).unwrap(), Some(1));

    let chapter = g
        .get_value_at(root, "Chapter", 0)
        .unwrap()
        .unwrap()
        .as_bean()
        .unwrap();
    assert_eq!(
        g.index_of(chapter, "Line", &Value::Text("a1".into())).unwrap(),
        Some(0)
    );
    assert_eq!(
        g.index_of(chapter, "Line", &Value::Text("zz".into())).unwrap(),
        None
    );

    // remove_value reports the index the match occupied.
    assert_eq!(g.remove_value(root, "Chapter", &b).unwrap(), Some(1));
    assert_eq!(g.size(root, "Chapter").unwrap(), 1);
}
