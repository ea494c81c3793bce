mod common;

use common::{chapter_titles, sample_book};
use xmlbind::Value;

#[test]
fn replace_reorders_survivors_without_new_identities() {
    let mut g = sample_book();
    let root = g.root();
    let id_a = g.index_to_id(root, "Chapter", 0).unwrap();
    let id_b = g.index_to_id(root, "Chapter", 1).unwrap();
    let a = g.get_value_at(root, "Chapter", 0).unwrap().unwrap();
    let b = g.get_value_at(root, "Chapter", 1).unwrap().unwrap();
    let c = g.create_bean("chapter").unwrap();
    g.set_value(c, "Title", Some(Value::Text("C".into()))).unwrap();

    g.set_values(root, "Chapter", &[b, a, Value::Bean(c)]).unwrap();

    assert_eq!(chapter_titles(&g), ["B", "A", "C"]);
    // Survivors kept their permanent ids, only their index moved.
    assert_eq!(g.index_to_id(root, "Chapter", 0).unwrap(), id_b);
    assert_eq!(g.index_to_id(root, "Chapter", 1).unwrap(), id_a);
    let id_c = g.index_to_id(root, "Chapter", 2).unwrap();
    assert_ne!(id_c, id_a);
    assert_ne!(id_c, id_b);
}

#[test]
fn replace_mirrors_the_new_order_into_the_dom() {
    let mut g = sample_book();
    let root = g.root();
    let a = g.get_value_at(root, "Chapter", 0).unwrap().unwrap();
    let b = g.get_value_at(root, "Chapter", 1).unwrap().unwrap();
    g.set_values(root, "Chapter", &[b, a]).unwrap();

    let doc = g.document();
    let root_el = doc.root().unwrap();
    let titles: Vec<String> = doc
        .child_elements(root_el)
        .into_iter()
        .filter(|&e| doc.element_name(e) == Some("chapter"))
        .map(|e| {
            let title_el = doc.child_elements(e)[0];
            doc.text_content(title_el).unwrap_or_default()
        })
        .collect();
    assert_eq!(titles, ["B", "A"]);
}

#[test]
fn replace_drops_what_the_new_sequence_lacks() {
    let mut g = sample_book();
    let root = g.root();
    let id_a = g.index_to_id(root, "Chapter", 0).unwrap();
    let b = g.get_value_at(root, "Chapter", 1).unwrap().unwrap();
    g.set_values(root, "Chapter", std::slice::from_ref(&b)).unwrap();
    assert_eq!(chapter_titles(&g), ["B"]);
    assert_eq!(g.id_to_index(root, "Chapter", id_a).unwrap(), None);
}

#[test]
fn scalar_replace_matches_by_equality() {
    let mut g = sample_book();
    let root = g.root();
    let a = g.get_value_at(root, "Chapter", 0).unwrap().unwrap();
    let chapter = a.as_bean().unwrap();
    let id_a1 = g.index_to_id(chapter, "Line", 0).unwrap();

    g.set_values(
        chapter,
        "Line",
        &[Value::Text("a0".into()), Value::Text("a1".into())],
    )
    .unwrap();
    assert_eq!(
        g.get_values(chapter, "Line").unwrap(),
        [
            Some(Value::Text("a0".into())),
            Some(Value::Text("a1".into()))
        ]
    );
    // The kept line moved to index 1 with its identity intact.
    assert_eq!(g.index_to_id(chapter, "Line", 1).unwrap(), id_a1);
}

#[test]
fn empty_replacement_clears_the_array() {
    let mut g = sample_book();
    let root = g.root();
    g.set_values(root, "Chapter", &[]).unwrap();
    assert_eq!(g.size(root, "Chapter").unwrap(), 0);
    let doc = g.document();
    let chapters = doc
        .child_elements(doc.root().unwrap())
        .into_iter()
        .filter(|&e| doc.element_name(e) == Some("chapter"))
        .count();
    assert_eq!(chapters, 0);
}
