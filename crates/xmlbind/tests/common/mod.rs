//! Shared Book/Chapter fixture used across the integration suites.

use xmlbind::{
    AttrDecl, AttrKind, AttrOption, Graph, NodeDecl, PropertyDecl, TypeFlags, TypeRegistry, Value,
};

pub fn book_registry() -> TypeRegistry {
    TypeRegistry::new("book")
        .with(
            NodeDecl::new("book")
                .with_attr(AttrDecl::new("lang", AttrKind::Cdata, AttrOption::Implied))
                .with_attr(
                    AttrDecl::new("version", AttrKind::Cdata, AttrOption::Fixed)
                        .with_default("1.0"),
                )
                .with_attr(
                    AttrDecl::new("cover", AttrKind::Enumerated, AttrOption::Implied)
                        .with_values(&["hard", "soft"])
                        .with_default("soft"),
                )
                .with_prop(PropertyDecl::new(
                    "title",
                    TypeFlags::MANDATORY | TypeFlags::TEXT | TypeFlags::KEY,
                ))
                .with_prop(PropertyDecl::new(
                    "paperback",
                    TypeFlags::OPTIONAL | TypeFlags::BOOLEAN,
                ))
                .with_prop(PropertyDecl::bean(
                    "chapter",
                    TypeFlags::OPTIONAL_ARRAY | TypeFlags::VETOABLE,
                    "chapter",
                )),
        )
        .with(
            NodeDecl::new("chapter")
                .with_prop(PropertyDecl::new(
                    "title",
                    TypeFlags::OPTIONAL | TypeFlags::TEXT | TypeFlags::KEY,
                ))
                .with_prop(PropertyDecl::new(
                    "line",
                    TypeFlags::OPTIONAL_ARRAY | TypeFlags::TEXT,
                )),
        )
}

/// Empty graph with just the root bean.
pub fn empty_book() -> Graph {
    Graph::new(book_registry()).expect("registry is well formed")
}

/// A book with a title and two chapters ("A" with one line, "B" empty).
pub fn sample_book() -> Graph {
    let mut g = empty_book();
    let root = g.root();
    g.set_value(root, "Title", Some(Value::Text("Guide".into())))
        .unwrap();
    add_chapter(&mut g, "A", &["a1"]);
    add_chapter(&mut g, "B", &[]);
    g
}

pub fn add_chapter(g: &mut Graph, title: &str, lines: &[&str]) -> xmlbind::BeanId {
    let root = g.root();
    let chapter = g.create_bean("chapter").unwrap();
    g.set_value(chapter, "Title", Some(Value::Text(title.into())))
        .unwrap();
    for line in lines {
        g.add_value(chapter, "Line", Value::Text((*line).into()))
            .unwrap();
    }
    g.add_value(root, "Chapter", Value::Bean(chapter)).unwrap();
    chapter
}

/// Titles of the root's chapters, in sequence order.
pub fn chapter_titles(g: &Graph) -> Vec<String> {
    let root = g.root();
    let mut out = Vec::new();
    for v in g.get_values(root, "Chapter").unwrap().into_iter().flatten() {
        let chapter = v.as_bean().unwrap();
        let title = g
            .get_value(chapter, "Title")
            .unwrap()
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default();
        out.push(title);
    }
    out
}
