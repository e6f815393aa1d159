// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Schema evolution: data written by one version of a type, read by another.
//
// Each version lives in its own module and its own registry, the way two
// builds of the same program would see the types.

#![allow(clippy::missing_panics_doc)]

use objgraph::compat::{compare, Compatibility};
use objgraph::{Error, Format, Options, Persist, Serializer, TypeRegistry};
use std::io::Cursor;
use std::sync::Arc;

mod v1 {
    use objgraph::Persist;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Persist)]
    #[persist(name = "legacy.Grade")]
    pub enum Grade {
        #[default]
        Low,
        High = 10,
    }

    #[derive(Debug, Default, Persist)]
    #[persist(name = "legacy.Article")]
    pub struct Article {
        pub title: String,
        pub price: i32,
        pub discontinued: bool,
        pub grade: Grade,
    }
}

mod v2 {
    use objgraph::Persist;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Persist)]
    #[persist(name = "shop.Grade", alias = "legacy.Grade")]
    pub enum Grade {
        #[default]
        Low,
        Medium = 5,
        Premium = 10,
    }

    #[derive(Debug, Default, Persist)]
    #[persist(name = "shop.Item", alias = "legacy.Article")]
    pub struct Item {
        #[persist(alias = "title")]
        pub name: String,
        pub price: i64,
        pub stock: u32,
        pub grade: Grade,
    }
}

mod narrowed {
    use objgraph::Persist;

    #[derive(Debug, Default, Persist)]
    #[persist(name = "legacy.Article")]
    pub struct Article {
        pub title: String,
        pub price: i16,
        pub grade: super::v1::Grade,
    }
}

mod renamed_member {
    use objgraph::Persist;

    /// `title` is both a member name and another member's alias.
    #[derive(Debug, Default, Persist)]
    #[persist(name = "legacy.Article")]
    pub struct Article {
        #[persist(rename = "headline", alias = "title")]
        pub heading: String,
        pub title: String,
        pub grade: super::v1::Grade,
    }
}

/// Current build of `legacy.Article`: the grade member and its enumeration
/// are gone.
mod trimmed {
    use objgraph::Persist;

    #[derive(Debug, Default, PartialEq, Persist)]
    #[persist(name = "legacy.Article")]
    pub struct Article {
        pub title: String,
        pub price: i32,
    }
}

/// Keeps a grade member, but of an enumeration that never answered to
/// `legacy.Grade`.
mod regraded {
    use objgraph::Persist;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Persist)]
    #[persist(name = "catalog.Grade")]
    pub enum Grade {
        #[default]
        Low,
        High = 10,
    }

    #[derive(Debug, Default, Persist)]
    #[persist(name = "legacy.Article")]
    pub struct Article {
        pub title: String,
        pub grade: Grade,
    }
}

/// Two builds of one record, loaded in the same process.
mod pair_before {
    use objgraph::Persist;

    #[derive(Debug, Default, PartialEq, Persist)]
    #[persist(name = "tests.Pair")]
    pub struct Pair {
        pub a: i32,
        pub b: i32,
    }
}

mod pair_after {
    use objgraph::Persist;

    #[derive(Debug, Default, PartialEq, Persist)]
    #[persist(name = "tests.Pair")]
    pub struct Pair {
        pub b: i32,
        pub a: i32,
        pub c: i32,
    }
}

fn private_options() -> Options {
    Options::new().with_registry(Arc::new(TypeRegistry::new()))
}

fn write_v1(format: Format, article: &v1::Article) -> Cursor<Vec<u8>> {
    let mut stream = Cursor::new(Vec::new());
    Serializer::with_options(&mut stream, Some(format), private_options())
        .unwrap()
        .write_object(article)
        .unwrap();
    stream.set_position(0);
    stream
}

fn article() -> v1::Article {
    v1::Article {
        title: "Lamp".to_string(),
        price: 1999,
        discontinued: true,
        grade: v1::Grade::High,
    }
}

#[test]
fn test_renamed_type_and_member_read_into_new_version() {
    for format in Format::ALL {
        let mut stream = write_v1(format, &article());
        let item: v2::Item = Serializer::with_options(&mut stream, None, private_options())
            .unwrap()
            .read_object()
            .unwrap();

        assert_eq!(item.name, "Lamp");
        assert_eq!(item.price, 1999, "i32 widens to i64");
        assert_eq!(item.stock, 0, "missing member keeps its default");
        assert_eq!(item.grade, v2::Grade::Premium, "variant found by discriminant");
    }
}

#[test]
fn test_dynamic_graph_uses_current_names() {
    let mut stream = write_v1(Format::Binary, &article());
    let options = private_options();
    options.registry().ensure::<v2::Item>();
    let graph = Serializer::with_options(&mut stream, None, options)
        .unwrap()
        .read_graph()
        .unwrap();

    let (_, object) = graph.objects().next().unwrap();
    assert_eq!(object.type_name, "shop.Item");
    // Stored member names are kept; matching happens on typed reads.
    assert!(object.member("title").is_some());
    assert!(object.member("discontinued").is_some());
}

#[test]
fn test_narrowing_is_a_mismatch() {
    for format in Format::ALL {
        let mut stream = write_v1(format, &article());
        let err = Serializer::with_options(&mut stream, None, private_options())
            .unwrap()
            .read_object::<narrowed::Article>()
            .unwrap_err();
        match err {
            Error::TypeMismatch { expected, found } => {
                assert!(expected.contains("legacy.Article.price"), "{expected}");
                assert_eq!(found, "i32");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }
}

#[test]
fn test_exact_name_beats_alias() {
    for format in Format::ALL {
        let mut stream = write_v1(format, &article());
        let read: renamed_member::Article =
            Serializer::with_options(&mut stream, None, private_options())
                .unwrap()
                .read_object()
                .unwrap();
        assert_eq!(read.title, "Lamp");
        assert!(read.heading.is_empty());
        assert_eq!(read.grade, v1::Grade::High);
    }
}

#[test]
fn test_unknown_type_without_alias() {
    #[derive(Debug, Default, Persist)]
    #[persist(name = "shop.Other")]
    struct Other {
        title: String,
    }

    for format in Format::ALL {
        let mut stream = write_v1(format, &article());
        let err = Serializer::with_options(&mut stream, None, private_options())
            .unwrap()
            .read_object::<Other>()
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableType(name) if name == "legacy.Article"));
    }
}

#[test]
fn test_removed_member_with_removed_type_is_skipped() {
    for format in Format::ALL {
        let mut stream = write_v1(format, &article());
        let read: trimmed::Article = Serializer::with_options(&mut stream, None, private_options())
            .unwrap()
            .read_object()
            .unwrap();
        assert_eq!(
            read,
            trimmed::Article {
                title: "Lamp".to_string(),
                price: 1999,
            }
        );

        // A dynamic read still needs every stored type.
        stream.set_position(0);
        let options = private_options();
        options.registry().ensure::<trimmed::Article>();
        let err = Serializer::with_options(&mut stream, None, options)
            .unwrap()
            .read_graph()
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableType(name) if name == "legacy.Grade"));
    }
}

#[test]
fn test_declared_member_with_unknown_type_fails() {
    for format in Format::ALL {
        let mut stream = write_v1(format, &article());
        let err = Serializer::with_options(&mut stream, None, private_options())
            .unwrap()
            .read_object::<regraded::Article>()
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableType(name) if name == "legacy.Grade"));
    }
}

#[test]
fn test_builds_sharing_a_name_in_the_global_registry() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        Serializer::open(&mut stream, Some(format))
            .unwrap()
            .write_object(&pair_before::Pair { a: 1, b: 2 })
            .unwrap();
        stream.set_position(0);
        let after: pair_after::Pair = Serializer::open(&mut stream, None)
            .unwrap()
            .read_object()
            .unwrap();
        assert_eq!(after, pair_after::Pair { b: 2, a: 1, c: 0 });

        let mut stream = Cursor::new(Vec::new());
        Serializer::open(&mut stream, Some(format))
            .unwrap()
            .write_object(&pair_after::Pair { b: 3, a: 4, c: 5 })
            .unwrap();
        stream.set_position(0);
        let before: pair_before::Pair = Serializer::open(&mut stream, None)
            .unwrap()
            .read_object()
            .unwrap();
        assert_eq!(before, pair_before::Pair { a: 4, b: 3 });
    }
}

#[test]
fn test_descriptor_comparison_matches_reads() {
    let old = v1::Article::descriptor().unwrap();
    let new = v2::Item::descriptor().unwrap();
    let details = compare(&old, &new).details;
    assert!(details.iter().any(|d| d == "renamed type: legacy.Article -> shop.Item"));
    assert!(details.iter().any(|d| d == "renamed member: title -> name"));
    assert!(details.iter().any(|d| d.starts_with("removed member") && d.ends_with("discontinued")));
    assert!(details.iter().any(|d| d.starts_with("added member") && d.ends_with("stock")));

    let narrowed = narrowed::Article::descriptor().unwrap();
    assert_eq!(
        compare(&old, &narrowed).compatibility,
        Compatibility::Forward
    );
}
