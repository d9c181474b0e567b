//! Property-based tests for the extractor and URI resolver.
//!
//! Properties under test:
//! 1. any string attribute survives extraction and re-parsing unchanged
//! 2. multi-valued references keep count and order
//! 3. `file_uri` output is always `file:///`-prefixed, slash-only and parseable

use std::sync::Arc;

use modelconv_core::{
    file_uri, Feature, FeatureValue, JsonExtractor, Model, Multiplicity, Schema, TypeDef, ValueKind,
};
use proptest::prelude::*;
use serde_json::Value;

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(
            "Props",
            vec![
                TypeDef::new("Root")
                    .with_feature(Feature::attribute("text", ValueKind::String, Multiplicity::Single))
                    .with_feature(Feature::reference("items", "Item", Multiplicity::Multi)),
                TypeDef::new("Item")
                    .with_feature(Feature::attribute("n", ValueKind::Number, Multiplicity::Single)),
            ],
        )
        .expect("schema should be valid"),
    )
}

fn extract(model: &Model) -> Value {
    let mut out = Vec::new();
    JsonExtractor::new().write_model(model, &mut out).unwrap();
    serde_json::from_slice(&out).unwrap()
}

/// Strings biased towards characters that need escaping.
fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("\"".to_string()),
        Just("\\".to_string()),
        Just("\u{0}\u{1f}\u{7f}".to_string()),
        Just("line\nbreak\r\ttab".to_string()),
        "\\PC{0,40}",
        any::<String>(),
    ]
}

fn arb_segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._-][A-Za-z0-9._ -]{0,11}"
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, ..Default::default() })]

    /// Property: extraction escapes every string so a JSON parser reads it back verbatim.
    #[test]
    fn string_attribute_roundtrip(text in arb_text()) {
        let mut model = Model::new(schema());
        let root = model.create("Root").unwrap();
        model.set(root, "text", FeatureValue::Scalar(text.clone().into())).unwrap();

        let doc = extract(&model);
        prop_assert_eq!(doc["text"].as_str(), Some(text.as_str()));
    }

    /// Property: nested objects appear once each, in reference order.
    #[test]
    fn multi_reference_keeps_order(values in proptest::collection::vec(any::<i64>(), 0..20)) {
        let mut model = Model::new(schema());
        let root = model.create("Root").unwrap();
        let mut items = Vec::with_capacity(values.len());
        for v in &values {
            let item = model.create("Item").unwrap();
            model.set(item, "n", FeatureValue::Scalar((*v).into())).unwrap();
            items.push(item);
        }
        model.set(root, "items", FeatureValue::Elements(items)).unwrap();

        let doc = extract(&model);
        let got: Vec<i64> = doc["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["n"].as_i64().unwrap())
            .collect();
        prop_assert_eq!(got, values);
    }

    /// Property: any mix of separators and an optional drive prefix normalizes.
    #[test]
    fn file_uri_is_normalized(
        drive in proptest::option::of("[A-Z]"),
        segments in proptest::collection::vec(arb_segment(), 1..6),
        backslashes in any::<bool>(),
    ) {
        let sep = if backslashes { "\\" } else { "/" };
        let mut path = match &drive {
            Some(d) => format!("{d}:"),
            None => String::new(),
        };
        for segment in &segments {
            path.push_str(sep);
            path.push_str(segment);
        }

        let uri = file_uri(&path).unwrap();
        prop_assert!(uri.starts_with("file:///"));
        prop_assert!(!uri.contains('\\'));
        prop_assert!(!uri["file:///".len()..].starts_with('/'));
        prop_assert!(url::Url::parse(&uri).is_ok());
    }
}
