//! Classifier and compressor working together on realistic documents.

use artifact_patcher::config::CompressorConfig;
use artifact_patcher::{
    classify, ClassificationCache, CompressOptions, CompressionMode, Compressor, EditIntent,
};
use proptest::prelude::*;

fn component(name: &str, rows: usize) -> String {
    let mut out = format!("function {name}({{ items }}) {{\n");
    for i in 0..rows {
        out.push_str(&format!(
            "  const row{i} = items.filter((item) => item.group === {i}).length;\n"
        ));
    }
    out.push_str("  return <section>{items.length}</section>;\n}\n\n");
    out
}

fn dashboard() -> String {
    let mut out = String::from("import React from \"react\";\n\n");
    out.push_str(&component("Header", 25));
    out.push_str(&component("Sidebar", 25));
    out.push_str(&component("Footer", 25));
    out.push_str(
        "export default function App() {\n  return (\n    <div>\n      <Header items={[]} />\n      <Sidebar items={[]} />\n      <Footer items={[]} />\n    </div>\n  );\n}\n",
    );
    out
}

#[test]
fn style_request_compresses_around_the_mentioned_component() {
    let request = "Make the Footer background color darker";
    let intent = classify(request).intent;
    assert_eq!(intent, EditIntent::Style);

    let code = dashboard();
    let config = CompressorConfig::default();
    let options = CompressOptions::new(intent).with_min_lines(0).with_request(request);
    let out = Compressor::new(&config).compress(&code, &options);

    assert_eq!(out.stats.mode, CompressionMode::Structural);
    assert_eq!(out.stats.hidden, 2);
    assert!(out.code.contains("function Header({ items }) { /* "));
    assert!(out.code.contains("function Sidebar({ items }) { /* "));
    assert!(out.code.contains("const row24 = items.filter"));
    assert!(out.code.contains("<Footer items={[]} />"));
    assert!(out.stats.result_lines < out.stats.original_lines);
}

#[test]
fn unknown_requests_compress_least() {
    let code = dashboard();
    let config = CompressorConfig::default();
    let compressor = Compressor::new(&config);

    let hidden = |intent| {
        compressor
            .compress(&code, &CompressOptions::new(intent).with_min_lines(0))
            .stats
            .hidden
    };
    let unknown = hidden(EditIntent::Unknown);
    for intent in EditIntent::ALL {
        assert!(hidden(intent) >= unknown, "{intent} hid fewer bodies than unknown");
    }
}

#[test]
fn default_floor_skips_short_documents() {
    let code = component("Card", 10);
    let config = CompressorConfig::default();
    let out = Compressor::new(&config).compress(&code, &CompressOptions::new(EditIntent::Style));
    assert_eq!(out.stats.mode, CompressionMode::Unchanged);
    assert_eq!(out.code, code);
}

#[test]
fn cached_classification_matches_direct() {
    let mut cache = ClassificationCache::default();
    for request in ["fix the crash on submit", "添加一个登录按钮", "change the title text"] {
        assert_eq!(cache.classify(request), classify(request));
    }
    assert_eq!(cache.len(), 3);
}

fn generated_document() -> impl Strategy<Value = String> {
    prop::collection::vec(0usize..40, 1..6).prop_map(|sizes| {
        sizes
            .iter()
            .enumerate()
            .map(|(i, rows)| component(&format!("Part{i}"), *rows))
            .collect()
    })
}

fn any_intent() -> impl Strategy<Value = EditIntent> {
    prop::sample::select(EditIntent::ALL.to_vec())
}

proptest! {
    #[test]
    fn compression_never_grows(code in generated_document(), intent in any_intent()) {
        let config = CompressorConfig::default();
        let out = Compressor::new(&config)
            .compress(&code, &CompressOptions::new(intent).with_min_lines(0));

        prop_assert!(out.stats.result_lines <= out.stats.original_lines);
        if out.stats.hidden == 0 {
            prop_assert_eq!(&out.code, &code);
        } else {
            prop_assert!(out.code.len() < code.len());
        }
    }

    #[test]
    fn compression_is_safe_on_arbitrary_text(code in "[a-z{}();=\n ]{0,400}", intent in any_intent()) {
        let config = CompressorConfig::default();
        let out = Compressor::new(&config)
            .compress(&code, &CompressOptions::new(intent).with_min_lines(0));

        prop_assert!(out.stats.result_lines <= out.stats.original_lines);
        if out.stats.hidden == 0 {
            prop_assert_eq!(&out.code, &code);
        }
    }
}
