#![no_main]

use std::path::Path;
use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use modelconv_core::inject::{parse_schema, populate_model, ModelDocument};
use modelconv_core::{ExtractorConfig, JsonExtractor, Model};

// Input is a schema document and a model document separated by a NUL byte.
// Goal: loaders reject bad input with errors and the extractor never panics
// or overflows the stack, even on cyclic models.
fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|&b| b == 0) else {
        return;
    };
    let (schema_bytes, model_bytes) = (&data[..split], &data[split + 1..]);

    let Ok(schema) = parse_schema(schema_bytes, Path::new("fuzz.schema.json")) else {
        return;
    };
    let Ok(doc) = serde_json::from_slice::<ModelDocument>(model_bytes) else {
        return;
    };
    let mut model = Model::new(Arc::new(schema));
    if populate_model(&mut model, &doc).is_err() {
        return;
    }

    let extractor = JsonExtractor::with_config(ExtractorConfig {
        max_depth: 64,
        ..ExtractorConfig::default()
    });
    let mut out = Vec::new();
    if extractor.write_model(&model, &mut out).is_ok() {
        serde_json::from_slice::<serde_json::Value>(&out).expect("extractor output must parse");
    }
});
