//! Criterion benchmarks for loading, transforming and extracting models.
//!
//! Fixtures are read from disk once, outside the measured loops, so only the
//! in-memory work is timed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modelconv_core::inject::{parse_schema, populate_model, ModelDocument};
use modelconv_core::{
    EngineParams, Feature, FeatureValue, HandleStore, JsonExtractor, LaunchMode, MappingEngine,
    MemoryStore, Model, Multiplicity, NullProgress, Schema, TransformationEngine, TypeDef,
    ValueKind,
};

fn fixture_path(name: &str) -> PathBuf {
    let fixtures_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures/probe2fiware");
    Path::new(fixtures_dir).join(name)
}

fn read_fixture(name: &str) -> Vec<u8> {
    let path = fixture_path(name);
    fs::read(&path).unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

fn load_schema(name: &str) -> Schema {
    parse_schema(&read_fixture(name), &fixture_path(name)).unwrap()
}

/// A `Root` with `n` probes, each carrying a name and a numeric value.
fn fleet_model(n: usize) -> Model {
    let schema = Schema::new(
        "Fleet",
        vec![
            TypeDef::new("Root")
                .with_feature(Feature::attribute("id", ValueKind::String, Multiplicity::Single))
                .with_feature(Feature::reference("probes", "Probe", Multiplicity::Multi)),
            TypeDef::new("Probe")
                .with_feature(Feature::attribute("name", ValueKind::String, Multiplicity::Single))
                .with_feature(Feature::attribute("value", ValueKind::Number, Multiplicity::Single)),
        ],
    )
    .unwrap();
    let mut model = Model::new(Arc::new(schema));
    let root = model.create("Root").unwrap();
    model
        .set(root, "id", FeatureValue::Scalar("urn:ngsi-ld:Fleet:F1".into()))
        .unwrap();
    let mut probes = Vec::with_capacity(n);
    for i in 0..n {
        let probe = model.create("Probe").unwrap();
        model
            .set(probe, "name", FeatureValue::Scalar(format!("probe \"{i}\"").into()))
            .unwrap();
        model
            .set(probe, "value", FeatureValue::Scalar((i as i64).into()))
            .unwrap();
        probes.push(probe);
    }
    model.set(root, "probes", FeatureValue::Elements(probes)).unwrap();
    model
}

fn bench_extract_fleet(c: &mut Criterion) {
    let extractor = JsonExtractor::new();
    let mut group = c.benchmark_group("extract/fleet");
    for n in [10usize, 1_000, 10_000] {
        let model = fleet_model(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &model, |b, model| {
            b.iter(|| extractor.write_model(black_box(model), io::sink()).unwrap())
        });
    }
    group.finish();
}

fn bench_load_vehicle(c: &mut Criterion) {
    let schema = Arc::new(load_schema("ProbeVehicle.schema.json"));
    let doc: ModelDocument = serde_json::from_slice(&read_fixture("M-Vehicle.json")).unwrap();

    c.bench_function("load/vehicle", |b| {
        b.iter(|| {
            let mut model = Model::new(Arc::clone(&schema));
            populate_model(&mut model, black_box(&doc)).unwrap();
            model
        })
    });
}

fn bench_transform_probe2fiware(c: &mut Criterion) {
    let src_schema = load_schema("ProbeVehicle.schema.json");
    let dst_schema = load_schema("Fiware.schema.json");
    let doc: ModelDocument = serde_json::from_slice(&read_fixture("M-Vehicle.json")).unwrap();
    let program = read_fixture("Probe2Fiware.program.json");

    c.bench_function("transform/probe2fiware", |b| {
        b.iter(|| {
            let mut store = MemoryStore::new();
            let s = store.new_schema();
            store.populate_schema(s, src_schema.clone()).unwrap();
            let d = store.new_schema();
            store.populate_schema(d, dst_schema.clone()).unwrap();
            let src = store.new_model(s).unwrap();
            populate_model(store.model_mut(src).unwrap(), &doc).unwrap();
            let dst = store.new_model(d).unwrap();

            let params = EngineParams::default();
            let mut engine = MappingEngine::new();
            engine.initialize(&params);
            engine.add_in_model(src, "IN", "ProbeVehicle");
            engine.add_out_model(dst, "OUT", "Fiware");
            engine
                .launch(
                    &mut store,
                    LaunchMode::Run,
                    &mut NullProgress,
                    &params,
                    &mut Cursor::new(black_box(&program)),
                )
                .unwrap();
            store
        })
    });
}

criterion_group!(
    benches,
    bench_extract_fleet,
    bench_load_vehicle,
    bench_transform_probe2fiware,
);
criterion_main!(benches);
