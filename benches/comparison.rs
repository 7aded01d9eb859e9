// ABOUTME: Benchmark comparing BSON codec performance against serde_json.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_bsonwire::{Decoder, DecoderConfig, TokenType};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct SimpleStruct {
    name: String,
    age: u32,
    active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ComplexStruct {
    id: u64,
    name: String,
    email: String,
    scores: Vec<i32>,
    metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Metadata {
    created: String,
    updated: String,
    tags: Vec<String>,
    rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Batch {
    users: Vec<ComplexStruct>,
}

fn create_simple_data() -> SimpleStruct {
    SimpleStruct {
        name: "Alice".to_string(),
        age: 30,
        active: true,
    }
}

fn create_complex(i: u64) -> ComplexStruct {
    ComplexStruct {
        id: 12_345_678_901_234 + i,
        name: format!("User {i}"),
        email: format!("user{i}@example.com"),
        scores: vec![95, 87, 92, 88, 91, 89, 94, 90, 93, 86],
        metadata: Metadata {
            created: "2024-01-15T10:30:00Z".to_string(),
            updated: "2024-01-18T14:22:33Z".to_string(),
            tags: vec!["premium".to_string(), "verified".to_string()],
            rating: (i as f64) / 10.0,
        },
    }
}

fn create_batch() -> Batch {
    Batch {
        users: (0..100).map(create_complex).collect(),
    }
}

/// Encode and decode `data` with both codecs in one benchmark group.
fn bench_pair<T>(c: &mut Criterion, group_name: &str, data: &T)
where
    T: Serialize + DeserializeOwned,
{
    let bson_bytes = serde_bsonwire::to_vec(data).unwrap();
    let json_bytes = serde_json::to_vec(data).unwrap();

    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Bytes(json_bytes.len() as u64));

    group.bench_function("bson_encode", |b| {
        b.iter(|| serde_bsonwire::to_vec(black_box(data)).unwrap())
    });

    group.bench_function("json_encode", |b| {
        b.iter(|| serde_json::to_vec(black_box(data)).unwrap())
    });

    group.bench_function("bson_decode", |b| {
        b.iter(|| serde_bsonwire::from_slice::<T>(black_box(&bson_bytes)).unwrap())
    });

    group.bench_function("json_decode", |b| {
        b.iter(|| serde_json::from_slice::<T>(black_box(&json_bytes)).unwrap())
    });

    println!(
        "{group_name} sizes: BSON={} bytes, JSON={} bytes ({:.1}% of JSON)",
        bson_bytes.len(),
        json_bytes.len(),
        (bson_bytes.len() as f64 / json_bytes.len() as f64) * 100.0
    );

    group.finish();
}

fn bench_simple_struct(c: &mut Criterion) {
    bench_pair(c, "simple_struct", &create_simple_data());
}

fn bench_complex_struct(c: &mut Criterion) {
    bench_pair(c, "complex_struct", &create_complex(0));
}

fn bench_nested_data(c: &mut Criterion) {
    bench_pair(c, "nested_100_objects", &create_batch());
}

/// Raw token reading, with a small fill buffer so that strings are
/// decoded across many refills.
fn bench_token_stream(c: &mut Criterion) {
    let bytes = serde_bsonwire::to_vec(&create_batch()).unwrap();

    let mut group = c.benchmark_group("token_stream");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    for buffer_size in [16, 4096] {
        group.bench_function(format!("read_buffer_{buffer_size}"), |b| {
            b.iter(|| {
                let config = DecoderConfig {
                    buffer_size,
                    ..DecoderConfig::default()
                };
                let mut dec = Decoder::with_config(black_box(&bytes[..]), config);
                let mut count = 0usize;
                while dec.read().unwrap() != TokenType::None {
                    count += 1;
                }
                count
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_simple_struct,
    bench_complex_struct,
    bench_nested_data,
    bench_token_stream,
);

criterion_main!(benches);
