use std::fs;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use html_validate::parser::{parse, tokenize};
use html_validate::MetaTable;

/// Generate markup of different shapes for benchmarking
fn generate_markup(sections: usize, pattern: &str) -> String {
    let mut content = String::from("<!doctype html>\n<html><head><title>bench</title></head><body>\n");

    for i in 0..sections {
        match pattern {
            "flat" => content.push_str(&format!("<p>paragraph {}</p>\n", i)),
            "nested" => content.push_str(&format!(
                "<div><section><ul><li><a href=\"#{}\"><span>{}</span></a></li></ul></section></div>\n",
                i, i
            )),
            "attribute_heavy" => content.push_str(&format!(
                "<input id=\"f{}\" name=\"field{}\" class=\"a b c\" type=\"text\" value='{}' data-x=1 disabled>\n",
                i, i, i
            )),
            "comment_heavy" => content.push_str(&format!(
                "<!-- section {} -->\n<!-- [html-validate-disable-next deprecated] -->\n<p>{}</p>\n",
                i, i
            )),
            _ => content.push_str(&format!("<div>{}</div>\n", i)),
        }
    }

    content.push_str("</body></html>\n");
    content
}

/// Benchmark the lexer alone
fn bench_tokenization(c: &mut Criterion) {
    let patterns = ["flat", "nested", "attribute_heavy", "comment_heavy"];

    let mut group = c.benchmark_group("tokenization");

    for pattern in patterns {
        let content = generate_markup(1_000, pattern);
        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(BenchmarkId::new("tokenize", pattern), &content, |b, content| {
            b.iter(|| {
                let count = tokenize(black_box(content), "bench.html")
                    .filter_map(Result::ok)
                    .count();
                black_box(count)
            })
        });
    }

    group.finish();
}

/// Benchmark tree building on documents of different sizes
fn bench_tree_building(c: &mut Criterion) {
    let meta = MetaTable::html5().expect("built-in metadata");
    let sizes = [100, 1_000, 10_000];

    let mut group = c.benchmark_group("tree_building");

    for &size in &sizes {
        for pattern in ["flat", "nested"] {
            let content = generate_markup(size, pattern);
            group.throughput(Throughput::Elements(size as u64));
            group.bench_with_input(
                BenchmarkId::new(pattern, size),
                &content,
                |b, content| b.iter(|| black_box(parse(black_box(content), "bench.html", &meta))),
            );
        }
    }

    group.finish();
}

/// Benchmark parsing the fixture documents
fn bench_real_files(c: &mut Criterion) {
    let meta = MetaTable::html5().expect("built-in metadata");
    let fixture_files = ["tests/fixtures/sample.html", "tests/fixtures/broken.html"];

    let mut group = c.benchmark_group("real_files");

    for file_path in fixture_files {
        if let Ok(content) = fs::read_to_string(file_path) {
            let file_name = file_path.rsplit('/').next().unwrap_or("unknown");
            group.throughput(Throughput::Bytes(content.len() as u64));
            group.bench_with_input(
                BenchmarkId::new("parse", file_name),
                &content,
                |b, content| b.iter(|| black_box(parse(black_box(content), file_name, &meta))),
            );
        }
    }

    group.finish();
}

criterion_group!(
    parsing_benches,
    bench_tokenization,
    bench_tree_building,
    bench_real_files
);

criterion_main!(parsing_benches);
