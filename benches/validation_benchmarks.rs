use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use html_validate::core::Severity;
use html_validate::{Config, HtmlValidate};

/// Generate documents with a given share of problems
fn generate_document(sections: usize, scenario: &str) -> String {
    let mut content = String::from("<!doctype html>\n<html><head><title>bench</title></head><body>\n");

    for i in 0..sections {
        match scenario {
            "all_valid" => content.push_str(&format!(
                "<section><h2>Title {}</h2><p>Text <em>{}</em></p></section>\n",
                i, i
            )),
            "structural_errors" => {
                if i % 3 == 0 {
                    content.push_str("<div><span></div>\n");
                } else {
                    content.push_str(&format!("<p>{}</p>\n", i));
                }
            }
            "content_model_errors" => {
                if i % 2 == 0 {
                    content.push_str("<span><div>block</div></span><li>stray</li>\n");
                } else {
                    content.push_str("<table><thead></thead><caption></caption></table>\n");
                }
            }
            "directives" => content.push_str(&format!(
                "<!-- [html-validate-disable-next deprecated] -->\n<center>{}</center>\n",
                i
            )),
            _ => content.push_str(&format!("<div>{}</div>\n", i)),
        }
    }

    content.push_str("</body></html>\n");
    content
}

/// Benchmark validation with different error densities
fn bench_validation_scenarios(c: &mut Criterion) {
    let engine = HtmlValidate::new(&Config::recommended()).expect("recommended config");
    let scenarios = [
        "all_valid",
        "structural_errors",
        "content_model_errors",
        "directives",
    ];

    let mut group = c.benchmark_group("validation_scenarios");

    for scenario in scenarios {
        let content = generate_document(1_000, scenario);
        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(BenchmarkId::new("recommended", scenario), &content, |b, content| {
            b.iter(|| black_box(engine.validate_string(black_box(content), "bench.html")))
        });
    }

    group.finish();
}

/// Benchmark how validation scales with document size
fn bench_validation_scalability(c: &mut Criterion) {
    let engine = HtmlValidate::new(&Config::recommended()).expect("recommended config");
    let sizes = [100, 1_000, 10_000];

    let mut group = c.benchmark_group("validation_scalability");

    for &size in &sizes {
        let content = generate_document(size, "all_valid");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sections", size), &content, |b, content| {
            b.iter(|| black_box(engine.validate_string(black_box(content), "bench.html")))
        });
    }

    group.finish();
}

/// Benchmark the cost of the rule set itself
fn bench_rule_count(c: &mut Criterion) {
    let content = generate_document(1_000, "content_model_errors");
    let configs = [
        ("none", Config::empty()),
        ("close_order", Config::empty().with_rule("close-order", Severity::Error)),
        ("recommended", Config::recommended()),
    ];

    let mut group = c.benchmark_group("rule_count");

    for (name, config) in configs {
        let engine = HtmlValidate::new(&config).expect("valid config");
        group.bench_with_input(BenchmarkId::new("rules", name), &content, |b, content| {
            b.iter(|| black_box(engine.validate_string(black_box(content), "bench.html")))
        });
    }

    group.finish();
}

/// Benchmark engine setup (metadata resolution and rule instantiation)
fn bench_engine_setup(c: &mut Criterion) {
    let config = Config::recommended();
    c.bench_function("engine_setup", |b| {
        b.iter(|| black_box(HtmlValidate::new(black_box(&config))))
    });
}

criterion_group!(
    validation_benches,
    bench_validation_scenarios,
    bench_validation_scalability,
    bench_rule_count,
    bench_engine_setup
);

criterion_main!(validation_benches);
