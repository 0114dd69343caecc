//! Dispatch benchmarks.
//!
//! Run with: `cargo bench -p trellis-dispatch`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use trellis_dispatch::Dispatcher;

fn build_tree(siblings: usize) -> TempDir {
    let root = TempDir::new().expect("tempdir");
    let base = root.path();

    for i in 0..siblings {
        fs::create_dir_all(base.join(format!("section{i}"))).expect("mkdir");
        fs::write(base.join(format!("page{i}.html.spt")), "page").expect("write");
    }

    let blog = base.join("blog").join("%year.int").join("%slug");
    fs::create_dir_all(&blog).expect("mkdir");
    fs::write(blog.join("index.html.spt"), "post").expect("write");
    fs::write(base.join("index.html"), "home").expect("write");

    root
}

fn parts(path: &str) -> Vec<String> {
    path.trim_start_matches('/').split('/').map(String::from).collect()
}

fn bench_path(c: &mut Criterion, name: &str, root: &Path, path: &str) {
    let dispatcher = Dispatcher::default();
    let parts = parts(path);
    c.bench_function(name, |b| {
        b.iter(|| black_box(dispatcher.dispatch(&parts, path, root)));
    });
}

fn bench_literal(c: &mut Criterion) {
    let root = build_tree(50);
    bench_path(c, "literal_dynamic_file", root.path(), "/page25.html");
}

fn bench_index(c: &mut Criterion) {
    let root = build_tree(50);
    bench_path(c, "root_index", root.path(), "/");
}

fn bench_nested_wildcards(c: &mut Criterion) {
    let root = build_tree(50);
    bench_path(c, "nested_wildcards", root.path(), "/blog/2024/hello-world/");
}

fn bench_not_found(c: &mut Criterion) {
    let root = build_tree(50);
    bench_path(c, "not_found", root.path(), "/missing/deep/path");
}

fn bench_directory_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("directory_width");
    let dispatcher = Dispatcher::default();

    for siblings in [10, 100, 1000] {
        let root = build_tree(siblings);
        let path = "/blog/2024/hello-world/";
        let parts = parts(path);
        group.bench_with_input(BenchmarkId::from_parameter(siblings), &root, |b, root| {
            b.iter(|| black_box(dispatcher.dispatch(&parts, path, root.path())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_literal,
    bench_index,
    bench_nested_wildcards,
    bench_not_found,
    bench_directory_width,
);
criterion_main!(benches);
