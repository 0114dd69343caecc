//! End-to-end tests for the request processor.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::header::{CONTENT_TYPE, LOCATION};
use http::StatusCode;
use tempfile::TempDir;
use trellis_config::ProcessorConfig;
use trellis_core::{keys, Output, ProcessError, StateUpdate, WildcardValue};
use trellis_pipeline::stages::names;
use trellis_pipeline::{FnStage, RequestProcessor, RunOptions};

fn www(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        write(dir.path(), name, contents);
    }
    dir
}

fn write(root: &Path, name: &str, contents: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn processor(dir: &TempDir) -> RequestProcessor {
    RequestProcessor::new(ProcessorConfig::for_root(dir.path())).unwrap()
}

fn body(state: &trellis_core::PipelineState) -> String {
    let output = state.get::<Output>(keys::OUTPUT).unwrap();
    String::from_utf8(output.as_bytes().unwrap().to_vec()).unwrap()
}

#[test]
fn test_static_file_is_served_verbatim() {
    let dir = www(&[("robots.txt", "User-agent: *\n")]);
    let state = processor(&dir)
        .process("/robots.txt", "", &RunOptions::raise_immediately())
        .unwrap();

    assert_eq!(body(&state), "User-agent: *\n");
    let output = state.get::<Output>(keys::OUTPUT).unwrap();
    assert_eq!(output.headers.get(CONTENT_TYPE).unwrap(), "text/plain");
}

#[test]
fn test_dynamic_file_renders_wildcards() {
    let dir = www(&[("users/%name/index.html.spt", "<p>Hello, {name}!</p>")]);
    let state = processor(&dir)
        .process("/users/alice/", "", &RunOptions::raise_immediately())
        .unwrap();

    assert_eq!(body(&state), "<p>Hello, alice!</p>");
    assert_eq!(state.lookup("dispatch_result.wildcards.name").unwrap(), "alice");
    assert_eq!(state.lookup("path.name").unwrap(), "alice");
    let output = state.get::<Output>(keys::OUTPUT).unwrap();
    assert_eq!(
        output.headers.get(CONTENT_TYPE).unwrap(),
        "text/html; charset=UTF-8"
    );
}

#[test]
fn test_typed_wildcard_is_converted() {
    let dir = www(&[("archive/%year.int.spt", "year {year}")]);
    let processor = processor(&dir);

    let state = processor
        .process("/archive/2024", "", &RunOptions::raise_immediately())
        .unwrap();
    let path = state.get::<trellis_core::Path>(keys::PATH).unwrap();
    assert_eq!(path.wildcard("year"), Some(&WildcardValue::Int(2024)));
    assert!(path.wildcard("year.int").is_none());
    assert_eq!(body(&state), "year 2024");

    let err = processor
        .process("/archive/abc", "", &RunOptions::raise_immediately())
        .unwrap_err();
    assert!(matches!(err, ProcessError::TypecastRejected { .. }));
    assert!(err.is_not_found());
}

#[test]
fn test_not_found_in_deferred_mode_yields_404_output() {
    let dir = www(&[("index.html", "home")]);
    let state = processor(&dir)
        .process("/missing.html", "", &RunOptions::default())
        .unwrap();

    let output = state.get::<Output>(keys::OUTPUT).unwrap();
    assert_eq!(output.status, StatusCode::NOT_FOUND);
    assert_eq!(state.lookup("error.stage").unwrap(), names::DISPATCH_PATH_TO_FILESYSTEM);
    assert!(!state.contains(keys::RESOURCE));
}

#[test]
fn test_rejected_typecast_in_deferred_mode_yields_404_output() {
    let dir = www(&[("%year.int.spt", "Year {year}")]);
    let processor = processor(&dir);

    let state = processor.process("/2024", "", &RunOptions::default()).unwrap();
    assert_eq!(body(&state), "Year 2024");

    let state = processor.process("/abc", "", &RunOptions::default()).unwrap();
    let output = state.get::<Output>(keys::OUTPUT).unwrap();
    assert_eq!(output.status, StatusCode::NOT_FOUND);
    assert_eq!(state.lookup("error.stage").unwrap(), names::APPLY_TYPECASTERS_TO_PATH);
    assert!(!state.contains(keys::RESOURCE));
    assert!(output.as_bytes().is_some());
}

#[test]
fn test_reserved_wildcard_added_after_startup_is_captured() {
    let dir = www(&[]);
    let processor = processor(&dir);
    write(dir.path(), "%parts.spt", "parts");

    let state = processor.process("/abc", "", &RunOptions::default()).unwrap();
    let output = state.get::<Output>(keys::OUTPUT).unwrap();
    assert_eq!(output.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.lookup("error.stage").unwrap(), names::DISPATCH_PATH_TO_FILESYSTEM);

    let err = processor
        .process("/abc", "", &RunOptions::raise_immediately())
        .unwrap_err();
    assert!(!matches!(err, ProcessError::Configuration(_)));
}

#[test]
fn test_directory_without_slash_redirects_with_querystring() {
    let dir = www(&[("docs/index.html", "docs")]);
    let processor = processor(&dir);

    let err = processor
        .process("/docs", "page=2", &RunOptions::raise_immediately())
        .unwrap_err();
    assert!(matches!(err, ProcessError::Redirect { ref location } if location == "/docs/?page=2"));

    let state = processor.process("/docs", "", &RunOptions::default()).unwrap();
    let output = state.get::<Output>(keys::OUTPUT).unwrap();
    assert_eq!(output.status, StatusCode::FOUND);
    assert_eq!(output.headers.get(LOCATION).unwrap(), "/docs/");
}

#[test]
fn test_unencodable_output_fails() {
    let dir = www(&[("cafe.txt.spt", "café")]);
    let mut config = ProcessorConfig::for_root(dir.path());
    config.encode_output_as = "ascii".to_string();
    let processor = RequestProcessor::new(config).unwrap();

    let err = processor
        .process("/cafe.txt", "", &RunOptions::raise_immediately())
        .unwrap_err();
    assert!(matches!(
        err,
        ProcessError::Encoding { character: 'é', position: 3, .. }
    ));
}

#[test]
fn test_return_after_dispatch_stops_before_loading() {
    let dir = www(&[("about.html.spt", "about")]);
    let processor = processor(&dir);

    let state = processor
        .process(
            "/about.html",
            "",
            &RunOptions::raise_immediately().return_after(names::DISPATCH_PATH_TO_FILESYSTEM),
        )
        .unwrap();

    assert_eq!(state.lookup("dispatch_result.is_dynamic").unwrap(), true);
    assert!(!state.contains(keys::RESOURCE));
    assert!(!state.contains(keys::OUTPUT));
    assert!(processor.cache().is_empty());
}

#[test]
fn test_spliced_stage_preserves_processing() {
    let dir = www(&[("hello.txt.spt", "hi {who}")]);
    let calls = Arc::new(AtomicUsize::new(0));

    for anchor in names::CANONICAL {
        let counter = Arc::clone(&calls);
        let processor = RequestProcessor::builder(ProcessorConfig::for_root(dir.path()))
            .insert_after(
                anchor,
                FnStage::new("count_calls", &[], move |_ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(StateUpdate::none())
                }),
            )
            .build()
            .unwrap();

        let state = processor
            .process("/hello.txt", "who=there", &RunOptions::raise_immediately())
            .unwrap();
        assert_eq!(body(&state), "hi there");
    }

    assert_eq!(calls.load(Ordering::SeqCst), names::CANONICAL.len());
}

#[test]
fn test_resources_are_cached_per_processor() {
    let dir = www(&[("page.html.spt", "v1")]);
    let processor = processor(&dir);

    processor.process("/page.html", "", &RunOptions::raise_immediately()).unwrap();
    write(dir.path(), "page.html.spt", "v2");
    let state = processor.process("/page.html", "", &RunOptions::raise_immediately()).unwrap();
    assert_eq!(body(&state), "v1");
    assert_eq!(processor.cache().stats().compilations, 1);

    processor.cache().clear();
    let state = processor.process("/page.html", "", &RunOptions::raise_immediately()).unwrap();
    assert_eq!(body(&state), "v2");
}

#[test]
fn test_custom_typecaster() {
    let dir = www(&[("flags/%on.flag.spt", "{on}")]);
    let processor = RequestProcessor::builder(ProcessorConfig::for_root(dir.path()))
        .typecaster("flag", |raw, _state| match raw {
            "on" => Ok(WildcardValue::Bool(true)),
            "off" => Ok(WildcardValue::Bool(false)),
            other => anyhow::bail!("`{other}` is not on or off"),
        })
        .build()
        .unwrap();

    let state = processor.process("/flags/on", "", &RunOptions::raise_immediately()).unwrap();
    assert_eq!(state.lookup("path.on").unwrap(), true);

    let err = processor
        .process("/flags/maybe", "", &RunOptions::raise_immediately())
        .unwrap_err();
    assert!(err.is_not_found());
}
