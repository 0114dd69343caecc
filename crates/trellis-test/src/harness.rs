//! The pipeline harness.

use std::sync::Arc;

use trellis_config::ProcessorConfig;
use trellis_core::{keys, Output, PipelineState};
use trellis_dispatch::DispatchResult;
use trellis_pipeline::stages::names;
use trellis_pipeline::{RequestProcessor, RequestProcessorBuilder, RunOptions};

use crate::error::TestError;
use crate::fixture::FsFixture;

type Customizer = Arc<dyn Fn(RequestProcessorBuilder) -> RequestProcessorBuilder + Send + Sync>;

/// How a hit runs and what it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitOptions {
    /// Return the first stage failure instead of recovering. Defaults to `true`.
    pub raise_immediately: bool,
    /// Stop after this stage.
    pub return_after: Option<String>,
    /// Dot-path into the final state. Defaults to `output`.
    pub want: String,
}

impl Default for HitOptions {
    fn default() -> Self {
        Self {
            raise_immediately: true,
            return_after: None,
            want: keys::OUTPUT.to_string(),
        }
    }
}

impl HitOptions {
    /// Lets errors be captured and rendered by the recovery stage.
    pub fn deferred(mut self) -> Self {
        self.raise_immediately = false;
        self
    }

    /// Stops after `stage`.
    pub fn return_after(mut self, stage: impl Into<String>) -> Self {
        self.return_after = Some(stage.into());
        self
    }

    /// Selects what to return.
    pub fn want(mut self, want: impl Into<String>) -> Self {
        self.want = want.into();
        self
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            raise_immediately: self.raise_immediately,
            return_after: self.return_after.clone(),
        }
    }
}

/// Drives a [`RequestProcessor`] over an [`FsFixture`].
///
/// The processor is built on first use and rebuilt after any configuration
/// change.
///
/// # Example
///
/// ```
/// use trellis_test::Harness;
///
/// let mut harness = Harness::new().unwrap();
/// let output = harness.simple("Greetings, program!", "index.html.spt", None).unwrap();
/// assert_eq!(output["body"], "Greetings, program!");
/// assert_eq!(output["status"], 200);
///
/// harness.fs().mk_www("hello.txt.spt", "Hello, {who}!").unwrap();
/// assert_eq!(harness.body("/hello.txt", "who=world").unwrap(), "Hello, world!");
/// ```
pub struct Harness {
    fs: FsFixture,
    config: ProcessorConfig,
    customizers: Vec<Customizer>,
    processor: Option<RequestProcessor>,
}

impl Harness {
    /// Creates a harness over fresh, empty trees.
    pub fn new() -> Result<Self, TestError> {
        let fs = FsFixture::new()?;
        let mut config = ProcessorConfig::for_root(fs.www_root());
        config.project_root = Some(fs.project_root().to_path_buf());
        Ok(Self {
            fs,
            config,
            customizers: Vec::new(),
            processor: None,
        })
    }

    /// The filesystem fixture.
    pub fn fs(&self) -> &FsFixture {
        &self.fs
    }

    /// The configuration the next build will use.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Changes the configuration. The processor is rebuilt on next use.
    pub fn configure(&mut self, f: impl FnOnce(&mut ProcessorConfig)) -> &mut Self {
        f(&mut self.config);
        self.processor = None;
        self
    }

    /// Adds a builder step (typecasters, renderers, extra stages). The
    /// processor is rebuilt on next use.
    pub fn customize<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(RequestProcessorBuilder) -> RequestProcessorBuilder + Send + Sync + 'static,
    {
        self.customizers.push(Arc::new(f));
        self.processor = None;
        self
    }

    /// The processor, building it if needed.
    pub fn processor(&mut self) -> Result<&RequestProcessor, TestError> {
        let processor = match self.processor.take() {
            Some(processor) => processor,
            None => self
                .customizers
                .iter()
                .fold(RequestProcessor::builder(self.config.clone()), |b, f| f(b))
                .build()?,
        };
        Ok(self.processor.insert(processor))
    }

    /// Runs a request and returns the final state.
    pub fn hit_state(
        &mut self,
        path: &str,
        querystring: &str,
        options: &HitOptions,
    ) -> Result<PipelineState, TestError> {
        let run = options.run_options();
        Ok(self.processor()?.process(path, querystring, &run)?)
    }

    /// Runs a request and returns the JSON projection at `options.want`.
    pub fn hit(
        &mut self,
        path: &str,
        querystring: &str,
        options: &HitOptions,
    ) -> Result<serde_json::Value, TestError> {
        let state = self.hit_state(path, querystring, options)?;
        state
            .lookup(&options.want)
            .ok_or_else(|| TestError::Missing(options.want.clone()))
    }

    /// Runs a request and returns the encoded output body as UTF-8.
    pub fn body(&mut self, path: &str, querystring: &str) -> Result<String, TestError> {
        let state = self.hit_state(path, querystring, &HitOptions::default())?;
        output_body(&state)
    }

    /// The request path that serves `filepath`.
    ///
    /// Strips the dynamic suffix, then the first index name the path ends
    /// with: `blog/index.html.spt` is served at `/blog/`.
    pub fn uri_for(&self, filepath: &str) -> String {
        let mut uri = format!("/{}", filepath.trim_start_matches('/'));
        if let Some(len) = uri.strip_suffix(self.config.dynamic_suffix.as_str()).map(str::len) {
            uri.truncate(len);
        }
        let index_len = self.config.indices.iter().find_map(|index| {
            uri.strip_suffix(index.as_str())
                .filter(|rest| rest.ends_with('/'))
                .map(str::len)
        });
        if let Some(len) = index_len {
            uri.truncate(len);
        }
        uri
    }

    /// Writes `contents` to `filepath` under `www` and hits it.
    ///
    /// Without `uripath`, the request path is derived with
    /// [`uri_for`](Self::uri_for).
    pub fn simple(
        &mut self,
        contents: &str,
        filepath: &str,
        uripath: Option<&str>,
    ) -> Result<serde_json::Value, TestError> {
        self.simple_with(contents, filepath, uripath, &HitOptions::default())
    }

    /// [`simple`](Self::simple) with explicit options.
    pub fn simple_with(
        &mut self,
        contents: &str,
        filepath: &str,
        uripath: Option<&str>,
        options: &HitOptions,
    ) -> Result<serde_json::Value, TestError> {
        self.fs.mk_www(filepath, contents)?;
        let uri = uripath.map_or_else(|| self.uri_for(filepath), str::to_string);
        self.hit(&uri, "", options)
    }

    /// Writes `contents` to `filepath`, dispatches, and returns the dispatch
    /// result without loading anything.
    pub fn make_dispatch_result(
        &mut self,
        contents: &str,
        filepath: &str,
        uripath: Option<&str>,
    ) -> Result<DispatchResult, TestError> {
        self.fs.mk_www(filepath, contents)?;
        let uri = uripath.map_or_else(|| self.uri_for(filepath), str::to_string);
        let options = HitOptions::default()
            .return_after(names::DISPATCH_PATH_TO_FILESYSTEM)
            .want(keys::DISPATCH_RESULT);
        let state = self.hit_state(&uri, "", &options)?;
        state
            .get::<DispatchResult>(keys::DISPATCH_RESULT)
            .cloned()
            .ok_or_else(|| TestError::Missing(options.want))
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("fs", &self.fs)
            .field("config", &self.config)
            .field("customizers", &self.customizers.len())
            .field("built", &self.processor.is_some())
            .finish()
    }
}

/// The encoded body of `state`'s output, as UTF-8.
pub fn output_body(state: &PipelineState) -> Result<String, TestError> {
    let output = state
        .get::<Output>(keys::OUTPUT)
        .ok_or_else(|| TestError::Missing(keys::OUTPUT.to_string()))?;
    let bytes = match output.as_bytes() {
        Some(bytes) => bytes.to_vec(),
        None => return Err(TestError::Body("output was never encoded".to_string())),
    };
    String::from_utf8(bytes).map_err(|e| TestError::Body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_for() {
        let harness = Harness::new().unwrap();
        assert_eq!(harness.uri_for("index.html.spt"), "/");
        assert_eq!(harness.uri_for("blog/index.html"), "/blog/");
        assert_eq!(harness.uri_for("about.html.spt"), "/about.html");
        assert_eq!(harness.uri_for("/robots.txt"), "/robots.txt");
        assert_eq!(harness.uri_for("myindex.html"), "/myindex.html");
    }

    #[test]
    fn test_configure_rebuilds() {
        let mut harness = Harness::new().unwrap();
        harness.processor().unwrap();
        harness.configure(|c| c.changes_reload = true);
        assert!(harness.processor().unwrap().config().changes_reload);
    }

    #[test]
    fn test_hit_options_defaults() {
        let options = HitOptions::default();
        assert!(options.raise_immediately);
        assert_eq!(options.want, "output");
        assert!(options.return_after.is_none());

        let options = options.deferred().return_after("render_resource").want("resource");
        assert_eq!(
            options.run_options(),
            RunOptions {
                raise_immediately: false,
                return_after: Some("render_resource".to_string()),
            }
        );
    }
}
