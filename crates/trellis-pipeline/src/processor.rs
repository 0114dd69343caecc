//! The request processor.
//!
//! [`RequestProcessor`] owns everything a request needs that outlives the
//! request: the validated configuration, the dispatcher, the typecaster and
//! renderer tables, the output codec and the resource cache. All of it is
//! immutable after [`RequestProcessorBuilder::build`] except the cache, so a
//! processor can be shared across threads behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use trellis_config::ProcessorConfig;
use trellis_core::{
    keys, Codec, ConfigurationError, Path, PipelineState, ProcessError, RequestId, WildcardValue,
};
use trellis_dispatch::Dispatcher;
use trellis_resource::{LoadOptions, Renderer, RendererRegistry, ResourceCache};
use trellis_typecast::TypecasterTable;

use crate::pipeline::{BoxedStage, Pipeline, PipelineBuilder, RunOptions};
use crate::stage::Stage;
use crate::stages::{
    names, ApplyTypecastersToPath, DispatchPathToFilesystem, EncodeOutput, HydratePath,
    HydrateQuerystring, LoadResourceFromFilesystem, RenderErrorToOutput, RenderResource,
};

/// Keys every run starts with.
pub const INITIAL_KEYS: [&str; 4] = [
    keys::RAW_PATH,
    keys::RAW_QUERYSTRING,
    keys::REQUEST_PROCESSOR,
    keys::REQUEST_ID,
];

/// Process-wide collaborators, available to stages as `request_processor`.
pub struct ProcessorContext {
    config: ProcessorConfig,
    dispatcher: Dispatcher,
    typecasters: TypecasterTable,
    renderers: RendererRegistry,
    load_options: LoadOptions,
    codec: Codec,
    cache: ResourceCache,
}

impl ProcessorContext {
    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The filesystem dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Registered typecasters.
    #[must_use]
    pub fn typecasters(&self) -> &TypecasterTable {
        &self.typecasters
    }

    /// Registered renderers.
    #[must_use]
    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    /// How files become resources.
    #[must_use]
    pub fn load_options(&self) -> &LoadOptions {
        &self.load_options
    }

    /// The codec for `encode_output_as`.
    #[must_use]
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// The resource cache.
    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }
}

impl Serialize for ProcessorContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ProcessorContext", 4)?;
        s.serialize_field("config", &self.config)?;
        s.serialize_field("codec", self.codec.name())?;
        s.serialize_field("renderers", &self.renderers.names().collect::<Vec<_>>())?;
        s.serialize_field("typecasters", &self.typecasters.names().collect::<Vec<_>>())?;
        s.end()
    }
}

impl fmt::Debug for ProcessorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorContext")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("codec", &self.codec)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Processes requests against a `www_root` tree.
///
/// # Example
///
/// ```
/// use trellis_config::ProcessorConfig;
/// use trellis_core::{keys, Output};
/// use trellis_pipeline::{RequestProcessor, RunOptions};
///
/// let www = tempfile::tempdir().unwrap();
/// std::fs::write(www.path().join("hello.txt.spt"), "Hello, {who}!").unwrap();
///
/// let processor = RequestProcessor::new(ProcessorConfig::for_root(www.path())).unwrap();
/// let state = processor
///     .process("/hello.txt", "who=world", &RunOptions::raise_immediately())
///     .unwrap();
///
/// let output = state.get::<Output>(keys::OUTPUT).unwrap();
/// assert_eq!(output.as_bytes().unwrap().as_ref(), b"Hello, world!");
/// ```
#[derive(Clone)]
pub struct RequestProcessor {
    context: Arc<ProcessorContext>,
    pipeline: Pipeline,
}

impl RequestProcessor {
    /// Builds a processor with the default stages, typecasters and renderers.
    ///
    /// # Errors
    ///
    /// Any [`ConfigurationError`] found while validating `config`.
    pub fn new(config: ProcessorConfig) -> Result<Self, ConfigurationError> {
        Self::builder(config).build()
    }

    /// Starts a builder for customizing the processor.
    #[must_use]
    pub fn builder(config: ProcessorConfig) -> RequestProcessorBuilder {
        RequestProcessorBuilder::new(config)
    }

    /// Runs the pipeline for one request.
    ///
    /// The state is seeded with `raw_path`, `raw_querystring`,
    /// `request_processor` and a fresh `request_id`.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub fn process(
        &self,
        raw_path: &str,
        raw_querystring: &str,
        options: &RunOptions,
    ) -> Result<PipelineState, ProcessError> {
        let mut state = PipelineState::new();
        state.insert_inspectable(keys::RAW_PATH, raw_path.to_string());
        state.insert_inspectable(keys::RAW_QUERYSTRING, raw_querystring.to_string());
        state.insert_inspectable(keys::REQUEST_PROCESSOR, Arc::clone(&self.context));
        state.insert_inspectable(keys::REQUEST_ID, RequestId::new());

        self.pipeline.run(state, options)
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// The resource cache, for invalidation.
    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        self.context.cache()
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        self.context.config()
    }

    /// The shared processor context.
    #[must_use]
    pub fn context(&self) -> &Arc<ProcessorContext> {
        &self.context
    }

    /// The pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestProcessor")
            .field("www_root", &self.context.config.www_root)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// The default stage list, in order.
#[must_use]
pub fn default_pipeline() -> PipelineBuilder {
    Pipeline::builder()
        .push(HydratePath)
        .push(HydrateQuerystring)
        .push(DispatchPathToFilesystem)
        .push(ApplyTypecastersToPath)
        .push(LoadResourceFromFilesystem)
        .push(RenderResource)
        .push(EncodeOutput)
        .insert_before(names::ENCODE_OUTPUT, RenderErrorToOutput)
}

/// Builder for [`RequestProcessor`].
///
/// Starts from the default stages, the default typecasters (`int`, `float`)
/// and the built-in renderers (`stdlib_format`, `raw`).
pub struct RequestProcessorBuilder {
    config: ProcessorConfig,
    typecasters: TypecasterTable,
    renderers: RendererRegistry,
    pipeline: PipelineBuilder,
}

impl RequestProcessorBuilder {
    /// Creates a builder for `config`.
    #[must_use]
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            typecasters: TypecasterTable::default(),
            renderers: RendererRegistry::default(),
            pipeline: default_pipeline(),
        }
    }

    /// Registers a typecaster for the `name` wildcard suffix.
    #[must_use]
    pub fn typecaster<F>(mut self, name: impl Into<String>, caster: F) -> Self
    where
        F: Fn(&str, &PipelineState) -> anyhow::Result<WildcardValue> + Send + Sync + 'static,
    {
        self.typecasters.register(name, caster);
        self
    }

    /// Registers a renderer under its own name.
    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderers.register(renderer);
        self
    }

    /// Appends a stage after the default ones.
    #[must_use]
    pub fn push<S: Stage>(mut self, stage: S) -> Self {
        self.pipeline = self.pipeline.push(stage);
        self
    }

    /// Inserts a stage directly before `anchor`.
    #[must_use]
    pub fn insert_before<S: Stage>(mut self, anchor: &str, stage: S) -> Self {
        self.pipeline = self.pipeline.insert_before(anchor, stage);
        self
    }

    /// Inserts a stage directly after `anchor`.
    #[must_use]
    pub fn insert_after<S: Stage>(mut self, anchor: &str, stage: S) -> Self {
        self.pipeline = self.pipeline.insert_after(anchor, stage);
        self
    }

    /// Inserts an already shared stage directly after `anchor`.
    #[must_use]
    pub fn insert_shared_after(mut self, anchor: &str, stage: BoxedStage) -> Self {
        self.pipeline = self.pipeline.insert_shared_after(anchor, stage);
        self
    }

    /// Validates everything and builds the processor.
    ///
    /// # Errors
    ///
    /// - `InvalidValue` for a field that fails validation, or a `www_root`
    ///   that is not a directory.
    /// - Any stage graph error from [`PipelineBuilder::build`].
    pub fn build(self) -> Result<RequestProcessor, ConfigurationError> {
        let Self {
            config,
            typecasters,
            renderers,
            pipeline,
        } = self;

        config.validate(renderers.names())?;

        if !config.www_root.is_dir() {
            return Err(ConfigurationError::invalid_value(
                "www_root",
                format!("`{}` is not a directory", config.www_root.display()),
            ));
        }

        check_wildcard_names(&config, &typecasters)?;

        let codec = Codec::lookup(&config.encode_output_as).ok_or_else(|| {
            ConfigurationError::invalid_value("encode_output_as", "unknown codec")
        })?;

        let pipeline = pipeline.build(&INITIAL_KEYS)?;

        let dispatcher =
            Dispatcher::new(config.indices.clone()).with_dynamic_suffix(config.dynamic_suffix.clone());
        let load_options = LoadOptions {
            dynamic_suffix: config.dynamic_suffix.clone(),
            renderer_default: config.renderer_default.clone(),
            media_type_default: config.media_type_default.clone(),
            media_type_json: config.media_type_json.clone(),
        };
        let cache = ResourceCache::new(config.changes_reload);

        tracing::info!(
            www_root = %config.www_root.display(),
            stages = pipeline.stage_count(),
            changes_reload = config.changes_reload,
            encode_output_as = codec.name(),
            "request processor ready"
        );

        Ok(RequestProcessor {
            context: Arc::new(ProcessorContext {
                config,
                dispatcher,
                typecasters,
                renderers,
                load_options,
                codec,
                cache,
            }),
            pipeline,
        })
    }
}

/// Refuses wildcards under `www_root` that would shadow a path attribute,
/// before or after their typecast.
fn check_wildcard_names(
    config: &ProcessorConfig,
    typecasters: &TypecasterTable,
) -> Result<(), ConfigurationError> {
    let tokens = trellis_dispatch::wildcard_tokens(&config.www_root, &config.dynamic_suffix)
        .map_err(|e| ConfigurationError::invalid_value("www_root", e.to_string()))?;

    for (token, entry) in tokens {
        let name = typecasters.bound_name(&token);
        if let Some(reserved) = [token.as_str(), name].into_iter().find(|n| Path::is_reserved(n)) {
            tracing::error!(entry = %entry.display(), wildcard = %token, "reserved wildcard name");
            return Err(ConfigurationError::ReservedWildcard(reserved.to_string()));
        }
    }
    Ok(())
}

impl fmt::Debug for RequestProcessorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestProcessorBuilder")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
