//! Rendering resources and captured errors into [`Output`].

use std::fmt::Write as _;
use std::sync::Arc;

use http::header::LOCATION;
use http::StatusCode;
use trellis_core::{keys, CapturedError, Output, ProcessError, StateUpdate};
use trellis_resource::Resource;

use super::{names, processor};
use crate::context::StageContext;
use crate::stage::{Stage, StageKind};

/// Turns the loaded resource into `output`.
///
/// Static resources are served verbatim with `charset_static` (if any).
/// Dynamic resources are rendered against the whole state with their
/// renderer and tagged with `charset_dynamic`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderResource;

impl Stage for RenderResource {
    fn name(&self) -> &'static str {
        names::RENDER_RESOURCE
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::REQUEST_PROCESSOR, keys::RESOURCE, keys::STATE]
    }

    fn outputs(&self) -> &[&'static str] {
        &[keys::OUTPUT]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let processor = processor(ctx)?;
        let config = processor.config();
        let resource = ctx.get::<Arc<Resource>>(keys::RESOURCE)?;

        let output = match resource.as_ref() {
            Resource::Static { body, media_type } => {
                let mut output = Output::binary(body.clone()).with_media_type(media_type);
                output.charset.clone_from(&config.charset_static);
                output
            }
            Resource::Dynamic {
                template,
                renderer,
                media_type,
            } => {
                let body = processor
                    .renderers()
                    .render(renderer, template, ctx.state()?)?;
                let mut output = Output::text(body).with_media_type(media_type);
                output.charset = Some(config.charset_dynamic.clone());
                output
            }
        };

        Ok(StateUpdate::none().with_inspectable(keys::OUTPUT, output))
    }
}

/// Recovery stage: turns the captured error into a plain-text `output`.
///
/// The status comes from the error category. Redirects also get a
/// `Location` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderErrorToOutput;

impl Stage for RenderErrorToOutput {
    fn name(&self) -> &'static str {
        names::RENDER_ERROR_TO_OUTPUT
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::ERROR]
    }

    fn outputs(&self) -> &[&'static str] {
        &[keys::OUTPUT]
    }

    fn kind(&self) -> StageKind {
        StageKind::Recovery
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let captured = ctx.get::<CapturedError>(keys::ERROR)?;
        let output = error_output(&captured.error)?;

        tracing::debug!(
            stage = %captured.stage,
            status = output.status.as_u16(),
            "rendered captured error"
        );

        Ok(StateUpdate::none().with_inspectable(keys::OUTPUT, output))
    }
}

fn error_output(error: &ProcessError) -> Result<Output, ProcessError> {
    let status: StatusCode = error.status_code();
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = format!("{} {reason}\n\n{error}\n", status.as_u16());

    let mut output = Output::text(body)
        .with_media_type("text/plain")
        .with_status(status);

    if let ProcessError::Redirect { location } = error {
        output
            .insert_header(LOCATION, &encode_location(location))
            .map_err(|e| ProcessError::stage_with_source("invalid redirect location", e))?;
    }

    Ok(output)
}

/// Percent-encodes everything a header value cannot carry as is.
fn encode_location(location: &str) -> String {
    let mut encoded = String::with_capacity(location.len());
    for byte in location.bytes() {
        if byte.is_ascii_graphic() {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}
