//! Output encoding.

use http::header::CONTENT_TYPE;
use trellis_core::{keys, Body, Output, ProcessError, StateUpdate};

use super::{names, processor};
use crate::context::StageContext;
use crate::stage::Stage;

/// Encodes a text `output` body with the configured output codec.
///
/// Byte bodies pass through untouched. Characters the codec cannot represent
/// fail with `Encoding`; nothing is replaced or dropped. Sets `Content-Type`
/// from the media type and charset.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOutput;

impl Stage for EncodeOutput {
    fn name(&self) -> &'static str {
        names::ENCODE_OUTPUT
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::REQUEST_PROCESSOR, keys::OUTPUT]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let processor = processor(ctx)?;
        let output = ctx.get_mut::<Output>(keys::OUTPUT)?;

        if let Body::Text(text) = &output.body {
            let encoded = processor.codec().encode(text)?;
            output.body = Body::Bytes(encoded);
            output.charset = Some(processor.config().encode_output_as.clone());
        }

        if let Some(content_type) = output.content_type() {
            output
                .insert_header(CONTENT_TYPE, &content_type)
                .map_err(|e| ProcessError::stage_with_source("invalid content type", e))?;
        }

        Ok(StateUpdate::none())
    }
}
