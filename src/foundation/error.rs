/// Convenience result type used across the graphics core.
pub type GraphicsResult<T> = Result<T, GraphicsError>;

/// Top-level error taxonomy surfaced by every public engine operation.
#[derive(thiserror::Error, Debug)]
pub enum GraphicsError {
    /// A send/update/remove arrived before `configureOutputs` succeeded.
    #[error("graphics outputs are not configured")]
    NotConfigured,

    /// A command payload failed schema validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The template sanitizer rejected the HTML or CSS.
    #[error("template rejected: {0}")]
    TemplateRejected(String),

    /// An asset id referenced by a bundle could not be resolved.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// A single asset exceeded the per-item size cap.
    #[error("asset too large: {0}")]
    AssetTooLarge(String),

    /// Storing an asset would exceed the registry's total size cap.
    #[error("asset registry is full")]
    RegistryFull,

    /// A layer violates the category-exclusivity or global count invariant.
    #[error("layer limit exceeded: {0}")]
    LayerLimit(String),

    /// A bundle's declared render format contradicts the active output format.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// The renderer subprocess channel is down.
    #[error("renderer unavailable")]
    RendererUnavailable,

    /// The output adapter refused configure/sendFrame/stop.
    #[error("output helper error: {0}")]
    OutputHelperError(String),

    /// An output transition failed at a named stage; rollback diagnostics are included.
    #[error("output transition failed at stage '{stage}': {message}")]
    OutputTransitionError {
        /// Stage name from `OutputTransitionService`'s staged pipeline.
        stage: &'static str,
        /// Human-readable failure detail for that stage.
        message: String,
        /// Diagnostics collected while attempting rollback, if rollback itself failed.
        rollback: Option<String>,
    },

    /// The caller exceeded an externally enforced command-rate policy.
    ///
    /// Enforcement lives outside this core; this variant only lets a caller surface the
    /// classification verbatim.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GraphicsError {
    /// Build a [`GraphicsError::InvalidPayload`] value.
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Build a [`GraphicsError::TemplateRejected`] value.
    pub fn template_rejected(msg: impl Into<String>) -> Self {
        Self::TemplateRejected(msg.into())
    }

    /// Build a [`GraphicsError::LayerLimit`] value.
    pub fn layer_limit(msg: impl Into<String>) -> Self {
        Self::LayerLimit(msg.into())
    }

    /// Build a [`GraphicsError::FormatMismatch`] value.
    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch(msg.into())
    }

    /// Build a [`GraphicsError::OutputHelperError`] value.
    pub fn output_helper(msg: impl Into<String>) -> Self {
        Self::OutputHelperError(msg.into())
    }

    /// Build a [`GraphicsError::OutputTransitionError`] with no rollback diagnostics.
    pub fn transition(stage: &'static str, message: impl Into<String>) -> Self {
        Self::OutputTransitionError {
            stage,
            message: message.into(),
            rollback: None,
        }
    }

    /// Attach rollback diagnostics to an existing transition error.
    pub fn with_rollback(self, diag: impl Into<String>) -> Self {
        match self {
            Self::OutputTransitionError {
                stage, message, ..
            } => Self::OutputTransitionError {
                stage,
                message,
                rollback: Some(diag.into()),
            },
            other => other,
        }
    }

    /// The `graphics_error` event code this variant fans out under, if any (`spec.md` §6: errors
    /// of class `renderer_error`, `output_helper_error`, or transition stages). Caller-validation
    /// errors (bad payloads, limits, asset/template rejections) never fan out.
    pub fn event_code(&self) -> Option<&'static str> {
        match self {
            Self::RendererUnavailable => Some("renderer_error"),
            Self::OutputHelperError(_) => Some("output_helper_error"),
            Self::OutputTransitionError { .. } => Some("transition_error"),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
