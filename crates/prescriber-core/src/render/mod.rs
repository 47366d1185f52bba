//! Document rendering: normalization, template binding, and the
//! conversion seam.

mod normalizer;
mod template;

use thiserror::Error;

pub use normalizer::{normalize, NormalizedRecord, EMPTY_SYMPTOMS_BLOCK, EMPTY_TREATMENT_BLOCK};
pub use template::{
    RenderMode, TemplateError, TemplateRenderer, APPROVAL_STAMP_PLACEHOLDER, DEFAULT_TEMPLATE,
    REQUIRED_PLACEHOLDERS,
};

/// Failure converting a rendered document to its delivery format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// The converter backend could not be reached or started
    #[error("document converter unavailable: {0}")]
    Unavailable(String),
    /// Conversion exceeded its deadline and was killed
    #[error("document conversion timed out after {seconds}s")]
    Timeout { seconds: u64 },
    /// The backend ran but did not produce a document
    #[error("document conversion failed: {0}")]
    Failed(String),
}

impl ConvertError {
    /// Whether retrying the same conversion later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConvertError::Unavailable(_) | ConvertError::Timeout { .. }
        )
    }
}

/// Converts a rendered document to the delivery format (PDF).
///
/// Implementations live outside this crate; the lifecycle manager only
/// sees this trait.
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, document: &[u8]) -> Result<Vec<u8>, ConvertError>;
}

/// Pass-through converter for tests and plain-text delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl DocumentConverter for IdentityConverter {
    fn convert(&self, document: &[u8]) -> Result<Vec<u8>, ConvertError> {
        Ok(document.to_vec())
    }
}
