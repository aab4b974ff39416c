pub mod pptx;

use std::path::Path;

use thiserror::Error;

use crate::context::SubstitutionContext;

/// Per-job rendering failure. Recorded in the run, never fatal to it.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("template error: {0}")]
    Template(String),
}

/// Produces one output file from a template and a substitution context.
pub trait Renderer: Send + Sync {
    /// Extension of the template files this renderer accepts.
    fn template_extension(&self) -> &str;

    /// Render `template` with `context` (placeholder tag to value) into
    /// `destination`, creating parent directories as needed.
    fn render(
        &self,
        template: &Path,
        context: &SubstitutionContext,
        destination: &Path,
    ) -> Result<(), RenderError>;
}
