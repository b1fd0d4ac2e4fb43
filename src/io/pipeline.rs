//! End-to-end import: resolve a provider, tokenize the resource, import.

use crate::io::registry::CapabilityRegistry;
use crate::io::services::{ImportContext, ImportParameters, ImportReport, ProgressReporter};
use crate::io::tokenizer::Tokenizer;
use crate::{Error, Result};

/// Runs imports through a [`CapabilityRegistry`].
#[derive(Clone, Default)]
pub struct ImportPipeline {
    registry: CapabilityRegistry,
}

impl ImportPipeline {
    /// Creates a pipeline over `registry`.
    #[must_use]
    pub const fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Imports `params.resource` into the table of `params.target`.
    ///
    /// # Errors
    ///
    /// See [`ImportPipeline::run_with_progress`].
    pub fn run(&self, params: &ImportParameters, ctx: &ImportContext<'_>) -> Result<ImportReport> {
        self.run_with_progress(params, ctx, None)
    }

    /// Imports `params.resource`, reporting each line and record to
    /// `progress`.
    ///
    /// The resource is opened through the ref the willing provider issued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no provider is willing, an error if
    /// the resource cannot be read or tokenized, and any error the provider
    /// returns.
    pub fn run_with_progress(
        &self,
        params: &ImportParameters,
        ctx: &ImportContext<'_>,
        progress: Option<ProgressReporter<'_>>,
    ) -> Result<ImportReport> {
        let resolved = self
            .registry
            .resolve(&params.resource, &params.format, params.target)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "no provider can import '{}' as {}",
                    params.resource, params.target
                ))
            })?;

        tracing::info!(
            provider = resolved.provider.name(),
            resource = %params.resource,
            provider_ref = %resolved.provider_ref,
            estimated = resolved.estimated_count,
            "Importing resource"
        );

        let reader = resolved.provider.open(&resolved.provider_ref)?;
        let lines = Tokenizer::new(&params.format)?.tokenize(reader)?;

        resolved
            .provider
            .import(&resolved.provider_ref, params, lines, ctx, progress)
    }
}
