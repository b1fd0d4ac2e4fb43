//! Capability registry: matches a resource with the provider willing to import it.
//!
//! Providers are asked in registration order and the first willing one wins.
//! Register specialised providers before generic ones.

use crate::io::services::{ImportContext, ImportParameters, ImportReport, ProgressReporter};
use crate::io::{StreamFormat, TokenizedLine};
use crate::models::EntityType;
use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::Arc;

/// Contract version assumed for providers that do not report one.
pub const DEFAULT_CONTRACT_VERSION: u32 = 1;

/// Opaque handle a provider returns when it accepts a resource.
///
/// Only the issuing provider interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProviderRef(String);

impl ProviderRef {
    /// Wraps a provider-specific value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the wrapped value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A provider's answer to [`ImportProvider::is_willing_to`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Willingness {
    /// Whether the provider accepts the resource.
    pub willing: bool,
    /// Handle passed back to [`ImportProvider::import`].
    pub provider_ref: ProviderRef,
    /// Estimated number of records in the resource.
    pub estimated_count: usize,
}

impl Willingness {
    /// The provider accepts the resource.
    #[must_use]
    pub const fn accept(provider_ref: ProviderRef, estimated_count: usize) -> Self {
        Self {
            willing: true,
            provider_ref,
            estimated_count,
        }
    }

    /// The provider declines the resource.
    #[must_use]
    pub fn decline() -> Self {
        Self::default()
    }
}

/// A plugin able to import resources for one or more entity types.
pub trait ImportProvider: Send + Sync {
    /// Returns the provider name, for logs.
    fn name(&self) -> &str;

    /// Returns the entity types this provider imports.
    fn entity_types(&self) -> &[EntityType];

    /// Inspects `resource` and says whether this provider can import it.
    fn is_willing_to(&self, resource: &str, format: &StreamFormat) -> Willingness;

    /// Opens the resource behind a ref this provider issued.
    ///
    /// The default reads the ref as a local file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be opened.
    fn open(&self, provider_ref: &ProviderRef) -> Result<Box<dyn Read>> {
        let file = File::open(provider_ref.as_str()).map_err(|e| {
            Error::operation("open_import_file", format!("{provider_ref}: {e}"))
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    /// Imports already tokenized lines, reporting progress to `progress`.
    ///
    /// The report's [`ImportReport::error_count`] is the provider's error count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the parameters are unusable.
    fn import(
        &self,
        provider_ref: &ProviderRef,
        params: &ImportParameters,
        lines: Vec<TokenizedLine>,
        ctx: &ImportContext<'_>,
        progress: Option<ProgressReporter<'_>>,
    ) -> Result<ImportReport>;

    /// Returns the supported contract version.
    fn contract_version(&self) -> u32 {
        DEFAULT_CONTRACT_VERSION
    }
}

/// The provider selected for a resource.
#[derive(Clone)]
pub struct ResolvedProvider {
    /// The willing provider.
    pub provider: Arc<dyn ImportProvider>,
    /// Handle returned by the provider.
    pub provider_ref: ProviderRef,
    /// Estimated number of records.
    pub estimated_count: usize,
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider.name())
            .field("provider_ref", &self.provider_ref)
            .field("estimated_count", &self.estimated_count)
            .finish()
    }
}

/// Ordered list of import providers.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    providers: Vec<Arc<dyn ImportProvider>>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in providers.
    ///
    /// The bank statement provider comes before the generic delimited-file
    /// providers.
    #[must_use]
    pub fn with_builtin_providers() -> Self {
        use crate::io::providers::{BankStatementProvider, DelimitedFileProvider};
        use crate::models::{Account, BankTransaction, Class};

        let mut registry = Self::new();
        registry.register(Arc::new(BankStatementProvider));
        registry.register(Arc::new(DelimitedFileProvider::<Account>::new()));
        registry.register(Arc::new(DelimitedFileProvider::<Class>::new()));
        registry.register(Arc::new(DelimitedFileProvider::<BankTransaction>::new()));
        registry
    }

    /// Appends a provider.
    pub fn register(&mut self, provider: Arc<dyn ImportProvider>) {
        tracing::debug!(
            provider = provider.name(),
            version = provider.contract_version(),
            "Import provider registered"
        );
        self.providers.push(provider);
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns whether no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the providers declaring `target`, in registration order.
    pub fn providers_for(&self, target: EntityType) -> impl Iterator<Item = &Arc<dyn ImportProvider>> {
        self.providers
            .iter()
            .filter(move |p| p.entity_types().contains(&target))
    }

    /// Finds the first provider declaring `target` that accepts `resource`.
    #[must_use]
    pub fn resolve(
        &self,
        resource: &str,
        format: &StreamFormat,
        target: EntityType,
    ) -> Option<ResolvedProvider> {
        let resolved = self.providers_for(target).find_map(|provider| {
            let answer = provider.is_willing_to(resource, format);
            tracing::trace!(
                provider = provider.name(),
                resource,
                willing = answer.willing,
                "Provider consulted"
            );
            answer.willing.then(|| ResolvedProvider {
                provider: Arc::clone(provider),
                provider_ref: answer.provider_ref,
                estimated_count: answer.estimated_count,
            })
        });

        match &resolved {
            Some(r) => tracing::debug!(
                provider = r.provider.name(),
                resource,
                entity = %target,
                estimated = r.estimated_count,
                "Provider resolved"
            ),
            None => tracing::debug!(resource, entity = %target, "No willing provider"),
        }
        resolved
    }
}
