//! Processor Registry
//!
//! Maps backend slugs to loaded processors. Registration happens at
//! startup (explicitly or through plugin discovery), lookups happen per
//! request, so a coarse read-mostly lock over slug-ordered state is
//! enough.

use std::sync::{Arc, RwLock};

use crate::config::PaygateConfig;
use crate::error::{PaymentError, Result};
use crate::processor::{Processor, ProcessorDescriptor, ProcessorPlugin};

struct Registration {
    /// Captured at registration; currency lists are static per backend
    descriptor: ProcessorDescriptor,
    processor: Arc<dyn Processor>,
}

/// Outcome of a discovery pass
#[derive(Debug, Default)]
pub struct DiscoverySummary {
    /// Backends registered by this pass
    pub registered: usize,

    /// Plugins that failed to load, with the load error
    pub failed: Vec<(String, PaymentError)>,
}

/// Registry of payment backends, keyed by slug
pub struct ProcessorRegistry {
    // Vec keeps registration order; backend counts stay single-digit
    entries: RwLock<Vec<Registration>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a processor under its descriptor's slug
    ///
    /// Re-registering a slug replaces the processor (last write wins)
    /// but keeps the slug's original position in enumeration order.
    pub fn register(&self, processor: Arc<dyn Processor>) {
        let descriptor = processor.descriptor();
        let mut entries = self.entries.write().unwrap();

        let registration = Registration {
            descriptor,
            processor,
        };
        match entries
            .iter_mut()
            .find(|r| r.descriptor.slug == registration.descriptor.slug)
        {
            Some(existing) => *existing = registration,
            None => entries.push(registration),
        }
    }

    /// Remove a backend; unknown slugs fail, repeated removal included
    pub fn unregister(&self, slug: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let position = entries
            .iter()
            .position(|r| r.descriptor.slug == slug)
            .ok_or_else(|| PaymentError::ProcessorNotFound(slug.to_string()))?;
        entries.remove(position);
        Ok(())
    }

    /// Look up a backend by slug
    pub fn get_by_slug(&self, slug: &str) -> Result<Arc<dyn Processor>> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .find(|r| r.descriptor.slug == slug)
            .map(|r| r.processor.clone())
            .ok_or_else(|| PaymentError::ProcessorNotFound(slug.to_string()))
    }

    /// All backends accepting a currency, in registration order
    pub fn get_for_currency(&self, currency: &str) -> Vec<Arc<dyn Processor>> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .filter(|r| r.descriptor.accepts(currency))
            .map(|r| r.processor.clone())
            .collect()
    }

    /// (slug, display_name) pairs for a currency, in registration order
    pub fn get_choices(&self, currency: &str) -> Vec<(String, String)> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .filter(|r| r.descriptor.accepts(currency))
            .map(|r| {
                (
                    r.descriptor.slug.clone(),
                    r.descriptor.display_name.clone(),
                )
            })
            .collect()
    }

    /// Registered slugs, in registration order
    pub fn slugs(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap();
        entries.iter().map(|r| r.descriptor.slug.clone()).collect()
    }

    /// Number of registered backends
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Load and register every plugin, best effort
    ///
    /// Each plugin gets its settings block from the configuration. A
    /// plugin that fails to load is reported in the summary and skipped;
    /// the rest of the pass and all prior registrations are unaffected.
    pub fn discover(
        &self,
        plugins: &[Arc<dyn ProcessorPlugin>],
        config: &PaygateConfig,
    ) -> DiscoverySummary {
        let mut summary = DiscoverySummary::default();

        for plugin in plugins {
            let slug = plugin.slug().to_string();
            let settings = config
                .backend_settings(&slug)
                .cloned()
                .unwrap_or(serde_json::Value::Null);

            match plugin.load(&settings) {
                Ok(processor) => {
                    self.register(processor);
                    summary.registered += 1;
                    tracing::info!(slug = %slug, "Registered payment backend");
                }
                Err(e) => {
                    tracing::warn!(slug = %slug, error = %e, "Backend failed to load");
                    summary.failed.push((slug, e));
                }
            }
        }

        summary
    }
}
