// src/harness/registry.rs - Named pipeline factories
//
// Projects point at their pipeline with a `<module>:<binding>` reference.
// Callers register a factory under that reference; resolution is a map
// lookup, nothing is loaded at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use super::pipeline::{ChatPipeline, Pipeline, SAMPLE_SYSTEM_PROMPT};
use crate::infra::config::{ModuleRef, ProjectConfig};
use crate::infra::errors::LinguaMetricaError;
use crate::provider::resolver::{create_provider, ProviderSettings};

pub type PipelineFactory =
    Arc<dyn Fn(&ProjectConfig) -> anyhow::Result<Arc<dyn Pipeline>> + Send + Sync>;

/// Reference of the built-in sample assistant.
pub const SAMPLE_PIPELINE: &str = "sample.llm:pipeline";

#[derive(Default)]
pub struct PipelineRegistry {
    modules: HashMap<String, HashMap<String, PipelineFactory>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the sample chat assistant registered under
    /// `sample.llm:pipeline`, backed by the project's configured provider.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ModuleRef::new("sample.llm", "pipeline"), |config| {
            let resolved = create_provider(config.provider, &ProviderSettings::from_env())?;
            let pipeline: Arc<dyn Pipeline> = Arc::new(ChatPipeline::new(
                resolved.provider,
                resolved.model,
                SAMPLE_SYSTEM_PROMPT,
            ));
            Ok(pipeline)
        });
        registry
    }

    /// Register a factory. Re-registering a reference replaces the old one.
    pub fn register<F>(&mut self, reference: ModuleRef, factory: F)
    where
        F: Fn(&ProjectConfig) -> anyhow::Result<Arc<dyn Pipeline>> + Send + Sync + 'static,
    {
        tracing::debug!("Registering pipeline {}", reference);
        self.modules
            .entry(reference.module)
            .or_default()
            .insert(reference.binding, Arc::new(factory));
    }

    /// Register an already constructed pipeline.
    pub fn register_pipeline(&mut self, reference: ModuleRef, pipeline: Arc<dyn Pipeline>) {
        self.register(reference, move |_| Ok(pipeline.clone()));
    }

    pub fn contains(&self, reference: &ModuleRef) -> bool {
        self.modules
            .get(&reference.module)
            .is_some_and(|bindings| bindings.contains_key(&reference.binding))
    }

    /// All registered references, sorted.
    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .modules
            .iter()
            .flat_map(|(module, bindings)| {
                bindings
                    .keys()
                    .map(move |binding| format!("{module}:{binding}"))
            })
            .collect();
        refs.sort();
        refs
    }

    /// Look up and build the pipeline behind `reference`.
    pub fn resolve(
        &self,
        reference: &ModuleRef,
        config: &ProjectConfig,
    ) -> Result<Arc<dyn Pipeline>, LinguaMetricaError> {
        let resolution_error = |message: String| LinguaMetricaError::HarnessResolution {
            reference: reference.to_string(),
            message,
        };

        let bindings = self.modules.get(&reference.module).ok_or_else(|| {
            resolution_error(format!("module '{}' not found", reference.module))
        })?;

        let factory = bindings.get(&reference.binding).ok_or_else(|| {
            resolution_error(format!(
                "module '{}' has no binding '{}'",
                reference.module, reference.binding
            ))
        })?;

        factory(config).map_err(|e| resolution_error(e.to_string()))
    }
}
