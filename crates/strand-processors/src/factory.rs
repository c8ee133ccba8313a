//! Processor registry.
//!
//! An explicit object, built once at startup and passed by reference to
//! whatever creates processors.  There is no global registry: adding a
//! transformer means calling [`ProcessorFactory::register`] with a
//! constructor, nothing in the scheduler changes.

use std::collections::HashMap;

use tracing::debug;

use strand_core::config::ProcessorConfig;
use strand_core::error::{EngineError, Result};

use crate::blend::BlendInterpolator;
use crate::processor::Processor;
use crate::scale::ScaleFilter;

/// Builds a processor from its configuration and a device index.
///
/// The index lets a constructor pick a device up front (for example to
/// load a model onto it).  Device validation happens in
/// [`ProcessorCore::init`](crate::processor::ProcessorCore::init), which
/// receives the same index through [`ProcessorInit::device`](crate::processor::ProcessorInit::device).
pub type Constructor = Box<dyn Fn(&ProcessorConfig, u32) -> Result<Processor> + Send + Sync>;

#[derive(Default)]
pub struct ProcessorFactory {
    constructors: HashMap<String, Constructor>,
}

impl ProcessorFactory {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `scale` and `blend`.
    ///
    /// Both run on the CPU and ignore the device index here; `init`
    /// rejects any hardware selector other than `none`.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register(ScaleFilter::TYPE, |config, _device| {
            Ok(Processor::Filter(Box::new(ScaleFilter::from_config(config)?)))
        });
        factory.register(BlendInterpolator::TYPE, |config, _device| {
            Ok(Processor::Interpolator(Box::new(
                BlendInterpolator::from_config(config)?,
            )))
        });
        factory
    }

    /// Register (or replace) the constructor for `tag`.
    pub fn register<F>(&mut self, tag: &str, constructor: F)
    where
        F: Fn(&ProcessorConfig, u32) -> Result<Processor> + Send + Sync + 'static,
    {
        if self
            .constructors
            .insert(tag.to_string(), Box::new(constructor))
            .is_some()
        {
            debug!(tag, "Processor constructor replaced");
        }
    }

    /// Build the processor named by `config.processor`.
    pub fn create(&self, config: &ProcessorConfig, device_index: u32) -> Result<Processor> {
        let constructor = self
            .constructors
            .get(&config.processor)
            .ok_or_else(|| EngineError::UnknownProcessor(config.processor.clone()))?;
        let processor = constructor(config, device_index)?;
        debug!(
            tag = %config.processor,
            mode = processor.mode().as_str(),
            device_index,
            "Processor created"
        );
        Ok(processor)
    }

    /// Registered tags, sorted.
    pub fn registered(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }
}

impl std::fmt::Debug for ProcessorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorFactory")
            .field("registered", &self.registered())
            .finish()
    }
}
