//! Plugin host seam.
//!
//! Plugin instances reference engine-loaded capabilities by name. The
//! compiler never executes plugin code; it asks the [`PluginHost`] for the
//! capability class of each referenced plugin, per-instance state sizes, and
//! the output width of sensor plugins, then packs the answers.

use sim_model::PluginCapability;

use crate::error::{CompileError, Result};

/// Answers capability and sizing queries about registered plugins.
pub trait PluginHost {
    /// Capability of a registered plugin, `None` when unknown.
    fn capability(&self, plugin_name: &str) -> Option<PluginCapability>;

    /// State slots one instance needs, given its attributes.
    fn state_size(&self, plugin_name: &str, attributes: &[(String, String)]) -> Result<usize>;

    /// Sensor output width of a sensor-capability plugin instance.
    fn sensor_dim(&self, plugin_name: &str, attributes: &[(String, String)]) -> Result<usize>;
}

/// A host that knows no plugins. Any plugin reference fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl PluginHost for NullHost {
    fn capability(&self, _plugin_name: &str) -> Option<PluginCapability> {
        None
    }

    fn state_size(&self, plugin_name: &str, _attributes: &[(String, String)]) -> Result<usize> {
        Err(CompileError::plugin(format!(
            "unknown plugin '{plugin_name}'"
        )))
    }

    fn sensor_dim(&self, plugin_name: &str, _attributes: &[(String, String)]) -> Result<usize> {
        Err(CompileError::plugin(format!(
            "unknown plugin '{plugin_name}'"
        )))
    }
}

/// A fixed table of capabilities, for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct StaticHost {
    entries: Vec<(String, PluginCapability, usize, usize)>,
}

impl StaticHost {
    /// Create an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin with fixed state size and sensor dimension.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        capability: PluginCapability,
        state_size: usize,
        sensor_dim: usize,
    ) {
        self.entries
            .push((name.into(), capability, state_size, sensor_dim));
    }

    fn entry(&self, name: &str) -> Option<&(String, PluginCapability, usize, usize)> {
        self.entries.iter().find(|(n, ..)| n == name)
    }
}

impl PluginHost for StaticHost {
    fn capability(&self, plugin_name: &str) -> Option<PluginCapability> {
        self.entry(plugin_name).map(|&(_, c, ..)| c)
    }

    fn state_size(&self, plugin_name: &str, _attributes: &[(String, String)]) -> Result<usize> {
        self.entry(plugin_name)
            .map(|&(_, _, s, _)| s)
            .ok_or_else(|| CompileError::plugin(format!("unknown plugin '{plugin_name}'")))
    }

    fn sensor_dim(&self, plugin_name: &str, _attributes: &[(String, String)]) -> Result<usize> {
        self.entry(plugin_name)
            .map(|&(_, _, _, d)| d)
            .ok_or_else(|| CompileError::plugin(format!("unknown plugin '{plugin_name}'")))
    }
}
