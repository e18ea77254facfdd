use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    pub layer: u32,
    #[serde(default)]
    pub depth: i32,
}

impl LayerConfig {
    fn new(name: &str, layer: u32, depth: i32) -> Self {
        Self { name: name.to_string(), layer, depth }
    }
}

/// Flexible-height scaling handed to the renderer along with each layer root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScalingConfig {
    #[serde(default = "ScalingConfig::default_manual_height")]
    pub manual_height: u32,
    #[serde(default = "ScalingConfig::default_minimum_height")]
    pub minimum_height: u32,
    #[serde(default = "ScalingConfig::default_maximum_height")]
    pub maximum_height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadingConfig {
    /// Ticks a scene load may stay pending before it is abandoned. `None` waits forever.
    #[serde(default)]
    pub scene_timeout_ticks: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopupConfig {
    #[serde(default)]
    pub default_priority: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "UiConfig::default_layers")]
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub loading: LoadingConfig,
    #[serde(default)]
    pub popups: PopupConfig,
}

#[derive(Debug, Clone, Default)]
pub struct UiConfigOverrides {
    pub scene_timeout_ticks: Option<u32>,
    pub default_priority: Option<i32>,
}

impl ScalingConfig {
    const fn default_manual_height() -> u32 {
        720
    }

    const fn default_minimum_height() -> u32 {
        320
    }

    const fn default_maximum_height() -> u32 {
        1080
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            manual_height: Self::default_manual_height(),
            minimum_height: Self::default_minimum_height(),
            maximum_height: Self::default_maximum_height(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            layers: Self::default_layers(),
            scaling: ScalingConfig::default(),
            loading: LoadingConfig::default(),
            popups: PopupConfig::default(),
        }
    }
}

impl UiConfig {
    fn default_layers() -> Vec<LayerConfig> {
        vec![LayerConfig::new("GUI", 5, 30), LayerConfig::new("GUIOverlay", 6, 60)]
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read UI config file {}", path.display()))?;
        let cfg: UiConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse UI config file {}", path.display()))?;
        cfg.validate().with_context(|| format!("Invalid UI config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("UI config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        let mut ids = BTreeSet::new();
        for layer in &self.layers {
            if !names.insert(layer.name.as_str()) {
                bail!("Layer name '{}' is declared twice", layer.name);
            }
            if !ids.insert(layer.layer) {
                bail!("Layer id {} is declared twice", layer.layer);
            }
        }
        let scaling = &self.scaling;
        if scaling.minimum_height > scaling.maximum_height {
            bail!(
                "Scaling minimum_height {} exceeds maximum_height {}",
                scaling.minimum_height,
                scaling.maximum_height
            );
        }
        if scaling.manual_height < scaling.minimum_height || scaling.manual_height > scaling.maximum_height {
            bail!(
                "Scaling manual_height {} must lie within [{}, {}]",
                scaling.manual_height,
                scaling.minimum_height,
                scaling.maximum_height
            );
        }
        Ok(())
    }

    pub fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn apply_overrides(&mut self, overrides: &UiConfigOverrides) {
        if let Some(ticks) = overrides.scene_timeout_ticks {
            self.loading.scene_timeout_ticks = Some(ticks);
        }
        if let Some(priority) = overrides.default_priority {
            self.popups.default_priority = priority;
        }
    }
}

impl UiConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.scene_timeout_ticks.is_none() && self.default_priority.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.scene_timeout_ticks.is_some() {
            fields.push("scene_timeout_ticks");
        }
        if self.default_priority.is_some() {
            fields.push("default_priority");
        }
        fields
    }
}
