use crate::config::UiConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOptions {
    config: Option<PathBuf>,
    catalog: Option<PathBuf>,
    ticks: Option<u32>,
    fixed_dt: Option<f32>,
    scene_timeout: Option<u32>,
    default_priority: Option<i32>,
}

impl CliOptions {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = CliOptions::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => options.config = Some(PathBuf::from(value)),
                "catalog" => options.catalog = Some(PathBuf::from(value)),
                "ticks" => {
                    options.ticks = Some(value.parse::<u32>().with_context(|| format!("Invalid ticks '{value}'"))?);
                }
                "dt" => {
                    let dt = value.parse::<f32>().with_context(|| format!("Invalid dt '{value}'"))?;
                    if !(dt.is_finite() && dt > 0.0) {
                        bail!("dt must be a positive finite number, got {value}");
                    }
                    options.fixed_dt = Some(dt);
                }
                "scene-timeout" => {
                    options.scene_timeout = Some(
                        value.parse::<u32>().with_context(|| format!("Invalid scene-timeout '{value}'"))?,
                    );
                }
                "default-priority" => {
                    options.default_priority = Some(
                        value.parse::<i32>().with_context(|| format!("Invalid default-priority '{value}'"))?,
                    );
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --catalog, --ticks, --dt, \
                     --scene-timeout, --default-priority."
                ),
            }
        }
        Ok(options)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn catalog_path(&self) -> Option<&PathBuf> {
        self.catalog.as_ref()
    }

    pub fn ticks(&self) -> Option<u32> {
        self.ticks
    }

    pub fn fixed_dt(&self) -> Option<f32> {
        self.fixed_dt
    }

    pub fn config_overrides(&self) -> UiConfigOverrides {
        UiConfigOverrides { scene_timeout_ticks: self.scene_timeout, default_priority: self.default_priority }
    }

    #[cfg(test)]
    pub fn as_tuple(&self) -> (Option<u32>, Option<u32>, Option<i32>) {
        (self.ticks, self.scene_timeout, self.default_priority)
    }
}
