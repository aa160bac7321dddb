use crate::plan::SlicePlan;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

/// Settings loaded from a TOML configuration file.
///
/// ```toml
/// ceiling = 128
/// workers = 8
/// priority = "@common-chars.txt"
/// font_family = "Example Sans"
/// font_display = "swap"
/// store_uri = "/fonts/"
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SliceConfig {
    pub ceiling: Option<u32>,
    pub workers: Option<usize>,
    pub priority: Option<String>,
    pub font_family: Option<String>,
    pub font_display: Option<String>,
    pub store_uri: Option<String>,
}
impl SliceConfig {
    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Could not read config from {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Returns these settings, with every setting present in `overrides` replacing its value.
    pub fn override_with(self, overrides: SliceConfig) -> SliceConfig {
        SliceConfig {
            ceiling: overrides.ceiling.or(self.ceiling),
            workers: overrides.workers.or(self.workers),
            priority: overrides.priority.or(self.priority),
            font_family: overrides.font_family.or(self.font_family),
            font_display: overrides.font_display.or(self.font_display),
            store_uri: overrides.store_uri.or(self.store_uri),
        }
    }

    /// Copies every setting present in the file onto the plan.
    pub fn apply(&self, plan: &mut SlicePlan) -> Result<()> {
        if let Some(ceiling) = self.ceiling {
            plan.ceiling(ceiling);
        }
        if let Some(workers) = self.workers {
            plan.workers(workers);
        }
        if let Some(priority) = &self.priority {
            plan.priority_spec(priority)?;
        }
        if let Some(font_family) = &self.font_family {
            plan.font_family(font_family.as_str());
        }
        if let Some(font_display) = &self.font_display {
            plan.font_display(font_display.as_str());
        }
        Ok(())
    }
}
