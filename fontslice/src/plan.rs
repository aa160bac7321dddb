use crate::ranges::DEFAULT_CEILING;
use anyhow::{ensure, Context, Result};
use enumset::{EnumSet, EnumSetType};
use std::{fs, ops::Deref, sync::Arc};

/// The number of subsetting jobs run at once by default.
pub const DEFAULT_WORKERS: usize = 8;

const FONT_DISPLAY_VALUES: &[&str] = &["auto", "block", "swap", "fallback", "optional"];

/// A loaded configuration for font slicing.
#[derive(Clone, Debug)]
pub struct LoadedSlicePlan(pub(crate) Arc<SlicePlanData>);
impl Deref for LoadedSlicePlan {
    type Target = SlicePlanData;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct SlicePlanData {
    pub priority: Vec<char>,
    pub ceiling: u32,
    pub workers: usize,
    pub font_family: Option<String>,
    pub font_display: String,
    pub flags: EnumSet<SliceFlags>,
}

#[derive(EnumSetType, Debug)]
pub enum SliceFlags {
    NoSubsetting,
    SfntOutput,
}

/// Loads a character spec: either literal characters, or `@path` for the contents of a file.
pub fn load_chars(spec: &str) -> Result<Vec<char>> {
    if let Some(path) = spec.strip_prefix('@') {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Could not read character list from {path:?}"))?;
        Ok(data.chars().filter(|x| !x.is_whitespace()).collect())
    } else {
        Ok(spec.chars().collect())
    }
}

/// Represents a configuration for font slicing.
#[derive(Clone, Debug)]
pub struct SlicePlan {
    priority: Vec<char>,
    ceiling: u32,
    workers: usize,
    font_family: Option<String>,
    font_display: String,
    pub(crate) flags: EnumSet<SliceFlags>,
}
impl SlicePlan {
    pub fn new() -> SlicePlan {
        SlicePlan {
            priority: Vec::new(),
            ceiling: DEFAULT_CEILING,
            workers: DEFAULT_WORKERS,
            font_family: None,
            font_display: "block".to_string(),
            flags: Default::default(),
        }
    }

    /// Characters that are split out of the main character set, and placed into the first
    /// slices of the font. This is meant for the most common characters of a language, so they
    /// are downloaded first and in small files.
    pub fn priority_chars(&mut self, chars: impl Iterator<Item = char>) -> &mut Self {
        self.priority.extend(chars);
        self
    }

    /// Adds priority characters from a character spec. See [`load_chars`].
    pub fn priority_spec(&mut self, spec: &str) -> Result<&mut Self> {
        let chars = load_chars(spec)?;
        Ok(self.priority_chars(chars.into_iter()))
    }

    /// Sets the maximum number of codepoints in a slice.
    pub fn ceiling(&mut self, ceiling: u32) -> &mut Self {
        self.ceiling = ceiling;
        self
    }

    /// Sets the number of subsetting jobs that may run at once.
    pub fn workers(&mut self, workers: usize) -> &mut Self {
        self.workers = workers;
        self
    }

    /// Overrides the `font-family` used in the generated stylesheet.
    pub fn font_family(&mut self, name: impl Into<String>) -> &mut Self {
        self.font_family = Some(name.into());
        self
    }

    /// Sets the `font-display` used in the generated stylesheet.
    pub fn font_display(&mut self, value: impl Into<String>) -> &mut Self {
        self.font_display = value.into();
        self
    }

    /// Only plans the slices, without subsetting the font.
    pub fn no_subsetting(&mut self) -> &mut Self {
        self.flags.insert(SliceFlags::NoSubsetting);
        self
    }

    /// Writes slices in the flavour of the source font instead of compressing them to WOFF2.
    pub fn sfnt_output(&mut self) -> &mut Self {
        self.flags.insert(SliceFlags::SfntOutput);
        self
    }

    pub fn build(&self) -> Result<LoadedSlicePlan> {
        ensure!(self.ceiling > 0, "The slice ceiling must be at least 1.");
        ensure!(self.workers > 0, "At least one worker is required.");
        ensure!(
            FONT_DISPLAY_VALUES.contains(&self.font_display.as_str()),
            "Unknown font-display value: {:?}",
            self.font_display,
        );

        Ok(LoadedSlicePlan(Arc::new(SlicePlanData {
            priority: self.priority.clone(),
            ceiling: self.ceiling,
            workers: self.workers,
            font_family: self.font_family.clone(),
            font_display: self.font_display.clone(),
            flags: self.flags,
        })))
    }
}
impl Default for SlicePlan {
    fn default() -> Self {
        Self::new()
    }
}
