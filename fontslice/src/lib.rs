//! Slices large fonts into many small subsets, each covering one CSS `unicode-range`.

mod config;
mod manifest;
mod plan;
mod ranges;
mod render;
mod splitter;

use anyhow::Result;
use fontslice_fontops::FontFaceWrapper;
use roaring::RoaringBitmap;
use tracing::{info_span, Instrument};

pub use config::SliceConfig;
pub use fontslice_fontops::{FeatureTag, FontFormat};
pub use manifest::{RangeManifest, MANIFEST_FILE_NAME};
pub use plan::{load_chars, LoadedSlicePlan, SliceFlags, SlicePlan, DEFAULT_WORKERS};
pub use ranges::{
    group_codepoints, pack_runs, parse_unicode_range, plan_ranges, CodepointRun, RangeGroup,
    DEFAULT_CEILING,
};
pub use render::{check_store_subdirs, SliceInfo, WebfontInfo};
pub use splitter::{split_webfont, FontSource, SliceReport};

/// A loaded font.
///
/// This may be used to filter font collections or simply slice multiple fonts in one operation.
#[derive(Clone, Debug)]
pub struct LoadedFont {
    underlying: FontFaceWrapper,
}
impl LoadedFont {
    /// Loads all fonts present in a given binary font data.
    pub fn load(font_data: &[u8]) -> Result<Vec<Self>> {
        Self::load_with_hint(None, font_data)
    }

    /// Loads all fonts present in a given binary font data, remembering the file it came from.
    pub fn load_with_hint(filename_hint: Option<&str>, font_data: &[u8]) -> Result<Vec<Self>> {
        Ok(FontFaceWrapper::load(filename_hint.map(str::to_string), font_data)?
            .into_iter()
            .map(|x| LoadedFont { underlying: x })
            .collect())
    }

    /// Returns the list of codepoints in the loaded font.
    pub fn codepoints(&self) -> RoaringBitmap {
        self.underlying.all_codepoints().clone()
    }

    /// Returns the OpenType layout features of the font.
    pub fn layout_features(&self) -> &[FeatureTag] {
        self.underlying.layout_features()
    }

    /// Returns the name of the font family
    pub fn font_family(&self) -> &str {
        self.underlying.font_family()
    }

    /// Returns the font version
    pub fn font_version(&self) -> &str {
        self.underlying.font_version()
    }
}

/// Slices each of the given fonts according to the plan.
pub async fn process_webfont(plan: &SlicePlan, fonts: &[LoadedFont]) -> Result<Vec<WebfontInfo>> {
    let plan = plan.build()?;

    let mut awaits = Vec::new();
    for font in fonts {
        let plan = plan.clone();
        let font = font.underlying.clone();

        let span = info_span!("split", font = %font);
        let _enter = span.enter();

        awaits.push(tokio::task::spawn(
            async move { split_webfont(&plan, &font).await }.in_current_span(),
        ));
    }

    let mut out = Vec::new();
    for font in awaits {
        out.push(font.await??)
    }
    Ok(out)
}
