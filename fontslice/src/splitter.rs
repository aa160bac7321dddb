use crate::{
    plan::{LoadedSlicePlan, SliceFlags},
    ranges::{plan_ranges, RangeGroup},
    render::{face_subdir, SliceInfo, WebfontInfo},
};
use anyhow::{bail, Context, Result};
use fontslice_common::join_set::JoinSet;
use fontslice_fontops::{FeatureTag, FontFaceWrapper, FontFormat};
use roaring::RoaringBitmap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A font that can be sliced into subsets.
///
/// Jobs for different slices run in parallel, so implementations must not rely on shared mutable
/// state.
pub trait FontSource: Clone + Send + Sync + 'static {
    fn font_family(&self) -> &str;
    fn font_style(&self) -> &str;
    fn font_version(&self) -> &str;
    fn filename_hint(&self) -> Option<&str>;
    fn format(&self) -> FontFormat;
    fn codepoints(&self) -> &RoaringBitmap;
    fn layout_features(&self) -> &[FeatureTag];

    /// Produces a font file in the given format containing exactly the codepoints of the given
    /// slice.
    fn subset(
        &self,
        group: &RangeGroup,
        features: &[FeatureTag],
        format: FontFormat,
    ) -> Result<Vec<u8>>;
}
impl FontSource for FontFaceWrapper {
    fn font_family(&self) -> &str {
        FontFaceWrapper::font_family(self)
    }
    fn font_style(&self) -> &str {
        FontFaceWrapper::font_style(self)
    }
    fn font_version(&self) -> &str {
        FontFaceWrapper::font_version(self)
    }
    fn filename_hint(&self) -> Option<&str> {
        FontFaceWrapper::filename_hint(self)
    }
    fn format(&self) -> FontFormat {
        FontFaceWrapper::format(self)
    }
    fn codepoints(&self) -> &RoaringBitmap {
        self.all_codepoints()
    }
    fn layout_features(&self) -> &[FeatureTag] {
        FontFaceWrapper::layout_features(self)
    }
    fn subset(
        &self,
        group: &RangeGroup,
        features: &[FeatureTag],
        format: FontFormat,
    ) -> Result<Vec<u8>> {
        FontFaceWrapper::subset(self, &group.ranges(), features, format)
    }
}

/// The outcome of the subsetting jobs for one font.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SliceReport {
    pub succeeded: Vec<usize>,
    pub failed: Vec<usize>,
}
impl SliceReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn ok_or_bail(&self, font: &str) -> Result<()> {
        if !self.failed.is_empty() {
            bail!(
                "Slicing {font} failed: {} succeeded, {} failed (slices {:?})",
                self.succeeded.len(),
                self.failed.len(),
                self.failed,
            );
        }
        Ok(())
    }
}

/// Plans the slices of a font, and runs one subsetting job per slice.
///
/// A failing job is logged and recorded in the [`SliceReport`]; it does not stop other jobs.
pub async fn split_webfont<F: FontSource>(
    plan: &LoadedSlicePlan,
    font: &F,
) -> Result<WebfontInfo> {
    let groups = plan_ranges(font.codepoints(), plan.priority.iter().copied(), plan.ceiling)?;
    info!("Planned {} slices for {} codepoints.", groups.len(), font.codepoints().len());

    let format = if plan.flags.contains(SliceFlags::SfntOutput) {
        font.format()
    } else {
        FontFormat::Woff2
    };

    let mut report = SliceReport::default();
    let data = if plan.flags.contains(SliceFlags::NoSubsetting) {
        debug!("Subsetting is disabled, only the slice plan will be written.");
        vec![None; groups.len()]
    } else {
        let features: Arc<[FeatureTag]> = font.layout_features().into();
        let mut jobs = JoinSet::bounded(plan.workers)?;
        for (index, group) in groups.iter().enumerate() {
            let font = font.clone();
            let group = group.clone();
            let features = features.clone();
            jobs.spawn_blocking(move || {
                debug!("Subsetting slice #{index} with {} codepoints.", group.span());
                font.subset(&group, &features, format)
                    .with_context(|| format!("Could not subset slice #{index} ({group})"))
            });
        }

        let mut data = Vec::new();
        for (index, result) in jobs.join_each().await.into_iter().enumerate() {
            match result {
                Ok(subset) => {
                    report.succeeded.push(index);
                    data.push(Some(subset));
                }
                Err(e) => {
                    error!("{e:?}");
                    report.failed.push(index);
                    data.push(None);
                }
            }
        }
        data
    };

    let extension = format.extension();
    let entries = groups
        .into_iter()
        .zip(data)
        .enumerate()
        .map(|(index, (group, data))| Arc::new(SliceInfo::new(index, extension, group, data)))
        .collect();
    let font_family = match &plan.font_family {
        Some(family) => family.clone(),
        None => font.font_family().to_string(),
    };

    Ok(WebfontInfo::new(
        font_family,
        font.font_version(),
        face_subdir(
            font.font_family(),
            font.filename_hint(),
            font.font_version(),
            font.font_style(),
        ),
        format,
        &plan.font_display,
        entries,
        report,
    ))
}
