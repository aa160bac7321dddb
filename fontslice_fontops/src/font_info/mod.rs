use anyhow::*;
use hb_subset::{sys::hb_ot_var_get_axis_count, Blob, FontFace, SubsetInput};
use roaring::RoaringBitmap;
use std::{
    fmt::{Debug, Display, Formatter},
    ops::RangeInclusive,
    sync::Arc,
};
use tracing::debug;

mod features;
mod woff2;

pub use features::FeatureTag;

/// The container format of a font file.
///
/// Loaded fonts are always `TrueType` or `OpenType`; `Woff2` only appears as an output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FontFormat {
    TrueType,
    OpenType,
    Woff2,
}
impl FontFormat {
    fn sniff(data: &[u8], idx: u32) -> Result<FontFormat> {
        fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
            let bytes = data.get(offset..offset + 4)?;
            Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }

        let mut offset = 0;
        if data.starts_with(b"ttcf") {
            let face_offset = read_u32(data, 12 + 4 * idx as usize)
                .ok_or_else(|| anyhow!("Font collection has no face #{idx}."))?;
            offset = face_offset as usize;
        }
        match data.get(offset..offset + 4) {
            Some(b"OTTO") => Ok(FontFormat::OpenType),
            Some([0, 1, 0, 0]) | Some(b"true") => Ok(FontFormat::TrueType),
            _ => bail!("Unrecognized font format."),
        }
    }

    /// The file extension used for subsets in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FontFormat::TrueType => "ttf",
            FontFormat::OpenType => "otf",
            FontFormat::Woff2 => "woff2",
        }
    }

    /// The CSS `format()` hint for this format.
    pub fn css_format(&self) -> &'static str {
        match self {
            FontFormat::TrueType => "truetype",
            FontFormat::OpenType => "opentype",
            FontFormat::Woff2 => "woff2",
        }
    }
}

/// A single face loaded from a font file.
#[derive(Clone)]
pub struct FontFaceWrapper(Arc<FontFaceData>);
struct FontFaceData {
    font_family: String,
    font_style: String,
    font_version: String,
    format: FontFormat,
    available_codepoints: RoaringBitmap,
    features: Vec<FeatureTag>,
    font_data: Arc<[u8]>,
    font_index: u32,
    filename_hint: Option<String>,
}
impl FontFaceWrapper {
    /// Loads every face present in the given font file.
    pub fn load(
        filename_hint: Option<String>,
        buffer: impl Into<Arc<[u8]>>,
    ) -> Result<Vec<FontFaceWrapper>> {
        let buffer: Arc<[u8]> = buffer.into();

        let is_woff = buffer.len() >= 4 && &buffer[0..4] == b"wOFF";
        let is_woff2 = buffer.len() >= 4 && &buffer[0..4] == b"wOF2";
        let is_collection = buffer.len() >= 4 && &buffer[0..4] == b"ttcf";

        if is_woff || is_woff2 {
            bail!("woff/woff2 input is not supported. Please convert to .ttf or .otf first.");
        }

        let mut fonts = Vec::new();
        if let Some(font) = Self::load_for_font(filename_hint.clone(), buffer.clone(), 0)? {
            fonts.push(font);
        } else {
            bail!("No glyphs in first font?");
        }

        if is_collection {
            let mut i = 1;
            while let Some(x) = Self::load_for_font(filename_hint.clone(), buffer.clone(), i)? {
                fonts.push(x);
                i += 1;
            }
        }

        debug!("Found {} fonts in file.", fonts.len());

        Ok(fonts)
    }
    fn load_for_font(
        filename_hint: Option<String>,
        font_data: Arc<[u8]>,
        idx: u32,
    ) -> Result<Option<FontFaceWrapper>> {
        let blob = Blob::from_bytes(&font_data)?;
        let font_face = FontFace::new_with_index(blob, idx)?;
        if font_face.glyph_count() == 0 {
            return Ok(None);
        }
        let format = FontFormat::sniff(&font_data, idx)?;

        let is_variable = unsafe { hb_ot_var_get_axis_count(font_face.as_raw()) != 0 };
        let font_family = if is_variable {
            // a lot of dynamic fonts have a weight prebaked in the font_family for some reason
            let family = font_face.font_family();
            let typographic_family = font_face.typographic_family();

            if family.starts_with(&typographic_family) && !typographic_family.is_empty() {
                typographic_family
            } else {
                family
            }
        } else {
            font_face.font_family()
        };
        let font_style = font_face.font_subfamily();
        let font_version = font_face
            .version_string()
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        let mut available_codepoints = RoaringBitmap::new();
        for char in font_face.covered_codepoints()?.iter() {
            available_codepoints.insert(char as u32);
        }
        let features = features::get_feature_tags(&font_face);

        debug!(
            "Loaded font: {font_family} / {font_style} / {font_version} / {} codepoints{}",
            available_codepoints.len(),
            if is_variable { " / Variable font" } else { "" },
        );
        debug!(
            "Layout features: {}",
            features.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(", "),
        );

        drop(font_face);

        Ok(Some(FontFaceWrapper(Arc::new(FontFaceData {
            font_family,
            font_style,
            font_version,
            format,
            available_codepoints,
            features,
            font_data,
            font_index: idx,
            filename_hint,
        }))))
    }

    pub fn all_codepoints(&self) -> &RoaringBitmap {
        &self.0.available_codepoints
    }
    pub fn layout_features(&self) -> &[FeatureTag] {
        &self.0.features
    }
    pub fn font_family(&self) -> &str {
        &self.0.font_family
    }
    pub fn font_style(&self) -> &str {
        &self.0.font_style
    }
    pub fn font_version(&self) -> &str {
        &self.0.font_version
    }
    pub fn format(&self) -> FontFormat {
        self.0.format
    }
    pub fn filename_hint(&self) -> Option<&str> {
        self.0.filename_hint.as_deref()
    }

    /// Produces a font containing only the given codepoints, keeping the given layout features.
    ///
    /// The output is either WOFF2, or an sfnt font of the same flavour as this one.
    pub fn subset(
        &self,
        ranges: &[RangeInclusive<u32>],
        features: &[FeatureTag],
        format: FontFormat,
    ) -> Result<Vec<u8>> {
        ensure!(
            format == FontFormat::Woff2 || format == self.0.format,
            "Cannot convert a {:?} font to {format:?}.",
            self.0.format,
        );

        // Load the font into harfbuzz
        let blob = Blob::from_bytes(&self.0.font_data)?;
        let font = FontFace::new_with_index(blob, self.0.font_index)?;

        // Prepare the subsetting plan
        let mut subset_input = SubsetInput::new()?;
        subset_input.unicode_set().clear();
        for range in ranges {
            for ch in range.clone() {
                if let Some(ch) = char::from_u32(ch) {
                    subset_input.unicode_set().insert(ch);
                }
            }
        }
        subset_input.layout_feature_tag_set().clear();
        for feature in features {
            subset_input.layout_feature_tag_set().insert(feature.to_hb_tag());
        }

        // Subset the font
        let new_font = subset_input.subset_font(&font)?;
        let data = new_font.underlying_blob().to_vec();
        match format {
            FontFormat::Woff2 => woff2::compress(&data),
            _ => Ok(data),
        }
    }
}
impl Debug for FontFaceWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[font: {} / {} / {}]",
            self.font_family(),
            self.font_style(),
            self.font_version(),
        )
    }
}
impl Display for FontFaceWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.font_family(), self.font_style())
    }
}
