use crate::{
    manifest::{RangeManifest, MANIFEST_FILE_NAME},
    ranges::RangeGroup,
    splitter::SliceReport,
};
use anyhow::*;
use fontslice_fontops::FontFormat;
use roaring::RoaringBitmap;
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

fn extract_name(str: &str) -> Option<String> {
    let out: String = str.chars().filter(|x| x.is_alphanumeric()).collect();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
fn extract_version(mut str: &str) -> String {
    let mut out = String::new();
    let version_txt = "version ";
    if str.to_lowercase().starts_with(version_txt) {
        str = &str[version_txt.len()..];
    }
    for char in str.chars() {
        if char.is_numeric() || char == '.' {
            out.push(char);
        } else {
            break;
        }
        if out.len() == 20 {
            break;
        }
    }
    let out = out.trim_matches('.');
    if out.is_empty() {
        "unversioned".to_string()
    } else {
        out.to_string()
    }
}

/// Returns the store directory for a face: `<family>/<version>/<style>`.
///
/// The family falls back to the name of the file the face was loaded from.
pub(crate) fn face_subdir(
    family: &str,
    filename_hint: Option<&str>,
    version: &str,
    style: &str,
) -> PathBuf {
    let name = extract_name(family)
        .or_else(|| filename_hint.and_then(extract_name))
        .unwrap_or_else(|| "font".to_string());
    let mut path = PathBuf::from(name);
    path.push(extract_version(version));
    path.push(extract_name(style).unwrap_or_else(|| "Regular".to_string()));
    path
}

/// Checks that no two webfonts would be written to the same store directory.
pub fn check_store_subdirs(fonts: &[WebfontInfo]) -> Result<()> {
    let mut seen = HashMap::new();
    for font in fonts {
        if let Some(other) = seen.insert(font.store_subdir(), font.font_family()) {
            bail!(
                "{other} and {} would both be written to {}.",
                font.font_family(),
                font.store_subdir().display(),
            );
        }
    }
    Ok(())
}

/// Contains the slices of a font, and the data needed to use them as a webfont.
#[derive(Debug, Clone)]
pub struct WebfontInfo {
    font_family: Arc<str>,
    font_version: Arc<str>,
    store_subdir: PathBuf,
    format: FontFormat,
    font_display: Arc<str>,
    entries: Vec<Arc<SliceInfo>>,
    report: SliceReport,
}
impl WebfontInfo {
    pub(crate) fn new(
        font_family: String,
        font_version: &str,
        store_subdir: PathBuf,
        format: FontFormat,
        font_display: &str,
        entries: Vec<Arc<SliceInfo>>,
        report: SliceReport,
    ) -> Self {
        WebfontInfo {
            font_family: font_family.into(),
            font_version: font_version.into(),
            store_subdir,
            format,
            font_display: font_display.into(),
            entries,
            report,
        }
    }

    /// Writes the slice files and the range manifest to the given directory.
    ///
    /// Anything previously stored in `target` is removed first.
    pub fn write_to_store(&self, target: &Path) -> Result<()> {
        if target.exists() {
            debug!("Removing old contents of {}...", target.display());
            fs::remove_dir_all(target)
                .with_context(|| format!("Could not clear {}", target.display()))?;
        }
        fs::create_dir_all(target)?;

        let mut path = target.to_path_buf();
        for entry in &self.entries {
            if let Some(data) = &entry.data {
                path.push(&entry.file_name);
                debug!("Writing {}...", path.display());
                fs::write(&path, data)?;
                path.pop();
            }
        }
        self.manifest().write_to(&target.join(MANIFEST_FILE_NAME))
    }

    /// Returns the directory, relative to the store, that this font's files belong in.
    pub fn store_subdir(&self) -> &Path {
        &self.store_subdir
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn font_version(&self) -> &str {
        &self.font_version
    }

    /// Returns a stylesheet appropriate for using this webfont.
    pub fn render_css<'a>(&'a self, store_uri: &str) -> impl Display + 'a {
        FontStylesheetDisplay { store_uri: store_uri.to_string(), sheet: self }
    }

    /// Returns the slice index to `unicode-range` mapping for this font.
    pub fn manifest(&self) -> RangeManifest {
        let groups: Vec<_> = self.entries.iter().map(|x| x.group.clone()).collect();
        RangeManifest::from_groups(&groups)
    }

    /// Returns the number of slices in the webfont.
    pub fn subset_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the slices in this webfont, in index order.
    pub fn subsets(&self) -> &[Arc<SliceInfo>] {
        &self.entries
    }

    /// Returns which subsetting jobs succeeded.
    pub fn report(&self) -> &SliceReport {
        &self.report
    }

    /// Returns the bitset of characters in the webfont.
    pub fn all_chars(&self) -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        for subset in &self.entries {
            bitmap |= subset.group.codepoints();
        }
        bitmap
    }
}

#[derive(Debug, Clone)]
pub struct SliceInfo {
    index: usize,
    file_name: String,
    group: RangeGroup,
    data: Option<Vec<u8>>,
}
impl SliceInfo {
    pub(crate) fn new(
        index: usize,
        extension: &str,
        group: RangeGroup,
        data: Option<Vec<u8>>,
    ) -> Self {
        SliceInfo { index, file_name: format!("{index}.{extension}"), group, data }
    }

    /// Returns the index of the slice.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the file name that this slice will be saved to.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the codepoint runs this slice covers.
    pub fn group(&self) -> &RangeGroup {
        &self.group
    }

    pub fn unicode_range(&self) -> String {
        self.group.to_string()
    }

    /// Returns the font data, or `None` if the slice was not subset.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

struct FontStylesheetDisplay<'a> {
    store_uri: String,
    sheet: &'a WebfontInfo,
}
impl<'a> Display for FontStylesheetDisplay<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for entry in &self.sheet.entries {
            writeln!(f, "@font-face {{")?;
            writeln!(f, "\tfont-family: {:?};", self.sheet.font_family)?;
            writeln!(f, "\tfont-style: normal;")?;
            writeln!(f, "\tfont-display: {};", self.sheet.font_display)?;
            writeln!(
                f,
                "\tsrc: url({:?}) format({:?});",
                format!("{}{}", self.store_uri, entry.file_name),
                self.sheet.format.css_format(),
            )?;
            writeln!(f, "\tunicode-range: {};", entry.group)?;
            writeln!(f, "}}")?;
        }
        Result::Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::CodepointRun;

    fn sample(style: &str, groups: Vec<RangeGroup>, failed: Vec<usize>) -> WebfontInfo {
        let entries = groups
            .into_iter()
            .enumerate()
            .map(|(i, group)| {
                let data = if failed.contains(&i) { None } else { Some(vec![i as u8; 4]) };
                Arc::new(SliceInfo::new(i, "woff2", group, data))
            })
            .collect();
        let succeeded = (0..2).filter(|x| !failed.contains(x)).collect();
        let version = "Version 2.004;hotconv 1.0.118";
        WebfontInfo::new(
            "Noto Sans SC".to_string(),
            version,
            face_subdir("Noto Sans SC", None, version, style),
            FontFormat::Woff2,
            "block",
            entries,
            SliceReport { succeeded, failed },
        )
    }

    fn two_slices(style: &str) -> WebfontInfo {
        let groups = vec![
            vec![CodepointRun::single(0x4E2D)].into(),
            vec![CodepointRun::new(0x41, 0x43), CodepointRun::single(0x61)].into(),
        ];
        sample(style, groups, vec![])
    }

    #[test]
    fn renders_font_face_rules() {
        let css = two_slices("Regular").render_css("/fonts/").to_string();
        assert_eq!(
            css,
            "@font-face {\n\
             \tfont-family: \"Noto Sans SC\";\n\
             \tfont-style: normal;\n\
             \tfont-display: block;\n\
             \tsrc: url(\"/fonts/0.woff2\") format(\"woff2\");\n\
             \tunicode-range: U+4E2D;\n\
             }\n\
             @font-face {\n\
             \tfont-family: \"Noto Sans SC\";\n\
             \tfont-style: normal;\n\
             \tfont-display: block;\n\
             \tsrc: url(\"/fonts/1.woff2\") format(\"woff2\");\n\
             \tunicode-range: U+41-43,U+61;\n\
             }\n"
        );
    }

    #[test]
    fn writes_slices_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let info = two_slices("Regular");
        let store = dir.path().join(info.store_subdir());
        info.write_to_store(&store).unwrap();

        assert_eq!(fs::read(store.join("1.woff2")).unwrap(), [1, 1, 1, 1]);
        let manifest = RangeManifest::load(&store.join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(manifest, info.manifest());
        assert_eq!(manifest.get(1), Some("U+41-43,U+61"));
    }

    #[test]
    fn rewriting_a_store_removes_stale_slices() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        two_slices("Regular").write_to_store(&store).unwrap();
        fs::write(store.join("notes.txt"), "old").unwrap();

        let groups = vec![
            vec![CodepointRun::new(0x20, 0x7E)].into(),
            vec![CodepointRun::single(0x4E2D)].into(),
        ];
        let rerun = sample("Regular", groups, vec![1]);
        rerun.write_to_store(&store).unwrap();

        assert_eq!(fs::read(store.join("0.woff2")).unwrap(), [0, 0, 0, 0]);
        assert!(!store.join("1.woff2").exists());
        assert!(!store.join("notes.txt").exists());
        let manifest = RangeManifest::load(&store.join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(manifest.get(0), Some("U+20-7E"));
    }

    #[test]
    fn faces_of_one_family_get_separate_directories() {
        let regular = two_slices("Regular");
        let bold = two_slices("Bold");
        assert_eq!(regular.store_subdir(), Path::new("NotoSansSC/2.004/Regular"));
        assert_eq!(bold.store_subdir(), Path::new("NotoSansSC/2.004/Bold"));
        check_store_subdirs(&[regular.clone(), bold]).unwrap();
        assert!(check_store_subdirs(&[regular.clone(), regular]).is_err());
    }

    #[test]
    fn store_directory_names() {
        let long = "A Very Long Font Family Name";
        assert_eq!(
            face_subdir(long, None, "1.0", ""),
            Path::new("AVeryLongFontFamilyName/1.0/Regular"),
        );
        assert_eq!(
            face_subdir("--", Some("MyFont-Bold"), "Version ..", "Bold"),
            Path::new("MyFontBold/unversioned/Bold"),
        );
        assert_eq!(face_subdir("", None, "", "Italic"), Path::new("font/unversioned/Italic"));
    }
}
