use anyhow::{bail, Result};
use fontslice::{
    check_store_subdirs, group_codepoints, pack_runs, plan_ranges, split_webfont, FeatureTag,
    FontFormat, FontSource, RangeGroup, RangeManifest, SlicePlan, DEFAULT_CEILING,
    MANIFEST_FILE_NAME,
};
use roaring::RoaringBitmap;
use std::{fs, sync::Arc};

#[derive(Clone)]
struct TestFont {
    style: &'static str,
    codepoints: Arc<RoaringBitmap>,
    broken: Option<u32>,
}
impl TestFont {
    fn new(codepoints: impl IntoIterator<Item = u32>) -> Self {
        TestFont {
            style: "Regular",
            codepoints: Arc::new(codepoints.into_iter().collect()),
            broken: None,
        }
    }
}
impl FontSource for TestFont {
    fn font_family(&self) -> &str {
        "Test Serif"
    }
    fn font_style(&self) -> &str {
        self.style
    }
    fn font_version(&self) -> &str {
        "Version 3.1"
    }
    fn filename_hint(&self) -> Option<&str> {
        Some("TestSerif")
    }
    fn format(&self) -> FontFormat {
        FontFormat::TrueType
    }
    fn codepoints(&self) -> &RoaringBitmap {
        &self.codepoints
    }
    fn layout_features(&self) -> &[FeatureTag] {
        &[]
    }
    fn subset(&self, group: &RangeGroup, _: &[FeatureTag], _: FontFormat) -> Result<Vec<u8>> {
        match self.broken {
            Some(cp) if group.contains(cp) => bail!("glyph U+{cp:X} is broken"),
            _ => Ok(group.codepoints().iter().flat_map(u32::to_be_bytes).collect()),
        }
    }
}

fn ranges_of(groups: &[RangeGroup]) -> Vec<String> {
    groups.iter().map(ToString::to_string).collect()
}

#[test]
fn small_latin_set_is_one_slice() {
    let runs = group_codepoints([0x41, 0x42, 0x43, 0x61]);
    let groups = pack_runs(&runs, DEFAULT_CEILING).unwrap();
    assert_eq!(ranges_of(&groups), ["U+41-43,U+61"]);
}

#[test]
fn long_run_splits_on_pages() {
    let runs = group_codepoints(0x4E00..=0x4E00 + 300);
    let groups = pack_runs(&runs, DEFAULT_CEILING).unwrap();
    assert_eq!(ranges_of(&groups), ["U+4E00-4E7F", "U+4E80-4EFF", "U+4F00-4F2C"]);
    assert_eq!(groups.iter().map(RangeGroup::span).collect::<Vec<_>>(), [128, 128, 45]);
}

#[test]
fn space_is_kept_and_controls_dropped() {
    let set: RoaringBitmap = [0x0A, 0x1F, 0x20, 0x41].into_iter().collect();
    let groups = plan_ranges(&set, "".chars(), DEFAULT_CEILING).unwrap();
    assert_eq!(ranges_of(&groups), ["U+20,U+41"]);
}

#[test]
fn priority_char_gets_its_own_first_slice() {
    let set: RoaringBitmap = (0x4E00..0x4E00 + 500).collect();
    let groups = plan_ranges(&set, ['中'], DEFAULT_CEILING).unwrap();
    assert_eq!(groups[0].to_string(), "U+4E2D");
    assert!(groups[1..].iter().all(|x| !x.contains(0x4E2D)));
    assert_eq!(groups.iter().map(|x| x.codepoints().len()).sum::<u64>(), 500);
}

#[tokio::test]
async fn slices_are_written_with_manifest_and_css() {
    let font = TestFont::new((0x20..0x7F).chain(0x3000..0x3040));
    let mut plan = SlicePlan::new();
    plan.priority_chars("。、".chars()).workers(2).font_display("swap");
    let info = split_webfont(&plan.build().unwrap(), &font).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join(info.store_subdir());
    info.write_to_store(&store).unwrap();
    assert!(store.ends_with("TestSerif/3.1/Regular"));

    let manifest = RangeManifest::load(&store.join(MANIFEST_FILE_NAME)).unwrap();
    let ranges: Vec<_> = manifest.iter().map(|(_, range)| range).collect();
    assert_eq!(ranges, ["U+3001-3002", "U+20-7E,U+3000", "U+3003-303F"]);
    for slice in info.subsets() {
        let data = fs::read(store.join(slice.file_name())).unwrap();
        assert_eq!(data.len() as u64, slice.group().codepoints().len() * 4);
    }

    let css = info.render_css("/static/fonts/").to_string();
    assert_eq!(css.matches("@font-face").count(), 3);
    assert!(css.contains("src: url(\"/static/fonts/2.woff2\") format(\"woff2\");"));
    assert!(css.contains("unicode-range: U+20-7E,U+3000;"));
    assert!(css.contains("font-display: swap;"));
}

#[tokio::test]
async fn failed_slice_is_skipped_but_listed() {
    let mut font = TestFont::new(0x100..0x200);
    font.broken = Some(0x1C0);
    let info = split_webfont(&SlicePlan::new().build().unwrap(), &font).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    info.write_to_store(dir.path()).unwrap();
    assert!(dir.path().join("0.woff2").exists());
    assert!(!dir.path().join("1.woff2").exists());
    assert_eq!(RangeManifest::load(&dir.path().join(MANIFEST_FILE_NAME)).unwrap().len(), 2);
    assert_eq!(info.report().failed, [1]);
}

#[tokio::test]
async fn faces_sharing_a_family_keep_their_own_files() {
    let mut regular = TestFont::new(0x41..0x5B);
    regular.style = "Regular";
    let mut bold = TestFont::new(0x4E00..0x4E10);
    bold.style = "Bold";

    let mut plan = SlicePlan::new();
    plan.font_family("Site Font");
    let plan = plan.build().unwrap();
    let fonts = vec![
        split_webfont(&plan, &regular).await.unwrap(),
        split_webfont(&plan, &bold).await.unwrap(),
    ];
    check_store_subdirs(&fonts).unwrap();

    let dir = tempfile::tempdir().unwrap();
    for font in &fonts {
        font.write_to_store(&dir.path().join(font.store_subdir())).unwrap();
    }

    let regular_dir = dir.path().join("TestSerif/3.1/Regular");
    let bold_dir = dir.path().join("TestSerif/3.1/Bold");
    let regular_manifest = RangeManifest::load(&regular_dir.join(MANIFEST_FILE_NAME)).unwrap();
    let bold_manifest = RangeManifest::load(&bold_dir.join(MANIFEST_FILE_NAME)).unwrap();
    assert_eq!(regular_manifest.get(0), Some("U+41-5A"));
    assert_eq!(bold_manifest.get(0), Some("U+4E00-4E0F"));
    assert_eq!(fs::read(regular_dir.join("0.woff2")).unwrap().len(), 26 * 4);
    assert_eq!(fs::read(bold_dir.join("0.woff2")).unwrap().len(), 16 * 4);
}

#[tokio::test]
async fn faces_with_the_same_store_directory_are_rejected() {
    let plan = SlicePlan::new().build().unwrap();
    let first = split_webfont(&plan, &TestFont::new(0x41..0x5B)).await.unwrap();
    let second = split_webfont(&plan, &TestFont::new(0x61..0x7B)).await.unwrap();
    assert!(check_store_subdirs(&[first, second]).is_err());
}

#[tokio::test]
async fn rerunning_into_a_store_drops_old_slices() {
    let dir = tempfile::tempdir().unwrap();
    let plan = SlicePlan::new().build().unwrap();

    let wide = split_webfont(&plan, &TestFont::new(0x100..0x300)).await.unwrap();
    wide.write_to_store(dir.path()).unwrap();
    assert!(dir.path().join("3.woff2").exists());

    let mut narrow = TestFont::new(0x100..0x200);
    narrow.broken = Some(0x180);
    let narrow = split_webfont(&plan, &narrow).await.unwrap();
    narrow.write_to_store(dir.path()).unwrap();

    assert!(dir.path().join("0.woff2").exists());
    assert!(!dir.path().join("1.woff2").exists());
    assert!(!dir.path().join("2.woff2").exists());
    assert!(!dir.path().join("3.woff2").exists());
    let manifest = RangeManifest::load(&dir.path().join(MANIFEST_FILE_NAME)).unwrap();
    assert_eq!(manifest.len(), 2);
}
