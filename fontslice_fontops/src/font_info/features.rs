use anyhow::*;
use hb_subset::{
    sys::{hb_face_t, hb_ot_layout_table_get_feature_tags, hb_tag_t},
    FontFace, Tag,
};
use std::{
    ffi::c_uint,
    fmt::{Debug, Display, Formatter},
    ptr,
    str::FromStr,
};

const GSUB: hb_tag_t = u32::from_be_bytes(*b"GSUB");
const GPOS: hb_tag_t = u32::from_be_bytes(*b"GPOS");

/// An OpenType layout feature tag, such as `liga` or `kern`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FeatureTag([u8; 4]);
impl FeatureTag {
    pub const fn new(tag: [u8; 4]) -> Self {
        FeatureTag(tag)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub(crate) fn to_hb_tag(self) -> Tag {
        Tag::new(&self.0)
    }
}
impl Display for FeatureTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for &byte in &self.0 {
            let ch = if byte.is_ascii_graphic() || byte == b' ' { byte as char } else { '?' };
            write!(f, "{ch}")?;
        }
        Result::Ok(())
    }
}
impl Debug for FeatureTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FeatureTag({:?})", self.to_string())
    }
}
impl FromStr for FeatureTag {
    type Err = Error;

    /// Parses a tag of one to four ASCII characters, padding it with spaces.
    fn from_str(s: &str) -> Result<Self> {
        ensure!(!s.is_empty() && s.len() <= 4, "Feature tags must be 1-4 characters: {s:?}");
        ensure!(s.bytes().all(|x| x.is_ascii_graphic()), "Feature tag is not ASCII: {s:?}");
        let mut tag = [b' '; 4];
        tag[..s.len()].copy_from_slice(s.as_bytes());
        Ok(FeatureTag(tag))
    }
}

unsafe fn load_feature_tags(face: *mut hb_face_t, table: hb_tag_t) -> Vec<hb_tag_t> {
    let total = hb_ot_layout_table_get_feature_tags(face, table, 0, ptr::null_mut(), ptr::null_mut());
    if total == 0 {
        return Vec::new();
    }

    let mut tags = vec![0; total as usize];
    let mut count = total as c_uint;
    hb_ot_layout_table_get_feature_tags(face, table, 0, &mut count, tags.as_mut_ptr());
    tags.truncate(count as usize);
    tags
}

/// Returns the layout features of a face, GSUB features first, in table order.
pub fn get_feature_tags(face: &FontFace) -> Vec<FeatureTag> {
    let mut tags: Vec<FeatureTag> = Vec::new();
    unsafe {
        let face = face.as_raw();
        for table in [GSUB, GPOS] {
            for tag in load_feature_tags(face, table) {
                let tag = FeatureTag(tag.to_be_bytes());
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
    }
    tags
}
