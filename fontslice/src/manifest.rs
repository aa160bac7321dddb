use crate::ranges::{parse_unicode_range, RangeGroup};
use anyhow::{ensure, Context, Result};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::debug;

/// The file name the manifest is stored under, next to the slices it describes.
pub const MANIFEST_FILE_NAME: &str = "unicode-ranges.json";

/// The mapping from slice index to `unicode-range` value for a sliced font.
///
/// This is stored as a JSON object keyed by the decimal slice index, in index order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeManifest {
    ranges: Vec<String>,
}
impl RangeManifest {
    pub fn from_groups(groups: &[RangeGroup]) -> Self {
        RangeManifest { ranges: groups.iter().map(|x| x.to_string()).collect() }
    }

    /// Returns the number of slices.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the `unicode-range` value of a slice.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.ranges.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.ranges.iter().map(String::as_str).enumerate()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a manifest, checking that indices are contiguous and every range is well-formed.
    pub fn from_json(data: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(data)?;

        let mut entries = Vec::new();
        for (key, range) in raw {
            let index: usize =
                key.parse().with_context(|| format!("Invalid slice index: {key:?}"))?;
            ensure!(index.to_string() == key, "Invalid slice index: {key:?}");
            parse_unicode_range(&range)
                .with_context(|| format!("Invalid unicode-range for slice #{index}"))?;
            entries.push((index, range));
        }
        entries.sort_by_key(|x| x.0);

        for (expected, (index, _)) in entries.iter().enumerate() {
            ensure!(expected == *index, "Slice #{expected} is missing from the manifest.");
        }
        Ok(RangeManifest { ranges: entries.into_iter().map(|x| x.1).collect() })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        debug!("Writing {}...", path.display());
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Could not write manifest to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest from {}", path.display()))?;
        Self::from_json(&data)
    }
}
impl Serialize for RangeManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.ranges.len()))?;
        for (index, range) in self.iter() {
            map.serialize_entry(&index.to_string(), range)?;
        }
        map.end()
    }
}
