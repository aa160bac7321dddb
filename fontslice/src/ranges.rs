//! Planning of `unicode-range` slices.
//!
//! A font's codepoints are first collapsed into maximal contiguous runs, and those runs are then
//! packed into groups whose total size stays below a ceiling. Each group becomes one subset file
//! and one `@font-face` rule.

use anyhow::{bail, ensure, Result};
use roaring::RoaringBitmap;
use std::{
    fmt::{Display, Formatter},
    ops::RangeInclusive,
};

/// The default maximum number of codepoints in a single slice.
pub const DEFAULT_CEILING: u32 = 128;

/// Codepoints below this are C0 control characters, and never assigned to a slice.
const FIRST_PRINTABLE: u32 = 0x20;
const MAX_CODEPOINT: u32 = 0x10FFFF;

/// An inclusive run of consecutive codepoints.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CodepointRun {
    pub start: u32,
    pub end: u32,
}
impl CodepointRun {
    pub const fn new(start: u32, end: u32) -> Self {
        CodepointRun { start, end }
    }

    pub const fn single(codepoint: u32) -> Self {
        CodepointRun { start: codepoint, end: codepoint }
    }

    /// The number of codepoints in the run.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, codepoint: u32) -> bool {
        (self.start..=self.end).contains(&codepoint)
    }

    pub fn as_range(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}
impl Display for CodepointRun {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "U+{:X}", self.start)
        } else {
            write!(f, "U+{:X}-{:X}", self.start, self.end)
        }
    }
}

/// A list of runs that are emitted together as one slice.
///
/// The [`Display`] implementation renders the value of the slice's `unicode-range` descriptor.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RangeGroup {
    runs: Vec<CodepointRun>,
}
impl RangeGroup {
    fn single(run: CodepointRun) -> Self {
        RangeGroup { runs: vec![run] }
    }

    pub fn runs(&self) -> &[CodepointRun] {
        &self.runs
    }

    /// The total number of codepoints in the group.
    pub fn span(&self) -> u32 {
        self.runs.iter().map(CodepointRun::len).sum()
    }

    pub fn contains(&self, codepoint: u32) -> bool {
        self.runs.iter().any(|x| x.contains(codepoint))
    }

    pub fn ranges(&self) -> Vec<RangeInclusive<u32>> {
        self.runs.iter().map(CodepointRun::as_range).collect()
    }

    pub fn codepoints(&self) -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        for run in &self.runs {
            bitmap.insert_range(run.as_range());
        }
        bitmap
    }
}
impl From<Vec<CodepointRun>> for RangeGroup {
    fn from(runs: Vec<CodepointRun>) -> Self {
        RangeGroup { runs }
    }
}
impl Display for RangeGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for run in &self.runs {
            if first {
                first = false;
            } else {
                f.write_str(",")?;
            }
            write!(f, "{run}")?;
        }
        Ok(())
    }
}

/// Collapses a sorted, duplicate-free sequence of codepoints into maximal contiguous runs.
///
/// C0 control characters are dropped.
pub fn group_codepoints(codepoints: impl IntoIterator<Item = u32>) -> Vec<CodepointRun> {
    let mut range_start = None;
    let mut range_last = 0;
    let mut runs = Vec::new();
    for ch in codepoints {
        if ch < FIRST_PRINTABLE {
            continue;
        }
        if let Some(start) = range_start {
            if range_last + 1 != ch {
                runs.push(CodepointRun::new(start, range_last));
                range_start = Some(ch);
            }
        } else {
            range_start = Some(ch);
        }
        range_last = ch;
    }
    if let Some(start) = range_start {
        runs.push(CodepointRun::new(start, range_last));
    }
    runs
}

/// Splits a run larger than the ceiling into pieces aligned to multiples of the ceiling.
///
/// The first piece fills out the page the run starts in, and the last piece ends exactly at the
/// end of the run.
fn split_run(run: CodepointRun, ceiling: u32, groups: &mut Vec<RangeGroup>) {
    let ceiling = u64::from(ceiling);
    let mut start = run.start;
    loop {
        let next_page = (u64::from(start) / ceiling + 1) * ceiling;
        let end = (next_page - 1).min(u64::from(run.end)) as u32;
        groups.push(RangeGroup::single(CodepointRun::new(start, end)));
        if end == run.end {
            break;
        }
        start = end + 1;
    }
}

/// Packs an ordered list of runs into groups with a total span below `ceiling`.
///
/// Adjacent small runs are merged greedily without reordering. A run exactly as large as the
/// ceiling is emitted alone, and a larger run is split into page-aligned pieces.
pub fn pack_runs(runs: &[CodepointRun], ceiling: u32) -> Result<Vec<RangeGroup>> {
    ensure!(ceiling > 0, "The slice ceiling must be at least 1.");
    for run in runs {
        ensure!(
            run.start <= run.end,
            "Invalid codepoint run: U+{:X} is after U+{:X}.",
            run.start,
            run.end,
        );
        ensure!(run.end <= MAX_CODEPOINT, "Codepoint U+{:X} is out of range.", run.end);
    }

    let mut groups = Vec::new();
    let mut iter = runs.iter().copied().peekable();
    while let Some(run) = iter.next() {
        let len = run.len();
        if len > ceiling {
            split_run(run, ceiling, &mut groups);
            continue;
        } else if len == ceiling {
            groups.push(RangeGroup::single(run));
            continue;
        }

        let mut group = vec![run];
        let mut span = len;
        while let Some(next) = iter.peek() {
            let new_span = span.saturating_add(next.len());
            if new_span >= ceiling {
                break;
            }
            group.push(*next);
            span = new_span;
            iter.next();
        }
        groups.push(group.into());
    }
    Ok(groups)
}

/// Plans the slices for a font.
///
/// Characters in `priority` that the font covers are taken out of the main set and packed on
/// their own, so that their slices come first. Priority characters the font lacks are ignored.
pub fn plan_ranges(
    codepoints: &RoaringBitmap,
    priority: impl IntoIterator<Item = char>,
    ceiling: u32,
) -> Result<Vec<RangeGroup>> {
    let priority: RoaringBitmap = priority
        .into_iter()
        .map(|x| x as u32)
        .filter(|x| codepoints.contains(*x))
        .collect();
    let remaining = codepoints - &priority;

    let mut groups = pack_runs(&group_codepoints(&priority), ceiling)?;
    groups.extend(pack_runs(&group_codepoints(&remaining), ceiling)?);
    Ok(groups)
}

fn parse_hex(str: &str) -> Result<u32> {
    ensure!(
        !str.is_empty() && str.len() <= 6 && str.bytes().all(|x| x.is_ascii_hexdigit()),
        "Invalid hex codepoint: {str:?}",
    );
    Ok(u32::from_str_radix(str, 16)?)
}

/// Parses the value of a CSS `unicode-range` descriptor.
///
/// Accepts single codepoints (`U+41`), ranges (`U+41-5A`) and wildcards (`U+4??`).
pub fn parse_unicode_range(spec: &str) -> Result<Vec<CodepointRun>> {
    let mut runs = Vec::new();
    for section in spec.split(',') {
        let section = section.trim();
        let Some(section) = section.strip_prefix("U+").or_else(|| section.strip_prefix("u+"))
        else {
            bail!("unicode-range token does not start with `U+`: {section:?}");
        };

        let (start, end) = if let Some((start, end)) = section.split_once('-') {
            (parse_hex(start)?, parse_hex(end)?)
        } else if section.contains('?') {
            let fixed = section.trim_end_matches('?');
            ensure!(!fixed.contains('?'), "Wildcards must be trailing: {section:?}");
            (parse_hex(&section.replace('?', "0"))?, parse_hex(&section.replace('?', "F"))?)
        } else {
            let val = parse_hex(section)?;
            (val, val)
        };
        ensure!(start <= end, "Reversed unicode-range token: {section:?}");
        ensure!(end <= MAX_CODEPOINT, "Codepoint U+{end:X} is out of range.");
        runs.push(CodepointRun::new(start, end));
    }
    Ok(runs)
}
