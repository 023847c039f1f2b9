//! The sequence-record value type and the record-splitting algorithm.
//!
//! A [`SeqRecord`] is immutable once built: splitting never mutates the
//! parent, it produces new child records. Alignment-related fields use
//! explicit `Option`s instead of the `"*"` / `0` sentinel values of SAM
//! text; the sentinels exist only at the serialization boundary.

use crate::error::PorecError;
use crate::mods::{self, ModData};
use anyhow::Result;
use std::fmt;

/// SAM flag bit for an unmapped record.
pub const FLAG_UNMAPPED: u16 = 4;

const TAG_VALUE_TYPES: &[u8] = b"AcCsSiIfZHB";

/// One typed auxiliary tag, `KEY:TYPE:VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub ty: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, ty: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            ty: ty.to_string(),
            value: value.to_string(),
        }
    }

    /// Parse `KEY:TYPE:VALUE`; the value may itself contain colons.
    /// Returns `None` for text that does not have the tag shape, so FASTQ
    /// comment tokens that are not tags can be skipped silently.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.splitn(3, ':');
        let key = parts.next()?;
        let ty = parts.next()?;
        let value = parts.next()?;
        let key_bytes = key.as_bytes();
        if key_bytes.len() != 2
            || !key_bytes[0].is_ascii_alphabetic()
            || !key_bytes[1].is_ascii_alphanumeric()
        {
            return None;
        }
        if ty.len() != 1 || !TAG_VALUE_TYPES.contains(&ty.as_bytes()[0]) {
            return None;
        }
        Some(Self::new(key, ty, value))
    }

    pub fn is_mod_tag(&self) -> bool {
        mods::MOD_TAG_KEYS.contains(&self.key.as_str())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.key, self.ty, self.value)
    }
}

/// One read or reference fragment: sequence, optional quality, mapping
/// fields, and an ordered list of auxiliary tags.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqRecord {
    pub name: String,
    pub seq: Vec<u8>,
    /// ASCII phred+33, same length as `seq` when present.
    pub qual: Option<Vec<u8>>,
    pub flags: u16,
    pub ref_name: Option<String>,
    /// 1-based when aligned.
    pub ref_pos: Option<u32>,
    pub map_quality: Option<u8>,
    pub cigar: Option<String>,
    pub next_ref_name: Option<String>,
    pub next_ref_pos: Option<u32>,
    pub template_length: i32,
    pub tags: Vec<Tag>,
}

impl SeqRecord {
    /// Build an unaligned record, validating sequence/quality agreement.
    pub fn unaligned(
        name: impl Into<String>,
        seq: Vec<u8>,
        qual: Option<Vec<u8>>,
        tags: Vec<Tag>,
    ) -> Result<Self> {
        let name = name.into();
        if let Some(q) = &qual {
            if q.len() != seq.len() {
                return Err(PorecError::MalformedRecord(format!(
                    "{name}: quality length {} != sequence length {}",
                    q.len(),
                    seq.len()
                ))
                .into());
            }
        }
        Ok(Self {
            name,
            seq,
            qual,
            flags: FLAG_UNMAPPED,
            ref_name: None,
            ref_pos: None,
            map_quality: None,
            cigar: None,
            next_ref_name: None,
            next_ref_pos: None,
            template_length: 0,
            tags,
        })
    }

    /// Build from a FASTX record: the id line is split into name and
    /// comment, and comment tokens with the tag shape are retained.
    pub fn from_fastx(id: &[u8], seq: &[u8], qual: Option<&[u8]>) -> Result<Self> {
        let id = std::str::from_utf8(id)
            .map_err(|_| PorecError::MalformedRecord("non-UTF-8 record id".to_string()))?;
        let mut words = id.split_ascii_whitespace();
        let name = words
            .next()
            .ok_or_else(|| PorecError::MalformedRecord("empty record id".to_string()))?;
        let tags = words.filter_map(Tag::parse).collect();
        Self::unaligned(name, seq.to_vec(), qual.map(|q| q.to_vec()), tags)
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn is_unmapped(&self) -> bool {
        self.flags & FLAG_UNMAPPED != 0
    }

    /// True iff any tag key belongs to the modification-tag set.
    pub fn has_mod_tags(&self) -> bool {
        self.tags.iter().any(Tag::is_mod_tag)
    }

    pub fn tag(&self, key: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.key == key)
    }

    /// Parent read name from the `MI` provenance tag.
    pub fn parent_name(&self) -> Option<&str> {
        self.tag("MI").map(|t| t.value.as_str())
    }

    /// `(start, end, index, total)` from the `Xc` tag, in the parent's
    /// coordinate frame.
    pub fn subread_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let tag = self.tag("Xc")?;
        let mut fields = tag.value.split(',');
        if fields.next() != Some("i") {
            return None;
        }
        let mut next = || fields.next()?.parse::<u32>().ok();
        Some((next()?, next()?, next()?, next()?))
    }

    /// Split the record at the given cut offsets into child records, one per
    /// tiled interval, in ascending order.
    ///
    /// Modification data, when present, is decoded exactly once before the
    /// interval loop; re-decoding per child is the dominant cost and is not
    /// allowed to happen.
    pub fn split(&self, cut_offsets: &[usize]) -> Result<Vec<SeqRecord>> {
        if let Some(&bad) = cut_offsets.iter().find(|&&offset| offset > self.seq.len()) {
            return Err(PorecError::MalformedRecord(format!(
                "{}: split offset {bad} outside sequence of length {}",
                self.name,
                self.seq.len()
            ))
            .into());
        }
        if let Some(q) = &self.qual {
            if q.len() != self.seq.len() {
                return Err(PorecError::MalformedRecord(format!(
                    "{}: quality length {} != sequence length {}",
                    self.name,
                    q.len(),
                    self.seq.len()
                ))
                .into());
            }
        }
        // A present-but-empty MM tag carries no keys; such records split as
        // modification-free.
        let modified_bases = if self.has_mod_tags() {
            mods::decode(&self.name, &self.seq, &self.tags)?.filter(|m| !m.is_empty())
        } else {
            None
        };
        let intervals = tile_intervals(cut_offsets, self.seq.len());
        let total = intervals.len();
        let mut subreads = Vec::with_capacity(total);
        for (x, (start, end)) in intervals.into_iter().enumerate() {
            let name = format!("{}:{}_{}", self.name, x + 1, total);
            subreads.push(self.subread(
                start,
                end,
                name,
                Some((x, total)),
                modified_bases.as_ref(),
            )?);
        }
        Ok(subreads)
    }

    /// Produce the child record for `[start, end)`.
    ///
    /// The child's tag list is recomputed: parent modification tags and any
    /// stale `MI` are stripped, then `MI:Z:{parent}` and the `Xc` offset tag
    /// are attached, then re-sliced `MM`/`ML` when the parent carried
    /// modification data.
    fn subread(
        &self,
        start: usize,
        end: usize,
        name: String,
        subread_index: Option<(usize, usize)>,
        modified_bases: Option<&ModData>,
    ) -> Result<SeqRecord> {
        let seq = self.seq[start..end].to_vec();
        let qual = self.qual.as_ref().map(|q| q[start..end].to_vec());
        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| !t.is_mod_tag() && t.key != "MI")
            .cloned()
            .collect();
        tags.push(Tag::new("MI", "Z", &self.name));
        if let Some((index, total)) = subread_index {
            tags.push(Tag::new(
                "Xc",
                "B",
                &format!("i,{start},{end},{index},{total}"),
            ));
        }
        if let Some(modified_bases) = modified_bases {
            let (mm, ml) = mods::encode_subread(&name, modified_bases, &seq, start, end)?;
            tags.push(mm);
            tags.push(ml);
        }
        SeqRecord::unaligned(name, seq, qual, tags)
    }

    /// Serialize as four FASTQ text lines, tags tab-joined in the header
    /// comment. A record without quality data cannot be written.
    pub fn to_fastq(&self, with_tags: bool) -> Result<String> {
        let qual = self
            .qual
            .as_ref()
            .ok_or_else(|| PorecError::MissingQuality(self.name.clone()))?;
        let tag_str = if with_tags {
            self.tags
                .iter()
                .map(Tag::to_string)
                .collect::<Vec<_>>()
                .join("\t")
        } else {
            String::new()
        };
        Ok(format!(
            "@{} {}\n{}\n+\n{}\n",
            self.name,
            tag_str,
            String::from_utf8_lossy(&self.seq),
            String::from_utf8_lossy(qual),
        ))
    }
}

/// Tile `[0, len)` into consecutive intervals at the given cut offsets.
///
/// With no offsets the whole sequence is one interval. Otherwise offsets are
/// sorted and deduplicated, and the bounds 0 and `len` are supplied when
/// absent, so the intervals are contiguous, non-overlapping, and jointly
/// span the whole sequence.
pub fn tile_intervals(cut_offsets: &[usize], len: usize) -> Vec<(usize, usize)> {
    if cut_offsets.is_empty() {
        return vec![(0, len)];
    }
    let mut positions = cut_offsets.to_vec();
    positions.sort_unstable();
    positions.dedup();
    if positions.first() != Some(&0) {
        positions.insert(0, 0);
    }
    if positions.last() != Some(&len) {
        positions.push(len);
    }
    positions
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}
