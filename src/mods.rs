//! Base-modification (methylation) call data carried in `MM`/`ML` tag pairs.
//!
//! Decoding recovers, per modification key, the absolute forward-sequence
//! offsets and probabilities of modified bases from the run-length delta
//! encoding. Encoding does the inverse for a subread: calls are selected by
//! the subread's interval in the parent coordinate frame and re-expressed as
//! deltas over canonical-base occurrences within the subread sequence.
//!
//! Probabilities stay on the SAM 0-255 byte scale end to end.

use crate::error::PorecError;
use crate::model::Tag;
use crate::types::{HashMap, HashMapExt, HashSet};
use anyhow::Result;

/// Tag keys that carry base-modification data.
pub const MOD_TAG_KEYS: &[&str] = &["MM", "ML", "Mm", "Ml"];

/// One modification key: canonical base, strand flag, modification code, and
/// optional skip-scheme character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModKey {
    /// Canonical base, uppercase (e.g. `C` for 5mC calls).
    pub canonical: u8,
    /// Numeric strand flag: 0 encodes `+`, anything else `-`.
    pub strand: u8,
    /// Modification code: single/multi-letter (e.g. `m`) or numeric ChEBI id.
    pub code: String,
    /// Optional skip-scheme character (`.` or `?`).
    pub skip: Option<char>,
}

impl ModKey {
    fn strand_char(&self) -> char {
        if self.strand == 0 {
            '+'
        } else {
            '-'
        }
    }
}

/// (offset, probability) calls for one key, offsets ascending in the parent
/// record's coordinate frame.
pub type ModCalls = Vec<(usize, u8)>;

/// Decoded modification data for a whole (unsplit) record. Key order is the
/// order of appearance in the `MM` tag; it is preserved through re-encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModData {
    pub keys: Vec<(ModKey, ModCalls)>,
}

impl ModData {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Positions of `canonical` in `seq`, scanned left to right,
/// case-insensitively.
fn base_occurrences(seq: &[u8], canonical: u8) -> Vec<usize> {
    seq.iter()
        .enumerate()
        .filter(|(_, b)| b.to_ascii_uppercase() == canonical)
        .map(|(i, _)| i)
        .collect()
}

/// One parsed `MM` key header plus its delta list.
struct MmEntry {
    key: ModKey,
    deltas: Vec<usize>,
}

/// Parse one `;`-separated `MM` segment, e.g. `C+m?,5,12`.
fn parse_mm_segment(record: &str, segment: &str) -> Result<MmEntry> {
    let bytes = segment.as_bytes();
    let malformed = |what: &str| {
        PorecError::MalformedRecord(format!("{record}: {what} in MM segment {segment:?}"))
    };
    let canonical = *bytes.first().ok_or_else(|| malformed("empty"))?;
    if !matches!(canonical, b'A' | b'C' | b'G' | b'T' | b'U' | b'N') {
        return Err(malformed("bad canonical base").into());
    }
    let strand = match bytes.get(1) {
        Some(b'+') => 0u8,
        Some(b'-') => 1u8,
        _ => return Err(malformed("bad strand").into()),
    };
    // Code is one alphabetic or one numeric token; multi-letter codes are
    // kept as a single token.
    let mut pos = 2usize;
    let code_start = pos;
    if bytes.get(pos).is_some_and(|b| b.is_ascii_digit()) {
        while bytes.get(pos).is_some_and(|b| b.is_ascii_digit()) {
            pos += 1;
        }
    } else {
        while bytes.get(pos).is_some_and(|b| b.is_ascii_alphabetic()) {
            pos += 1;
        }
    }
    if pos == code_start {
        return Err(malformed("missing modification code").into());
    }
    let code = segment[code_start..pos].to_string();
    let skip = match bytes.get(pos) {
        Some(b'.') => {
            pos += 1;
            Some('.')
        }
        Some(b'?') => {
            pos += 1;
            Some('?')
        }
        _ => None,
    };
    let mut deltas = Vec::new();
    if let Some(rest) = segment.get(pos..) {
        if !rest.is_empty() {
            let rest = rest
                .strip_prefix(',')
                .ok_or_else(|| malformed("bad delta list"))?;
            for field in rest.split(',') {
                let delta: usize = field
                    .parse()
                    .map_err(|_| malformed("non-numeric delta"))?;
                deltas.push(delta);
            }
        }
    }
    Ok(MmEntry {
        key: ModKey { canonical, strand, code, skip },
        deltas,
    })
}

/// Parse the `ML` value into per-key probability lists.
///
/// Two layouts are accepted: the `;`-separated per-key form this crate emits
/// (`C,112,230;A,13;`) and the flat SAM array form produced by aligner
/// passthrough (`C,112,230,13`), where probabilities are distributed across
/// keys by delta count. The first comma field of a segment is skipped in
/// either form.
fn parse_ml_value(record: &str, value: &str, entries: &[MmEntry]) -> Result<Vec<Vec<u8>>> {
    let malformed =
        |what: &str| PorecError::MalformedRecord(format!("{record}: {what} in ML value"));
    let parse_fields = |fields: &[&str]| -> Result<Vec<u8>> {
        fields
            .iter()
            .map(|f| {
                f.parse::<u8>()
                    .map_err(|_| malformed("non-numeric probability").into())
            })
            .collect()
    };

    let segments: Vec<&str> = value.split(';').filter(|s| !s.is_empty()).collect();
    if segments.len() > 1 {
        if segments.len() != entries.len() {
            return Err(malformed("segment count does not match MM keys").into());
        }
        let mut out = Vec::with_capacity(segments.len());
        for segment in segments {
            let fields: Vec<&str> = segment.split(',').collect();
            out.push(parse_fields(&fields[1..])?);
        }
        return Ok(out);
    }

    let flat: Vec<u8> = match segments.first() {
        None => Vec::new(),
        Some(segment) => {
            let fields: Vec<&str> = segment.split(',').collect();
            parse_fields(&fields[1..])?
        }
    };
    let mut out = Vec::with_capacity(entries.len());
    let mut taken = 0usize;
    for entry in entries {
        let end = taken + entry.deltas.len();
        if end > flat.len() {
            return Err(malformed("fewer probabilities than MM deltas").into());
        }
        out.push(flat[taken..end].to_vec());
        taken = end;
    }
    if taken != flat.len() {
        return Err(malformed("more probabilities than MM deltas").into());
    }
    Ok(out)
}

/// Decode a record's `MM`/`ML` tag pair into absolute (offset, probability)
/// calls over the forward sequence.
///
/// Returns `Ok(None)` when the record carries no `MM` tag. A present `MM`
/// tag with no keys decodes to an empty [`ModData`], which still marks the
/// record as modification-bearing.
pub fn decode(record: &str, seq: &[u8], tags: &[Tag]) -> Result<Option<ModData>> {
    let mm = tags.iter().find(|t| t.key == "MM" || t.key == "Mm");
    let Some(mm) = mm else {
        return Ok(None);
    };
    let ml = tags.iter().find(|t| t.key == "ML" || t.key == "Ml");

    let mut entries = Vec::new();
    for segment in mm.value.split(';').filter(|s| !s.is_empty()) {
        entries.push(parse_mm_segment(record, segment)?);
    }
    if entries.is_empty() {
        return Ok(Some(ModData::default()));
    }
    let probs = match ml {
        Some(ml) => parse_ml_value(record, &ml.value, &entries)?,
        None => {
            return Err(PorecError::MalformedRecord(format!(
                "{record}: MM tag without a matching ML tag"
            ))
            .into())
        }
    };

    let mut occurrence_cache: HashMap<u8, Vec<usize>> = HashMap::new();
    let mut keys = Vec::with_capacity(entries.len());
    for (entry, key_probs) in entries.into_iter().zip(probs) {
        if entry.deltas.len() != key_probs.len() {
            return Err(PorecError::ModificationEncodingMismatch {
                record: record.to_string(),
                deltas: entry.deltas.len(),
                probs: key_probs.len(),
            }
            .into());
        }
        let occurrences = occurrence_cache
            .entry(entry.key.canonical)
            .or_insert_with(|| base_occurrences(seq, entry.key.canonical));
        // Walk canonical-base occurrences, consuming each delta as a count
        // of unmodified occurrences to skip before the next modified one.
        let mut calls = Vec::with_capacity(entry.deltas.len());
        let mut cursor = 0usize;
        for (&delta, &prob) in entry.deltas.iter().zip(&key_probs) {
            cursor += delta;
            let Some(&offset) = occurrences.get(cursor) else {
                return Err(PorecError::MalformedRecord(format!(
                    "{record}: MM deltas overrun occurrences of base {}",
                    entry.key.canonical as char
                ))
                .into());
            };
            calls.push((offset, prob));
            cursor += 1;
        }
        keys.push((entry.key, calls));
    }
    Ok(Some(ModData { keys }))
}

/// Re-encode parent modification data for the subread covering
/// `[start, end)` of the parent, whose sliced sequence is `child_seq`.
///
/// Always returns the paired `MM`/`ML` tags when the parent carried
/// modification data; keys with no calls inside the interval are omitted
/// from the encoding entirely. A key whose selected call count does not
/// match its emitted delta count means an offset did not land on an
/// occurrence of the canonical base; that is a defect, not a recoverable
/// condition.
pub fn encode_subread(
    record: &str,
    mods: &ModData,
    child_seq: &[u8],
    start: usize,
    end: usize,
) -> Result<(Tag, Tag)> {
    let mut mm_value = String::new();
    let mut ml_value = String::new();
    // Occurrence index per canonical base, shared across keys: case folding
    // is identical for every key with the same canonical base.
    let mut occurrence_cache: HashMap<u8, Vec<usize>> = HashMap::new();

    for (key, calls) in &mods.keys {
        let selected: Vec<(usize, u8)> = calls
            .iter()
            .copied()
            .filter(|(offset, _)| *offset >= start && *offset < end)
            .collect();
        if selected.is_empty() {
            continue;
        }
        let occurrences = occurrence_cache
            .entry(key.canonical)
            .or_insert_with(|| base_occurrences(child_seq, key.canonical));
        let modified: HashSet<usize> = selected.iter().map(|(offset, _)| *offset).collect();

        let mut deltas: Vec<usize> = Vec::with_capacity(selected.len());
        let mut counter = 0usize;
        for &child_idx in occurrences.iter() {
            let parent_idx = child_idx + start;
            if modified.contains(&parent_idx) {
                deltas.push(counter);
                counter = 0;
            } else {
                counter += 1;
            }
        }
        if deltas.len() != selected.len() {
            return Err(PorecError::ModificationEncodingMismatch {
                record: record.to_string(),
                deltas: deltas.len(),
                probs: selected.len(),
            }
            .into());
        }

        let delta_str = deltas
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let prob_str = selected
            .iter()
            .map(|(_, p)| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let skip = key.skip.map(String::from).unwrap_or_default();
        mm_value.push_str(&format!(
            "{}{}{}{},{};",
            key.canonical as char,
            key.strand_char(),
            key.code,
            skip,
            delta_str
        ));
        ml_value.push_str(&format!("{},{};", key.canonical as char, prob_str));
    }

    Ok((
        Tag::new("MM", "Z", &mm_value),
        Tag::new("ML", "B", &ml_value),
    ))
}
