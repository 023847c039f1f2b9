//! Alignment annotator: groups already-split, already-aligned monomer
//! records by their parent concatemer and re-derives concatemer-level
//! ordering and contact information.
//!
//! Grouping assumes the input arrives clustered by parent, as produced by
//! name-sorted alignment output. A record for an already-closed parent is a
//! defect in upstream ordering and aborts the stream.

use crate::bam_input::BamInput;
use crate::error::PorecError;
use crate::header;
use crate::model::{SeqRecord, Tag};
use crate::types::{HashMap, HashSet, HashSetExt};
use anyhow::Result;
use noodles::core::Position;
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record::cigar::{op::Kind as CigarKind, Op as SamCigarOp};
use noodles::sam::alignment::record::data::field::Tag as SamTag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::data::field::{value::Array, Value};
use noodles::sam::alignment::record_buf::{
    Cigar as SamCigar, Data as SamData, QualityScores, RecordBuf, Sequence,
};
use noodles::bam;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Default)]
pub struct AnnotateStats {
    pub total_records: u64,
    pub unmapped_records: u64,
    pub read_groups: u64,
    pub contacts: u64,
}

/// One pairwise proximity contact between two mapped monomers of the same
/// concatemer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub parent: String,
    pub ref1: String,
    pub pos1: u32,
    pub ref2: String,
    pub pos2: u32,
}

fn group_key(record: &SeqRecord) -> Result<(String, u32)> {
    let parent = record.parent_name().ok_or_else(|| {
        PorecError::MalformedRecord(format!("{}: missing MI provenance tag", record.name))
    })?;
    let (start, _, _, _) = record.subread_bounds().ok_or_else(|| {
        PorecError::MalformedRecord(format!("{}: missing Xc offset tag", record.name))
    })?;
    Ok((parent.to_string(), start))
}

/// Lazy, single-pass grouping of monomer records by parent concatemer.
///
/// Yields `(parent_name, monomers)` with the monomers re-ordered by their
/// start offset in the parent's coordinate frame. Restartable only if the
/// underlying stream is, which for a BAM reader it is not.
pub struct MonomerGroups<I> {
    source: I,
    current: Option<(String, Vec<(u32, SeqRecord)>)>,
    closed: HashSet<String>,
    done: bool,
}

impl<I: Iterator<Item = Result<SeqRecord>>> MonomerGroups<I> {
    pub fn new(source: I) -> Self {
        Self {
            source,
            current: None,
            closed: HashSet::new(),
            done: false,
        }
    }
}

fn finish_group(mut group: Vec<(u32, SeqRecord)>) -> Vec<SeqRecord> {
    group.sort_by_key(|(start, _)| *start);
    group.into_iter().map(|(_, record)| record).collect()
}

impl<I: Iterator<Item = Result<SeqRecord>>> Iterator for MonomerGroups<I> {
    type Item = Result<(String, Vec<SeqRecord>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.source.next() {
                None => {
                    self.done = true;
                    let (name, group) = self.current.take()?;
                    return Some(Ok((name, finish_group(group))));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(record)) => {
                    let (parent, start) = match group_key(&record) {
                        Ok(key) => key,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    };
                    if let Some((name, group)) = &mut self.current {
                        if *name == parent {
                            group.push((start, record));
                            continue;
                        }
                    }
                    if self.closed.contains(&parent) {
                        self.done = true;
                        return Some(Err(
                            PorecError::OrderingViolation { parent }.into()
                        ));
                    }
                    let previous = self
                        .current
                        .replace((parent, vec![(start, record)]));
                    if let Some((name, group)) = previous {
                        self.closed.insert(name.clone());
                        return Some(Ok((name, finish_group(group))));
                    }
                }
            }
        }
    }
}

/// Every unordered pair of mapped monomers in a group, in ascending subread
/// order.
pub fn derive_contacts(parent: &str, monomers: &[SeqRecord]) -> Vec<Contact> {
    let mapped: Vec<(&str, u32)> = monomers
        .iter()
        .filter(|m| !m.is_unmapped())
        .filter_map(|m| Some((m.ref_name.as_deref()?, m.ref_pos?)))
        .collect();
    let mut contacts = Vec::new();
    for i in 0..mapped.len() {
        for j in (i + 1)..mapped.len() {
            contacts.push(Contact {
                parent: parent.to_string(),
                ref1: mapped[i].0.to_string(),
                pos1: mapped[i].1,
                ref2: mapped[j].0.to_string(),
                pos2: mapped[j].1,
            });
        }
    }
    contacts
}

/// Stream a monomer BAM, group by parent, and write annotated records (and
/// optionally a pairwise contact table).
pub fn run(
    in_bam: &Path,
    out_bam: &Path,
    contacts_out: Option<&Path>,
) -> Result<AnnotateStats> {
    let mut input = BamInput::open(in_bam)?;
    let out_header = header::build_header(&input.refs)?;
    let refname_to_id: HashMap<String, usize> = input
        .refs
        .iter()
        .enumerate()
        .map(|(id, (name, _))| (name.clone(), id))
        .collect();

    let out_file = File::create(out_bam)?;
    let mut writer = bam::io::Writer::new(out_file);
    writer.write_header(&out_header)?;
    let mut contacts_writer = match contacts_out {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let mut stats = AnnotateStats::default();
    for result in MonomerGroups::new(input.records()) {
        let (parent, monomers) = result?;
        stats.read_groups += 1;

        if let Some(tsv) = contacts_writer.as_mut() {
            for c in derive_contacts(&parent, &monomers) {
                writeln!(tsv, "{}\t{}\t{}\t{}\t{}", c.parent, c.ref1, c.pos1, c.ref2, c.pos2)?;
                stats.contacts += 1;
            }
        }

        let group_size = monomers.len();
        for monomer in &monomers {
            stats.total_records += 1;
            if monomer.is_unmapped() {
                stats.unmapped_records += 1;
            }
            let record = build_output_record(monomer, &refname_to_id, group_size)?;
            writer.write_alignment_record(&out_header, &record)?;
        }
    }

    writer.try_finish()?;
    if let Some(mut tsv) = contacts_writer {
        tsv.flush()?;
    }
    Ok(stats)
}

fn build_output_record(
    monomer: &SeqRecord,
    refname_to_id: &HashMap<String, usize>,
    group_size: usize,
) -> Result<RecordBuf> {
    let mut out = RecordBuf::default();
    *out.name_mut() = Some(monomer.name.clone().into_bytes().into());
    *out.flags_mut() = Flags::from_bits_truncate(monomer.flags);

    if let (Some(ref_name), Some(pos)) = (&monomer.ref_name, monomer.ref_pos) {
        let id = refname_to_id.get(ref_name).ok_or_else(|| {
            PorecError::MalformedRecord(format!(
                "{}: reference {ref_name} absent from header",
                monomer.name
            ))
        })?;
        let start = Position::try_from(pos as usize)
            .map_err(|_| anyhow::anyhow!("alignment start out of range: {pos}"))?;
        *out.reference_sequence_id_mut() = Some(*id);
        *out.alignment_start_mut() = Some(start);
    }
    if let Some(mq) = monomer.map_quality {
        *out.mapping_quality_mut() = MappingQuality::new(mq);
    }
    if let Some(cigar) = &monomer.cigar {
        *out.cigar_mut() = parse_cigar(&monomer.name, cigar)?;
    }
    if let (Some(mate_ref), Some(mate_pos)) = (&monomer.next_ref_name, monomer.next_ref_pos) {
        if let Some(id) = refname_to_id.get(mate_ref) {
            let start = Position::try_from(mate_pos as usize)
                .map_err(|_| anyhow::anyhow!("mate alignment start out of range: {mate_pos}"))?;
            *out.mate_reference_sequence_id_mut() = Some(*id);
            *out.mate_alignment_start_mut() = Some(start);
        }
    }
    *out.template_length_mut() = monomer.template_length;

    *out.sequence_mut() = Sequence::from(monomer.seq.clone());
    if let Some(qual) = &monomer.qual {
        let raw: Vec<u8> = qual.iter().map(|&q| q.saturating_sub(33)).collect();
        *out.quality_scores_mut() = QualityScores::from(raw);
    }

    let mut data = SamData::default();
    for tag in &monomer.tags {
        let key = tag.key.as_bytes();
        let [k0, k1] = key else {
            return Err(PorecError::MalformedRecord(format!(
                "{}: tag key {:?} is not two characters",
                monomer.name, tag.key
            ))
            .into());
        };
        data.insert(SamTag::new(*k0, *k1), tag_value(&monomer.name, tag)?);
    }
    data.insert(SamTag::new(b'X', b'n'), Value::from(group_size as i32));
    *out.data_mut() = data;

    Ok(out)
}

fn parse_cigar(name: &str, text: &str) -> Result<SamCigar> {
    let mut ops: Vec<SamCigarOp> = Vec::new();
    let mut len = 0usize;
    for &b in text.as_bytes() {
        if b.is_ascii_digit() {
            len = len * 10 + usize::from(b - b'0');
            continue;
        }
        let kind = match b {
            b'M' => CigarKind::Match,
            b'I' => CigarKind::Insertion,
            b'D' => CigarKind::Deletion,
            b'N' => CigarKind::Skip,
            b'S' => CigarKind::SoftClip,
            b'H' => CigarKind::HardClip,
            b'P' => CigarKind::Pad,
            b'=' => CigarKind::SequenceMatch,
            b'X' => CigarKind::SequenceMismatch,
            _ => {
                return Err(PorecError::MalformedRecord(format!(
                    "{name}: bad CIGAR operation {:?}",
                    b as char
                ))
                .into())
            }
        };
        ops.push(SamCigarOp::new(kind, len));
        len = 0;
    }
    Ok(ops.into_iter().collect())
}

fn tag_value(name: &str, tag: &Tag) -> Result<Value> {
    let malformed = || {
        PorecError::MalformedRecord(format!("{name}: unparseable tag {}:{}", tag.key, tag.ty))
    };
    let value = match tag.ty.as_str() {
        "A" => Value::Character(*tag.value.as_bytes().first().ok_or_else(malformed)?),
        "i" => Value::from(tag.value.parse::<i32>().map_err(|_| malformed())?),
        "f" => Value::Float(tag.value.parse::<f32>().map_err(|_| malformed())?),
        "Z" => Value::String(tag.value.clone().into_bytes().into()),
        "H" => Value::Hex(tag.value.clone().into_bytes().into()),
        "B" => {
            let mut fields = tag.value.split(',');
            let subtype = fields.next().ok_or_else(malformed)?;
            let fields: Vec<&str> = fields.collect();
            let array = match subtype {
                "c" => Array::Int8(parse_fields(&fields).ok_or_else(malformed)?),
                "C" => Array::UInt8(parse_fields(&fields).ok_or_else(malformed)?),
                "s" => Array::Int16(parse_fields(&fields).ok_or_else(malformed)?),
                "S" => Array::UInt16(parse_fields(&fields).ok_or_else(malformed)?),
                "i" => Array::Int32(parse_fields(&fields).ok_or_else(malformed)?),
                "I" => Array::UInt32(parse_fields(&fields).ok_or_else(malformed)?),
                "f" => Array::Float(parse_fields(&fields).ok_or_else(malformed)?),
                _ => return Err(malformed().into()),
            };
            Value::Array(array)
        }
        _ => return Err(malformed().into()),
    };
    Ok(value)
}

fn parse_fields<T: std::str::FromStr>(fields: &[&str]) -> Option<Vec<T>> {
    fields.iter().map(|f| f.parse::<T>().ok()).collect()
}
