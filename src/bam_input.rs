//! BAM reading boundary: converts alignment records into [`SeqRecord`]s
//! with explicit, statically-typed field validation.

use crate::error::PorecError;
use crate::model::{SeqRecord, Tag};
use anyhow::Result;
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::{self, Read as HtsRead};
use std::path::Path;

pub struct BamInput {
    /// Reference names and lengths, in header order.
    pub refs: Vec<(String, usize)>,
    reader: bam::Reader,
}

impl BamInput {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = bam::Reader::from_path(path)?;
        let refs = {
            let header = reader.header();
            header
                .target_names()
                .iter()
                .enumerate()
                .map(|(tid, name)| {
                    let len = header.target_len(tid as u32).unwrap_or(0) as usize;
                    (String::from_utf8_lossy(name).to_string(), len)
                })
                .collect()
        };
        Ok(Self { refs, reader })
    }

    /// Single-pass stream of converted records.
    pub fn records(&mut self) -> impl Iterator<Item = Result<SeqRecord>> + '_ {
        let names: Vec<String> = self.refs.iter().map(|(name, _)| name.clone()).collect();
        self.reader.records().map(move |result| {
            let record = result?;
            seq_record_from_bam(&record, &names)
        })
    }
}

fn ref_name(names: &[String], tid: i32) -> Option<String> {
    if tid < 0 {
        return None;
    }
    names.get(tid as usize).cloned()
}

fn seq_record_from_bam(record: &bam::Record, names: &[String]) -> Result<SeqRecord> {
    let name = std::str::from_utf8(record.qname())
        .map_err(|_| PorecError::MalformedRecord("non-UTF-8 read name".to_string()))?
        .to_string();
    let seq = record.seq().as_bytes();

    // Missing quality is all-0xff in BAM; anything else is raw phred,
    // shifted to ASCII phred+33 for the text-record model.
    let raw_qual = record.qual();
    let qual = if raw_qual.is_empty() || raw_qual.iter().all(|&q| q == 0xff) {
        None
    } else {
        if raw_qual.len() != seq.len() {
            return Err(PorecError::MalformedRecord(format!(
                "{name}: quality length {} != sequence length {}",
                raw_qual.len(),
                seq.len()
            ))
            .into());
        }
        Some(raw_qual.iter().map(|&q| q.saturating_add(33)).collect())
    };

    let unmapped = record.is_unmapped();
    let cigar = if unmapped {
        None
    } else {
        let text = record.cigar().take().to_string();
        (!text.is_empty()).then_some(text)
    };

    let mut tags = Vec::new();
    for item in record.aux_iter() {
        let (key, aux) = item?;
        let key = std::str::from_utf8(key)
            .map_err(|_| PorecError::MalformedRecord(format!("{name}: non-UTF-8 tag key")))?;
        if let Some(tag) = aux_to_tag(key, aux) {
            tags.push(tag);
        }
    }

    Ok(SeqRecord {
        name,
        qual,
        flags: record.flags(),
        ref_name: if unmapped { None } else { ref_name(names, record.tid()) },
        ref_pos: (!unmapped && record.pos() >= 0).then(|| record.pos() as u32 + 1),
        map_quality: (record.mapq() != 255).then_some(record.mapq()),
        cigar,
        next_ref_name: ref_name(names, record.mtid()),
        next_ref_pos: (record.mpos() >= 0).then(|| record.mpos() as u32 + 1),
        template_length: record.insert_size() as i32,
        tags,
        seq,
    })
}

fn join_array<T: ToString>(type_code: char, values: impl Iterator<Item = T>) -> String {
    let mut out = type_code.to_string();
    for v in values {
        out.push(',');
        out.push_str(&v.to_string());
    }
    out
}

/// Map an aux field onto the `KEY:TYPE:VALUE` text form. Field types with no
/// SAM text equivalent are dropped.
fn aux_to_tag(key: &str, aux: Aux) -> Option<Tag> {
    let (ty, value) = match aux {
        Aux::Char(c) => ("A", (c as char).to_string()),
        Aux::I8(v) => ("i", v.to_string()),
        Aux::U8(v) => ("i", v.to_string()),
        Aux::I16(v) => ("i", v.to_string()),
        Aux::U16(v) => ("i", v.to_string()),
        Aux::I32(v) => ("i", v.to_string()),
        Aux::U32(v) => ("i", v.to_string()),
        Aux::Float(v) => ("f", v.to_string()),
        Aux::Double(v) => ("f", v.to_string()),
        Aux::String(s) => ("Z", s.to_string()),
        Aux::HexByteArray(s) => ("H", s.to_string()),
        Aux::ArrayI8(values) => ("B", join_array('c', values.iter())),
        Aux::ArrayU8(values) => ("B", join_array('C', values.iter())),
        Aux::ArrayI16(values) => ("B", join_array('s', values.iter())),
        Aux::ArrayU16(values) => ("B", join_array('S', values.iter())),
        Aux::ArrayI32(values) => ("B", join_array('i', values.iter())),
        Aux::ArrayU32(values) => ("B", join_array('I', values.iter())),
        Aux::ArrayFloat(values) => ("B", join_array('f', values.iter())),
    };
    Some(Tag::new(key, ty, &value))
}
