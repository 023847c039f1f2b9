//! Digestion pipeline: drives the cutter and splitter over a reference
//! genome (per chromosome) or over a lazily streamed set of concatemer
//! reads.
//!
//! Both modes are pure transformations with no retry semantics: a malformed
//! input record fails the whole run, and partial output is invalid.

use crate::enzyme::EnzymeCutter;
use crate::error::PorecError;
use crate::model::{tile_intervals, SeqRecord};
use crate::types::FragmentId;
use anyhow::{anyhow, Context, Result};
use needletail::parse_fastx_file;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Default)]
pub struct GenomeDigestStats {
    pub chromosomes: u64,
    pub fragments: u64,
    pub bases: u64,
}

#[derive(Debug, Default)]
pub struct DigestStats {
    pub reads_in: u64,
    pub monomers_out: u64,
    pub bases_out: u64,
}

/// FASTQ output sink for monomer records.
///
/// The underlying file is held open for the duration of the consuming pass;
/// `finish()` is the success path and surfaces flush errors, while dropping
/// the writer on an error path still closes the handle.
pub struct MonomerWriter {
    inner: BufWriter<File>,
    reads: u64,
    bases: u64,
}

impl MonomerWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("could not create output file {}", path.display()))?;
        Ok(Self {
            inner: BufWriter::new(file),
            reads: 0,
            bases: 0,
        })
    }

    pub fn write_record(&mut self, record: &SeqRecord) -> Result<()> {
        let text = record.to_fastq(true)?;
        self.inner.write_all(text.as_bytes())?;
        self.reads += 1;
        self.bases += record.len() as u64;
        Ok(())
    }

    /// Flush and release the sink, returning `(reads, bases)` written.
    pub fn finish(mut self) -> Result<(u64, u64)> {
        self.inner.flush()?;
        Ok((self.reads, self.bases))
    }
}

/// Digest every chromosome of `fasta`, writing one coordinate-table row and
/// one cut-reference FASTA record per fragment.
///
/// Rows are ascending within each chromosome and the fragment ordinal is a
/// genome-wide running index, so the row count equals the total child count.
pub fn digest_genome(
    cutter: &EnzymeCutter,
    fasta: &Path,
    bed_out: &Path,
    fasta_out: &Path,
) -> Result<GenomeDigestStats> {
    let mut reader = parse_fastx_file(fasta)
        .map_err(|e| anyhow!("failed to open FASTA {}: {}", fasta.display(), e))?;
    let mut bed = BufWriter::new(
        File::create(bed_out)
            .with_context(|| format!("could not create {}", bed_out.display()))?,
    );
    let mut fa = BufWriter::new(
        File::create(fasta_out)
            .with_context(|| format!("could not create {}", fasta_out.display()))?,
    );

    let mut stats = GenomeDigestStats::default();
    let mut fragment_id: FragmentId = 0;
    while let Some(result) = reader.next() {
        let record = result.map_err(|e| anyhow!("failed to parse FASTA record: {}", e))?;
        let id = record.id().to_vec();
        let chrom = std::str::from_utf8(&id)
            .map_err(|_| PorecError::MalformedRecord("non-UTF-8 chromosome name".to_string()))?
            .split_ascii_whitespace()
            .next()
            .ok_or_else(|| PorecError::MalformedRecord("empty chromosome name".to_string()))?;
        let seq = record.seq();

        let cut_sites = cutter.cut_sites(&seq);
        let fragments = tile_intervals(&cut_sites, seq.len());
        tracing::debug!(
            chrom,
            length = seq.len(),
            cut_sites = cut_sites.len(),
            fragments = fragments.len(),
            "digested chromosome"
        );
        for (start, end) in fragments {
            writeln!(bed, "{chrom}\t{start}\t{end}\t{fragment_id}")?;
            fa.write_all(b">")?;
            write!(fa, "{chrom}:{start}_{end}")?;
            fa.write_all(b"\n")?;
            fa.write_all(&seq[start..end])?;
            fa.write_all(b"\n")?;
            fragment_id += 1;
            stats.fragments += 1;
        }
        stats.chromosomes += 1;
        stats.bases += seq.len() as u64;
    }
    bed.flush()?;
    fa.flush()?;
    Ok(stats)
}

/// Digest a stream of concatemer reads into monomer FASTQ records.
///
/// Reads are pulled lazily from the inputs in order. When `max_reads` is
/// non-zero the stream short-circuits after that many input reads: the
/// remainder is never pulled from the parser.
pub fn digest_concatemers(
    cutter: &EnzymeCutter,
    inputs: &[impl AsRef<Path>],
    writer: &mut MonomerWriter,
    max_reads: u64,
) -> Result<DigestStats> {
    let mut stats = DigestStats::default();
    'inputs: for path in inputs {
        let path = path.as_ref();
        let mut reader = parse_fastx_file(path)
            .map_err(|e| anyhow!("failed to open {}: {}", path.display(), e))?;
        loop {
            if max_reads > 0 && stats.reads_in >= max_reads {
                break 'inputs;
            }
            let Some(result) = reader.next() else {
                break;
            };
            let record = result.map_err(|e| anyhow!("failed to parse record: {}", e))?;
            let parent = SeqRecord::from_fastx(record.id(), &record.seq(), record.qual())?;
            stats.reads_in += 1;

            let cut_sites = cutter.cut_sites(&parent.seq);
            for monomer in parent.split(&cut_sites)? {
                stats.bases_out += monomer.len() as u64;
                stats.monomers_out += 1;
                writer.write_record(&monomer)?;
            }
        }
        tracing::debug!(input = %path.display(), reads = stats.reads_in, "digested input");
    }
    Ok(stats)
}
