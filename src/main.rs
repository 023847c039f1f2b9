use anyhow::{bail, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use porec_rs::{annotate, cli, digest, EnzymeCutter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        cli::Command::Index {
            fasta,
            enzyme,
            prefix,
            force,
        } => run_index(&fasta, &enzyme, prefix, force),
        cli::Command::Digest {
            enzyme,
            inputs,
            output,
            max_reads,
        } => run_digest(&enzyme, &inputs, &output, max_reads),
        cli::Command::Annotate {
            in_bam,
            out_bam,
            contacts,
        } => run_annotate(&in_bam, &out_bam, contacts.as_deref()),
    }
}

fn run_index(fasta: &Path, enzyme: &str, prefix: Option<PathBuf>, force: bool) -> Result<()> {
    let cutter = EnzymeCutter::from_name(enzyme)?;
    let prefix = prefix.unwrap_or_else(|| {
        let stem = fasta.file_stem().unwrap_or_default().to_string_lossy();
        fasta.with_file_name(format!("{stem}.porec.{enzyme}"))
    });
    let bed_out = PathBuf::from(format!("{}.bed", prefix.display()));
    let fasta_out = PathBuf::from(format!("{}.fasta", prefix.display()));
    if !force && (bed_out.exists() || fasta_out.exists()) {
        bail!("some of the outputs already exist, remove them or pass --force");
    }
    let stats = digest::digest_genome(&cutter, fasta, &bed_out, &fasta_out)?;
    tracing::info!(
        chromosomes = stats.chromosomes,
        fragments = stats.fragments,
        bases = stats.bases,
        bed = %bed_out.display(),
        fasta = %fasta_out.display(),
        "genome digestion complete"
    );
    Ok(())
}

fn run_digest(enzyme: &str, inputs: &[PathBuf], output: &Path, max_reads: u64) -> Result<()> {
    let cutter = EnzymeCutter::from_name(enzyme)?;
    tracing::info!(enzyme = cutter.name(), inputs = inputs.len(), "digesting concatemers");
    let mut writer = digest::MonomerWriter::create(output)?;
    let stats = digest::digest_concatemers(&cutter, inputs, &mut writer, max_reads)?;
    let (reads, bases) = writer.finish()?;
    tracing::info!(
        reads_in = stats.reads_in,
        monomers = reads,
        bases,
        output = %output.display(),
        "concatemer digestion complete"
    );
    Ok(())
}

fn run_annotate(in_bam: &Path, out_bam: &Path, contacts: Option<&Path>) -> Result<()> {
    tracing::info!(input = %in_bam.display(), "processing monomer alignments");
    let stats = annotate::run(in_bam, out_bam, contacts)?;
    tracing::info!(
        total_records = stats.total_records,
        unmapped_records = stats.unmapped_records,
        read_groups = stats.read_groups,
        contacts = stats.contacts,
        "annotation complete"
    );
    Ok(())
}
