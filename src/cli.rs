use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "porec-rs",
    about = "In-silico restriction digestion and monomer splitting for Pore-C reads",
    version
)]
pub struct Args {
    /// Set logging level to WARN
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Digest a reference genome into restriction fragments
    Index {
        /// Reference genome FASTA
        fasta: PathBuf,

        /// Restriction enzyme name (e.g. NlaIII)
        enzyme: String,

        /// Output prefix [default: {fasta_stem}.porec.{enzyme}]
        #[arg(long, value_name = "PATH")]
        prefix: Option<PathBuf>,

        /// Overwrite existing outputs
        #[arg(long)]
        force: bool,
    },

    /// Digest concatemer reads into monomer FASTQ
    Digest {
        /// Restriction enzyme name (e.g. NlaIII)
        enzyme: String,

        /// Input concatemer FASTQ file(s)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output monomer FASTQ
        #[arg(short = 'o', long = "out", value_name = "FASTQ")]
        output: PathBuf,

        /// Stop after this many input reads (0 = no limit)
        #[arg(long, default_value_t = 0)]
        max_reads: u64,
    },

    /// Group aligned monomers by parent concatemer and derive contacts
    Annotate {
        /// Input BAM with monomer alignments, clustered by parent read
        in_bam: PathBuf,

        /// Output BAM path
        #[arg(short = 'o', long = "out", value_name = "BAM")]
        out_bam: PathBuf,

        /// Optional pairwise contact table (TSV)
        #[arg(long, value_name = "TSV")]
        contacts: Option<PathBuf>,
    },
}
