//! porec-rs: in-silico restriction digestion and monomer splitting for
//! Pore-C concatemer reads.
//!
//! # Library usage
//!
//! ```no_run
//! use porec_rs::{EnzymeCutter, SeqRecord};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cutter = EnzymeCutter::from_name("NlaIII")?;
//! let read = SeqRecord::unaligned(
//!     "read1",
//!     b"AACATGAA".to_vec(),
//!     Some(b"IIIIIIII".to_vec()),
//!     Vec::new(),
//! )?;
//! let monomers = read.split(&cutter.cut_sites(&read.seq))?;
//! for monomer in &monomers {
//!     print!("{}", monomer.to_fastq(true)?);
//! }
//! # Ok(())
//! # }
//! ```

// Internal plumbing.
pub(crate) mod types;

// Public modules: stable API surface.
pub mod annotate;
pub mod bam_input;
pub mod cli;
pub mod digest;
pub mod enzyme;
pub mod error;
pub mod header;
pub mod model;
pub mod mods;

// Flat re-exports for the most commonly used types.
pub use annotate::{derive_contacts, Contact, MonomerGroups};
pub use enzyme::EnzymeCutter;
pub use error::PorecError;
pub use model::{tile_intervals, SeqRecord, Tag};
pub use mods::{ModData, ModKey};
