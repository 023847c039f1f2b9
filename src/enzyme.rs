//! Restriction-enzyme cut-site scanning.
//!
//! An [`EnzymeCutter`] is built once from a name lookup against the enzyme
//! registry and then reused across many sequences. Scanning is a pure
//! function over bytes: the same sequence always yields the same sorted,
//! deduplicated list of cut offsets.

use crate::error::PorecError;
use anyhow::Result;
use memchr::memmem;

/// Recognition sites are IUPAC DNA, uppercase. The cut offset is measured
/// from the start of the recognition site on the forward strand.
struct EnzymeSpec {
    name: &'static str,
    site: &'static [u8],
    cut_offset: usize,
}

/// Registry of supported enzymes. Unknown names fail construction before any
/// scanning occurs.
const ENZYMES: &[EnzymeSpec] = &[
    EnzymeSpec { name: "NlaIII", site: b"CATG", cut_offset: 4 },
    EnzymeSpec { name: "DpnII", site: b"GATC", cut_offset: 0 },
    EnzymeSpec { name: "MboI", site: b"GATC", cut_offset: 0 },
    EnzymeSpec { name: "Csp6I", site: b"GTAC", cut_offset: 1 },
    EnzymeSpec { name: "HindIII", site: b"AAGCTT", cut_offset: 1 },
    EnzymeSpec { name: "EcoRI", site: b"GAATTC", cut_offset: 1 },
    EnzymeSpec { name: "NcoI", site: b"CCATGG", cut_offset: 1 },
    EnzymeSpec { name: "HinfI", site: b"GANTC", cut_offset: 1 },
    EnzymeSpec { name: "ApoI", site: b"RAATTY", cut_offset: 1 },
];

/// Check if a single subject base matches an IUPAC degenerate code.
fn iupac_matches(code: u8, base: u8) -> bool {
    match code {
        b'A' => base == b'A',
        b'C' => base == b'C',
        b'G' => base == b'G',
        b'T' => base == b'T',
        b'R' => matches!(base, b'A' | b'G'),
        b'Y' => matches!(base, b'C' | b'T'),
        b'M' => matches!(base, b'A' | b'C'),
        b'K' => matches!(base, b'G' | b'T'),
        b'S' => matches!(base, b'G' | b'C'),
        b'W' => matches!(base, b'A' | b'T'),
        b'H' => matches!(base, b'A' | b'C' | b'T'),
        b'B' => matches!(base, b'C' | b'G' | b'T'),
        b'V' => matches!(base, b'A' | b'C' | b'G'),
        b'D' => matches!(base, b'A' | b'G' | b'T'),
        b'N' => matches!(base, b'A' | b'C' | b'G' | b'T'),
        _ => false,
    }
}

/// Locates restriction cut sites in arbitrary sequences.
#[derive(Debug, Clone)]
pub struct EnzymeCutter {
    name: String,
    site: Vec<u8>,
    cut_offset: usize,
    degenerate: bool,
}

impl EnzymeCutter {
    /// Look the enzyme up in the registry.
    pub fn from_name(name: &str) -> Result<Self> {
        let spec = ENZYMES
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PorecError::UnknownEnzyme(name.to_string()))?;
        Ok(Self {
            name: spec.name.to_string(),
            site: spec.site.to_vec(),
            cut_offset: spec.cut_offset,
            degenerate: spec.site.iter().any(|b| !matches!(b, b'A' | b'C' | b'G' | b'T')),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn recognition_site(&self) -> &[u8] {
        &self.site
    }

    /// All cut positions in `seq`, sorted ascending and deduplicated.
    ///
    /// Matching is case-insensitive over the subject sequence and considers
    /// overlapping occurrences of the recognition site. An empty result is
    /// valid: the splitter then passes the sequence through as one interval.
    pub fn cut_sites(&self, seq: &[u8]) -> Vec<usize> {
        if seq.len() < self.site.len() {
            return Vec::new();
        }
        let hay = seq.to_ascii_uppercase();
        let mut sites = if self.degenerate {
            self.scan_iupac(&hay)
        } else {
            self.scan_exact(&hay)
        };
        sites.sort_unstable();
        sites.dedup();
        sites
    }

    /// Fixed-site scan via memmem, re-searching from `match + 1` so that
    /// overlapping occurrences are not lost.
    fn scan_exact(&self, hay: &[u8]) -> Vec<usize> {
        let finder = memmem::Finder::new(&self.site);
        let mut sites = Vec::new();
        let mut from = 0usize;
        while let Some(pos) = finder.find(&hay[from..]) {
            let at = from + pos;
            sites.push(at + self.cut_offset);
            from = at + 1;
        }
        sites
    }

    fn scan_iupac(&self, hay: &[u8]) -> Vec<usize> {
        let site_len = self.site.len();
        let mut sites = Vec::new();
        for i in 0..=hay.len() - site_len {
            let matched = self
                .site
                .iter()
                .zip(&hay[i..i + site_len])
                .all(|(&code, &base)| iupac_matches(code, base));
            if matched {
                sites.push(i + self.cut_offset);
            }
        }
        sites
    }
}
