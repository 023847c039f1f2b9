//! End-to-end digestion over temp files: FASTQ in, monomer FASTQ out, and
//! genome FASTA in, coordinate table + cut-reference FASTA out.
use porec_rs::digest::{digest_concatemers, digest_genome, MonomerWriter};
use porec_rs::{EnzymeCutter, PorecError};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::tempdir;

// ── helpers ──────────────────────────────────────────────────────────────────

fn write_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut fh = fs::File::create(&path).unwrap();
    write!(fh, "{content}").unwrap();
    path
}

// ── concatemer digestion ─────────────────────────────────────────────────────

#[test]
fn concatemer_fastq_round_trip() {
    let dir = tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "reads.fastq",
        "@r1\nAACATGAA\n+\nIIIIIIII\n@r2\nTTTT\n+\nIIII\n",
    );
    let output = dir.path().join("monomers.fastq");

    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let mut writer = MonomerWriter::create(&output).unwrap();
    let stats = digest_concatemers(&cutter, &[input], &mut writer, 0).unwrap();
    let (monomers, bases) = writer.finish().unwrap();

    assert_eq!(stats.reads_in, 2);
    assert_eq!(monomers, 3);
    assert_eq!(bases, 12);

    let expected = "\
@r1:1_2 MI:Z:r1\tXc:B:i,0,6,0,2
AACATG
+
IIIIII
@r1:2_2 MI:Z:r1\tXc:B:i,6,8,1,2
AA
+
II
@r2:1_1 MI:Z:r2\tXc:B:i,0,4,0,1
TTTT
+
IIII
";
    assert_eq!(fs::read_to_string(&output).unwrap(), expected);
}

#[test]
fn max_reads_short_circuits_the_stream() {
    let dir = tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "reads.fastq",
        "@r1\nAACATGAA\n+\nIIIIIIII\n@r2\nTTTT\n+\nIIII\n",
    );
    let output = dir.path().join("monomers.fastq");

    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let mut writer = MonomerWriter::create(&output).unwrap();
    let stats = digest_concatemers(&cutter, &[input], &mut writer, 1).unwrap();
    writer.finish().unwrap();

    assert_eq!(stats.reads_in, 1);
    assert_eq!(stats.monomers_out, 2);
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("@r1:1_2"));
    assert!(!text.contains("@r2"));
}

#[test]
fn inputs_are_consumed_in_order() {
    let dir = tempdir().unwrap();
    let first = write_file(dir.path(), "a.fastq", "@r1\nTTTT\n+\nIIII\n");
    let second = write_file(dir.path(), "b.fastq", "@r2\nGGGG\n+\nIIII\n");
    let output = dir.path().join("monomers.fastq");

    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let mut writer = MonomerWriter::create(&output).unwrap();
    digest_concatemers(&cutter, &[first, second], &mut writer, 0).unwrap();
    writer.finish().unwrap();

    let text = fs::read_to_string(&output).unwrap();
    let r1_at = text.find("@r1:1_1").unwrap();
    let r2_at = text.find("@r2:1_1").unwrap();
    assert!(r1_at < r2_at);
}

#[test]
fn quality_less_input_cannot_be_written_as_fastq() {
    // FASTA input parses, but the FASTQ sink requires quality data.
    let dir = tempdir().unwrap();
    let input = write_file(dir.path(), "reads.fasta", ">r1\nAACATGAA\n");
    let output = dir.path().join("monomers.fastq");

    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let mut writer = MonomerWriter::create(&output).unwrap();
    let err = digest_concatemers(&cutter, &[input], &mut writer, 0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::MissingQuality(_))
    ));
}

#[test]
fn fastq_comment_tags_survive_digestion() {
    let dir = tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "reads.fastq",
        "@r1 RG:Z:sample1 ignored-token\nTTTT\n+\nIIII\n",
    );
    let output = dir.path().join("monomers.fastq");

    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let mut writer = MonomerWriter::create(&output).unwrap();
    digest_concatemers(&cutter, &[input], &mut writer, 0).unwrap();
    writer.finish().unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert_eq!(
        text,
        "@r1:1_1 RG:Z:sample1\tMI:Z:r1\tXc:B:i,0,4,0,1\nTTTT\n+\nIIII\n"
    );
}

// ── genome digestion ─────────────────────────────────────────────────────────

#[test]
fn genome_digest_writes_table_and_cut_reference() {
    let dir = tempdir().unwrap();
    let fasta = write_file(
        dir.path(),
        "genome.fasta",
        ">chr1 assembled\nAACATGAA\n>chr2\nTTTT\n",
    );
    let bed_out = dir.path().join("genome.porec.NlaIII.bed");
    let fasta_out = dir.path().join("genome.porec.NlaIII.fasta");

    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let stats = digest_genome(&cutter, &fasta, &bed_out, &fasta_out).unwrap();

    assert_eq!(stats.chromosomes, 2);
    assert_eq!(stats.fragments, 3);
    assert_eq!(stats.bases, 12);

    let bed = fs::read_to_string(&bed_out).unwrap();
    assert_eq!(bed, "chr1\t0\t6\t0\nchr1\t6\t8\t1\nchr2\t0\t4\t2\n");
    // One coordinate row per cut-reference record, in the same order.
    let fa = fs::read_to_string(&fasta_out).unwrap();
    assert_eq!(fa, ">chr1:0_6\nAACATG\n>chr1:6_8\nAA\n>chr2:0_4\nTTTT\n");
}

#[test]
fn uncut_genome_is_one_fragment_per_chromosome() {
    let dir = tempdir().unwrap();
    let fasta = write_file(dir.path(), "genome.fasta", ">chr1\nTTTTTTTTTT\n");
    let bed_out = dir.path().join("out.bed");
    let fasta_out = dir.path().join("out.fasta");

    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let stats = digest_genome(&cutter, &fasta, &bed_out, &fasta_out).unwrap();
    assert_eq!(stats.fragments, 1);
    assert_eq!(
        fs::read_to_string(&bed_out).unwrap(),
        "chr1\t0\t10\t0\n"
    );
}
