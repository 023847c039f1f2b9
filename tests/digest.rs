//! Cutter and splitter behavior: cut-site scanning, interval tiling,
//! child naming, and provenance tags.
use porec_rs::{tile_intervals, EnzymeCutter, PorecError, SeqRecord, Tag};

// ── helpers ──────────────────────────────────────────────────────────────────

fn read(name: &str, seq: &[u8]) -> SeqRecord {
    let qual = vec![b'I'; seq.len()];
    SeqRecord::unaligned(name, seq.to_vec(), Some(qual), Vec::new()).expect("valid record")
}

// ── cutter ───────────────────────────────────────────────────────────────────

#[test]
fn unknown_enzyme_fails_before_scanning() {
    let err = EnzymeCutter::from_name("NopeI").unwrap_err();
    match err.downcast_ref::<PorecError>() {
        Some(PorecError::UnknownEnzyme(name)) => assert_eq!(name, "NopeI"),
        other => panic!("expected UnknownEnzyme, got {other:?}"),
    }
}

#[test]
fn nlaiii_cuts_after_its_site() {
    // NlaIII: CATG^, so a site starting at 2 cuts at 6.
    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    assert_eq!(cutter.cut_sites(b"AACATGAA"), vec![6]);
}

#[test]
fn cutter_is_case_insensitive() {
    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    assert_eq!(cutter.cut_sites(b"aacatgaa"), vec![6]);
}

#[test]
fn cutter_is_deterministic() {
    let cutter = EnzymeCutter::from_name("DpnII").unwrap();
    let seq = b"GATCAAGATCGGATCATG";
    assert_eq!(cutter.cut_sites(seq), cutter.cut_sites(seq));
}

#[test]
fn adjacent_sites_are_all_found() {
    // DpnII: ^GATC, sites at 0 and 4.
    let cutter = EnzymeCutter::from_name("DpnII").unwrap();
    assert_eq!(cutter.cut_sites(b"GATCGATC"), vec![0, 4]);
}

#[test]
fn degenerate_site_matches_every_middle_base() {
    // HinfI: G^ANTC.
    let cutter = EnzymeCutter::from_name("HinfI").unwrap();
    for middle in [b'A', b'C', b'G', b'T'] {
        let seq = [b'T', b'T', b'G', b'A', middle, b'T', b'C', b'T'];
        assert_eq!(cutter.cut_sites(&seq), vec![3], "middle base {}", middle as char);
    }
}

#[test]
fn degenerate_purine_pyrimidine_classes() {
    // ApoI: R^AATTY.
    let cutter = EnzymeCutter::from_name("ApoI").unwrap();
    assert_eq!(cutter.cut_sites(b"GAATTC"), vec![1]);
    assert_eq!(cutter.cut_sites(b"AAATTT"), vec![1]);
    assert!(cutter.cut_sites(b"CAATTC").is_empty());
}

#[test]
fn no_sites_in_short_sequence() {
    let cutter = EnzymeCutter::from_name("HindIII").unwrap();
    assert!(cutter.cut_sites(b"AAG").is_empty());
}

// ── tiling ───────────────────────────────────────────────────────────────────

#[test]
fn tiling_covers_whole_sequence() {
    // Unsorted with duplicates; bounds must be supplied and intervals must
    // tile [0, len) exactly.
    let intervals = tile_intervals(&[7, 3, 3, 9], 12);
    assert_eq!(intervals, vec![(0, 3), (3, 7), (7, 9), (9, 12)]);
    let mut cursor = 0;
    for (start, end) in &intervals {
        assert_eq!(*start, cursor, "gap or overlap at {start}");
        assert!(end > start);
        cursor = *end;
    }
    assert_eq!(cursor, 12);
}

#[test]
fn boundary_cuts_collapse_into_bounds() {
    assert_eq!(tile_intervals(&[0, 8], 8), vec![(0, 8)]);
    assert_eq!(tile_intervals(&[0, 4], 8), vec![(0, 4), (4, 8)]);
}

#[test]
fn no_cuts_single_interval() {
    assert_eq!(tile_intervals(&[], 10), vec![(0, 10)]);
}

// ── splitter ─────────────────────────────────────────────────────────────────

#[test]
fn split_children_reconstruct_parent() {
    let parent = read("read1", b"ACGTACGTACGT");
    let children = parent.split(&[4, 9]).unwrap();
    assert_eq!(children.len(), 3);
    let rebuilt: Vec<u8> = children.iter().flat_map(|c| c.seq.clone()).collect();
    assert_eq!(rebuilt, parent.seq);
}

#[test]
fn split_at_interior_site() {
    // A cut at 4 yields children covering [0,4) and [4,8).
    let parent = read("read1", b"AACATGAA");
    let children = parent.split(&[4]).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].name, "read1:1_2");
    assert_eq!(children[0].seq, b"AACA");
    assert_eq!(children[1].name, "read1:2_2");
    assert_eq!(children[1].seq, b"TGAA");
}

#[test]
fn no_cut_split_is_a_renamed_passthrough() {
    let parent = read("read1", b"ACGTACGTAC");
    let children = parent.split(&[]).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "read1:1_1");
    assert_eq!(children[0].seq, parent.seq);
    assert_eq!(children[0].qual, parent.qual);
}

#[test]
fn child_names_ascend() {
    let parent = read("mol", b"ACGTACGTACGTACGT");
    let children = parent.split(&[4, 8, 12]).unwrap();
    let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["mol:1_4", "mol:2_4", "mol:3_4", "mol:4_4"]);
}

#[test]
fn children_carry_provenance_tags() {
    let parent = read("read1", b"AACATGAA");
    let children = parent.split(&[6]).unwrap();
    assert_eq!(children[0].parent_name(), Some("read1"));
    assert_eq!(children[0].subread_bounds(), Some((0, 6, 0, 2)));
    assert_eq!(children[1].subread_bounds(), Some((6, 8, 1, 2)));
}

#[test]
fn stale_parent_provenance_is_replaced() {
    let mut parent = read("read1", b"AACATGAA");
    parent.tags.push(Tag::new("MI", "Z", "stale"));
    parent.tags.push(Tag::new("RG", "Z", "sample1"));
    let children = parent.split(&[6]).unwrap();
    assert_eq!(children[0].parent_name(), Some("read1"));
    // Non-modification, non-MI tags pass through.
    assert_eq!(children[0].tag("RG").map(|t| t.value.as_str()), Some("sample1"));
}

#[test]
fn quality_is_sliced_with_sequence() {
    let qual: Vec<u8> = (0..8).map(|i| b'#' + i).collect();
    let parent =
        SeqRecord::unaligned("read1", b"AACATGAA".to_vec(), Some(qual.clone()), Vec::new())
            .unwrap();
    let children = parent.split(&[6]).unwrap();
    assert_eq!(children[0].qual.as_deref(), Some(&qual[..6]));
    assert_eq!(children[1].qual.as_deref(), Some(&qual[6..]));
}

#[test]
fn out_of_range_offset_is_malformed() {
    let parent = read("read1", b"ACGT");
    let err = parent.split(&[9]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::MalformedRecord(_))
    ));
}

#[test]
fn mismatched_quality_is_malformed() {
    let err =
        SeqRecord::unaligned("read1", b"ACGT".to_vec(), Some(b"II".to_vec()), Vec::new())
            .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::MalformedRecord(_))
    ));
}

// ── end to end over the cutter ───────────────────────────────────────────────

#[test]
fn digest_read_with_real_enzyme() {
    let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
    let parent = read("read1", b"AACATGAA");
    let children = parent.split(&cutter.cut_sites(&parent.seq)).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].seq, b"AACATG");
    assert_eq!(children[1].seq, b"AA");
}
