//! Modification-data decoding and per-subread re-indexing.
use porec_rs::mods::{decode, encode_subread, ModData, ModKey};
use porec_rs::{PorecError, SeqRecord, Tag};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Parent with C calls at offsets 2 and 7.
/// Sequence: A A C C G A C C G C  → C occurrences at 2, 3, 6, 7, 9.
/// Deltas over occurrences: 2 → 0 skipped, 7 → 2 skipped (3 and 6).
fn modified_read() -> SeqRecord {
    SeqRecord::unaligned(
        "read1",
        b"AACCGACCGC".to_vec(),
        Some(vec![b'I'; 10]),
        vec![
            Tag::new("MM", "Z", "C+m?,0,2;"),
            Tag::new("ML", "B", "C,229,204;"),
        ],
    )
    .unwrap()
}

fn mm_value(record: &SeqRecord) -> &str {
    &record.tag("MM").expect("MM tag").value
}

fn ml_value(record: &SeqRecord) -> &str {
    &record.tag("ML").expect("ML tag").value
}

// ── decode ───────────────────────────────────────────────────────────────────

#[test]
fn record_without_mod_tags_decodes_to_none() {
    let read =
        SeqRecord::unaligned("read1", b"ACGT".to_vec(), None, Vec::new()).unwrap();
    assert!(!read.has_mod_tags());
    assert!(decode("read1", &read.seq, &read.tags).unwrap().is_none());
}

#[test]
fn decode_recovers_absolute_offsets() {
    let read = modified_read();
    assert!(read.has_mod_tags());
    let mods = decode("read1", &read.seq, &read.tags).unwrap().unwrap();
    assert_eq!(mods.keys.len(), 1);
    let (key, calls) = &mods.keys[0];
    assert_eq!(key.canonical, b'C');
    assert_eq!(key.strand, 0);
    assert_eq!(key.code, "m");
    assert_eq!(key.skip, Some('?'));
    assert_eq!(calls, &vec![(2, 229), (7, 204)]);
}

#[test]
fn decode_flat_ml_across_keys() {
    // Aligner-passthrough layout: one flat array distributed by delta count.
    let seq = b"CA".to_vec();
    let tags = vec![
        Tag::new("MM", "Z", "C+m,0;A+a,0;"),
        Tag::new("ML", "B", "C,200,100"),
    ];
    let mods = decode("read1", &seq, &tags).unwrap().unwrap();
    assert_eq!(mods.keys[0].1, vec![(0, 200)]);
    assert_eq!(mods.keys[1].1, vec![(1, 100)]);
}

#[test]
fn mm_without_ml_is_malformed() {
    let tags = vec![Tag::new("MM", "Z", "C+m,0;")];
    let err = decode("read1", b"CC", &tags).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::MalformedRecord(_))
    ));
}

#[test]
fn delta_probability_count_mismatch_is_fatal() {
    let tags = vec![
        Tag::new("MM", "Z", "C+m,0,0;A+a,0;"),
        Tag::new("ML", "B", "C,200;A,100;"),
    ];
    let err = decode("read1", b"CCCA", &tags).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::ModificationEncodingMismatch { .. })
    ));
}

#[test]
fn truncated_flat_ml_is_malformed() {
    let tags = vec![
        Tag::new("MM", "Z", "C+m,0,0;"),
        Tag::new("ML", "B", "C,200"),
    ];
    let err = decode("read1", b"CCC", &tags).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::MalformedRecord(_))
    ));
}

// ── re-indexing through split ────────────────────────────────────────────────

#[test]
fn split_reindexes_calls_per_child() {
    let children = modified_read().split(&[5]).unwrap();
    assert_eq!(children.len(), 2);

    // Child 1 covers [0,5) = AACCG: keeps the offset-2 call, delta counts
    // from the child's own start.
    assert_eq!(mm_value(&children[0]), "C+m?,0;");
    assert_eq!(ml_value(&children[0]), "C,229;");

    // Child 2 covers [5,10) = ACCGC: keeps the offset-7 call, re-indexed to
    // one skipped C occurrence (parent offset 6) before it.
    assert_eq!(mm_value(&children[1]), "C+m?,1;");
    assert_eq!(ml_value(&children[1]), "C,204;");
}

#[test]
fn child_without_calls_still_carries_empty_mod_tags() {
    // Both calls fall in the first child; the second is digested from a
    // modification-bearing parent and keeps the (empty) tag pair.
    let children = modified_read().split(&[8]).unwrap();
    assert_eq!(mm_value(&children[0]), "C+m?,0,2;");
    assert_eq!(ml_value(&children[0]), "C,229,204;");
    assert_eq!(mm_value(&children[1]), "");
    assert_eq!(ml_value(&children[1]), "");
}

#[test]
fn parent_mod_tags_do_not_leak_into_children() {
    let children = modified_read().split(&[5]).unwrap();
    for child in &children {
        let mm_tags = child.tags.iter().filter(|t| t.key == "MM").count();
        let ml_tags = child.tags.iter().filter(|t| t.key == "ML").count();
        assert_eq!((mm_tags, ml_tags), (1, 1), "exactly one re-sliced pair");
    }
}

#[test]
fn round_trip_decode_of_child_tags() {
    let children = modified_read().split(&[5]).unwrap();
    let child = &children[1];
    let mods = decode(&child.name, &child.seq, &child.tags).unwrap().unwrap();
    // Offset 7 in the parent is offset 2 in child [5,10).
    assert_eq!(mods.keys[0].1, vec![(2, 204)]);
}

#[test]
fn keys_without_calls_in_child_are_omitted() {
    // C call at 0 (child 1 only), A call at 5 (child 2 only).
    let read = SeqRecord::unaligned(
        "read1",
        b"CTTTTATTTT".to_vec(),
        Some(vec![b'I'; 10]),
        vec![
            Tag::new("MM", "Z", "C+m,0;A+a,0;"),
            Tag::new("ML", "B", "C,229;A,204;"),
        ],
    )
    .unwrap();
    let children = read.split(&[5]).unwrap();
    assert_eq!(mm_value(&children[0]), "C+m,0;");
    assert_eq!(ml_value(&children[0]), "C,229;");
    assert_eq!(mm_value(&children[1]), "A+a,0;");
    assert_eq!(ml_value(&children[1]), "A,204;");
}

#[test]
fn minus_strand_flag_emits_minus_sign() {
    let mods = ModData {
        keys: vec![(
            ModKey {
                canonical: b'C',
                strand: 1,
                code: "m".to_string(),
                skip: None,
            },
            vec![(0, 42)],
        )],
    };
    let (mm, ml) = encode_subread("read1", &mods, b"CAT", 0, 3).unwrap();
    assert_eq!(mm.value, "C-m,0;");
    assert_eq!(ml.value, "C,42;");
}

#[test]
fn call_not_on_canonical_base_is_a_defect() {
    // Offset 0 is an A, so the delta walk can never account for the call.
    let mods = ModData {
        keys: vec![(
            ModKey {
                canonical: b'C',
                strand: 0,
                code: "m".to_string(),
                skip: None,
            },
            vec![(0, 42)],
        )],
    };
    let err = encode_subread("read1", &mods, b"ACT", 0, 3).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::ModificationEncodingMismatch { .. })
    ));
}
