//! Grouping of aligned monomer records by parent concatemer.
use porec_rs::{derive_contacts, MonomerGroups, PorecError, SeqRecord, Tag};

// ── helpers ──────────────────────────────────────────────────────────────────

fn monomer(
    parent: &str,
    idx: u32,
    total: u32,
    start: u32,
    end: u32,
    mapped: Option<(&str, u32)>,
) -> SeqRecord {
    let name = format!("{parent}:{}_{total}", idx + 1);
    let len = (end - start) as usize;
    let tags = vec![
        Tag::new("MI", "Z", parent),
        Tag::new("Xc", "B", &format!("i,{start},{end},{idx},{total}")),
    ];
    let mut record =
        SeqRecord::unaligned(name, vec![b'A'; len], Some(vec![b'I'; len]), tags).unwrap();
    if let Some((ref_name, pos)) = mapped {
        record.flags = 0;
        record.ref_name = Some(ref_name.to_string());
        record.ref_pos = Some(pos);
    }
    record
}

fn groups_of(
    records: Vec<SeqRecord>,
) -> Vec<anyhow::Result<(String, Vec<SeqRecord>)>> {
    MonomerGroups::new(records.into_iter().map(Ok)).collect()
}

// ── grouping ─────────────────────────────────────────────────────────────────

#[test]
fn clustered_records_group_by_parent() {
    let results = groups_of(vec![
        monomer("read1", 0, 2, 0, 500, None),
        monomer("read1", 1, 2, 500, 900, None),
        monomer("read2", 0, 1, 0, 700, None),
    ]);
    assert_eq!(results.len(), 2);
    let (name1, group1) = results[0].as_ref().unwrap();
    assert_eq!(name1, "read1");
    assert_eq!(group1.len(), 2);
    let (name2, group2) = results[1].as_ref().unwrap();
    assert_eq!(name2, "read2");
    assert_eq!(group2.len(), 1);
}

#[test]
fn group_is_reordered_by_parent_offset() {
    // Alignment output need not preserve subread order within a name group.
    let results = groups_of(vec![
        monomer("read1", 2, 3, 800, 900, None),
        monomer("read1", 0, 3, 0, 500, None),
        monomer("read1", 1, 3, 500, 800, None),
    ]);
    let (_, group) = results[0].as_ref().unwrap();
    let names: Vec<&str> = group.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["read1:1_3", "read1:2_3", "read1:3_3"]);
}

#[test]
fn reopened_group_is_an_ordering_violation() {
    let results = groups_of(vec![
        monomer("read1", 0, 2, 0, 500, None),
        monomer("read1", 1, 2, 500, 900, None),
        monomer("read2", 0, 1, 0, 700, None),
        monomer("read1", 0, 2, 0, 500, None),
    ]);
    // read1 closes when read2 opens; its reappearance must abort the stream.
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    match err.downcast_ref::<PorecError>() {
        Some(PorecError::OrderingViolation { parent }) => assert_eq!(parent, "read1"),
        other => panic!("expected OrderingViolation, got {other:?}"),
    }
}

#[test]
fn record_without_provenance_is_malformed() {
    let mut record = monomer("read1", 0, 1, 0, 100, None);
    record.tags.retain(|t| t.key != "MI");
    let results = groups_of(vec![record]);
    let err = results[0].as_ref().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PorecError>(),
        Some(PorecError::MalformedRecord(_))
    ));
}

#[test]
fn record_without_offsets_is_malformed() {
    let mut record = monomer("read1", 0, 1, 0, 100, None);
    record.tags.retain(|t| t.key != "Xc");
    let results = groups_of(vec![record]);
    assert!(results[0].is_err());
}

#[test]
fn empty_stream_yields_no_groups() {
    let results = groups_of(Vec::new());
    assert!(results.is_empty());
}

// ── contacts ─────────────────────────────────────────────────────────────────

#[test]
fn contacts_are_all_mapped_pairs() {
    let group = vec![
        monomer("read1", 0, 3, 0, 500, Some(("chr1", 100))),
        monomer("read1", 1, 3, 500, 800, Some(("chr2", 9000))),
        monomer("read1", 2, 3, 800, 900, Some(("chr1", 44))),
    ];
    let contacts = derive_contacts("read1", &group);
    assert_eq!(contacts.len(), 3);
    assert_eq!(contacts[0].ref1, "chr1");
    assert_eq!(contacts[0].pos1, 100);
    assert_eq!(contacts[0].ref2, "chr2");
    assert_eq!(contacts[0].pos2, 9000);
    assert_eq!(contacts[2].ref1, "chr2");
    assert_eq!(contacts[2].ref2, "chr1");
}

#[test]
fn unmapped_monomers_join_no_contacts() {
    let group = vec![
        monomer("read1", 0, 3, 0, 500, Some(("chr1", 100))),
        monomer("read1", 1, 3, 500, 800, None),
        monomer("read1", 2, 3, 800, 900, Some(("chr1", 44))),
    ];
    let contacts = derive_contacts("read1", &group);
    assert_eq!(contacts.len(), 1);
    assert_eq!((contacts[0].pos1, contacts[0].pos2), (100, 44));
}

#[test]
fn single_monomer_group_has_no_contacts() {
    let group = vec![monomer("read1", 0, 1, 0, 500, Some(("chr1", 100)))];
    assert!(derive_contacts("read1", &group).is_empty());
}
