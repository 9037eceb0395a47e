//! Randomized gap edits never change a read's ungapped basecalls.

use ace_assembly::contig::{ContigBuilder, ReadBuilder};
use ace_assembly::range::Range;
use ace_assembly::sequence::{ungap, Direction, GAP};
use ace_assembly::AceError;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const BASES: &[u8] = b"ACGT";

fn random_bases(rng: &mut SmallRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| BASES[rng.gen_range(0..BASES.len())]).collect()
}

/// A consensus with reads copied from random windows of it.
fn random_builder(rng: &mut SmallRng) -> (ContigBuilder, HashMap<String, Vec<u8>>) {
    let consensus = random_bases(rng, 60);
    let mut builder = ContigBuilder::new("ctg", consensus.clone());
    let mut originals = HashMap::new();
    for i in 0..8 {
        let start = rng.gen_range(0..50);
        let len = rng.gen_range(5..=60 - start);
        let bases = consensus[start..start + len].to_vec();
        let direction = if rng.gen_bool(0.5) {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        let id = format!("read{i}");
        builder
            .add_read(ReadBuilder::untrimmed(id.as_str(), bases.clone(), start, direction))
            .unwrap();
        originals.insert(id, bases);
    }
    (builder, originals)
}

/// `window` with its gaps moved to random positions.
fn relayout(rng: &mut SmallRng, window: &[u8]) -> Vec<u8> {
    let mut bases = ungap(window);
    let gaps = window.len() - bases.len();
    for _ in 0..gaps {
        let at = rng.gen_range(0..=bases.len());
        bases.insert(at, GAP);
    }
    bases
}

fn check_reads(builder: &ContigBuilder, originals: &HashMap<String, Vec<u8>>) {
    for read in builder.reads() {
        assert_eq!(ungap(read.bases()), originals[read.id()], "read {}", read.id());
    }
}

#[test]
fn test_random_edits_preserve_ungapped_reads() {
    for seed in 0..20u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let (mut builder, originals) = random_builder(&mut rng);

        for _ in 0..200 {
            match rng.gen_range(0..3) {
                0 => {
                    let column = rng.gen_range(0..=builder.consensus().len());
                    builder.insert_gap(column).unwrap();
                }
                1 => {
                    let column = rng.gen_range(0..builder.consensus().len());
                    match builder.delete_gap(column) {
                        Ok(()) | Err(AceError::InvalidEdit(_)) => {}
                        Err(e) => panic!("unexpected error {e}"),
                    }
                }
                _ => {
                    let ids: Vec<String> = builder.reads().map(|r| r.id().to_string()).collect();
                    let id = ids.choose(&mut rng).unwrap();
                    let read = builder.read(id).unwrap();
                    let len = rng.gen_range(1..=read.len().min(6));
                    let start = rng.gen_range(0..=read.len() - len);
                    let new_bases = relayout(&mut rng, &read.bases()[start..start + len]);
                    let range = Range::of_length((read.offset() + start) as i64, len);
                    builder.reabacus(id, range, &new_bases).unwrap();
                }
            }
            check_reads(&builder, &originals);
        }

        let contig = builder.build().unwrap();
        assert_eq!(contig.num_reads(), originals.len());
        for read in contig.reads() {
            assert_eq!(ungap(&contig.read_bases(read)), originals[read.id()]);
        }
    }
}

#[test]
fn test_reabacus_rejects_changed_bases() {
    let mut rng = SmallRng::seed_from_u64(7);
    let (mut builder, originals) = random_builder(&mut rng);
    let read = builder.read("read0").unwrap();
    let range = Range::of_length(read.offset() as i64, 3);
    let mut changed = read.bases()[..3].to_vec();
    changed[1] = if changed[1] == b'A' { b'C' } else { b'A' };

    assert!(matches!(
        builder.reabacus("read0", range, &changed),
        Err(AceError::ReabacusMismatch { .. })
    ));
    check_reads(&builder, &originals);
}

#[test]
fn test_delete_gap_undoes_insert_gap() {
    let mut rng = SmallRng::seed_from_u64(11);
    let (mut builder, originals) = random_builder(&mut rng);
    let before = builder.clone();
    builder.insert_gap(17).unwrap();
    builder.delete_gap(17).unwrap();
    assert_eq!(builder.consensus(), before.consensus());
    for (a, b) in builder.reads().zip(before.reads()) {
        assert_eq!(a.bases(), b.bases());
        assert_eq!(a.offset(), b.offset());
    }
    check_reads(&builder, &originals);
}
