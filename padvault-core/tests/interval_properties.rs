#![allow(missing_docs)]
use padvault_core::{Atom, Error, Interval};
use proptest::prelude::*;

/// One unit atom per set bit.
fn from_bits(bits: &[bool]) -> Interval {
    let atoms = bits
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .map(|(i, _)| Atom::new(i as u64, 1));
    Interval::from_atoms(atoms).expect("unit atoms never overlap")
}

fn covered(interval: &Interval, len: usize) -> Vec<bool> {
    let mut bits = vec![false; len];
    for atom in interval.iter_interior() {
        for offset in atom.start..atom.end() {
            bits[offset as usize] = true;
        }
    }
    bits
}

const PIECES: usize = 5;

/// Splits the set bits among `PIECES` disjoint intervals by owner.
fn split(owners: &[Option<usize>]) -> Vec<Interval> {
    (0..PIECES)
        .map(|piece| {
            let bits: Vec<bool> = owners.iter().map(|owner| *owner == Some(piece)).collect();
            from_bits(&bits)
        })
        .collect()
}

/// Unions adjacent pairs until one interval is left.
fn union_pairwise(mut pieces: Vec<Interval>) -> Interval {
    while pieces.len() > 1 {
        pieces = pieces
            .chunks(2)
            .map(|pair| match pair {
                [a, b] => a.union(b).expect("pieces are disjoint"),
                [a] => a.clone(),
                _ => unreachable!(),
            })
            .collect();
    }
    pieces.pop().unwrap_or_default()
}

proptest! {
    #[test]
    fn canonical_form(bits in prop::collection::vec(any::<bool>(), 0..64)) {
        let interval = from_bits(&bits);
        prop_assert_eq!(interval.len(), bits.iter().filter(|b| **b).count() as u64);
        prop_assert_eq!(covered(&interval, bits.len()), bits);
        for pair in interval.to_atoms().windows(2) {
            // Sorted, disjoint and never touching.
            prop_assert!(pair[0].end() < pair[1].start);
        }
        prop_assert!(interval.to_atoms().iter().all(|atom| atom.len > 0));
    }

    #[test]
    fn order_of_atoms_does_not_matter(bits in prop::collection::vec(any::<bool>(), 0..64)) {
        let forward = from_bits(&bits);
        let backward = Interval::from_atoms(forward.to_atoms().iter().rev().copied())
            .expect("canonical atoms never overlap");
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn interior_and_exterior_partition(bits in prop::collection::vec(any::<bool>(), 1..64)) {
        let interval = from_bits(&bits);
        let total = bits.len() as u64;
        let exterior = Interval::from_atoms(
            interval.iter_exterior(Some(total)).expect("total covers interval"),
        )
        .expect("gaps never overlap");
        prop_assert_eq!(
            interval.union(&exterior).expect("gaps are disjoint from interval"),
            Interval::from_atom(0, total)
        );
    }

    #[test]
    fn union_matches_bitwise_or(
        pairs in prop::collection::vec((any::<bool>(), any::<bool>()), 0..64)
    ) {
        let a: Vec<bool> = pairs.iter().map(|(x, _)| *x).collect();
        let b: Vec<bool> = pairs.iter().map(|(x, y)| *y && !*x).collect();
        let merged = from_bits(&a).union(&from_bits(&b)).expect("disjoint by construction");
        let expected: Vec<bool> = a.iter().zip(&b).map(|(x, y)| *x || *y).collect();
        prop_assert_eq!(covered(&merged, pairs.len()), expected);
        prop_assert_eq!(merged.len(), from_bits(&a).len() + from_bits(&b).len());
        let swapped = from_bits(&b).union(&from_bits(&a)).expect("disjoint by construction");
        prop_assert_eq!(merged, swapped);
    }

    #[test]
    fn union_with_shared_offset_fails(
        bits in prop::collection::vec(any::<bool>(), 1..64),
        pick in any::<prop::sample::Index>(),
    ) {
        let interval = from_bits(&bits);
        prop_assume!(!interval.is_empty());
        let atoms = interval.to_atoms();
        let atom = atoms[pick.index(atoms.len())];
        let overlap = Interval::from_atom(atom.start, 1);
        let is_overlap_err = matches!(interval.union(&overlap), Err(Error::Overlap { .. }));
        prop_assert!(is_overlap_err);
    }

    #[test]
    fn union_of_many_pieces_ignores_order_and_grouping(
        owners in prop::collection::vec(prop::option::of(0..PIECES), 0..64),
        order in Just((0..PIECES).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let bits: Vec<bool> = owners.iter().map(Option::is_some).collect();
        let expected = from_bits(&bits);
        let pieces = split(&owners);
        let shuffled: Vec<Interval> = order.iter().map(|i| pieces[*i].clone()).collect();

        let left = shuffled
            .iter()
            .fold(Interval::empty(), |acc, piece| acc.union(piece).expect("pieces are disjoint"));
        let right = shuffled
            .iter()
            .rev()
            .fold(Interval::empty(), |acc, piece| piece.union(&acc).expect("pieces are disjoint"));
        prop_assert_eq!(&left, &expected);
        prop_assert_eq!(&right, &expected);
        prop_assert_eq!(union_pairwise(shuffled), expected.clone());
        prop_assert_eq!(union_pairwise(pieces), expected);
    }
}
