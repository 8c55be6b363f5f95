use super::node::{Children, Node};
use super::*;

use std::collections::HashMap;

use proptest::prelude::*;

/// Keys congruent to each other modulo every level modulus follow identical
/// routing at all nine levels.
const ALL_LEVELS_STRIDE: u64 = 31 * 29 * 23 * 19 * 17 * 13 * 11 * 7 * 5;

/// Walk the whole tree and assert its structural invariants:
///
/// - every node's hash code reproduces the residue path that reaches it;
/// - dense child arrays are exactly as wide as their level's modulus, with
///   each occupant on its own residue slot;
/// - sparse children occupy pairwise-distinct residue slots;
/// - overflow chains are flat and never dense;
/// - the number of reachable values matches `len()`.
fn validate_tree<V>(t: &HashTree<V>) {
    assert_eq!(t.head.len() as u64, t.root_modulus);

    let mut entries = 0usize;
    let mut path: Vec<(u64, u64)> = Vec::new();
    for (slot, node) in t.head.iter().enumerate() {
        let Some(node) = node else { continue };
        path.push((t.root_modulus, slot as u64));
        walk(node, 1, &mut path, &mut entries);
        path.pop();
    }
    assert_eq!(entries, t.len(), "reachable values must match len()");
}

fn walk<V>(node: &Node<V>, level: usize, path: &mut Vec<(u64, u64)>, entries: &mut usize) {
    for &(modulus, slot) in path.iter() {
        assert_eq!(
            node.hashcode % modulus,
            slot,
            "hashcode {:#x} inconsistent with its routing path",
            node.hashcode,
        );
    }
    if node.data.is_some() {
        *entries += 1;
    }

    if level == MAX_LEVELS {
        let Children::Sparse(chain) = &node.children else {
            panic!("dense children past the deepest level");
        };
        for entry in chain {
            for &(modulus, slot) in path.iter() {
                assert_eq!(
                    entry.hashcode % modulus,
                    slot,
                    "chained hashcode {:#x} inconsistent with its routing path",
                    entry.hashcode,
                );
            }
            assert!(entry.is_childless(), "chain entries must be flat");
            if entry.data.is_some() {
                *entries += 1;
            }
        }
        return;
    }

    let modulus = LEVEL_PRIMES[level - 1];
    match &node.children {
        Children::Sparse(list) => {
            for (i, a) in list.iter().enumerate() {
                for b in &list[..i] {
                    assert_ne!(
                        a.hashcode % modulus,
                        b.hashcode % modulus,
                        "sparse children must occupy distinct slots",
                    );
                }
            }
            for child in list {
                path.push((modulus, child.hashcode % modulus));
                walk(child, level + 1, path, entries);
                path.pop();
            }
        }
        Children::Dense(slots) => {
            assert_eq!(
                slots.len() as u64,
                modulus,
                "dense width must match the level modulus",
            );
            for (slot, child) in slots.iter().enumerate() {
                let Some(child) = child else { continue };
                assert_eq!(
                    (child.hashcode % modulus) as usize,
                    slot,
                    "dense child off its residue slot",
                );
                path.push((modulus, slot as u64));
                walk(child, level + 1, path, entries);
                path.pop();
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u64, u64),
    Erase(u64),
    Count(u64),
}

/// Mix uniform codes with residue-colliding families so representation
/// switches, deep descents, and overflow chains all get exercised.
fn key_strategy() -> impl Strategy<Value = u64> + Clone {
    prop_oneof![
        3 => any::<u64>(),
        3 => (0u64..512).prop_map(|k| k * 31 + 7),
        2 => (0u64..64).prop_map(|k| k * (31 * 29 * 23) + 5),
        1 => (0u64..16).prop_map(|k| k * ALL_LEVELS_STRIDE + 3),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        5 => (key.clone(), any::<u64>()).prop_map(|(h, v)| Op::Insert(h, v)),
        3 => key.clone().prop_map(Op::Erase),
        2 => key.prop_map(Op::Count),
    ];
    prop::collection::vec(op, 0..=1500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalent_to_hashmap(ops in ops_strategy()) {
        let mut t: HashTree<u64> = HashTree::new();
        let mut m: HashMap<u64, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(h, v) => {
                    let fresh = !m.contains_key(&h);
                    prop_assert_eq!(t.insert(h, v), fresh);
                    m.entry(h).or_insert(v);
                }
                Op::Erase(h) => {
                    prop_assert_eq!(t.erase(h), m.remove(&h));
                }
                Op::Count(h) => {
                    prop_assert_eq!(t.count(h), usize::from(m.contains_key(&h)));
                    prop_assert_eq!(t.get(h), m.get(&h));
                }
            }
            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);

        let mut got: Vec<(u64, u64)> = t.iter().map(|(h, v)| (h, *v)).collect();
        let mut expected: Vec<(u64, u64)> = m.iter().map(|(h, v)| (*h, *v)).collect();
        got.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_erase_everything_empties_the_tree(
        keys in prop::collection::hash_set(key_strategy(), 0..400),
    ) {
        let mut t: HashTree<u64> = HashTree::new();
        for &h in &keys {
            prop_assert!(t.insert(h, h ^ 0x5a5a));
        }
        prop_assert_eq!(t.len(), keys.len());
        validate_tree(&t);

        for &h in &keys {
            prop_assert_eq!(t.erase(h), Some(h ^ 0x5a5a));
        }
        prop_assert!(t.is_empty());
        prop_assert_eq!(t.stats(), TreeStats::default());
        validate_tree(&t);
    }

    #[test]
    fn prop_clear_then_reuse(keys in prop::collection::hash_set(key_strategy(), 0..200)) {
        let mut t: HashTree<u64> = HashTree::new();
        for &h in &keys {
            t.insert(h, h);
        }
        t.clear();
        prop_assert!(t.is_empty());
        validate_tree(&t);

        for &h in &keys {
            prop_assert!(t.insert(h, h + 1));
            prop_assert_eq!(t.get(h), Some(&(h + 1)));
        }
        validate_tree(&t);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], f: &mut impl FnMut(&[T])) {
    fn recurse<T: Clone>(prefix: &mut Vec<T>, rest: &[T], f: &mut impl FnMut(&[T])) {
        if rest.is_empty() {
            f(prefix);
            return;
        }
        for i in 0..rest.len() {
            let mut rest = rest.to_vec();
            prefix.push(rest.remove(i));
            recurse(prefix, &rest, f);
            prefix.pop();
        }
    }
    recurse(&mut Vec::new(), items, f);
}

#[test]
fn exhaustive_erase_orders_over_colliding_keys() {
    // Six keys sharing one root slot; erase them in every possible order and
    // check promotion never strands or loses an entry.
    let keys: Vec<u64> = (0..6u64).map(|k| k * 31 + 1).collect();

    for_each_permutation(&keys, &mut |perm| {
        let mut t: HashTree<u64> = HashTree::new();
        for &h in &keys {
            assert!(t.insert(h, h));
        }
        for (n, &h) in perm.iter().enumerate() {
            assert_eq!(t.erase(h), Some(h));
            assert_eq!(t.count(h), 0);
            assert_eq!(t.len(), keys.len() - n - 1);
            validate_tree(&t);
        }
        assert!(t.is_empty());
    });
}

#[test]
fn exhaustive_insert_orders_over_chain_keys() {
    // Five all-level-colliding keys inserted in every order always produce
    // the same reachable contents.
    let keys: Vec<u64> = (0..5u64).map(|k| k * ALL_LEVELS_STRIDE + 9).collect();

    for_each_permutation(&keys, &mut |perm| {
        let mut t: HashTree<u64> = HashTree::new();
        for &h in perm {
            assert!(t.insert(h, h));
        }
        validate_tree(&t);
        for &h in &keys {
            assert_eq!(t.get(h), Some(&h));
        }
    });
}
