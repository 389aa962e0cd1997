#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check internal
// state (rehash progress, per-generation counts) alongside the public API.

use crate::config::DictConfig;
use crate::dict::Dict;
use crate::error::{DictError, ResizeRejection};
use crate::types::{BinaryKeys, DictType};
use hashbrown::HashMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::BTreeSet;

// Pool-indexed operations so shrinking converges on earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Add(usize, i32),
    Replace(usize, i32),
    Delete(usize),
    DeleteNoFree(usize),
    Find(usize),
    Rehash(usize),
    Expand(usize),
    Resize,
    RandomKey,
    ScanPass,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,6}", 1..=24).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Add(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Replace(i, v)),
            2 => idx.clone().prop_map(Op::Delete),
            1 => idx.clone().prop_map(Op::DeleteNoFree),
            2 => idx.clone().prop_map(Op::Find),
            1 => (0usize..8).prop_map(Op::Rehash),
            1 => (0usize..64).prop_map(Op::Expand),
            1 => Just(Op::Resize),
            1 => Just(Op::RandomKey),
            1 => Just(Op::ScanPass),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn full_scan<T: DictType<Key = String, Value = i32>>(d: &Dict<T>) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut cursor = 0;
    loop {
        cursor = d.scan(cursor, |e| {
            seen.insert(e.key().clone());
        });
        if cursor == 0 {
            return seen;
        }
    }
}

// State-machine equivalence against a hashbrown map. After every op:
// - `len` matches the model and `iter` yields exactly `len` entries.
// - The per-generation used counts add up and `ht[1]` exists only while
//   rehashing.
fn run<T>(mut d: Dict<T>, pool: &[String], ops: Vec<Op>) -> Result<(), TestCaseError>
where
    T: DictType<Key = String, Value = i32>,
{
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            Op::Add(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match d.add(k.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "add must fail on duplicate");
                        prop_assert_eq!(h.value(&d), Some(&v));
                        model.insert(k, v);
                    }
                    Err(e) => {
                        prop_assert!(already);
                        prop_assert_eq!(e, DictError::KeyExists);
                    }
                }
            }
            Op::Replace(i, v) => {
                let k = pool[i].clone();
                let added = d.replace(k.clone(), v);
                prop_assert_eq!(added, model.insert(k, v).is_none());
            }
            Op::Delete(i) => {
                let res = d.delete(&pool[i]);
                match model.remove(&pool[i]) {
                    Some(_) => prop_assert_eq!(res, Ok(())),
                    None => prop_assert_eq!(res, Err(DictError::KeyNotFound)),
                }
            }
            Op::DeleteNoFree(i) => {
                let res = d.delete_no_free(&pool[i]);
                match model.remove(&pool[i]) {
                    Some(mv) => {
                        let (k, v) = res.expect("present in model").into_parts();
                        prop_assert_eq!(&k, &pool[i]);
                        prop_assert_eq!(v, Some(mv));
                    }
                    None => prop_assert!(matches!(res, Err(DictError::KeyNotFound))),
                }
            }
            Op::Find(i) => {
                let expected = model.get(&pool[i]).copied();
                prop_assert_eq!(d.fetch_value(&pool[i]).copied(), expected);
                prop_assert_eq!(d.contains_key(&pool[i]), expected.is_some());
            }
            Op::Rehash(n) => {
                let more = d.rehash(n);
                prop_assert_eq!(more, d.is_rehashing());
            }
            Op::Expand(n) => {
                let rehashing = d.is_rehashing();
                let res = d.expand(n);
                if rehashing {
                    prop_assert_eq!(res, Err(DictError::ResizeRejected(ResizeRejection::Rehashing)));
                } else {
                    prop_assert_eq!(res.is_ok(), n >= model.len());
                }
            }
            Op::Resize => {
                let rehashing = d.is_rehashing();
                let res = d.resize();
                prop_assert_eq!(res.is_ok(), !rehashing);
                if res.is_ok() && !d.is_rehashing() {
                    prop_assert!(d.slots() >= model.len());
                }
            }
            Op::RandomKey => match d.random_key() {
                Some(h) => {
                    let k = h.key(&d).expect("random handle is live").clone();
                    prop_assert_eq!(h.value(&d), model.get(&k));
                }
                None => prop_assert!(model.is_empty()),
            },
            Op::ScanPass => {
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(full_scan(&d), m_keys);
            }
            Op::Iterate => {
                let s_keys: BTreeSet<_> = d.iter().map(|e| e.key().clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        prop_assert_eq!(d.len(), model.len());
        prop_assert_eq!(d.iter().count(), model.len());
        prop_assert_eq!(d.ht[0].used + d.ht[1].used, d.slots.len());
        prop_assert_eq!(d.is_rehashing(), d.ht[1].is_allocated());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let d = Dict::with_config(BinaryKeys::<String, i32>::new(), DictConfig::default().with_rng_seed(7));
        run(d, &pool, ops)?;
    }
}

// Every key lands in bucket 0, so every lookup walks one long chain.
struct Colliding;
impl DictType for Colliding {
    type Key = String;
    type Value = i32;
    fn hash(&self, _key: &String, _seed: u32) -> u64 {
        0
    }
}

// Same invariants under worst-case collisions.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let d = Dict::with_config(Colliding, DictConfig::default().with_rng_seed(7));
        run(d, &pool, ops)?;
    }
}
