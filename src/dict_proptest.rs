#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check the
// two-table bookkeeping directly.

use crate::dict::Dict;
use crate::error::DictError;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Clone, Debug)]
enum Op {
    Store(usize, i32),
    LoadOrStore(usize, i32),
    Delete(usize),
    Load(usize),
    Resize,
    ResizeTo(u64),
    Rehash(u64),
    Iterate,
    DeleteWhileSafe(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Store(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::LoadOrStore(i, v)),
            3 => idx.clone().prop_map(Op::Delete),
            2 => idx.clone().prop_map(Op::Load),
            1 => Just(Op::Resize),
            1 => (0u64..100).prop_map(Op::ResizeTo),
            1 => (0u64..4).prop_map(Op::Rehash),
            1 => Just(Op::Iterate),
            1 => (1usize..4).prop_map(Op::DeleteWhileSafe),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Structural invariants that must hold between any two operations.
fn check_invariants<K, V, S>(d: &Dict<K, V, S>) -> Result<(), TestCaseError> {
    let [t0, t1] = &d.tables;
    prop_assert_eq!(d.len(), t0.used + t1.used);
    prop_assert_eq!(d.entries.len() as u64, d.len());
    prop_assert!(t0.size == 0 || t0.size.is_power_of_two());
    prop_assert_eq!(d.is_rehashing(), t1.size != 0);
    if !d.is_rehashing() {
        prop_assert_eq!(t1.used, 0);
        prop_assert_eq!(t1.generation, 0);
    }
    // No key is chained twice, in one table or across both.
    let mut seen = HashSet::new();
    for table in [t0, t1] {
        let mut counted = 0;
        for idx in 0..table.size {
            let mut cur = table.head(idx);
            while let Some(slot) = cur {
                prop_assert!(seen.insert(slot), "entry linked twice");
                let e = &d.entries[slot];
                prop_assert_eq!(e.hash & table.sizemask, idx);
                counted += 1;
                cur = e.next;
            }
        }
        prop_assert_eq!(counted, table.used);
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `store` upserts, `load_or_store` keeps the first value, `delete` removes.
// - `load` always returns the last stored value, however far a rehash got.
// - resize requests fail exactly while rehashing or below occupancy.
// - iteration yields every live key once; safe iteration tolerates deletes.
// - table bookkeeping stays exact after every step.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: Dict<String, i32> = Dict::new();
        let mut model: HashMap<String, i32> = HashMap::new();

        for op in ops {
            match op {
                Op::Store(i, v) => {
                    let prev = sut.store(pool[i].clone(), v).unwrap();
                    prop_assert_eq!(prev, model.insert(pool[i].clone(), v));
                }
                Op::LoadOrStore(i, v) => {
                    let (h, loaded) = sut.load_or_store(pool[i].clone(), v).unwrap();
                    prop_assert_eq!(loaded, model.contains_key(&pool[i]));
                    let expected = *model.entry(pool[i].clone()).or_insert(v);
                    prop_assert_eq!(h.value(&sut), Some(&expected));
                }
                Op::Delete(i) => {
                    let got = sut.delete(pool[i].as_str()).unwrap();
                    prop_assert_eq!(got, model.remove(&pool[i]));
                }
                Op::Load(i) => {
                    let got = sut.load(pool[i].as_str()).unwrap().copied();
                    prop_assert_eq!(got, model.get(&pool[i]).copied());
                }
                Op::Resize => {
                    let rehashing = sut.is_rehashing();
                    match sut.resize() {
                        Ok(()) => prop_assert!(!rehashing),
                        Err(DictError::RehashInProgress) => prop_assert!(rehashing),
                        Err(e) => prop_assert!(false, "unexpected {:?}", e),
                    }
                }
                Op::ResizeTo(n) => {
                    let rehashing = sut.is_rehashing();
                    let used = sut.tables[0].used;
                    match sut.resize_to(n) {
                        Ok(()) => prop_assert!(!rehashing && n >= used),
                        Err(DictError::RehashInProgress) => prop_assert!(rehashing),
                        Err(DictError::InvalidTarget { requested, used: u }) => {
                            prop_assert!(!rehashing);
                            prop_assert_eq!((requested, u), (n, used));
                            prop_assert!(n < used);
                        }
                        Err(e) => prop_assert!(false, "unexpected {:?}", e),
                    }
                }
                Op::Rehash(n) => {
                    let finished = sut.rehash(n);
                    prop_assert_eq!(finished, !sut.is_rehashing());
                }
                Op::Iterate => {
                    let keys: Vec<String> = sut.iter().map(|(k, _)| k.clone()).collect();
                    let unique: BTreeSet<String> = keys.iter().cloned().collect();
                    prop_assert_eq!(keys.len(), unique.len());
                    let expected: BTreeSet<String> = model.keys().cloned().collect();
                    prop_assert_eq!(unique, expected);
                    prop_assert!(sut.range(|_, _| true).is_ok());
                }
                Op::DeleteWhileSafe(every) => {
                    let mut visited = BTreeSet::new();
                    let mut n = 0usize;
                    sut.range_safely(|d, h| {
                        let k = h.key(d).cloned().expect("live handle");
                        assert!(visited.insert(k.clone()), "revisited {:?}", k);
                        if n % every == 0 {
                            d.delete(k.as_str()).unwrap();
                        }
                        n += 1;
                        true
                    });
                    let expected: BTreeSet<String> = model.keys().cloned().collect();
                    prop_assert_eq!(&visited, &expected);
                    let survivors: BTreeSet<String> =
                        sut.iter().map(|(k, _)| k.clone()).collect();
                    model.retain(|k, _| survivors.contains(k));
                    prop_assert_eq!(sut.safe_iterators, 0);
                }
            }
            check_invariants(&sut)?;
            prop_assert_eq!(sut.len(), model.len() as u64);
        }

        for (k, v) in &model {
            prop_assert_eq!(sut.load(k.as_str()).unwrap(), Some(v));
        }
    }
}
