use std::collections::HashSet;

use proptest::prelude::*;

use quiver_vectors::{Vectors, VectorId};

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<f32>),
    Delete(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => proptest::collection::vec(-10.0f32..10.0, 3).prop_map(Op::Add),
        1 => (0usize..64).prop_map(Op::Delete),
    ]
}

proptest! {
    // Ids handed out by add are strictly increasing, and the live id set is
    // exactly adds minus accepted deletes.
    #[test]
    fn live_ids_match_bookkeeping(ops in proptest::collection::vec(op_strategy(), 1..80)) {
        let mut v = Vectors::new(4);

        let mut added: Vec<VectorId> = Vec::new();
        let mut live: HashSet<VectorId> = HashSet::new();

        for op in ops {
            match op {
                Op::Add(vector) => {
                    let id = v.add(vector);
                    if let Some(&last) = added.last() {
                        prop_assert!(id > last, "ids must be strictly increasing");
                    }
                    added.push(id);
                    live.insert(id);
                }
                Op::Delete(i) => {
                    if added.is_empty() {
                        continue;
                    }
                    let id = added[i % added.len()];
                    let deleted = v.delete(id);
                    prop_assert_eq!(deleted, live.remove(&id));
                }
            }
        }

        // Query wide enough to surface every live record.
        let results = v.get(&[vec![1.0, 1.0, 1.0]], added.len() + 1);
        let found: HashSet<VectorId> = results.iter().copied().collect();

        prop_assert_eq!(results.len(), found.len(), "no duplicate ids");
        prop_assert_eq!(found, live);
    }

    // Repack keeps the live id set identical and answers the same point
    // queries as the original index.
    #[test]
    fn repack_preserves_live_records(ops in proptest::collection::vec(op_strategy(), 1..80)) {
        let mut v = Vectors::new(4);

        let mut added: Vec<(VectorId, Vec<f32>)> = Vec::new();
        let mut live: HashSet<VectorId> = HashSet::new();

        for op in ops {
            match op {
                Op::Add(vector) => {
                    let id = v.add(vector.clone());
                    added.push((id, vector));
                    live.insert(id);
                }
                Op::Delete(i) => {
                    if added.is_empty() {
                        continue;
                    }
                    let id = added[i % added.len()].0;
                    if v.delete(id) {
                        live.remove(&id);
                    }
                }
            }
        }

        let packed = v.repack();

        let results = packed.get(&[vec![1.0, 1.0, 1.0]], added.len() + 1);
        let found: HashSet<VectorId> = results.iter().copied().collect();
        prop_assert_eq!(&found, &live);

        // Every surviving record is still found under its own vector, unless
        // the vector cannot be ranked by cosine (zero norm).
        for (id, vector) in &added {
            if !live.contains(id) {
                continue;
            }
            if vector.iter().all(|&x| x == 0.0) {
                continue;
            }
            let hits = packed.get(&[vector.clone()], live.len().max(1));
            prop_assert!(hits.contains(id), "id {} missing after repack", id);
        }
    }
}
