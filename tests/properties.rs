use proptest::prelude::*;
use spark_bindables::{Bindable, BindableList, BindableNumber, NumberOptions};
use std::cell::RefCell;
use std::rc::Rc;

const NODES: usize = 6;

/// A chain 0-1-..-5 plus extra edges, so the graph is connected and may have
/// cycles and diamonds.
fn connected_bindables(extra: &[(usize, usize)]) -> Vec<Bindable<i32>> {
    let first = Bindable::new(0);
    let mut nodes = vec![first];
    for i in 1..NODES {
        let next = nodes[i - 1].get_bound_copy();
        nodes.push(next);
    }
    for &(a, b) in extra {
        if a != b {
            nodes[a].bind_to(&nodes[b]).unwrap();
        }
    }
    nodes
}

fn connected_lists(extra: &[(usize, usize)]) -> Vec<BindableList<i32>> {
    let mut lists = vec![BindableList::new()];
    for i in 1..NODES {
        let next = lists[i - 1].get_bound_copy();
        lists.push(next);
    }
    for &(a, b) in extra {
        if a != b {
            lists[a].bind_to(&lists[b]).unwrap();
        }
    }
    lists
}

#[derive(Debug, Clone)]
enum Edit {
    Push(i32),
    Insert(usize, i32),
    RemoveAt(usize),
    Set(usize, i32),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        any::<i32>().prop_map(Edit::Push),
        (0usize..8, any::<i32>()).prop_map(|(i, v)| Edit::Insert(i, v)),
        (0usize..8).prop_map(Edit::RemoveAt),
        (0usize..8, any::<i32>()).prop_map(|(i, v)| Edit::Set(i, v)),
    ]
}

proptest! {
    #[test]
    fn writes_converge_and_settle_once(
        extra in prop::collection::vec((0..NODES, 0..NODES), 0..8),
        writes in prop::collection::vec((0..NODES, -3i32..3), 1..20),
    ) {
        let nodes = connected_bindables(&extra);
        let log: Vec<Rc<RefCell<Vec<i32>>>> =
            (0..NODES).map(|_| Rc::new(RefCell::new(Vec::new()))).collect();
        let _subs: Vec<_> = nodes
            .iter()
            .zip(&log)
            .map(|(node, log)| {
                let log = log.clone();
                node.on_value_changed(move |e| log.borrow_mut().push(e.new_value))
            })
            .collect();

        for (writer, value) in writes {
            let before = nodes[0].value();
            for entry in &log {
                entry.borrow_mut().clear();
            }

            nodes[writer].set_value(value).unwrap();

            for (node, entry) in nodes.iter().zip(&log) {
                prop_assert_eq!(node.value(), value);
                let fired = entry.borrow();
                if before == value {
                    prop_assert!(fired.is_empty());
                } else {
                    prop_assert_eq!(&*fired, &vec![value]);
                }
            }
        }
    }

    #[test]
    fn list_edits_match_a_plain_vec(
        extra in prop::collection::vec((0..NODES, 0..NODES), 0..8),
        edits in prop::collection::vec((0..NODES, edit()), 1..30),
    ) {
        let lists = connected_lists(&extra);
        let mut model: Vec<i32> = Vec::new();

        for (target, edit) in edits {
            let list = &lists[target];
            let len = model.len();
            match edit {
                Edit::Push(v) => {
                    list.push(v).unwrap();
                    model.push(v);
                }
                Edit::Insert(i, v) => {
                    let result = list.insert(i, v);
                    if i <= len {
                        prop_assert!(result.is_ok());
                        model.insert(i, v);
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                Edit::RemoveAt(i) => {
                    let result = list.remove_at(i);
                    if i < len {
                        prop_assert_eq!(result.ok(), Some(model.remove(i)));
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                Edit::Set(i, v) => {
                    let result = list.set(i, v);
                    if i < len {
                        prop_assert_eq!(result.ok(), Some(std::mem::replace(&mut model[i], v)));
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
            }

            for list in &lists {
                prop_assert_eq!(&list.items(), &model);
            }
        }
    }

    #[test]
    fn public_writes_stay_in_range(
        bounds in (-1000i64..1000, -1000i64..1000),
        values in prop::collection::vec(any::<i64>(), 1..10),
    ) {
        let (min, max) = if bounds.0 <= bounds.1 { bounds } else { (bounds.1, bounds.0) };
        let number = BindableNumber::with_options(0i64, NumberOptions::new().min(min).max(max)).unwrap();
        let copy = number.get_bound_copy();

        for value in values {
            copy.set_value(value).unwrap();
            prop_assert!(number.value() >= min && number.value() <= max);
            prop_assert_eq!(number.value(), copy.value());
        }
    }

    #[test]
    fn lease_exclusive_until_returned(
        extra in prop::collection::vec((0..NODES, 0..NODES), 0..8),
        leaser in 0..NODES,
        other in 0..NODES,
    ) {
        let nodes = connected_bindables(&extra);
        let lease = nodes[leaser].begin_lease(true).unwrap();

        prop_assert!(nodes[other].begin_lease(false).is_err());
        prop_assert!(nodes.iter().all(|n| n.disabled()));

        lease.return_bindable().unwrap();
        prop_assert!(nodes.iter().all(|n| !n.disabled()));
        let again = nodes[other].begin_lease(false);
        prop_assert!(again.is_ok());
    }
}
