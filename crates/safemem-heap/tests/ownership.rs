//! Ownership and invalidation scenarios across owners and soft handles.

use std::mem;

use proptest::prelude::*;
use safemem_core::{AccessError, Unchecked};
use safemem_heap::{OwningPtr, SoftPtr};
use safemem_test_utils::fixtures::{chain, chain_sum, Registry};
use safemem_test_utils::{test_heap, throughput_heap, DropCounter, Tracked};

#[test]
fn reset_invalidates_single_soft() {
    let heap = test_heap();
    let mut o = OwningPtr::<i32>::new_in(&heap, 42);
    let s1 = SoftPtr::from(&o);
    assert_eq!(*s1.get(), 42);
    o.reset();
    assert_eq!(s1.try_get().unwrap_err(), AccessError::Invalidated);
}

#[test]
fn copies_fail_independently_after_owner_drop() {
    let heap = test_heap();
    let o = OwningPtr::<i32>::new_in(&heap, 42);
    let s1 = o.soft();
    let s2 = s1.clone();
    assert_ne!(s1.slot_id(), s2.slot_id());
    drop(o);
    assert_eq!(s1.try_get().unwrap_err(), AccessError::Invalidated);
    assert_eq!(s2.try_get().unwrap_err(), AccessError::Invalidated);
    drop(s1);
    assert_eq!(s2.try_get().unwrap_err(), AccessError::Invalidated);
}

#[test]
#[should_panic(expected = "safemem: access through invalidated handle")]
fn get_after_reset_is_fatal() {
    let heap = test_heap();
    let mut o = OwningPtr::<i32>::new_in(&heap, 1);
    let s = o.soft();
    o.reset();
    let _ = s.get();
}

#[test]
fn object_destroyed_exactly_once() {
    let heap = test_heap();
    let counter = DropCounter::new();
    let o: OwningPtr<Tracked<u8>> = OwningPtr::new_in(&heap, counter.track(0));
    let softs: Vec<_> = (0..7).map(|_| o.soft()).collect();
    drop(o);
    assert_eq!(counter.count(), 1);
    drop(softs);
    assert_eq!(counter.count(), 1);
}

#[test]
fn teardown_order_object_then_observers_then_block() {
    let heap = test_heap();
    let mut o: OwningPtr<u32> = OwningPtr::new_in(&heap, 1);
    let s = o.soft();
    o.reset();
    let stats = heap.stats();
    assert_eq!(stats.invalidations, 1);
    assert_eq!(stats.zombie_blocks, 1);
    assert!(!s.is_valid());
}

#[test]
fn moved_owner_keeps_observers() {
    let heap = test_heap();
    let mut a: OwningPtr<u32> = OwningPtr::new_in(&heap, 5);
    let s = a.soft();
    let b = mem::take(&mut a);
    assert!(a.is_empty());
    assert!(s.points_to(&b));
    assert_eq!(*s.get(), 5);
    drop(a);
    assert!(s.is_valid());
    drop(b);
    assert!(!s.is_valid());
}

#[test]
fn moved_soft_stays_registered_once() {
    let heap = test_heap();
    let o: OwningPtr<u32> = OwningPtr::new_in(&heap, 5);
    let s = o.soft();
    let mut holder = vec![SoftPtr::null()];
    holder[0] = s;
    assert_eq!(o.observer_count(), 1);
    let boxed = Box::new(holder.pop().unwrap());
    assert_eq!(o.observer_count(), 1);
    assert_eq!(*boxed.get(), 5);
    drop(boxed);
    assert_eq!(o.observer_count(), 0);
}

#[test]
fn linked_chain_tears_down_cleanly() {
    let heap = test_heap();
    let head = chain(&heap, 16);
    assert_eq!(chain_sum(&head), (0..16).sum());
    let tail_prev = {
        let mut cursor = head.soft();
        for _ in 0..15 {
            let next = cursor.get().next.soft();
            cursor = next;
        }
        let prev = cursor.get().prev.clone();
        prev
    };
    assert!(tail_prev.is_valid());
    drop(head);
    assert!(!tail_prev.is_valid());
    assert_eq!(heap.stats().live_blocks, 0);
    assert_eq!(heap.zombie_count(), 16);
}

#[test]
fn mass_invalidation() {
    let heap = test_heap();
    let mut reg = Registry::new(&heap, 10, 20);
    assert_eq!(reg.valid_views(), 200);
    for o in reg.owners.iter_mut().step_by(2) {
        o.reset();
    }
    assert_eq!(reg.valid_views(), 100);
    reg.owners.clear();
    assert_eq!(reg.valid_views(), 0);
    assert_eq!(heap.stats().invalidations, 200);
}

#[test]
fn unchecked_mode_still_reports_invalidated() {
    let heap = throughput_heap();
    let mut o: OwningPtr<String, Unchecked> = OwningPtr::new_in(&heap, "x".to_string());
    let s = o.soft();
    let copy = s.clone();
    o.reset();
    assert_eq!(s.try_get().unwrap_err(), AccessError::Invalidated);
    assert_eq!(copy.try_get().unwrap_err(), AccessError::Invalidated);
    assert_eq!(heap.zombie_count(), 0);
}

#[test]
fn checked_and_unchecked_coexist() {
    let heap = test_heap();
    let mut safe: OwningPtr<u8> = OwningPtr::new_in(&heap, 1);
    let mut fast: OwningPtr<u8, Unchecked> = OwningPtr::new_in(&heap, 2);
    let (s_safe, s_fast) = (safe.soft(), fast.soft());
    safe.reset();
    fast.reset();
    assert!(!s_safe.is_valid());
    assert!(!s_fast.is_valid());
    assert_eq!(heap.zombie_count(), 1);
}

#[test]
fn soft_outlives_heap_handle() {
    let s = {
        let heap = test_heap();
        let o: OwningPtr<u8> = OwningPtr::new_in(&heap, 1);
        let s = o.soft();
        drop(o);
        s
    };
    assert_eq!(s.try_get().unwrap_err(), AccessError::Invalidated);
}

#[derive(Clone, Debug)]
enum Op {
    NewSoft,
    DropSoft(prop::sample::Index),
    MoveSoft(prop::sample::Index),
    ResetOwner(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::NewSoft),
        3 => any::<prop::sample::Index>().prop_map(Op::DropSoft),
        2 => any::<prop::sample::Index>().prop_map(Op::MoveSoft),
        1 => any::<u8>().prop_map(Op::ResetOwner),
    ]
}

proptest! {
    #[test]
    fn single_owner_and_slot_uniqueness(ops in prop::collection::vec(op(), 1..120)) {
        let heap = test_heap();
        let mut owner: OwningPtr<u8> = OwningPtr::new_in(&heap, 0);
        let mut softs: Vec<SoftPtr<u8>> = Vec::new();
        for op in ops {
            match op {
                Op::NewSoft => softs.push(owner.soft()),
                Op::DropSoft(ix) if !softs.is_empty() => {
                    softs.remove(ix.index(softs.len()));
                }
                Op::MoveSoft(ix) if !softs.is_empty() => {
                    let i = ix.index(softs.len());
                    let moved = mem::take(&mut softs[i]);
                    prop_assert!(softs[i].is_null());
                    softs[i] = moved;
                }
                Op::ResetOwner(v) => owner.reset_with(v),
                _ => {}
            }

            let live: Vec<_> = softs.iter().filter(|s| s.points_to(&owner)).collect();
            prop_assert_eq!(owner.observer_count(), live.len());
            let mut slots: Vec<_> = live.iter().filter_map(|s| s.slot_id()).collect();
            slots.sort();
            slots.dedup();
            prop_assert_eq!(slots.len(), live.len());
            for s in &softs {
                prop_assert_eq!(s.is_valid(), s.points_to(&owner));
            }
        }
    }
}
