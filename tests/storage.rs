//! End-to-end tests exercising handles across policy boundaries.

use std::cell::RefCell;

use polystore::prelude::*;

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log(entry: impl Into<String>) {
    LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn take_log() -> Vec<String> {
    LOG.with(|log| log.borrow_mut().drain(..).collect())
}

/// A payload carrying a heap-backed buffer; the handle side stays small no
/// matter how much data it drags along.
#[derive(Clone, Debug, PartialEq)]
struct Samples {
    name: &'static str,
    data: Vec<u8>,
}

impl Samples {
    fn new(name: &'static str, len: usize) -> Self {
        Self {
            name,
            data: vec![0xAB; len],
        }
    }
}

impl Invokable for Samples {
    fn invoke(&self) {
        log(format!("samples:{}:{}", self.name, self.data.len()));
    }
}

/// A payload stored entirely by value.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Counter(u64);

impl Invokable for Counter {
    fn invoke(&self) {
        log(format!("counter:{}", self.0));
    }
}

#[test]
fn invoke_dispatches_to_the_stored_value() {
    let heap: Storage<OnHeap> = Storage::new(Samples::new("a", 256));
    let stack: Storage<OnStack<Invoke, 64>> = Storage::new(Counter(7));

    heap.invoke();
    stack.invoke();
    assert_eq!(take_log(), ["samples:a:256", "counter:7"]);
}

#[test]
fn swap_across_policies_carries_the_behavior_along() {
    let mut heap: Storage<OnHeap> = Storage::new(Samples::new("payload", 256));
    let mut stack: Storage<OnStack<Invoke, 64>> = Storage::new(Counter(8));

    heap.swap(&mut stack);

    heap.invoke();
    stack.invoke();
    assert_eq!(take_log(), ["counter:8", "samples:payload:256"]);

    assert_eq!(heap.downcast_ref::<Counter>(), Some(&Counter(8)));
    assert_eq!(
        stack.downcast_ref::<Samples>(),
        Some(&Samples::new("payload", 256))
    );
}

#[test]
fn swap_is_symmetric() {
    let mut heap: Storage<OnHeap> = Storage::new(Counter(1));
    let mut stack: Storage<OnStack<Invoke, 64>> = Storage::new(Counter(2));

    stack.swap(&mut heap);
    assert_eq!(heap.downcast_ref::<Counter>(), Some(&Counter(2)));
    assert_eq!(stack.downcast_ref::<Counter>(), Some(&Counter(1)));
}

#[test]
fn swapping_twice_restores_both_handles() {
    // Across storage kinds.
    let mut heap: Storage<OnHeap<Inert>> = Storage::new(String::from("boxed"));
    let mut stack: Storage<OnStack<Inert, 64>> = Storage::new(5_u32);
    heap.swap(&mut stack);
    heap.swap(&mut stack);
    assert_eq!(heap.downcast_ref::<String>(), Some(&String::from("boxed")));
    assert_eq!(stack.downcast_ref::<u32>(), Some(&5));

    // Across buffer capacities.
    let mut small: Storage<OnStack<Inert, 48>> = Storage::new(1_u32);
    let mut large: Storage<OnStack<Inert, 96>> = Storage::new(2_u64);
    small.swap(&mut large);
    small.swap(&mut large);
    assert_eq!(small.downcast_ref::<u32>(), Some(&1));
    assert_eq!(large.downcast_ref::<u64>(), Some(&2));
}

#[test]
fn infeasible_swap_leaves_both_handles_untouched() {
    // By-value array payload; its erased wrapper exceeds 64 bytes.
    let mut heap: Storage<OnHeap<Inert>> = Storage::new([1_u8; 200]);
    let mut stack: Storage<OnStack<Inert, 64>> = Storage::new(3_u32);

    let err = heap.try_swap(&mut stack).unwrap_err();
    assert_eq!(err.capacity(), 64);
    assert!(err.required_size() > 64);

    assert_eq!(heap.downcast_ref::<[u8; 200]>(), Some(&[1; 200]));
    assert_eq!(stack.downcast_ref::<u32>(), Some(&3));
}

#[test]
fn cross_capacity_stack_swap() {
    let mut small: Storage<OnStack<Inert, 48>> = Storage::new(1_u32);
    let mut large: Storage<OnStack<Inert, 96>> = Storage::new([2_u64; 8]);

    // One direction does not fit.
    assert!(small.try_swap(&mut large).is_err());

    // Two fitting payloads cross capacities fine.
    let mut other: Storage<OnStack<Inert, 96>> = Storage::new(4_u64);
    small.try_swap(&mut other).unwrap();
    assert_eq!(small.downcast_ref::<u64>(), Some(&4));
    assert_eq!(other.downcast_ref::<u32>(), Some(&1));
}

#[test]
fn hybrid_swaps_never_fail_among_themselves() {
    let mut small: Storage<Hybrid<Inert, 64>> = Storage::new(1_u32);
    let mut large: Storage<Hybrid<Inert, 64>> = Storage::new([2_u8; 500]);

    assert!(small.policy().is_inline());
    assert!(!large.policy().is_inline());

    small.try_swap(&mut large).unwrap();
    assert!(!small.policy().is_inline());
    assert!(large.policy().is_inline());
    assert_eq!(small.downcast_ref::<[u8; 500]>(), Some(&[2; 500]));
    assert_eq!(large.downcast_ref::<u32>(), Some(&1));
}

#[test]
fn mutation_through_the_handle_is_visible_to_invoke() {
    let mut handle: Storage<OnStack<Invoke, 64>> = Storage::new(Counter(1));
    handle.downcast_mut::<Counter>().unwrap().0 = 41;
    handle.invoke();
    assert_eq!(take_log(), ["counter:41"]);
}

#[test]
fn clone_produces_an_independent_handle() {
    let original: Storage<OnStack<Invoke, 64>> = Storage::new(Counter(5));
    let clone = original.clone();
    drop(original);

    clone.invoke();
    assert_eq!(take_log(), ["counter:5"]);
}

#[test]
fn transfer_chains_across_all_policies() {
    let stack: Storage<OnStack<Inert, 64>> = Storage::new(String::from("wandering"));

    let heap: Storage<OnHeap<Inert>> = stack.transfer();
    let hybrid: Storage<Hybrid<Inert, 64>> = heap.transfer();
    assert!(hybrid.policy().is_inline());

    let back: Storage<OnStack<Inert, 64>> = hybrid.try_transfer().unwrap();
    assert_eq!(
        back.downcast_ref::<String>(),
        Some(&String::from("wandering"))
    );
}

#[test]
fn rejected_transfer_returns_the_original() {
    let heap: Storage<OnHeap<Inert>> = Storage::new([9_u8; 200]);
    let (heap, err) = heap.try_transfer::<OnStack<Inert, 64>>().unwrap_err();
    assert_eq!(err.capacity(), 64);
    assert_eq!(heap.downcast_ref::<[u8; 200]>(), Some(&[9; 200]));
}

/// A payload with an alignment requirement stricter than the default
/// buffer alignment.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(align(32))]
struct AlignedBlock([u8; 16]);

#[test]
fn over_aligned_payloads_need_a_matching_buffer() {
    use polystore::alignment::Align32;

    let aligned: Storage<OnStack<Inert, 64, Align32>> = Storage::new(AlignedBlock([1; 16]));
    assert_eq!(
        aligned.downcast_ref::<AlignedBlock>(),
        Some(&AlignedBlock([1; 16]))
    );

    // The default 16-byte buffer alignment cannot host it, however many
    // bytes the buffer has.
    let heap: Storage<OnHeap<Inert>> = Storage::new(AlignedBlock([2; 16]));
    let (_, err) = heap.try_transfer::<OnStack<Inert, 256>>().unwrap_err();
    assert_eq!(err.required_align(), 32);
    assert_eq!(err.slot_align(), 16);
}

#[test]
fn handles_report_their_payload_type() {
    let handle: Storage<OnHeap<Inert>> = Storage::new(42_u32);
    assert_eq!(handle.value_type_id(), std::any::TypeId::of::<u32>());
    assert!(handle.value_type_name().ends_with("u32"));
    assert!(handle.has_value());
}

#[test]
fn debug_output_shows_the_value() {
    let handle: Storage<OnStack<Invoke, 64>> = Storage::new(Counter(3));
    assert_eq!(format!("{handle:?}"), "Counter(3)");
}
