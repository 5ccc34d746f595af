//! Budget cascade integration tests
//!
//! Exercises TimeBudgetTracker's overrun accounting across whole stage
//! sequences: buffer-first absorption, downstream cascading, allocation
//! conservation, and the non-negativity invariants.

use tablepilot::budget::{Stage, TimeBudgetTracker};

fn tracker(allocations: [u64; 6]) -> TimeBudgetTracker {
    let total = allocations.iter().sum();
    TimeBudgetTracker::with_allocations(total, allocations, 50)
}

// ============================================================================
// Cascading
// ============================================================================

#[test]
fn overrun_with_empty_buffer_cascades_exactly_into_next_stage() {
    // 100ms perception allocation, 170ms actual, no buffer
    let mut budget = tracker([100, 100, 100, 100, 100, 0]);
    budget.record_actual(Stage::Perception, 170, true);

    assert_eq!(budget.allocation(Stage::Solver), 30);
    assert_eq!(budget.allocation(Stage::Perception), 170);
    // Stages beyond the absorbing one are untouched
    assert_eq!(budget.allocation(Stage::Advisors), 100);
    assert_eq!(budget.allocation(Stage::Synthesis), 100);
}

#[test]
fn buffer_absorbs_before_downstream_stages() {
    let mut budget = tracker([100, 100, 100, 100, 100, 50]);
    budget.record_actual(Stage::Perception, 140, true);

    // 40ms overrun fits entirely in the buffer
    assert_eq!(budget.allocation(Stage::Buffer), 10);
    assert_eq!(budget.allocation(Stage::Solver), 100);
}

#[test]
fn large_overrun_drains_multiple_downstream_stages() {
    let mut budget = tracker([100, 100, 100, 100, 100, 20]);
    budget.record_actual(Stage::Perception, 400, true);

    // 300 over: buffer 20, then solver 100, then advisors 100, then 80 of
    // synthesis
    assert_eq!(budget.allocation(Stage::Buffer), 0);
    assert_eq!(budget.allocation(Stage::Solver), 0);
    assert_eq!(budget.allocation(Stage::Advisors), 0);
    assert_eq!(budget.allocation(Stage::Synthesis), 20);
    assert_eq!(budget.allocation(Stage::Execution), 100);
}

#[test]
fn total_allocation_is_conserved_across_cascades() {
    let mut budget = tracker([100, 100, 100, 100, 100, 50]);
    let before = budget.total_allocated();

    budget.record_actual(Stage::Perception, 250, true);
    assert_eq!(budget.total_allocated(), before);

    budget.record_actual(Stage::Solver, 10, true);
    assert_eq!(budget.total_allocated(), before);
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn allocations_never_go_negative_under_extreme_overrun() {
    let mut budget = tracker([100, 100, 100, 100, 100, 0]);
    // Overrun larger than everything downstream combined
    budget.record_actual(Stage::Perception, 10_000, true);

    for stage in Stage::PIPELINE {
        assert!(budget.remaining(Some(stage)) <= budget.allocation(stage));
    }
    assert_eq!(budget.allocation(Stage::Solver), 0);
    assert_eq!(budget.allocation(Stage::Advisors), 0);
}

#[test]
fn reserve_release_sequences_keep_remaining_non_negative() {
    let mut budget = tracker([100, 200, 300, 100, 100, 100]);

    assert!(budget.reserve(Stage::Advisors, 200));
    assert_eq!(budget.remaining(Some(Stage::Advisors)), 100);
    // A second reservation beyond what is left is refused
    assert!(!budget.reserve(Stage::Advisors, 150));

    budget.release(Stage::Advisors, 200);
    budget.record_actual(Stage::Advisors, 180, true);
    assert_eq!(budget.remaining(Some(Stage::Advisors)), 120);
    assert_eq!(budget.used(Stage::Advisors), 180);
}

#[test]
fn surplus_restitution_is_capped_at_original_buffer_size() {
    let mut budget = tracker([100, 100, 100, 100, 100, 50]);
    // Drain the buffer with one overrun
    budget.record_actual(Stage::Perception, 150, true);
    assert_eq!(budget.allocation(Stage::Buffer), 0);

    // A fast stage donates its surplus back, but never past the original size
    budget.record_actual(Stage::Solver, 10, true);
    assert!(budget.allocation(Stage::Buffer) <= 50);
    assert!(budget.allocation(Stage::Buffer) > 0);
}

#[test]
fn stage_preemption_trips_when_allocation_is_spent() {
    let mut budget = tracker([100, 100, 100, 100, 100, 0]);
    assert!(!budget.should_preempt(Stage::Synthesis));

    budget.record_actual(Stage::Synthesis, 100, false);
    assert!(budget.should_preempt(Stage::Synthesis));
}
