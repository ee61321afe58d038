//! Multi-leg basket scenarios.
//!
//! Validates that:
//! - a pair opens with independently truncated leg sizes
//! - a price move books the sum of leg P&L and updates gross exposure
//! - resizing to the same target twice trades once
//! - a missing leg price unwinds the whole basket over two updates
//! - a reverse split that leaves a leg without whole shares does the same
//! - closing twice is a no-op

use tally_ledger::{BasketState, MultiLegPosition};

const RATE: f64 = 0.005;
const TOL: f64 = 0.05;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9 * (1.0 + a.abs().max(b.abs()))
}

fn ibm_aapl() -> MultiLegPosition {
    MultiLegPosition::open(&["IBM", "AAPL"], &[100.0, 200.0], &[1_000.0, -1_000.0], RATE, TOL)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Scenario 1: open and mark
// ---------------------------------------------------------------------------

#[test]
fn pair_opens_with_independent_leg_sizes() {
    let b = ibm_aapl();
    assert_eq!(b.shares(), vec![10, -5]);
    assert!(approx(b.gross_exposure(), 2_000.0));
    assert!(approx(b.daily_pl(), -15.0 * RATE));
}

#[test]
fn adverse_short_leg_move() {
    let mut b = ibm_aapl();
    b.settle_day();
    b.update_position_prices(&[102.0, 210.0], &[], &[]);
    // +2 x 10 on IBM, -10 x 5 on the AAPL short
    assert!(approx(b.daily_pl(), -30.0));
    assert!(approx(b.gross_exposure(), 2_070.0));
}

#[test]
fn collapsing_short_leg_move() {
    let mut b = ibm_aapl();
    b.settle_day();
    b.update_position_prices(&[101.0, 101.0], &[], &[]);
    assert!(approx(b.daily_pl(), 505.0));
    assert!(approx(b.gross_exposure(), 1_515.0));
    assert!(approx(b.net_exposure(), 505.0));
}

// ---------------------------------------------------------------------------
// Scenario 2: idempotent rebalance
// ---------------------------------------------------------------------------

#[test]
fn repeated_rebalance_to_same_target_trades_once() {
    let mut b = ibm_aapl();
    b.settle_day();
    b.update_position_prices(&[110.0, 180.0], &[], &[]);
    b.settle_day();

    assert!(b.update_position_exposure(3_000.0, TOL));
    let shares = b.shares();
    let pl_after_first = b.daily_pl();
    assert!(pl_after_first < 0.0, "first rebalance pays commission");

    assert!(!b.update_position_exposure(3_000.0, TOL));
    assert_eq!(b.shares(), shares);
    assert_eq!(b.daily_pl(), pl_after_first);
    assert_eq!(b.stat_rebalance_count(), 1);

    // even with zero tolerance the target maps onto the same shares
    assert!(!b.update_position_exposure(3_000.0, 0.0));
    assert_eq!(b.stat_rebalance_count(), 1);
}

#[test]
fn rebalance_keeps_entry_weights_after_drift() {
    let mut b = ibm_aapl();
    b.update_position_prices(&[125.0, 160.0], &[], &[]);
    b.update_position_exposure(2_000.0, 0.0);
    // 1000 / 125 = 8 long, -1000 / 160 = -6.25 -> -6 short
    assert_eq!(b.shares(), vec![8, -6]);
}

// ---------------------------------------------------------------------------
// Scenario 3: forced unwind
// ---------------------------------------------------------------------------

#[test]
fn missing_leg_forces_full_unwind() {
    let mut b = ibm_aapl();
    b.settle_day();

    b.update_position_prices(&[101.0, f64::NAN], &[], &[]);
    assert_eq!(b.state(), BasketState::PendingClose);
    assert_eq!(b.shares(), vec![10, 0], "only the unpriced leg is zeroed");
    // IBM +10, AAPL close-out commission on 5 shares
    assert!(approx(b.daily_pl(), 10.0 - 5.0 * RATE));
    b.settle_day();

    // no rebalance while pending
    assert!(!b.update_position_exposure(10_000.0, TOL));

    b.update_position_prices(&[103.0, 205.0], &[], &[]);
    assert_eq!(b.state(), BasketState::Closed);
    assert_eq!(b.shares(), vec![0, 0]);
    assert!(approx(b.daily_pl(), 20.0 - 10.0 * RATE));
    assert_eq!(b.gross_exposure(), 0.0);
}

#[test]
fn reverse_split_zeroing_a_leg_unwinds_the_basket() {
    let mut b = ibm_aapl();
    b.settle_day();

    // 1-for-10 on AAPL: the -5 share short leg becomes half a share
    b.update_position_prices(&[101.0, 2_000.0], &[], &[1.0, 0.1]);
    assert_eq!(b.state(), BasketState::PendingClose);
    assert_eq!(b.shares(), vec![10, 0]);
    assert!(approx(b.cash_in_lieu(), -1_000.0));
    assert!(approx(b.daily_pl(), 10.0), "split leg books no P&L");
    b.settle_day();

    b.update_position_prices(&[102.0, 2_000.0], &[], &[]);
    assert_eq!(b.state(), BasketState::Closed);
    assert!(approx(b.daily_pl(), 10.0 - 10.0 * RATE));
}

#[test]
fn second_close_is_a_no_op() {
    let mut b = ibm_aapl();
    b.close_position();
    let pl = b.daily_pl();
    b.close_position();
    assert_eq!(b.daily_pl(), pl);
    assert_eq!(b.shares(), vec![0, 0]);
    assert!(approx(pl, -30.0 * RATE));
}
