//! Spec §8 Scenario B: the same long entry setup as Scenario A, but the
//! price falls through the -5% stop band instead of rising, closing with a
//! loss.

mod common;

#[test]
fn stop_loss_closes_with_a_loss() {
    // Rises just enough to trigger an entry, then falls through -5% of the
    // entry close to force a stop-loss exit.
    let closes = vec![
        145.0, 146.0, 148.0, 150.0, 152.0, // entry
        148.0, 142.0, 135.0, 130.0, 128.0, 126.0,
    ];
    let report = common::run_with_bars(&closes);

    let total_trades: usize = report.steps.iter().map(|s| s.trades.len()).sum();
    assert!(total_trades >= 2, "expected an entry and an exit fill, got {total_trades} trades");

    let closed: usize = report.steps.iter().map(|s| s.closed_this_step.len()).sum();
    assert_eq!(closed, 1, "exactly one round-trip should close");

    let pnl = report.metrics.get("summary.total_realized_pnl").copied().unwrap_or(0.0);
    assert!(pnl < 0.0, "stop-loss exit should realize a loss, got {pnl}");

    let reason = report
        .steps
        .iter()
        .flat_map(|s| s.closed_this_step.iter())
        .any(|c| c.close_reason == "stop loss");
    assert!(reason, "close reason should record the stop-loss trigger");
}
