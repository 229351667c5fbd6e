use timelock_vault::{
    amount::{format_total, UNIT_SCALE},
    scenario::{self, Actor, ScenarioConfig},
    VaultError,
};

#[test]
fn two_depositors_walkthrough() {
    let report = scenario::run(ScenarioConfig::default()).unwrap();
    assert_eq!(report.lock_duration, 50);
    assert_eq!(report.depositors.len(), 2);

    let alice = &report.depositors[0];
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.deposit_block, 1);
    assert_eq!(alice.unlock_block, 51);
    assert!(matches!(
        alice.early_rejection,
        Some(VaultError::Locked {
            unlock_block: 51,
            current: 33,
            ..
        })
    ));
    assert!(alice.late_rejection.is_none());
    assert_eq!(alice.withdrawn, UNIT_SCALE);
    assert_eq!(alice.remaining, UNIT_SCALE);
    assert_eq!(alice.wallet, 10_000 * UNIT_SCALE - UNIT_SCALE);

    let pierre = &report.depositors[1];
    assert_eq!(pierre.deposit_block, 2);
    assert_eq!(pierre.unlock_block, 52);
    assert!(matches!(
        pierre.early_rejection,
        Some(VaultError::Locked { .. })
    ));
    assert!(pierre.late_rejection.is_none());
    assert_eq!(pierre.remaining, UNIT_SCALE);

    // two deposits, both waits, two withdrawals; refused attempts mine nothing
    assert_eq!(report.final_block, 2 + 30 + 25 + 2);
    assert_eq!(report.total_held, u128::from(2 * UNIT_SCALE));
    assert_eq!(format_total(report.total_held), "2.0");
}

#[test]
fn short_lock_lets_early_withdrawals_through() {
    let report = scenario::run(ScenarioConfig {
        lock_duration: 0,
        ..ScenarioConfig::default()
    })
    .unwrap();
    for depositor in &report.depositors {
        assert!(depositor.early_rejection.is_none());
        assert!(depositor.late_rejection.is_none());
        assert_eq!(depositor.withdrawn, depositor.deposited - depositor.remaining);
    }
}

#[test]
fn oversized_withdrawal_is_refused_after_unlock() {
    let report = scenario::run(ScenarioConfig {
        actors: vec![Actor::new("Alice", 2 * UNIT_SCALE, 3 * UNIT_SCALE)],
        ..ScenarioConfig::default()
    })
    .unwrap();
    let alice = &report.depositors[0];
    assert!(matches!(
        alice.early_rejection,
        Some(VaultError::Locked { .. })
    ));
    assert!(matches!(
        alice.late_rejection,
        Some(VaultError::InsufficientBalance {
            requested,
            available,
            ..
        }) if requested == 3 * UNIT_SCALE && available == 2 * UNIT_SCALE
    ));
    assert_eq!(alice.remaining, 2 * UNIT_SCALE);
}
