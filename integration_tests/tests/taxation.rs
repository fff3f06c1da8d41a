use adventure_core::TaxLedger;
use world_schema::{calculate_tax, EnforcementStanding, TaxPolicy};

#[test]
fn unpaid_structure_is_seized_at_the_42_day_mark() {
    let policy = TaxPolicy::default();
    let tpd = policy.ticks_per_day;
    let mut ledger = TaxLedger::new(policy);
    ledger.register_structure("keep_1", 0);
    ledger
        .process_collection("keep_1", 1_000, 0)
        .expect("collect at tick 0");

    // cadence 7d + grace 14d + seizure 21d = 42 days.
    assert!(ledger.update_enforcement(41 * tpd).is_empty());
    assert_eq!(
        ledger.update_enforcement(42 * tpd),
        vec!["keep_1".to_owned()]
    );
}

#[test]
fn paying_in_full_before_the_deadline_clears_the_seizure_set() {
    let policy = TaxPolicy::default();
    let tpd = policy.ticks_per_day;
    let mut ledger = TaxLedger::new(policy);
    ledger.register_structure("keep_1", 0);
    let record = ledger
        .process_collection("keep_1", 1_000, 0)
        .expect("collect");
    assert_eq!(record.tax_owed, calculate_tax(policy.rate, 1_000));

    ledger.update_enforcement(20 * tpd);
    ledger
        .record_payment("keep_1", record.tax_owed, 20 * tpd)
        .expect("pay in full");

    assert!(ledger.update_enforcement(42 * tpd).is_empty());
    assert_eq!(
        ledger
            .record("keep_1")
            .expect("record")
            .standing(42 * tpd, &policy),
        EnforcementStanding::Current
    );
}

#[test]
fn partial_payment_keeps_the_clock_running() {
    let policy = TaxPolicy::default();
    let tpd = policy.ticks_per_day;
    let mut ledger = TaxLedger::new(policy);
    ledger.register_structure("keep_1", 0);
    let record = ledger
        .process_collection("keep_1", 2_000, 0)
        .expect("collect");
    ledger
        .record_payment("keep_1", record.tax_owed / 2, 10 * tpd)
        .expect("half payment");

    assert_eq!(
        ledger.update_enforcement(42 * tpd),
        vec!["keep_1".to_owned()],
        "outstanding balance still seizes on schedule"
    );
}

#[test]
fn tax_assessment_floors_fractional_amounts() {
    assert_eq!(calculate_tax(0.05, 1_019), 50);
    assert_eq!(calculate_tax(0.05, 19), 0);
    assert_eq!(calculate_tax(0.05, 100), 5);
}
