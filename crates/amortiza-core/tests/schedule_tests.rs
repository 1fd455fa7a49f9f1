use amortiza_core::correction::{CorrectionPolicy, CorrectionTable, IndexCorrection, MonthKey};
use amortiza_core::extras::ExtraPayment;
use amortiza_core::schedule::{
    build_schedule, generate_schedule, AmortizationSystem, InstallmentRecord, LoanParameters,
};
use amortiza_core::AmortizaError;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn loan(system: AmortizationSystem) -> LoanParameters {
    LoanParameters::new(dec!(100000), dec!(0.01), 12, system)
}

fn with_projected_correction(
    mut params: LoanParameters,
    rate: Decimal,
    policy: CorrectionPolicy,
) -> LoanParameters {
    params.correction = Some(IndexCorrection {
        table: CorrectionTable::new(),
        projected_rate: rate,
        policy,
    });
    params
}

fn assert_cent_quantized(records: &[InstallmentRecord]) {
    for r in records {
        for v in [
            r.installment,
            r.amortization,
            r.interest,
            r.fee,
            r.extra,
            r.paid,
            r.balance,
        ] {
            assert_eq!(v, v.round_dp(2), "month {} carries sub-cent value {}", r.month, v);
        }
    }
}

// ===========================================================================
// Scenario A: SAC, no correction
// ===========================================================================

#[test]
fn test_sac_known_answer() {
    let result = generate_schedule(&loan(AmortizationSystem::Sac)).unwrap();
    let first = &result.records[0];

    assert_eq!(first.amortization, dec!(8333.33));
    assert_eq!(first.interest, dec!(1000.00));
    assert_eq!(first.installment, dec!(9333.33));
    assert_eq!(first.balance, dec!(91666.67));

    assert_eq!(result.records.len(), 12);
    let last = &result.records[11];
    assert_eq!(last.month, 12);
    assert_eq!(last.balance, Decimal::ZERO);
    // Four cents of rounding drift land in the final amortization
    assert_eq!(last.amortization, dec!(8333.37));
    assert_eq!(last.installment, dec!(8416.70));

    assert_eq!(result.total_interest, dec!(6500));
    assert_eq!(result.total_paid, dec!(106500));
    assert_eq!(result.months_executed, 12);
    assert!(!result.residual_closed);
    assert_eq!(result.base_installment, None);
}

#[test]
fn test_sac_amortization_constant_and_interest_non_increasing() {
    let params = LoanParameters::new(dec!(250000), dec!(0.0075), 240, AmortizationSystem::Sac);
    let result = generate_schedule(&params).unwrap();
    let records = &result.records;

    assert_eq!(records.len(), 240);
    let target = records[0].amortization;
    for r in &records[..records.len() - 1] {
        assert_eq!(r.amortization, target);
    }
    for pair in records.windows(2) {
        assert!(pair[1].interest <= pair[0].interest);
    }
    assert_cent_quantized(records);
}

// ===========================================================================
// Scenario B: PRICE, no correction
// ===========================================================================

#[test]
fn test_price_known_answer() {
    let result = generate_schedule(&loan(AmortizationSystem::Price)).unwrap();

    assert_eq!(result.base_installment, Some(dec!(8884.88)));
    assert_eq!(result.records.len(), 12);
    for r in &result.records[..11] {
        assert_eq!(r.installment, dec!(8884.88));
    }
    let last = &result.records[11];
    assert_eq!(last.installment, dec!(8884.85));
    assert_eq!(last.amortization, dec!(8796.88));
    assert_eq!(last.interest, dec!(87.97));
    assert_eq!(last.balance, Decimal::ZERO);
    assert_eq!(result.total_interest, dec!(6618.53));
}

#[test]
fn test_price_installment_level_over_long_term() {
    let params = LoanParameters::new(dec!(300000), dec!(0.008), 360, AmortizationSystem::Price);
    let result = generate_schedule(&params).unwrap();
    let records = &result.records;

    assert_eq!(records.len(), 360);
    let level = records[0].installment;
    for r in &records[..359] {
        assert_eq!(r.installment, level);
        assert_eq!(r.installment, r.amortization + r.interest + r.fee);
    }
    assert_eq!(records[359].balance, Decimal::ZERO);
    assert_eq!(result.total_amortization, dec!(300000));
}

#[test]
fn test_principal_fully_repaid_without_correction() {
    for system in [AmortizationSystem::Sac, AmortizationSystem::Price] {
        let params = LoanParameters::new(dec!(54321.99), dec!(0.0123), 97, system);
        let result = generate_schedule(&params).unwrap();
        assert_eq!(result.total_amortization + result.total_extra, dec!(54321.99));
        assert_eq!(result.records.len(), 97);
        assert_eq!(result.records.last().unwrap().balance, Decimal::ZERO);
    }
}

// ===========================================================================
// Scenario C: one-off extra
// ===========================================================================

#[test]
fn test_one_off_extra_shortens_schedule() {
    let baseline = generate_schedule(&loan(AmortizationSystem::Price)).unwrap();

    let mut params = loan(AmortizationSystem::Price);
    params.extras = vec![ExtraPayment::at_month(3, dec!(20000))];
    let result = generate_schedule(&params).unwrap();

    let month3 = &result.records[2];
    assert_eq!(month3.extra, dec!(20000));
    assert_eq!(month3.amortization, baseline.records[2].amortization);
    assert_eq!(month3.balance, baseline.records[2].balance - dec!(20000));
    assert_eq!(month3.balance, dec!(56108.02));
    assert_eq!(month3.paid, dec!(28884.88));

    assert!(result.months_executed < 12);
    assert_eq!(result.months_executed, 10);
    assert_eq!(result.total_amortization + result.total_extra, dec!(100000));
    assert_eq!(result.total_interest, dec!(4912.79));
}

#[test]
fn test_dated_extra_matches_indexed_extra() {
    let mut by_index = loan(AmortizationSystem::Price);
    by_index.start_date = NaiveDate::from_ymd_opt(2024, 1, 15);
    by_index.extras = vec![ExtraPayment::at_month(3, dec!(20000))];

    let mut by_date = by_index.clone();
    by_date.extras = vec![ExtraPayment::on_date(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        dec!(20000),
    )];

    assert_eq!(
        generate_schedule(&by_index).unwrap(),
        generate_schedule(&by_date).unwrap()
    );
}

#[test]
fn test_extra_never_exceeds_remaining_balance() {
    let mut params = loan(AmortizationSystem::Sac);
    params.extras = vec![ExtraPayment::at_month(2, dec!(1000000))];
    let result = generate_schedule(&params).unwrap();

    assert_eq!(result.records.len(), 2);
    let month2 = &result.records[1];
    assert_eq!(month2.amortization, dec!(8333.33));
    assert_eq!(month2.extra, dec!(91666.67) - dec!(8333.33));
    assert_eq!(month2.balance, Decimal::ZERO);
}

#[test]
fn test_recurring_extra_every_month() {
    let mut params = loan(AmortizationSystem::Sac);
    params.recurring_extra = dec!(5000);
    let result = generate_schedule(&params).unwrap();

    assert_eq!(result.months_executed, 8);
    for r in &result.records[..7] {
        assert_eq!(r.extra, dec!(5000));
    }
    // Final month: amortization clears the balance, nothing left for the extra
    let last = &result.records[7];
    assert_eq!(last.amortization, dec!(6666.69));
    assert_eq!(last.extra, Decimal::ZERO);
    assert_eq!(result.total_paid, dec!(104266.67));
}

// ===========================================================================
// Scenario D: correction in month 1 only
// ===========================================================================

#[test]
fn test_first_month_correction_scales_balance_and_installment() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
    let table = CorrectionTable::from_entries([(MonthKey::from_date(start), dec!(0.001))]);

    let mut params = loan(AmortizationSystem::Price);
    params.start_date = Some(start);
    params.correction = Some(IndexCorrection {
        table,
        projected_rate: Decimal::ZERO,
        policy: CorrectionPolicy::CompoundInstallment,
    });
    let result = generate_schedule(&params).unwrap();
    let first = &result.records[0];

    // Balance 100000 -> 100100.00, PAJ 8884.88 -> 8893.76 before interest
    assert_eq!(first.correction, dec!(0.001));
    assert_eq!(first.interest, dec!(1001.00));
    assert_eq!(first.installment, dec!(8893.76));
    assert_eq!(first.amortization, dec!(7892.76));
    assert_eq!(first.balance, dec!(92207.24));
    assert_eq!(first.due_date, Some(start));

    for r in &result.records[1..] {
        assert_eq!(r.correction, Decimal::ZERO);
    }
    for r in &result.records[1..11] {
        assert_eq!(r.installment, dec!(8893.76));
    }
    assert_eq!(result.records.len(), 12);
    assert_eq!(result.total_amortization, dec!(100100));
}

#[test]
fn test_months_beyond_table_use_projected_rate() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let table = CorrectionTable::from_entries([(MonthKey::from_date(start), dec!(0.001))]);

    let mut params = loan(AmortizationSystem::Sac);
    params.start_date = Some(start);
    params.correction = Some(IndexCorrection {
        table,
        projected_rate: dec!(0.0005),
        policy: CorrectionPolicy::default(),
    });
    let output = build_schedule(&params).unwrap();

    assert_eq!(output.result.records[0].correction, dec!(0.001));
    assert_eq!(output.result.records[1].correction, dec!(0.0005));
    assert!(output
        .warnings
        .iter()
        .any(|w| w.contains("projected rate 0.0005")));
}

// ===========================================================================
// Correction policies
// ===========================================================================

#[test]
fn test_balance_only_policy_keeps_installment() {
    let params = with_projected_correction(
        loan(AmortizationSystem::Price),
        dec!(0.002),
        CorrectionPolicy::BalanceOnly,
    );
    let result = generate_schedule(&params).unwrap();

    assert_eq!(result.records[0].installment, dec!(8884.88));
    assert_eq!(result.records[0].interest, dec!(1002.00));
    assert_eq!(result.records[0].balance, dec!(92317.12));
    // The uncorrected installment falls behind, pushing the loan past its term
    assert_eq!(result.months_executed, 13);
    assert_eq!(result.records[12].installment, dec!(1477.05));
}

#[test]
fn test_compound_policy_rescales_installment_monthly() {
    let params = with_projected_correction(
        loan(AmortizationSystem::Price),
        dec!(0.002),
        CorrectionPolicy::CompoundInstallment,
    );
    let result = generate_schedule(&params).unwrap();

    assert_eq!(result.records[0].installment, dec!(8902.65));
    assert_eq!(result.records[1].installment, dec!(8920.46));
    assert_eq!(result.records[2].installment, dec!(8938.30));
    assert_eq!(result.months_executed, 12);
    assert_eq!(result.records[11].installment, dec!(9100.42));
}

#[test]
fn test_rebase_policy_rederives_from_original_installment() {
    let params = with_projected_correction(
        loan(AmortizationSystem::Price),
        dec!(0.002),
        CorrectionPolicy::RebaseInstallment,
    );
    let result = generate_schedule(&params).unwrap();

    assert_eq!(result.records[0].installment, dec!(8902.65));
    assert_eq!(result.months_executed, 12);
    // Same path as compounding until per-month rounding diverges at the close
    assert_eq!(result.records[11].installment, dec!(9100.47));
}

#[test]
fn test_sac_amortization_never_corrected() {
    let params = with_projected_correction(
        loan(AmortizationSystem::Sac),
        dec!(0.002),
        CorrectionPolicy::CompoundInstallment,
    );
    let result = generate_schedule(&params).unwrap();
    assert_eq!(result.records[0].amortization, dec!(8333.33));
    assert_eq!(result.records[5].amortization, dec!(8333.33));
}

// ===========================================================================
// Scenario E: residual closure
// ===========================================================================

#[test]
fn test_residual_closure_after_safety_margin() {
    let mut params = with_projected_correction(
        LoanParameters::new(dec!(1000), dec!(0.01), 12, AmortizationSystem::Sac),
        dec!(0.5),
        CorrectionPolicy::default(),
    );
    params.safety_margin_months = 5;
    let output = build_schedule(&params).unwrap();
    let result = &output.result;

    assert!(result.residual_closed);
    assert_eq!(result.records.len(), 18);
    assert_eq!(result.records[16].balance, dec!(821227.69));

    let closing = result.records.last().unwrap();
    assert_eq!(closing.month, 18);
    assert_eq!(closing.extra, Decimal::ZERO);
    assert_eq!(closing.correction, Decimal::ZERO);
    assert_eq!(closing.amortization, dec!(821227.69));
    assert_eq!(closing.interest, dec!(8212.28));
    assert_eq!(closing.installment, dec!(829439.97));
    assert_eq!(closing.balance, Decimal::ZERO);

    assert_eq!(
        result.records.iter().filter(|r| r.month > 17).count(),
        1
    );
    assert!(output.warnings.iter().any(|w| w.contains("lump installment")));
}

// ===========================================================================
// Whole-schedule properties
// ===========================================================================

#[test]
fn test_records_satisfy_identities() {
    let mut params = loan(AmortizationSystem::Price);
    params.monthly_fee = dec!(37.45);
    params.start_date = NaiveDate::from_ymd_opt(2023, 11, 30);
    params.extras = vec![
        ExtraPayment::at_month(2, dec!(1500.555)),
        ExtraPayment::at_month(7, dec!(3000)),
    ];
    params = with_projected_correction(params, dec!(0.0007), CorrectionPolicy::RebaseInstallment);
    let result = generate_schedule(&params).unwrap();

    assert_cent_quantized(&result.records);
    let mut previous = dec!(100000);
    for (i, r) in result.records.iter().enumerate() {
        assert_eq!(r.month as usize, i + 1);
        assert_eq!(r.installment, r.amortization + r.interest + r.fee);
        assert_eq!(r.paid, r.installment + r.extra);
        assert!(r.balance <= previous * (Decimal::ONE + r.correction));
        previous = r.balance;
    }
    assert_eq!(result.records.last().unwrap().balance, Decimal::ZERO);
    assert_eq!(result.records[1].extra, dec!(1500.56));
}

#[test]
fn test_identical_inputs_yield_identical_output() {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let mut params = loan(AmortizationSystem::Price);
    params.start_date = Some(start);
    params.correction = Some(IndexCorrection::with_trailing_average(
        CorrectionTable::from_entries([
            (MonthKey::from_date(start), dec!(0.0009)),
            (MonthKey::from_date(start).succ(), dec!(0.0011)),
        ]),
        12,
    ));

    let first = generate_schedule(&params).unwrap();
    let second = generate_schedule(&params).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_validation_errors_return_no_schedule() {
    let mut params = loan(AmortizationSystem::Sac);
    params.principal = dec!(-5);
    let err = generate_schedule(&params).unwrap_err();
    match err {
        AmortizaError::InvalidInput { field, .. } => assert_eq!(field, "principal"),
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_schedule_json_round_trip_from_host_input() {
    let json = r#"{
        "principal": "100000",
        "monthly_rate": "0.01",
        "term_months": 12,
        "system": "PRICE",
        "start_date": "2024-01-15",
        "extras": [{"target": {"date": "2024-03-01"}, "amount": "20000"}],
        "correction": {"table": {"2024-01": "0"}, "policy": "balance_only"}
    }"#;
    let params: LoanParameters = serde_json::from_str(json).unwrap();
    let result = generate_schedule(&params).unwrap();
    assert_eq!(result.months_executed, 10);
    assert_eq!(result.records[2].extra, dec!(20000));
}

#[test]
fn test_oversized_host_principal_is_domain_error() {
    let json = r#"{
        "principal": "79000000000000000000000000000",
        "monthly_rate": "0.01",
        "term_months": 1,
        "system": "sac"
    }"#;
    let params: LoanParameters = serde_json::from_str(json).unwrap();
    assert!(matches!(
        build_schedule(&params),
        Err(AmortizaError::DomainError { .. })
    ));
}
