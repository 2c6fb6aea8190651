use thiserror::Error;
use tracing::debug;

use super::engine::{
    after_tax_coefficients, monthly_rate, months_in, post_tax_corpus, required_corpus,
};
use super::types::{SolveInputs, SwpResult, Unknown};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("exactly one of lump sum, monthly contribution and accumulation years must be unset, got {unset}")]
    InvalidUnknownCount { unset: usize },

    #[error("accumulation period rounds to zero months; no monthly contribution can fund the corpus")]
    DegenerateAccumulation,

    #[error("goal unreachable within {cap_years} years of accumulation")]
    GoalUnreachable { cap_years: u32 },
}

/// Solves for the single unset accumulation variable so that the post-tax
/// corpus funds the inflation-indexed withdrawal plan.
///
/// Lump sum and monthly contribution are solved algebraically; the
/// accumulation period is found by scanning whole months up to
/// `search_cap_years`. The returned corpus is always recomputed from the
/// resolved triple.
///
/// Fails with `DegenerateAccumulation` when solving for the monthly
/// contribution over a period that rounds to zero months.
pub fn solve_swp(inputs: &SolveInputs) -> Result<SwpResult, SolveError> {
    let rate = monthly_rate(inputs.annual_return);
    let (lump_sum, monthly, years) = match (
        inputs.lump_sum,
        inputs.monthly_contribution,
        inputs.accumulation_years,
    ) {
        (None, Some(monthly), Some(years)) => {
            (solve_lump_sum(inputs, rate, monthly, years), monthly, years)
        }
        (Some(lump_sum), None, Some(years)) => (
            lump_sum,
            solve_monthly_contribution(inputs, rate, lump_sum, years)?,
            years,
        ),
        (Some(lump_sum), Some(monthly), None) => (
            lump_sum,
            monthly,
            solve_accumulation_years(inputs, rate, lump_sum, monthly)?,
        ),
        _ => {
            return Err(SolveError::InvalidUnknownCount {
                unset: inputs.unknowns().len(),
            });
        }
    };

    let corpus =
        post_tax_corpus(lump_sum, monthly, rate, months_in(years), inputs.tax_rate);
    Ok(SwpResult {
        lump_sum,
        monthly_contribution: monthly,
        accumulation_years: years,
        corpus_at_retirement: corpus,
    })
}

fn corpus_needed(inputs: &SolveInputs, rate: f64, years: f64) -> f64 {
    required_corpus(
        inputs.monthly_withdrawal_today,
        years,
        inputs.withdrawal_years,
        inputs.inflation_rate,
        rate,
    )
}

fn solve_lump_sum(inputs: &SolveInputs, rate: f64, monthly: f64, years: f64) -> f64 {
    let needed = corpus_needed(inputs, rate, years);
    let coeffs = after_tax_coefficients(rate, months_in(years), inputs.tax_rate);
    let lump_sum = (needed - coeffs.monthly * monthly) / coeffs.lump_sum;
    debug!(unknown = ?Unknown::LumpSum, needed, lump_sum, "solved algebraically");
    if lump_sum < 0.0 {
        debug!(lump_sum, "contributions alone overshoot the requirement");
    }
    lump_sum
}

fn solve_monthly_contribution(
    inputs: &SolveInputs,
    rate: f64,
    lump_sum: f64,
    years: f64,
) -> Result<f64, SolveError> {
    let months = months_in(years);
    if months == 0 {
        return Err(SolveError::DegenerateAccumulation);
    }
    let needed = corpus_needed(inputs, rate, years);
    let coeffs = after_tax_coefficients(rate, months, inputs.tax_rate);
    let monthly = (needed - coeffs.lump_sum * lump_sum) / coeffs.monthly;
    debug!(unknown = ?Unknown::MonthlyContribution, needed, monthly, "solved algebraically");
    if monthly < 0.0 {
        debug!(monthly, "lump sum alone overshoots the requirement");
    }
    Ok(monthly)
}

fn solve_accumulation_years(
    inputs: &SolveInputs,
    rate: f64,
    lump_sum: f64,
    monthly: f64,
) -> Result<f64, SolveError> {
    let cap_months = inputs.search_cap_years.saturating_mul(12);
    for months in 0..=cap_months {
        let years = months as f64 / 12.0;
        let needed = corpus_needed(inputs, rate, years);
        let available = post_tax_corpus(lump_sum, monthly, rate, months, inputs.tax_rate);
        if available >= needed {
            debug!(unknown = ?Unknown::AccumulationYears, months, needed, available, "requirement met");
            return Ok(years);
        }
    }
    debug!(cap_months, "requirement never met");
    Err(SolveError::GoalUnreachable {
        cap_years: inputs.search_cap_years,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DEFAULT_SEARCH_CAP_YEARS;
    use proptest::prelude::{prop_assert, prop_assume, proptest};
    use proptest::test_runner::TestCaseError;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn scenario_inputs() -> SolveInputs {
        SolveInputs {
            monthly_withdrawal_today: 100_000.0,
            withdrawal_years: 10.0,
            inflation_rate: 0.07,
            annual_return: 0.125,
            tax_rate: 0.125,
            lump_sum: None,
            monthly_contribution: None,
            accumulation_years: None,
            search_cap_years: DEFAULT_SEARCH_CAP_YEARS,
        }
    }

    fn needed_at(inputs: &SolveInputs, years: f64) -> f64 {
        corpus_needed(inputs, monthly_rate(inputs.annual_return), years)
    }

    #[test]
    fn rejects_zero_unknowns() {
        let inputs = SolveInputs {
            lump_sum: Some(0.0),
            monthly_contribution: Some(1_000.0),
            accumulation_years: Some(10.0),
            ..scenario_inputs()
        };
        assert_eq!(
            solve_swp(&inputs),
            Err(SolveError::InvalidUnknownCount { unset: 0 })
        );
    }

    #[test]
    fn rejects_two_or_three_unknowns() {
        let two = SolveInputs {
            monthly_contribution: Some(16_000.0),
            ..scenario_inputs()
        };
        assert_eq!(
            solve_swp(&two),
            Err(SolveError::InvalidUnknownCount { unset: 2 })
        );
        assert_eq!(
            solve_swp(&scenario_inputs()),
            Err(SolveError::InvalidUnknownCount { unset: 3 })
        );
    }

    #[test]
    fn accumulation_search_finds_first_crossing_month() {
        let inputs = SolveInputs {
            lump_sum: Some(0.0),
            monthly_contribution: Some(16_000.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert!(result.accumulation_years.is_finite());
        assert_close(result.accumulation_years, 37.75, 1e-9);

        let rate = monthly_rate(inputs.annual_return);
        let months = months_in(result.accumulation_years);
        let needed = needed_at(&inputs, result.accumulation_years);
        let recomputed = post_tax_corpus(0.0, 16_000.0, rate, months, inputs.tax_rate);
        assert_eq!(recomputed, result.corpus_at_retirement);
        assert!(result.corpus_at_retirement >= needed);

        let previous_years = (months - 1) as f64 / 12.0;
        let previous = post_tax_corpus(0.0, 16_000.0, rate, months - 1, inputs.tax_rate);
        assert!(previous < needed_at(&inputs, previous_years));
    }

    #[test]
    fn accumulation_search_with_lump_sum_reference() {
        let inputs = SolveInputs {
            lump_sum: Some(1_000_000.0),
            monthly_contribution: Some(16_000.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_close(result.accumulation_years, 340.0 / 12.0, 1e-9);
        assert_close(result.corpus_at_retirement, 63_948_618.231_571_876, 1e-3);
    }

    #[test]
    fn accumulation_search_when_already_funded() {
        let inputs = SolveInputs {
            lump_sum: Some(1e9),
            monthly_contribution: Some(0.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_eq!(result.accumulation_years, 0.0);
        assert_eq!(result.corpus_at_retirement, 1e9);
    }

    #[test]
    fn accumulation_search_reports_unreachable_goal() {
        let inputs = SolveInputs {
            lump_sum: Some(0.0),
            monthly_contribution: Some(100.0),
            search_cap_years: 5,
            ..scenario_inputs()
        };
        assert_eq!(
            solve_swp(&inputs),
            Err(SolveError::GoalUnreachable { cap_years: 5 })
        );
    }

    #[test]
    fn lump_sum_reference_value() {
        let inputs = SolveInputs {
            monthly_contribution: Some(16_000.0),
            accumulation_years: Some(20.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_close(result.lump_sum, 2_375_175.160_525_564_6, 1e-4);
        assert_close(result.corpus_at_retirement, 36_240_488.023_297_474, 1e-3);
        assert_close(
            result.corpus_at_retirement,
            needed_at(&inputs, 20.0),
            1e-6 * result.corpus_at_retirement,
        );
    }

    #[test]
    fn lump_sum_over_half_month_period_rounds_to_even() {
        let inputs = SolveInputs {
            monthly_contribution: Some(16_000.0),
            accumulation_years: Some(10.375),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_close(result.lump_sum, 4_958_769.338_630_793, 1e-4);
        assert_close(result.corpus_at_retirement, 18_896_230.466_378_048, 1e-3);
    }

    #[test]
    fn accumulation_search_with_half_month_horizon() {
        let inputs = SolveInputs {
            withdrawal_years: 0.375,
            lump_sum: Some(0.0),
            monthly_contribution: Some(16_000.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_eq!(result.accumulation_years, 26.0 / 12.0);
        assert_close(result.corpus_at_retirement, 464_630.532_594_822_2, 1e-6);
    }

    #[test]
    fn monthly_contribution_reference_value() {
        let inputs = SolveInputs {
            lump_sum: Some(0.0),
            accumulation_years: Some(20.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_close(result.monthly_contribution, 41_335.172_598_686_17, 1e-6);
        assert_close(result.corpus_at_retirement, 36_240_488.023_297_474, 1e-3);
    }

    #[test]
    fn monthly_contribution_over_zero_months_is_degenerate() {
        let inputs = SolveInputs {
            lump_sum: Some(0.0),
            accumulation_years: Some(0.0),
            ..scenario_inputs()
        };
        assert_eq!(solve_swp(&inputs), Err(SolveError::DegenerateAccumulation));
    }

    #[test]
    fn lump_sum_over_zero_months_is_required_corpus() {
        let inputs = SolveInputs {
            monthly_contribution: Some(0.0),
            accumulation_years: Some(0.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_close(result.lump_sum, needed_at(&inputs, 0.0), 1e-6);
        assert_close(result.corpus_at_retirement, result.lump_sum, 1e-6);
    }

    #[test]
    fn zero_return_reduces_to_contributed_principal() {
        let inputs = SolveInputs {
            annual_return: 0.0,
            inflation_rate: 0.0,
            monthly_withdrawal_today: 1_000.0,
            withdrawal_years: 1.0,
            lump_sum: Some(0.0),
            accumulation_years: Some(1.0),
            ..scenario_inputs()
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_close(result.monthly_contribution, 1_000.0, 1e-9);
        assert_close(result.corpus_at_retirement, 12_000.0, 1e-9);
    }

    #[test]
    fn return_equal_to_inflation_searches_months() {
        let inputs = SolveInputs {
            monthly_withdrawal_today: 1_000.0,
            withdrawal_years: 1.0,
            inflation_rate: 0.05,
            annual_return: 0.05,
            tax_rate: 0.1,
            lump_sum: Some(0.0),
            monthly_contribution: Some(100.0),
            accumulation_years: None,
            search_cap_years: DEFAULT_SEARCH_CAP_YEARS,
        };
        let result = solve_swp(&inputs).expect("must solve");
        assert_close(result.accumulation_years, 172.0 / 12.0, 1e-9);
        assert_close(result.corpus_at_retirement, 24_084.458_871_586_12, 1e-6);
    }

    #[test]
    fn solve_error_messages_are_descriptive() {
        assert_eq!(
            SolveError::GoalUnreachable { cap_years: 5 }.to_string(),
            "goal unreachable within 5 years of accumulation"
        );
        assert!(
            SolveError::InvalidUnknownCount { unset: 2 }
                .to_string()
                .ends_with("got 2")
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_lump_sum_and_contribution_round_trip(
            withdrawal in 1_000u32..200_000,
            horizon in 1u32..40,
            accumulation_half_months in 2u32..960,
            monthly in 0u32..100_000,
            inflation_bp in 0u32..1000,
            return_bp in 0u32..1800,
            tax_bp in 0u32..5000,
        ) {
            let base = SolveInputs {
                monthly_withdrawal_today: withdrawal as f64,
                withdrawal_years: horizon as f64,
                inflation_rate: inflation_bp as f64 / 10_000.0,
                annual_return: return_bp as f64 / 10_000.0,
                tax_rate: tax_bp as f64 / 10_000.0,
                lump_sum: None,
                monthly_contribution: Some(monthly as f64),
                accumulation_years: Some(accumulation_half_months as f64 / 24.0),
                search_cap_years: DEFAULT_SEARCH_CAP_YEARS,
            };
            let first = solve_swp(&base).expect("lump sum solve");
            prop_assume!(first.lump_sum >= 0.0);

            let back = solve_swp(&SolveInputs {
                lump_sum: Some(first.lump_sum),
                monthly_contribution: None,
                ..base
            })
            .expect("monthly solve");
            let tol = 1e-6 * (monthly as f64).max(1.0) + 1e-9 * first.corpus_at_retirement;
            prop_assert!((back.monthly_contribution - monthly as f64).abs() <= tol);

            let needed = needed_at(&base, base.accumulation_years.unwrap_or_default());
            prop_assert!((first.corpus_at_retirement - needed).abs() <= 1e-9 * needed.max(1.0));
        }

        #[test]
        fn prop_accumulation_result_is_first_crossing(
            withdrawal in 1_000u32..100_000,
            horizon_half_months in 12u32..720,
            lump_sum in 0u32..5_000_000,
            monthly in 1_000u32..100_000,
            inflation_bp in 0u32..800,
            return_bp in 500u32..1800,
            tax_bp in 0u32..3000,
        ) {
            let inputs = SolveInputs {
                monthly_withdrawal_today: withdrawal as f64,
                withdrawal_years: horizon_half_months as f64 / 24.0,
                inflation_rate: inflation_bp as f64 / 10_000.0,
                annual_return: return_bp as f64 / 10_000.0,
                tax_rate: tax_bp as f64 / 10_000.0,
                lump_sum: Some(lump_sum as f64),
                monthly_contribution: Some(monthly as f64),
                accumulation_years: None,
                search_cap_years: DEFAULT_SEARCH_CAP_YEARS,
            };
            let result = match solve_swp(&inputs) {
                Ok(result) => result,
                Err(SolveError::GoalUnreachable { .. }) => return Ok(()),
                Err(e) => return Err(TestCaseError::fail(format!("unexpected error: {e}"))),
            };
            let rate = monthly_rate(inputs.annual_return);
            let months = months_in(result.accumulation_years);
            prop_assert!(result.corpus_at_retirement >= needed_at(&inputs, result.accumulation_years));
            assert_recomputed_corpus(&inputs, rate, months, result.corpus_at_retirement)?;
            if months > 0 {
                let earlier_years = (months - 1) as f64 / 12.0;
                let earlier = post_tax_corpus(
                    lump_sum as f64,
                    monthly as f64,
                    rate,
                    months - 1,
                    inputs.tax_rate,
                );
                prop_assert!(earlier < needed_at(&inputs, earlier_years));
            }
        }
    }

    fn assert_recomputed_corpus(
        inputs: &SolveInputs,
        rate: f64,
        months: u32,
        corpus: f64,
    ) -> Result<(), TestCaseError> {
        let recomputed = post_tax_corpus(
            inputs.lump_sum.unwrap_or_default(),
            inputs.monthly_contribution.unwrap_or_default(),
            rate,
            months,
            inputs.tax_rate,
        );
        prop_assert!(recomputed == corpus, "recomputed {recomputed} != {corpus}");
        Ok(())
    }
}
