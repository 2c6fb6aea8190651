/// Below this magnitude a monthly rate is treated as zero, or two rates as equal.
pub const RATE_EPSILON: f64 = 1e-12;

const MONTHS_PER_YEAR: f64 = 12.0;

/// Linear multipliers a lump sum and a monthly contribution each carry into
/// the post-tax corpus, assuming the pre-tax gain is non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AfterTaxCoefficients {
    pub lump_sum: f64,
    pub monthly: f64,
}

/// Effective monthly rate that compounds to `annual_rate` over twelve months.
pub fn monthly_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / MONTHS_PER_YEAR) - 1.0
}

/// Whole months in `years`, half-months rounded to even, negatives clamped to zero.
pub fn months_in(years: f64) -> u32 {
    (years * MONTHS_PER_YEAR).round_ties_even().max(0.0) as u32
}

fn annuity_factor(rate: f64, months: u32) -> f64 {
    if rate.abs() > RATE_EPSILON {
        ((1.0 + rate).powf(months as f64) - 1.0) / rate
    } else {
        months as f64
    }
}

/// Pre-tax value after `months` of a lump sum plus end-of-month contributions.
pub fn future_value(lump_sum: f64, monthly: f64, rate: f64, months: u32) -> f64 {
    lump_sum * (1.0 + rate).powf(months as f64) + monthly * annuity_factor(rate, months)
}

/// Future value net of capital-gains tax on the gain over contributed principal.
/// Losses earn no credit.
pub fn post_tax_corpus(lump_sum: f64, monthly: f64, rate: f64, months: u32, tax_rate: f64) -> f64 {
    let gross = future_value(lump_sum, monthly, rate, months);
    let basis = lump_sum + monthly * months as f64;
    let gain = gross - basis;
    gross - gain.max(0.0) * tax_rate
}

/// Corpus needed at retirement to fund an inflation-indexed monthly withdrawal.
///
/// `monthly_withdrawal_today` is inflated over `accumulation_years` to give the
/// first nominal withdrawal, which then grows with monthly inflation for
/// `withdrawal_years` and is discounted at `monthly_return`.
pub fn required_corpus(
    monthly_withdrawal_today: f64,
    accumulation_years: f64,
    withdrawal_years: f64,
    inflation_rate: f64,
    monthly_return: f64,
) -> f64 {
    let growth = monthly_rate(inflation_rate);
    let payments = (withdrawal_years * MONTHS_PER_YEAR).round_ties_even();
    let first_withdrawal = monthly_withdrawal_today * (1.0 + inflation_rate).powf(accumulation_years);

    if (monthly_return - growth).abs() < RATE_EPSILON {
        return first_withdrawal * payments / (1.0 + monthly_return);
    }
    let ratio = (1.0 + growth) / (1.0 + monthly_return);
    first_withdrawal * (1.0 - ratio.powf(payments)) / (monthly_return - growth)
}

/// Multipliers for a lump sum and a monthly contribution held for `months`.
pub fn after_tax_coefficients(rate: f64, months: u32, tax_rate: f64) -> AfterTaxCoefficients {
    let growth = (1.0 + rate).powf(months as f64);
    AfterTaxCoefficients {
        lump_sum: (1.0 - tax_rate) * growth + tax_rate,
        monthly: (1.0 - tax_rate) * annuity_factor(rate, months) + tax_rate * months as f64,
    }
}
