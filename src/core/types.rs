use serde::Serialize;

pub const DEFAULT_SEARCH_CAP_YEARS: u32 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Unknown {
    LumpSum,
    MonthlyContribution,
    AccumulationYears,
}

/// One solve's worth of parameters. Rates are annual fractions; `None` marks
/// the accumulation-phase variable to solve for.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolveInputs {
    pub monthly_withdrawal_today: f64,
    pub withdrawal_years: f64,
    pub inflation_rate: f64,
    pub annual_return: f64,
    pub tax_rate: f64,
    pub lump_sum: Option<f64>,
    pub monthly_contribution: Option<f64>,
    pub accumulation_years: Option<f64>,
    pub search_cap_years: u32,
}

impl SolveInputs {
    pub fn unknowns(&self) -> Vec<Unknown> {
        let mut unknowns = Vec::with_capacity(3);
        if self.lump_sum.is_none() {
            unknowns.push(Unknown::LumpSum);
        }
        if self.monthly_contribution.is_none() {
            unknowns.push(Unknown::MonthlyContribution);
        }
        if self.accumulation_years.is_none() {
            unknowns.push(Unknown::AccumulationYears);
        }
        unknowns
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwpResult {
    pub lump_sum: f64,
    pub monthly_contribution: f64,
    pub accumulation_years: f64,
    pub corpus_at_retirement: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveKind {
    MonthlyVsInitial,
    YearsVsInitial,
    YearsVsMonthly,
}

impl CurveKind {
    pub fn x_label(self) -> &'static str {
        match self {
            CurveKind::MonthlyVsInitial | CurveKind::YearsVsInitial => "Initial lump sum",
            CurveKind::YearsVsMonthly => "Monthly contribution",
        }
    }

    pub fn y_label(self) -> &'static str {
        match self {
            CurveKind::MonthlyVsInitial => "Monthly contribution required",
            CurveKind::YearsVsInitial | CurveKind::YearsVsMonthly => "Years required",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct CurvePoint {
    pub x: f64,
    /// `None` when the accumulation-period search never met the requirement.
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveResult {
    pub kind: CurveKind,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub points: Vec<CurvePoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceResult {
    pub monthly_contribution_axis: Vec<f64>,
    pub accumulation_years_axis: Vec<f64>,
    /// Row per accumulation period, column per monthly contribution.
    pub lump_sum_grid: Vec<Vec<f64>>,
}
