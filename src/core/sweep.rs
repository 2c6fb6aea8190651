use tracing::debug;

use super::solver::{SolveError, solve_swp};
use super::types::{CurveKind, CurvePoint, CurveResult, SolveInputs, SurfaceResult, SwpResult};

pub const DEFAULT_CURVE_SAMPLES: usize = 250;
pub const DEFAULT_SURFACE_SAMPLES: usize = 40;

const LUMP_SUM_AXIS_MULTIPLE: f64 = 50.0;
const MONTHLY_AXIS_START: f64 = 100.0;
const MONTHLY_AXIS_MULTIPLE: f64 = 4.0;
const SURFACE_MIN_YEARS: f64 = 1.0;
const SURFACE_MAX_YEARS: f64 = 30.0;

/// Trades off the two unset accumulation variables against each other.
///
/// The variable that stays unknown in every solve is the y axis; the other
/// one is swept. Negative solutions are clipped to zero.
pub fn sweep_curve(inputs: &SolveInputs, samples: usize) -> Result<CurveResult, SolveError> {
    let unknowns = inputs.unknowns();
    if unknowns.len() != 2 {
        return Err(SolveError::InvalidUnknownCount {
            unset: unknowns.len(),
        });
    }

    let lump_sum_axis = || {
        linspace(
            0.0,
            inputs.monthly_withdrawal_today * LUMP_SUM_AXIS_MULTIPLE,
            samples,
        )
    };
    let (kind, xs) = if inputs.accumulation_years.is_some() {
        (CurveKind::MonthlyVsInitial, lump_sum_axis())
    } else if inputs.monthly_contribution.is_some() {
        (CurveKind::YearsVsInitial, lump_sum_axis())
    } else {
        (CurveKind::YearsVsMonthly, monthly_axis(inputs, samples))
    };

    let mut points = Vec::with_capacity(xs.len());
    for x in xs {
        let y = match kind {
            CurveKind::MonthlyVsInitial => {
                let result = solve_swp(&SolveInputs {
                    lump_sum: Some(x),
                    ..*inputs
                })?;
                Some(result.monthly_contribution)
            }
            CurveKind::YearsVsInitial => {
                years_or_unreachable(solve_swp(&SolveInputs {
                    lump_sum: Some(x),
                    ..*inputs
                }))?
            }
            CurveKind::YearsVsMonthly => {
                years_or_unreachable(solve_swp(&SolveInputs {
                    monthly_contribution: Some(x),
                    ..*inputs
                }))?
            }
        };
        points.push(CurvePoint {
            x,
            y: y.map(|v| v.max(0.0)),
        });
    }

    debug!(?kind, samples = points.len(), "curve swept");
    Ok(CurveResult {
        kind,
        x_label: kind.x_label(),
        y_label: kind.y_label(),
        points,
    })
}

/// Lump sum required across a monthly-contribution by accumulation-period
/// grid. Requires all three accumulation variables unset.
pub fn sweep_surface(
    inputs: &SolveInputs,
    monthly_samples: usize,
    years_samples: usize,
) -> Result<SurfaceResult, SolveError> {
    let unknowns = inputs.unknowns();
    if unknowns.len() != 3 {
        return Err(SolveError::InvalidUnknownCount {
            unset: unknowns.len(),
        });
    }

    let monthly_contribution_axis = monthly_axis(inputs, monthly_samples);
    let accumulation_years_axis = linspace(SURFACE_MIN_YEARS, SURFACE_MAX_YEARS, years_samples);

    let mut lump_sum_grid = Vec::with_capacity(accumulation_years_axis.len());
    for &years in &accumulation_years_axis {
        let mut row = Vec::with_capacity(monthly_contribution_axis.len());
        for &monthly in &monthly_contribution_axis {
            let result = solve_swp(&SolveInputs {
                monthly_contribution: Some(monthly),
                accumulation_years: Some(years),
                ..*inputs
            })?;
            row.push(result.lump_sum.max(0.0));
        }
        lump_sum_grid.push(row);
    }

    debug!(
        rows = lump_sum_grid.len(),
        cols = monthly_contribution_axis.len(),
        "surface swept"
    );
    Ok(SurfaceResult {
        monthly_contribution_axis,
        accumulation_years_axis,
        lump_sum_grid,
    })
}

fn years_or_unreachable(result: Result<SwpResult, SolveError>) -> Result<Option<f64>, SolveError> {
    match result {
        Ok(result) => Ok(Some(result.accumulation_years)),
        Err(SolveError::GoalUnreachable { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn monthly_axis(inputs: &SolveInputs, samples: usize) -> Vec<f64> {
    linspace(
        MONTHLY_AXIS_START,
        inputs.monthly_withdrawal_today * MONTHLY_AXIS_MULTIPLE,
        samples,
    )
}

/// `samples` evenly spaced values from `start` to `end`, both inclusive.
fn linspace(start: f64, end: f64, samples: usize) -> Vec<f64> {
    match samples {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (samples - 1) as f64;
            (0..samples)
                .map(|i| {
                    if i == samples - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}
