mod engine;
mod solver;
mod sweep;
mod types;

pub use engine::{
    AfterTaxCoefficients, after_tax_coefficients, future_value, monthly_rate, months_in,
    post_tax_corpus, required_corpus,
};
pub use solver::{SolveError, solve_swp};
pub use sweep::{DEFAULT_CURVE_SAMPLES, DEFAULT_SURFACE_SAMPLES, sweep_curve, sweep_surface};
pub use types::{
    CurveKind, CurvePoint, CurveResult, DEFAULT_SEARCH_CAP_YEARS, SolveInputs, SurfaceResult,
    SwpResult, Unknown,
};
