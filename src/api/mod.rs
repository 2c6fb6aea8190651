use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    CurveResult, DEFAULT_CURVE_SAMPLES, DEFAULT_SEARCH_CAP_YEARS, DEFAULT_SURFACE_SAMPLES,
    SolveError, SolveInputs, SurfaceResult, SwpResult, Unknown, monthly_rate, required_corpus,
    solve_swp, sweep_curve, sweep_surface,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolvePayload {
    monthly_withdrawal: Option<f64>,
    withdrawal_years: Option<f64>,
    inflation_rate: Option<f64>,
    annual_return: Option<f64>,
    tax_rate: Option<f64>,

    lump_sum: Option<f64>,
    monthly_contribution: Option<f64>,
    accumulation_years: Option<f64>,

    search_cap_years: Option<u32>,
    curve_samples: Option<usize>,
    surface_samples: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(
    name = "swp",
    about = "Solve lump sum, monthly contribution or accumulation years for an inflation-indexed SWP"
)]
struct Cli {
    #[arg(
        long,
        default_value_t = 100_000.0,
        help = "Desired monthly withdrawal in today's money"
    )]
    monthly_withdrawal: f64,
    #[arg(long, default_value_t = 10.0, help = "Years the withdrawals continue")]
    withdrawal_years: f64,
    #[arg(long, default_value_t = 7.0, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(long, default_value_t = 12.5, help = "Annual pre-tax return in percent")]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = 12.5,
        help = "Capital gains tax on the corpus gain in percent"
    )]
    tax_rate: f64,
    #[arg(long, help = "Upfront lump sum; omit to solve for it")]
    lump_sum: Option<f64>,
    #[arg(long, help = "Monthly contribution; omit to solve for it")]
    monthly_contribution: Option<f64>,
    #[arg(long, help = "Accumulation period in years; omit to solve for it")]
    accumulation_years: Option<f64>,
    #[arg(
        long,
        default_value_t = DEFAULT_SEARCH_CAP_YEARS,
        help = "Longest accumulation period searched when solving for years"
    )]
    search_cap_years: u32,
    #[arg(long, default_value_t = DEFAULT_CURVE_SAMPLES, help = "Points on the trade-off curve")]
    curve_samples: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_SURFACE_SAMPLES,
        help = "Grid points per axis on the requirement surface"
    )]
    surface_samples: usize,
    #[arg(long, help = "Print JSON instead of a table")]
    json: bool,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: SolveInputs,
    curve_samples: usize,
    surface_samples: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    unknown: Unknown,
    result: SwpResult,
    required_corpus: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: &Cli) -> Result<SolveInputs, String> {
    if !cli.monthly_withdrawal.is_finite() || cli.monthly_withdrawal <= 0.0 {
        return Err("--monthly-withdrawal must be > 0".to_string());
    }

    if !cli.withdrawal_years.is_finite() || cli.withdrawal_years <= 0.0 {
        return Err("--withdrawal-years must be > 0".to_string());
    }

    for (name, rate) in [
        ("--inflation-rate", cli.inflation_rate),
        ("--annual-return", cli.annual_return),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    if !(0.0..=100.0).contains(&cli.tax_rate) {
        return Err("--tax-rate must be between 0 and 100".to_string());
    }

    for (name, value) in [
        ("--lump-sum", cli.lump_sum),
        ("--monthly-contribution", cli.monthly_contribution),
        ("--accumulation-years", cli.accumulation_years),
    ] {
        if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
            return Err(format!("{name} must be >= 0"));
        }
    }

    if cli.search_cap_years == 0 {
        return Err("--search-cap-years must be > 0".to_string());
    }

    if cli.curve_samples < 2 || cli.surface_samples < 2 {
        return Err("--curve-samples and --surface-samples must be >= 2".to_string());
    }

    Ok(SolveInputs {
        monthly_withdrawal_today: cli.monthly_withdrawal,
        withdrawal_years: cli.withdrawal_years,
        inflation_rate: cli.inflation_rate / 100.0,
        annual_return: cli.annual_return / 100.0,
        tax_rate: cli.tax_rate / 100.0,
        lump_sum: cli.lump_sum,
        monthly_contribution: cli.monthly_contribution,
        accumulation_years: cli.accumulation_years,
        search_cap_years: cli.search_cap_years,
    })
}

/// Parses command-line arguments and prints a single solve, a trade-off
/// curve or a requirement surface depending on how many variables are unset.
pub fn run_cli<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let inputs = build_inputs(&cli)?;

    match inputs.unknowns().len() {
        0 => Err("Nothing to solve: all three variables provided.".to_string()),
        1 => {
            let response = solve_inputs(&inputs).map_err(|e| e.to_string())?;
            if cli.json {
                println!("{}", to_json(&response)?);
            } else {
                print!("{}", render_result(&response.result));
            }
            Ok(())
        }
        2 => {
            let curve = sweep_curve(&inputs, cli.curve_samples).map_err(|e| e.to_string())?;
            if cli.json {
                println!("{}", to_json(&curve)?);
            } else {
                println!("{}", plan_title(&inputs));
                print!("{}", render_curve(&curve));
            }
            Ok(())
        }
        _ => {
            let surface = sweep_surface(&inputs, cli.surface_samples, cli.surface_samples)
                .map_err(|e| e.to_string())?;
            if cli.json {
                println!("{}", to_json(&surface)?);
            } else {
                println!("{}", plan_title(&inputs));
                print!("{}", render_surface(&surface));
            }
            Ok(())
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode JSON: {e}"))
}

fn solve_inputs(inputs: &SolveInputs) -> Result<SolveResponse, SolveError> {
    let result = solve_swp(inputs)?;
    let unknown = inputs.unknowns()[0];
    let needed = required_corpus(
        inputs.monthly_withdrawal_today,
        result.accumulation_years,
        inputs.withdrawal_years,
        inputs.inflation_rate,
        monthly_rate(inputs.annual_return),
    );
    Ok(SolveResponse {
        unknown,
        result,
        required_corpus: needed,
    })
}

fn plan_title(inputs: &SolveInputs) -> String {
    format!(
        "Tax rate = {:.1}%, Inflation rate = {:.1}%, Annual return = {:.1}%, \
         Withdrawal horizon = {} years, Monthly withdrawal = {}",
        inputs.tax_rate * 100.0,
        inputs.inflation_rate * 100.0,
        inputs.annual_return * 100.0,
        inputs.withdrawal_years,
        format_amount(inputs.monthly_withdrawal_today),
    )
}

fn render_result(result: &SwpResult) -> String {
    let mut out = String::from("\n─ Result ─\n");
    for (key, value) in [
        ("lump_sum", result.lump_sum),
        ("monthly_contribution", result.monthly_contribution),
        ("accumulation_years", result.accumulation_years),
        ("corpus_at_retirement", result.corpus_at_retirement),
    ] {
        out.push_str(&format!("{key:<25}: {}\n", format_amount(value)));
    }
    out.push('\n');
    out
}

fn render_curve(curve: &CurveResult) -> String {
    let mut out = format!("{:>20}  {}\n", curve.x_label, curve.y_label);
    for point in &curve.points {
        let y = point
            .y
            .map(format_amount)
            .unwrap_or_else(|| "unreachable".to_string());
        out.push_str(&format!("{:>20}  {y}\n", format_amount(point.x)));
    }
    out
}

fn render_surface(surface: &SurfaceResult) -> String {
    let mut out = String::from("Initial requirement surface (negatives clipped)\n");
    out.push_str(&format!("{:>8}", "years"));
    for monthly in &surface.monthly_contribution_axis {
        out.push_str(&format!(" {:>16}", format_amount(*monthly)));
    }
    out.push('\n');
    for (years, row) in surface
        .accumulation_years_axis
        .iter()
        .zip(&surface.lump_sum_grid)
    {
        out.push_str(&format!("{years:>8.2}"));
        for value in row {
            out.push_str(&format!(" {:>16}", format_amount(*value)));
        }
        out.push('\n');
    }
    out
}

/// Two decimals with comma thousands separators, e.g. `1,234,567.89`.
fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/solve", get(solve_get_handler).post(solve_post_handler))
        .route("/api/curve", get(curve_get_handler).post(curve_post_handler))
        .route(
            "/api/surface",
            get(surface_get_handler).post(surface_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "SWP HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/solve");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn solve_get_handler(Query(payload): Query<SolvePayload>) -> Response {
    solve_response(payload)
}

async fn solve_post_handler(Json(payload): Json<SolvePayload>) -> Response {
    solve_response(payload)
}

async fn curve_get_handler(Query(payload): Query<SolvePayload>) -> Response {
    curve_response(payload)
}

async fn curve_post_handler(Json(payload): Json<SolvePayload>) -> Response {
    curve_response(payload)
}

async fn surface_get_handler(Query(payload): Query<SolvePayload>) -> Response {
    surface_response(payload)
}

async fn surface_post_handler(Json(payload): Json<SolvePayload>) -> Response {
    surface_response(payload)
}

fn solve_response(payload: SolvePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match solve_inputs(&request.inputs) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => solve_error_response(&e),
    }
}

fn curve_response(payload: SolvePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match sweep_curve(&request.inputs, request.curve_samples) {
        Ok(curve) => json_response(StatusCode::OK, curve),
        Err(e) => solve_error_response(&e),
    }
}

fn surface_response(payload: SolvePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match sweep_surface(
        &request.inputs,
        request.surface_samples,
        request.surface_samples,
    ) {
        Ok(surface) => json_response(StatusCode::OK, surface),
        Err(e) => solve_error_response(&e),
    }
}

fn solve_error_status(err: &SolveError) -> StatusCode {
    match err {
        SolveError::GoalUnreachable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SolveError::InvalidUnknownCount { .. } | SolveError::DegenerateAccumulation => {
            StatusCode::BAD_REQUEST
        }
    }
}

fn solve_error_response(err: &SolveError) -> Response {
    warn!(error = %err, "solve rejected");
    error_response(solve_error_status(err), &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SolvePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SolvePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.monthly_withdrawal {
        cli.monthly_withdrawal = v;
    }
    if let Some(v) = payload.withdrawal_years {
        cli.withdrawal_years = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.tax_rate {
        cli.tax_rate = v;
    }

    cli.lump_sum = payload.lump_sum;
    cli.monthly_contribution = payload.monthly_contribution;
    cli.accumulation_years = payload.accumulation_years;

    if let Some(v) = payload.search_cap_years {
        cli.search_cap_years = v;
    }
    if let Some(v) = payload.curve_samples {
        cli.curve_samples = v;
    }
    if let Some(v) = payload.surface_samples {
        cli.surface_samples = v;
    }

    let inputs = build_inputs(&cli)?;
    Ok(ApiRequest {
        inputs,
        curve_samples: cli.curve_samples,
        surface_samples: cli.surface_samples,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        monthly_withdrawal: 100_000.0,
        withdrawal_years: 10.0,
        inflation_rate: 7.0,
        annual_return: 12.5,
        tax_rate: 12.5,
        lump_sum: None,
        monthly_contribution: None,
        accumulation_years: None,
        search_cap_years: DEFAULT_SEARCH_CAP_YEARS,
        curve_samples: DEFAULT_CURVE_SAMPLES,
        surface_samples: DEFAULT_SURFACE_SAMPLES,
        json: false,
    }
}
