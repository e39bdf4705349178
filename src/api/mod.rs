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
    Comparison, DepositInvestment, Inputs, MAX_HORIZON_YEARS, MAX_TERM_YEARS, ModelError,
    PaymentBreakdown, ScenarioCalculator, StampDutyBreakdown, TaxSummary, amortization_schedule,
    equivalent_deposit_investment,
};

const PERIODS_PER_YEAR: u32 = 12;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    property_price: Option<f64>,
    deposit_percent: Option<f64>,
    upfront_costs: Option<f64>,
    mortgage_rate: Option<f64>,
    mortgage_term: Option<u32>,
    rental_yield: Option<f64>,
    weekly_rent: Option<f64>,
    property_growth: Option<f64>,
    rental_inflation: Option<f64>,
    stock_return: Option<f64>,
    property_expenses: Option<f64>,
    gross_income: Option<f64>,
    salary_growth: Option<f64>,
    first_home_buyer: Option<bool>,
    horizon_years: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "housing-compare",
    about = "Compare Buy to Live, Buy to Rent and Rent & Invest under Australian tax and stamp duty rules"
)]
struct Cli {
    #[arg(long, default_value_t = 800_000.0)]
    property_price: f64,
    #[arg(long, default_value_t = 20.0, help = "Deposit as a percent of the price")]
    deposit_percent: f64,
    #[arg(
        long,
        default_value_t = 3_000.0,
        help = "Legal and conveyancing costs paid at purchase"
    )]
    upfront_costs: f64,
    #[arg(long, default_value_t = 6.0, help = "Annual mortgage rate in percent")]
    mortgage_rate: f64,
    #[arg(long, default_value_t = 30)]
    mortgage_term_years: u32,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Gross rental yield of the investment property in percent"
    )]
    rental_yield: f64,
    #[arg(long, default_value_t = 650.0, help = "Weekly rent paid while renting")]
    weekly_rent: f64,
    #[arg(long, default_value_t = 5.0, help = "Annual property growth in percent")]
    property_growth_rate: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual rent inflation in percent")]
    rental_inflation_rate: f64,
    #[arg(long, default_value_t = 7.0, help = "Annual stock return in percent")]
    stock_return_rate: f64,
    #[arg(
        long,
        default_value_t = 1.0,
        help = "Rates, insurance and maintenance in percent of property value"
    )]
    property_expense_rate: f64,
    #[arg(long, default_value_t = 120_000.0)]
    gross_income: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual salary growth in percent")]
    salary_growth_rate: f64,
    #[arg(long, default_value_t = false)]
    first_home_buyer: bool,
    #[arg(long, default_value_t = 30)]
    horizon_years: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StampDutyComparison {
    owner_occupier: StampDutyBreakdown,
    investor: StampDutyBreakdown,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    inputs: Inputs,
    stamp_duty: StampDutyComparison,
    mortgage: Option<PaymentBreakdown>,
    starting_tax: TaxSummary,
    deposit_in_stocks: DepositInvestment,
    comparison: Comparison,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn require_percent(value: f64, flag: &str) -> Result<f64, String> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(format!("--{flag} must be between 0 and 100"));
    }
    Ok(value / 100.0)
}

fn require_non_negative_percent(value: f64, flag: &str) -> Result<f64, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("--{flag} must be >= 0"));
    }
    Ok(value / 100.0)
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if !cli.property_price.is_finite() || cli.property_price <= 0.0 {
        return Err("--property-price must be > 0".to_string());
    }

    if !cli.upfront_costs.is_finite() || cli.upfront_costs < 0.0 {
        return Err("--upfront-costs must be >= 0".to_string());
    }

    if !(1..=MAX_TERM_YEARS).contains(&cli.mortgage_term_years) {
        return Err(format!("--mortgage-term-years must be between 1 and {MAX_TERM_YEARS}"));
    }

    if !cli.weekly_rent.is_finite() || cli.weekly_rent < 0.0 {
        return Err("--weekly-rent must be >= 0".to_string());
    }

    if !cli.gross_income.is_finite() || cli.gross_income < 0.0 {
        return Err("--gross-income must be >= 0".to_string());
    }

    if !(1..=MAX_HORIZON_YEARS).contains(&cli.horizon_years) {
        return Err(format!("--horizon-years must be between 1 and {MAX_HORIZON_YEARS}"));
    }

    let inputs = Inputs {
        property_price: cli.property_price,
        deposit_fraction: require_percent(cli.deposit_percent, "deposit-percent")?,
        upfront_costs: cli.upfront_costs,
        mortgage_rate: require_non_negative_percent(cli.mortgage_rate, "mortgage-rate")?,
        mortgage_term_years: cli.mortgage_term_years,
        rental_yield: require_percent(cli.rental_yield, "rental-yield")?,
        weekly_rent: cli.weekly_rent,
        property_growth_rate: require_non_negative_percent(
            cli.property_growth_rate,
            "property-growth-rate",
        )?,
        rental_inflation_rate: require_non_negative_percent(
            cli.rental_inflation_rate,
            "rental-inflation-rate",
        )?,
        stock_return_rate: require_non_negative_percent(
            cli.stock_return_rate,
            "stock-return-rate",
        )?,
        property_expense_rate: require_percent(
            cli.property_expense_rate,
            "property-expense-rate",
        )?,
        gross_income: cli.gross_income,
        salary_growth_rate: require_non_negative_percent(
            cli.salary_growth_rate,
            "salary-growth-rate",
        )?,
        first_home_buyer: cli.first_home_buyer,
        horizon_years: cli.horizon_years,
    };

    inputs.validate().map_err(|e| e.to_string())?;
    Ok(inputs)
}

/// Parses command-line arguments (program name first) and returns the
/// comparison as pretty-printed JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;
    let inputs = build_inputs(cli)?;
    let calculator = ScenarioCalculator::australian().map_err(|e| e.to_string())?;
    let response = build_compare_response(&calculator, inputs).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to serialize: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "housing comparison API listening");
    info!("local access: http://127.0.0.1:{port}/api/compare");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn compare_get_handler(Query(payload): Query<ComparePayload>) -> Response {
    compare_handler_impl(payload).await
}

async fn compare_post_handler(Json(payload): Json<ComparePayload>) -> Response {
    compare_handler_impl(payload).await
}

async fn compare_handler_impl(payload: ComparePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => {
            warn!(error = %msg, "rejected comparison request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    info!(
        property_price = inputs.property_price,
        deposit_fraction = inputs.deposit_fraction,
        first_home_buyer = inputs.first_home_buyer,
        horizon_years = inputs.horizon_years,
        "comparison request"
    );

    let calculator = match ScenarioCalculator::australian() {
        Ok(calculator) => calculator,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    match build_compare_response(&calculator, inputs) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(ModelError::InvalidInput(msg)) => {
            warn!(error = %msg, "comparison failed on input");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
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
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<ComparePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: ComparePayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.property_price {
        cli.property_price = v;
    }
    if let Some(v) = payload.deposit_percent {
        cli.deposit_percent = v;
    }
    if let Some(v) = payload.upfront_costs {
        cli.upfront_costs = v;
    }
    if let Some(v) = payload.mortgage_rate {
        cli.mortgage_rate = v;
    }
    if let Some(v) = payload.mortgage_term {
        cli.mortgage_term_years = v;
    }
    if let Some(v) = payload.rental_yield {
        cli.rental_yield = v;
    }
    if let Some(v) = payload.weekly_rent {
        cli.weekly_rent = v;
    }
    if let Some(v) = payload.property_growth {
        cli.property_growth_rate = v;
    }
    if let Some(v) = payload.rental_inflation {
        cli.rental_inflation_rate = v;
    }
    if let Some(v) = payload.stock_return {
        cli.stock_return_rate = v;
    }
    if let Some(v) = payload.property_expenses {
        cli.property_expense_rate = v;
    }
    if let Some(v) = payload.gross_income {
        cli.gross_income = v;
    }
    if let Some(v) = payload.salary_growth {
        cli.salary_growth_rate = v;
    }
    if let Some(v) = payload.first_home_buyer {
        cli.first_home_buyer = v;
    }
    if let Some(v) = payload.horizon_years {
        cli.horizon_years = v;
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        property_price: 800_000.0,
        deposit_percent: 20.0,
        upfront_costs: 3_000.0,
        mortgage_rate: 6.0,
        mortgage_term_years: 30,
        rental_yield: 4.0,
        weekly_rent: 650.0,
        property_growth_rate: 5.0,
        rental_inflation_rate: 3.0,
        stock_return_rate: 7.0,
        property_expense_rate: 1.0,
        gross_income: 120_000.0,
        salary_growth_rate: 3.0,
        first_home_buyer: false,
        horizon_years: 30,
    }
}

fn build_compare_response(
    calculator: &ScenarioCalculator,
    inputs: Inputs,
) -> Result<CompareResponse, ModelError> {
    let comparison = calculator.compare(&inputs)?;
    let stamp_duty = StampDutyComparison {
        owner_occupier: calculator
            .stamp_duty()
            .breakdown(inputs.property_price, inputs.first_home_buyer)?,
        investor: calculator
            .stamp_duty()
            .breakdown(inputs.property_price, false)?,
    };
    let loan_amount = inputs.loan_amount();
    let mortgage = if loan_amount > 0.0 {
        Some(
            amortization_schedule(
                loan_amount,
                inputs.mortgage_rate,
                inputs.mortgage_term_years,
                PERIODS_PER_YEAR,
            )?
            .breakdown(),
        )
    } else {
        None
    };
    let starting_tax = calculator.tax().tax_summary(inputs.gross_income)?;
    let deposit_in_stocks = equivalent_deposit_investment(
        inputs.deposit(),
        inputs.stock_return_rate,
        inputs.horizon_years,
    )?;

    Ok(CompareResponse {
        inputs,
        stamp_duty,
        mortgage,
        starting_tax,
        deposit_in_stocks,
        comparison,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn clap_defaults_match_api_defaults() {
        let parsed = Cli::try_parse_from(["housing-compare"]).expect("defaults parse");
        let defaults = default_cli_for_api();
        assert_eq!(
            build_inputs(parsed).expect("valid"),
            build_inputs(defaults).expect("valid")
        );
    }

    #[test]
    fn build_inputs_converts_percents_to_fractions() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        assert_approx(inputs.deposit_fraction, 0.20);
        assert_approx(inputs.mortgage_rate, 0.06);
        assert_approx(inputs.rental_yield, 0.04);
        assert_approx(inputs.property_growth_rate, 0.05);
        assert_approx(inputs.rental_inflation_rate, 0.03);
        assert_approx(inputs.stock_return_rate, 0.07);
        assert_approx(inputs.property_expense_rate, 0.01);
        assert_approx(inputs.salary_growth_rate, 0.03);
        assert_approx(inputs.property_price, 800_000.0);
        assert_eq!(inputs.horizon_years, 30);
    }

    #[test]
    fn build_inputs_rejects_deposit_over_hundred_percent() {
        let mut cli = sample_cli();
        cli.deposit_percent = 120.0;
        let err = build_inputs(cli).expect_err("must reject deposit");
        assert!(err.contains("--deposit-percent"));
    }

    #[test]
    fn build_inputs_rejects_zero_horizon() {
        let mut cli = sample_cli();
        cli.horizon_years = 0;
        let err = build_inputs(cli).expect_err("must reject horizon");
        assert!(err.contains("--horizon-years"));
    }

    #[test]
    fn build_inputs_rejects_oversized_horizon_and_term() {
        let mut cli = sample_cli();
        cli.horizon_years = u32::MAX;
        let err = build_inputs(cli).expect_err("must reject horizon");
        assert!(err.contains("--horizon-years"));

        let mut cli = sample_cli();
        cli.mortgage_term_years = MAX_TERM_YEARS + 1;
        let err = build_inputs(cli).expect_err("must reject term");
        assert!(err.contains("--mortgage-term-years"));
    }

    #[test]
    fn oversized_horizon_in_payload_is_a_bad_request() {
        let err = inputs_from_json(r#"{"horizonYears": 4294967295}"#).expect_err("too long");
        assert!(err.contains("--horizon-years"));
    }

    #[test]
    fn build_inputs_rejects_non_positive_price() {
        let mut cli = sample_cli();
        cli.property_price = 0.0;
        let err = build_inputs(cli).expect_err("must reject price");
        assert!(err.contains("--property-price"));
    }

    #[test]
    fn build_inputs_rejects_negative_mortgage_rate() {
        let mut cli = sample_cli();
        cli.mortgage_rate = -1.0;
        let err = build_inputs(cli).expect_err("must reject rate");
        assert!(err.contains("--mortgage-rate"));
    }

    #[test]
    fn inputs_from_json_parses_web_keys() {
        let inputs = inputs_from_json(
            r#"{
                "propertyPrice": 650000,
                "depositPercent": 10,
                "mortgageRate": 5.5,
                "mortgageTerm": 25,
                "weeklyRent": 550,
                "firstHomeBuyer": true,
                "horizonYears": 20
            }"#,
        )
        .expect("valid payload");
        assert_approx(inputs.property_price, 650_000.0);
        assert_approx(inputs.deposit_fraction, 0.10);
        assert_approx(inputs.mortgage_rate, 0.055);
        assert_eq!(inputs.mortgage_term_years, 25);
        assert_approx(inputs.weekly_rent, 550.0);
        assert!(inputs.first_home_buyer);
        assert_eq!(inputs.horizon_years, 20);
        // Untouched fields keep their defaults.
        assert_approx(inputs.stock_return_rate, 0.07);
    }

    #[test]
    fn inputs_from_json_rejects_wrong_types() {
        let err = inputs_from_json(r#"{"propertyPrice": "lots"}"#).expect_err("bad json");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn compare_response_serialization_contains_expected_fields() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        let calculator = ScenarioCalculator::australian().expect("valid rules");
        let response = build_compare_response(&calculator, inputs).expect("comparison");
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"rulesVersion\":\"AU-2023-24\""));
        assert!(json.contains("\"buyToLive\""));
        assert!(json.contains("\"buyToRent\""));
        assert!(json.contains("\"rentAndInvest\""));
        assert!(json.contains("\"milestones\""));
        assert!(json.contains("\"netWorthAfterTax\""));
        assert!(json.contains("\"cumulativeTaxSaved\""));
        assert!(json.contains("\"ownerOccupier\""));
        assert!(json.contains("\"startingTax\""));
        assert!(json.contains("\"depositInStocks\""));
        assert!(json.contains("\"returnMetrics\""));
        assert_eq!(response.deposit_in_stocks.yearly_growth.len(), 30);
        assert_approx(response.deposit_in_stocks.initial_investment, 160_000.0);
        assert!(json.contains("\"strategy\":\"rent-and-invest\""));
        assert!(response.mortgage.is_some());
    }

    #[test]
    fn full_deposit_response_has_no_mortgage() {
        let mut cli = sample_cli();
        cli.deposit_percent = 100.0;
        let inputs = build_inputs(cli).expect("valid inputs");
        let calculator = ScenarioCalculator::australian().expect("valid rules");
        let response = build_compare_response(&calculator, inputs).expect("comparison");
        assert!(response.mortgage.is_none());
    }

    #[test]
    fn run_cli_prints_comparison_json() {
        let json = run_cli([
            "housing-compare",
            "--property-price",
            "900000",
            "--first-home-buyer",
            "--horizon-years",
            "10",
        ])
        .expect("cli run");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["inputs"]["horizonYears"], 10);
        assert_eq!(value["inputs"]["firstHomeBuyer"], true);
        assert_eq!(
            value["comparison"]["buyToLive"]["years"]
                .as_array()
                .map(Vec::len),
            Some(11)
        );
    }

    #[test]
    fn run_cli_reports_flag_errors() {
        let err = run_cli(["housing-compare", "--rental-yield", "150"]).expect_err("bad yield");
        assert!(err.contains("--rental-yield"));
        assert!(run_cli(["housing-compare", "--no-such-flag"]).is_err());
    }
}
