use serde::Serialize;

use super::error::{ModelError, require_finite, require_non_negative};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthYear {
    pub year: u32,
    pub value: f64,
    pub growth: f64,
    pub contribution: f64,
    pub cumulative_contributions: f64,
    pub cumulative_gains: f64,
    pub return_on_contributions: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnMetrics {
    pub initial_amount: f64,
    pub final_amount: f64,
    pub total_gain: f64,
    pub percentage_return: f64,
    pub multiple: f64,
}

/// The deposit kept in shares instead of going into a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInvestment {
    pub initial_investment: f64,
    pub annual_return_rate: f64,
    pub years: u32,
    pub final_value: f64,
    pub yearly_growth: Vec<GrowthYear>,
    pub return_metrics: ReturnMetrics,
    pub average_annual_return: f64,
}

// Market value and cost base of a single pooled holding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub value: f64,
    /// Net capital contributed, not compounded.
    pub cost_base: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            value: initial_capital,
            cost_base: initial_capital,
        }
    }

    /// Negative amounts withdraw capital and reduce the cost base by the same amount.
    pub fn contribute(&mut self, amount: f64) {
        self.value += amount;
        self.cost_base += amount;
    }

    pub fn grow(&mut self, annual_return_rate: f64) -> f64 {
        let growth = self.value * annual_return_rate;
        self.value += growth;
        growth
    }

    pub fn unrealised_gain(&self) -> f64 {
        capital_gain(self.value, self.cost_base)
    }
}

pub fn capital_gain(current_value: f64, cost_base: f64) -> f64 {
    current_value - cost_base
}

pub fn total_return(initial_amount: f64, final_amount: f64) -> ReturnMetrics {
    let total_gain = capital_gain(final_amount, initial_amount);
    let (percentage_return, multiple) = if initial_amount > 0.0 {
        (total_gain / initial_amount, final_amount / initial_amount)
    } else {
        (0.0, 0.0)
    };
    ReturnMetrics {
        initial_amount,
        final_amount,
        total_gain,
        percentage_return,
        multiple,
    }
}

fn validate_projection(
    initial_capital: f64,
    annual_contribution: f64,
    annual_return_rate: f64,
) -> Result<(), ModelError> {
    require_non_negative(initial_capital, "initial capital")?;
    require_non_negative(annual_contribution, "annual contribution")?;
    require_finite(annual_return_rate, "annual return rate")?;
    if annual_return_rate <= -1.0 {
        return Err(ModelError::invalid(format!(
            "annual return rate must be > -1, got {annual_return_rate}"
        )));
    }
    Ok(())
}

/// Portfolio value for years `0..=years`; index 0 is the initial capital.
pub fn project_value(
    initial_capital: f64,
    annual_contribution: f64,
    annual_return_rate: f64,
    years: u32,
) -> Result<Vec<f64>, ModelError> {
    validate_projection(initial_capital, annual_contribution, annual_return_rate)?;
    let mut portfolio = Portfolio::new(initial_capital);
    let mut values = Vec::with_capacity(years as usize + 1);
    values.push(portfolio.value);
    for _ in 0..years {
        portfolio.contribute(annual_contribution);
        portfolio.grow(annual_return_rate);
        values.push(portfolio.value);
    }
    Ok(values)
}

pub fn project_growth(
    initial_capital: f64,
    annual_contribution: f64,
    annual_return_rate: f64,
    years: u32,
) -> Result<Vec<GrowthYear>, ModelError> {
    validate_projection(initial_capital, annual_contribution, annual_return_rate)?;
    let mut portfolio = Portfolio::new(initial_capital);
    let mut rows = Vec::with_capacity(years as usize);
    for year in 1..=years {
        portfolio.contribute(annual_contribution);
        let growth = portfolio.grow(annual_return_rate);
        let cumulative_gains = portfolio.unrealised_gain();
        rows.push(GrowthYear {
            year,
            value: portfolio.value,
            growth,
            contribution: annual_contribution,
            cumulative_contributions: portfolio.cost_base,
            cumulative_gains,
            return_on_contributions: if portfolio.cost_base > 0.0 {
                cumulative_gains / portfolio.cost_base
            } else {
                0.0
            },
        });
    }
    Ok(rows)
}

pub fn equivalent_deposit_investment(
    deposit: f64,
    annual_return_rate: f64,
    years: u32,
) -> Result<DepositInvestment, ModelError> {
    let values = project_value(deposit, 0.0, annual_return_rate, years)?;
    let final_value = values.last().copied().unwrap_or(deposit);
    let return_metrics = total_return(deposit, final_value);
    Ok(DepositInvestment {
        initial_investment: deposit,
        annual_return_rate,
        years,
        final_value,
        yearly_growth: project_growth(deposit, 0.0, annual_return_rate, years)?,
        return_metrics,
        average_annual_return: if years > 0 {
            return_metrics.percentage_return / years as f64
        } else {
            0.0
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn contributions_are_invested_before_growth() {
        // (1000 + 100) * 1.1 = 1210; (1210 + 100) * 1.1 = 1441
        let values = project_value(1_000.0, 100.0, 0.10, 2).unwrap();
        assert_eq!(values.len(), 3);
        assert_approx(values[0], 1_000.0);
        assert_approx(values[1], 1_210.0);
        assert_approx(values[2], 1_441.0);
    }

    #[test]
    fn zero_years_returns_initial_capital_only() {
        let values = project_value(5_000.0, 100.0, 0.07, 0).unwrap();
        assert_eq!(values, vec![5_000.0]);
    }

    #[test]
    fn growth_detail_tracks_uncompounded_cost_base() {
        let rows = project_growth(1_000.0, 100.0, 0.10, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_approx(rows[1].cumulative_contributions, 1_200.0);
        assert_approx(rows[1].cumulative_gains, 241.0);
        assert_approx(rows[1].growth, 131.0);
        assert_approx(rows[1].return_on_contributions, 241.0 / 1_200.0);
    }

    #[test]
    fn capital_gain_is_value_less_cost_base() {
        assert_approx(capital_gain(1_500.0, 1_200.0), 300.0);
        assert_approx(capital_gain(900.0, 1_200.0), -300.0);
    }

    #[test]
    fn withdrawals_reduce_value_and_cost_base() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.grow(0.5);
        portfolio.contribute(-200.0);
        assert_approx(portfolio.value, 1_300.0);
        assert_approx(portfolio.cost_base, 800.0);
        assert_approx(portfolio.unrealised_gain(), 500.0);
    }

    #[test]
    fn total_return_reports_gain_and_multiple() {
        let metrics = total_return(100_000.0, 250_000.0);
        assert_approx(metrics.total_gain, 150_000.0);
        assert_approx(metrics.percentage_return, 1.5);
        assert_approx(metrics.multiple, 2.5);

        let empty = total_return(0.0, 500.0);
        assert_approx(empty.total_gain, 500.0);
        assert_approx(empty.percentage_return, 0.0);
        assert_approx(empty.multiple, 0.0);
    }

    #[test]
    fn deposit_compounds_without_further_contributions() {
        // 160,000 * 1.07^2 = 183,184
        let investment = equivalent_deposit_investment(160_000.0, 0.07, 2).unwrap();
        assert_approx(investment.final_value, 183_184.0);
        assert_eq!(investment.yearly_growth.len(), 2);
        assert_approx(investment.yearly_growth[1].value, 183_184.0);
        assert_approx(investment.yearly_growth[1].cumulative_contributions, 160_000.0);
        assert_approx(investment.return_metrics.total_gain, 23_184.0);
        assert_approx(investment.average_annual_return, 0.1449 / 2.0);
        assert!(equivalent_deposit_investment(-1.0, 0.07, 2).is_err());
    }

    #[test]
    fn rejects_invalid_projection_inputs() {
        assert!(project_value(-1.0, 0.0, 0.05, 3).is_err());
        assert!(project_value(1.0, -5.0, 0.05, 3).is_err());
        assert!(project_value(1.0, 0.0, -1.0, 3).is_err());
        assert!(project_growth(1.0, 0.0, f64::NAN, 3).is_err());
    }
}
