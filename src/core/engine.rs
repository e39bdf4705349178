use tracing::debug;

use super::error::ModelError;
use super::mortgage::{AnnualAmortization, amortization_schedule};
use super::rules::RuleSet;
use super::stamp_duty::StampDutyCalculator;
use super::stocks::Portfolio;
use super::tax::TaxCalculator;
use super::types::{
    Comparison, Inputs, Milestone, Strategy, StrategyProjection, StrategySummary, YearRecord,
};

const PERIODS_PER_YEAR: u32 = 12;
const WEEKS_PER_YEAR: f64 = 52.0;
const MONTHS_PER_YEAR: u32 = 12;
// A notional sale at a year-end comparison point settles in the following month.
const SETTLEMENT_MONTHS: u32 = 1;
const ROI_EPS: f64 = 1e-9;

pub const MILESTONE_YEARS: [u32; 5] = [5, 10, 15, 20, 30];

#[derive(Debug, Clone, Copy)]
struct YearContext {
    year: u32,
    property_value: f64,
    outstanding_debt: f64,
    mortgage_payment: f64,
    mortgage_interest: f64,
    property_expenses: f64,
    rental_income: f64,
    rent_paid: f64,
    marginal_rate: f64,
    income_tax: f64,
    baseline_outlay: f64,
}

#[derive(Debug)]
struct Baseline {
    deposit: f64,
    loan_amount: f64,
    periodic_payment: f64,
    owner_stamp_duty: f64,
    investor_stamp_duty: f64,
    years: Vec<YearContext>,
}

#[derive(Debug, Clone)]
pub struct ScenarioCalculator {
    rules_version: String,
    tax: TaxCalculator,
    stamp_duty: StampDutyCalculator,
}

impl ScenarioCalculator {
    pub fn new(rules: RuleSet) -> Result<Self, ModelError> {
        rules.validate()?;
        Ok(Self {
            rules_version: rules.version,
            tax: TaxCalculator::new(rules.tax)?,
            stamp_duty: StampDutyCalculator::new(rules.stamp_duty)?,
        })
    }

    pub fn australian() -> Result<Self, ModelError> {
        Self::new(RuleSet::australia_2023_24()?)
    }

    pub fn tax(&self) -> &TaxCalculator {
        &self.tax
    }

    pub fn stamp_duty(&self) -> &StampDutyCalculator {
        &self.stamp_duty
    }

    pub fn compare(&self, inputs: &Inputs) -> Result<Comparison, ModelError> {
        inputs.validate()?;
        let baseline = self.build_baseline(inputs)?;

        let buy_to_live = self.project_with(inputs, &baseline, Strategy::BuyToLive)?;
        let buy_to_rent = self.project_with(inputs, &baseline, Strategy::BuyToRent)?;
        let rent_and_invest = self.project_with(inputs, &baseline, Strategy::RentAndInvest)?;

        let milestones = milestone_years(inputs.horizon_years)
            .into_iter()
            .filter_map(|year| {
                Some(Milestone {
                    year,
                    buy_to_live: buy_to_live.year(year)?.clone(),
                    buy_to_rent: buy_to_rent.year(year)?.clone(),
                    rent_and_invest: rent_and_invest.year(year)?.clone(),
                })
            })
            .collect();

        Ok(Comparison {
            rules_version: self.rules_version.clone(),
            buy_to_live,
            buy_to_rent,
            rent_and_invest,
            milestones,
        })
    }

    pub fn project(
        &self,
        inputs: &Inputs,
        strategy: Strategy,
    ) -> Result<StrategyProjection, ModelError> {
        inputs.validate()?;
        let baseline = self.build_baseline(inputs)?;
        self.project_with(inputs, &baseline, strategy)
    }

    fn build_baseline(&self, inputs: &Inputs) -> Result<Baseline, ModelError> {
        let deposit = inputs.deposit();
        let loan_amount = inputs.loan_amount();
        let owner_stamp_duty = self
            .stamp_duty
            .stamp_duty(inputs.property_price, inputs.first_home_buyer)?;
        let investor_stamp_duty = self.stamp_duty.stamp_duty(inputs.property_price, false)?;

        // A fully paid deposit leaves nothing to amortise.
        let (periodic_payment, mortgage_years) = if loan_amount > 0.0 {
            let schedule = amortization_schedule(
                loan_amount,
                inputs.mortgage_rate,
                inputs.mortgage_term_years,
                PERIODS_PER_YEAR,
            )?;
            (schedule.payment(), schedule.annual_rollup())
        } else {
            (0.0, Vec::new())
        };

        let mut years = Vec::with_capacity(inputs.horizon_years as usize + 1);
        years.push(YearContext {
            year: 0,
            property_value: inputs.property_price,
            outstanding_debt: loan_amount.max(0.0),
            mortgage_payment: 0.0,
            mortgage_interest: 0.0,
            property_expenses: 0.0,
            rental_income: 0.0,
            rent_paid: 0.0,
            marginal_rate: self.tax.effective_marginal_rate(inputs.gross_income)?,
            income_tax: 0.0,
            baseline_outlay: deposit + owner_stamp_duty + inputs.upfront_costs,
        });

        for year in 1..=inputs.horizon_years {
            let property_value =
                inputs.property_price * (1.0 + inputs.property_growth_rate).powi(year as i32);
            let loan_year = mortgage_years
                .get(year as usize - 1)
                .copied()
                .unwrap_or(AnnualAmortization {
                    year,
                    payment: 0.0,
                    interest: 0.0,
                    principal: 0.0,
                    closing_balance: 0.0,
                    cumulative_interest: 0.0,
                });
            let rent_index = (1.0 + inputs.rental_inflation_rate).powi(year as i32);
            let salary =
                inputs.gross_income * (1.0 + inputs.salary_growth_rate).powi(year as i32);
            let property_expenses = property_value * inputs.property_expense_rate;

            years.push(YearContext {
                year,
                property_value,
                outstanding_debt: loan_year.closing_balance,
                mortgage_payment: loan_year.payment,
                mortgage_interest: loan_year.interest,
                property_expenses,
                rental_income: inputs.property_price * inputs.rental_yield * rent_index,
                rent_paid: inputs.weekly_rent * WEEKS_PER_YEAR * rent_index,
                marginal_rate: self.tax.effective_marginal_rate(salary)?,
                income_tax: self.tax.income_tax(salary)? + self.tax.medicare_levy(salary)?,
                baseline_outlay: loan_year.payment + property_expenses,
            });
        }

        Ok(Baseline {
            deposit,
            loan_amount: loan_amount.max(0.0),
            periodic_payment,
            owner_stamp_duty,
            investor_stamp_duty,
            years,
        })
    }

    // Whatever a strategy does not spend on housing out of the baseline outlay
    // goes into its portfolio, and any excess spending comes out of it.
    fn project_with(
        &self,
        inputs: &Inputs,
        baseline: &Baseline,
        strategy: Strategy,
    ) -> Result<StrategyProjection, ModelError> {
        let stamp_duty = match strategy {
            Strategy::BuyToLive => baseline.owner_stamp_duty,
            Strategy::BuyToRent => baseline.investor_stamp_duty,
            Strategy::RentAndInvest => 0.0,
        };
        let property_cost_base = inputs.property_price + stamp_duty + inputs.upfront_costs;
        let upfront_cash = if strategy.holds_property() {
            baseline.deposit + stamp_duty + inputs.upfront_costs
        } else {
            0.0
        };

        let mut portfolio = Portfolio::default();
        let mut cumulative_cash_invested = 0.0;
        let mut cumulative_tax_paid = 0.0;
        let mut cumulative_tax_saved = 0.0;
        let mut records = Vec::with_capacity(baseline.years.len());

        for ctx in &baseline.years {
            let (mortgage_payment, mortgage_interest, property_expenses) =
                if strategy.holds_property() {
                    (ctx.mortgage_payment, ctx.mortgage_interest, ctx.property_expenses)
                } else {
                    (0.0, 0.0, 0.0)
                };
            let (rental_income, rent_paid) = match strategy {
                Strategy::BuyToLive => (0.0, 0.0),
                Strategy::BuyToRent => (ctx.rental_income, ctx.rent_paid),
                Strategy::RentAndInvest => (0.0, ctx.rent_paid),
            };

            let cash_outlay = match (strategy, ctx.year) {
                (Strategy::BuyToLive, _) => ctx.baseline_outlay,
                (_, 0) => upfront_cash,
                _ => mortgage_payment + property_expenses + rent_paid - rental_income,
            };

            let negative_gearing_saving = if strategy == Strategy::BuyToRent {
                let taxable_loss = mortgage_interest + property_expenses - rental_income;
                self.tax
                    .negative_gearing_tax_saving(taxable_loss, ctx.marginal_rate)?
            } else {
                0.0
            };

            let portfolio_contribution = if strategy == Strategy::BuyToLive {
                0.0
            } else {
                ctx.baseline_outlay - cash_outlay
            };
            if portfolio_contribution < 0.0 && ctx.year > 0 {
                debug!(
                    strategy = strategy.label(),
                    year = ctx.year,
                    withdrawal = -portfolio_contribution,
                    "housing costs exceed baseline outlay; drawing on portfolio"
                );
            }
            portfolio.contribute(portfolio_contribution);
            if ctx.year > 0 {
                portfolio.grow(inputs.stock_return_rate);
            }

            cumulative_cash_invested += cash_outlay + portfolio_contribution;
            cumulative_tax_paid += ctx.income_tax;
            cumulative_tax_saved += negative_gearing_saving;

            let (property_value, outstanding_debt) = if strategy.holds_property() {
                (ctx.property_value, ctx.outstanding_debt)
            } else {
                (0.0, 0.0)
            };

            let holding_months = notional_holding_months(ctx.year);
            let property_cgt = if strategy == Strategy::BuyToRent {
                self.tax.capital_gains_tax(
                    property_value - property_cost_base,
                    holding_months,
                    ctx.marginal_rate,
                )?
            } else {
                // Main residence exemption, or no property at all.
                0.0
            };
            let portfolio_cgt = self.tax.capital_gains_tax(
                portfolio.unrealised_gain(),
                holding_months,
                ctx.marginal_rate,
            )?;
            let cgt_liability = property_cgt + portfolio_cgt;

            let equity = property_value + portfolio.value - outstanding_debt;
            let net_worth_pre_tax = equity + cumulative_tax_saved;
            let net_worth_after_tax = net_worth_pre_tax - cgt_liability;

            records.push(YearRecord {
                year: ctx.year,
                property_value,
                portfolio_value: portfolio.value,
                portfolio_cost_base: portfolio.cost_base,
                outstanding_debt,
                equity,
                cash_outlay,
                portfolio_contribution,
                cumulative_cash_invested,
                mortgage_payment,
                mortgage_interest,
                rental_income,
                rent_paid,
                property_expenses,
                marginal_rate: ctx.marginal_rate,
                income_tax: ctx.income_tax,
                cumulative_tax_paid,
                negative_gearing_saving,
                cumulative_tax_saved,
                cgt_liability,
                net_worth_pre_tax,
                net_worth_after_tax,
                roi: roi(net_worth_after_tax, cumulative_cash_invested),
            });
        }

        let summary = summarise(strategy, baseline, stamp_duty, upfront_cash, &records);
        debug!(
            strategy = strategy.label(),
            final_net_worth = summary.final_net_worth,
            final_roi = summary.final_roi,
            "projected strategy"
        );

        Ok(StrategyProjection {
            strategy,
            label: strategy.label(),
            years: records,
            summary,
        })
    }
}

pub fn run_comparison(inputs: &Inputs) -> Result<Comparison, ModelError> {
    ScenarioCalculator::australian()?.compare(inputs)
}

/// Reporting years for a horizon: the standard milestones it reaches plus the
/// horizon year itself.
pub fn milestone_years(horizon_years: u32) -> Vec<u32> {
    let mut years: Vec<u32> = MILESTONE_YEARS
        .iter()
        .copied()
        .filter(|&year| year <= horizon_years)
        .collect();
    if horizon_years > 0 && !years.contains(&horizon_years) {
        years.push(horizon_years);
    }
    years
}

// Every position open at a year-end comparison point has been held for more
// than a year once `year >= 1`.
fn notional_holding_months(year: u32) -> u32 {
    if year == 0 {
        0
    } else {
        year * MONTHS_PER_YEAR + SETTLEMENT_MONTHS
    }
}

fn roi(net_worth_after_tax: f64, cumulative_cash_invested: f64) -> f64 {
    if cumulative_cash_invested.abs() < ROI_EPS {
        0.0
    } else {
        (net_worth_after_tax - cumulative_cash_invested) / cumulative_cash_invested
    }
}

fn summarise(
    strategy: Strategy,
    baseline: &Baseline,
    stamp_duty: f64,
    upfront_cash: f64,
    records: &[YearRecord],
) -> StrategySummary {
    let (loan_amount, periodic_mortgage_payment) = if strategy.holds_property() {
        (baseline.loan_amount, baseline.periodic_payment)
    } else {
        (0.0, 0.0)
    };
    let Some(last) = records.last() else {
        return StrategySummary {
            stamp_duty,
            upfront_cash,
            loan_amount,
            periodic_mortgage_payment,
            final_net_worth_pre_tax: 0.0,
            final_net_worth: 0.0,
            final_roi: 0.0,
            final_cgt_liability: 0.0,
            total_tax_paid: 0.0,
            total_tax_saved: 0.0,
        };
    };
    StrategySummary {
        stamp_duty,
        upfront_cash,
        loan_amount,
        periodic_mortgage_payment,
        final_net_worth_pre_tax: last.net_worth_pre_tax,
        final_net_worth: last.net_worth_after_tax,
        final_roi: last.roi,
        final_cgt_liability: last.cgt_liability,
        total_tax_paid: last.cumulative_tax_paid + last.cgt_liability,
        total_tax_saved: last.cumulative_tax_saved,
    }
}
