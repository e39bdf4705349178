use serde::Serialize;

use super::error::{ModelError, require_fraction, require_non_negative, require_positive};
use super::mortgage::MAX_TERM_YEARS;

pub const MAX_HORIZON_YEARS: u32 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    BuyToLive,
    BuyToRent,
    RentAndInvest,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::BuyToLive,
        Strategy::BuyToRent,
        Strategy::RentAndInvest,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Strategy::BuyToLive => "Buy to Live",
            Strategy::BuyToRent => "Buy to Rent",
            Strategy::RentAndInvest => "Rent & Invest",
        }
    }

    pub fn holds_property(self) -> bool {
        !matches!(self, Strategy::RentAndInvest)
    }
}

/// Economic assumptions shared by all three strategies. Rates are fractions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    pub property_price: f64,
    pub deposit_fraction: f64,
    /// Legal and conveyancing costs paid with the deposit.
    pub upfront_costs: f64,
    pub mortgage_rate: f64,
    pub mortgage_term_years: u32,
    /// Gross rent of the investment property at purchase, as a fraction of its price.
    pub rental_yield: f64,
    /// Rent the household pays while not living in its own property.
    pub weekly_rent: f64,
    pub property_growth_rate: f64,
    pub rental_inflation_rate: f64,
    pub stock_return_rate: f64,
    /// Rates, insurance and maintenance as a fraction of the property's value.
    pub property_expense_rate: f64,
    pub gross_income: f64,
    pub salary_growth_rate: f64,
    pub first_home_buyer: bool,
    pub horizon_years: u32,
}

impl Inputs {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_positive(self.property_price, "property price")?;
        require_fraction(self.deposit_fraction, "deposit fraction")?;
        require_non_negative(self.upfront_costs, "upfront costs")?;
        require_non_negative(self.mortgage_rate, "mortgage rate")?;
        if !(1..=MAX_TERM_YEARS).contains(&self.mortgage_term_years) {
            return Err(ModelError::invalid(format!(
                "mortgage term must be between 1 and {MAX_TERM_YEARS} years, got {}",
                self.mortgage_term_years
            )));
        }
        require_fraction(self.rental_yield, "rental yield")?;
        require_non_negative(self.weekly_rent, "weekly rent")?;
        require_non_negative(self.property_growth_rate, "property growth rate")?;
        require_non_negative(self.rental_inflation_rate, "rental inflation rate")?;
        require_non_negative(self.stock_return_rate, "stock return rate")?;
        require_fraction(self.property_expense_rate, "property expense rate")?;
        require_non_negative(self.gross_income, "gross income")?;
        require_non_negative(self.salary_growth_rate, "salary growth rate")?;
        if !(1..=MAX_HORIZON_YEARS).contains(&self.horizon_years) {
            return Err(ModelError::invalid(format!(
                "horizon must be between 1 and {MAX_HORIZON_YEARS} years, got {}",
                self.horizon_years
            )));
        }
        Ok(())
    }

    pub fn deposit(&self) -> f64 {
        self.property_price * self.deposit_fraction
    }

    pub fn loan_amount(&self) -> f64 {
        self.property_price - self.deposit()
    }
}

/// One strategy's position at the end of a year. Year 0 is the purchase date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub property_value: f64,
    pub portfolio_value: f64,
    pub portfolio_cost_base: f64,
    pub outstanding_debt: f64,
    pub equity: f64,
    pub cash_outlay: f64,
    /// Capital moved into (or, when negative, out of) the portfolio this year.
    pub portfolio_contribution: f64,
    pub cumulative_cash_invested: f64,
    pub mortgage_payment: f64,
    pub mortgage_interest: f64,
    pub rental_income: f64,
    pub rent_paid: f64,
    pub property_expenses: f64,
    pub marginal_rate: f64,
    pub income_tax: f64,
    pub cumulative_tax_paid: f64,
    pub negative_gearing_saving: f64,
    pub cumulative_tax_saved: f64,
    /// Tax payable if every asset were sold at this year's values.
    pub cgt_liability: f64,
    pub net_worth_pre_tax: f64,
    pub net_worth_after_tax: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySummary {
    pub stamp_duty: f64,
    pub upfront_cash: f64,
    pub loan_amount: f64,
    pub periodic_mortgage_payment: f64,
    pub final_net_worth_pre_tax: f64,
    pub final_net_worth: f64,
    pub final_roi: f64,
    pub final_cgt_liability: f64,
    pub total_tax_paid: f64,
    pub total_tax_saved: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyProjection {
    pub strategy: Strategy,
    pub label: &'static str,
    pub years: Vec<YearRecord>,
    pub summary: StrategySummary,
}

impl StrategyProjection {
    pub fn year(&self, year: u32) -> Option<&YearRecord> {
        self.years.get(year as usize)
    }

    pub fn final_year(&self) -> Option<&YearRecord> {
        self.years.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub year: u32,
    pub buy_to_live: YearRecord,
    pub buy_to_rent: YearRecord,
    pub rent_and_invest: YearRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub rules_version: String,
    pub buy_to_live: StrategyProjection,
    pub buy_to_rent: StrategyProjection,
    pub rent_and_invest: StrategyProjection,
    pub milestones: Vec<Milestone>,
}

impl Comparison {
    pub fn projection(&self, strategy: Strategy) -> &StrategyProjection {
        match strategy {
            Strategy::BuyToLive => &self.buy_to_live,
            Strategy::BuyToRent => &self.buy_to_rent,
            Strategy::RentAndInvest => &self.rent_and_invest,
        }
    }
}
