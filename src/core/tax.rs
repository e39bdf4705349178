use serde::Serialize;

use super::error::{ModelError, require_finite, require_fraction, require_non_negative};
use super::rules::TaxRules;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSummary {
    pub taxable_income: f64,
    pub income_tax: f64,
    pub medicare_levy: f64,
    pub total_tax: f64,
    pub marginal_rate: f64,
    pub average_rate: f64,
    pub after_tax_income: f64,
}

#[derive(Debug, Clone)]
pub struct TaxCalculator {
    rules: TaxRules,
}

impl TaxCalculator {
    pub fn new(rules: TaxRules) -> Result<Self, ModelError> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &TaxRules {
        &self.rules
    }

    pub fn income_tax(&self, gross_income: f64) -> Result<f64, ModelError> {
        require_non_negative(gross_income, "gross income")?;
        Ok(self.rules.brackets.evaluate(gross_income))
    }

    /// The levy is charged on the whole income once it exceeds the threshold.
    pub fn medicare_levy(&self, gross_income: f64) -> Result<f64, ModelError> {
        require_non_negative(gross_income, "gross income")?;
        if gross_income > self.rules.medicare_levy_threshold {
            Ok(gross_income * self.rules.medicare_levy_rate)
        } else {
            Ok(0.0)
        }
    }

    pub fn marginal_tax_rate(&self, gross_income: f64) -> Result<f64, ModelError> {
        require_non_negative(gross_income, "gross income")?;
        Ok(self.rules.brackets.bracket_for(gross_income).rate)
    }

    pub fn effective_marginal_rate(&self, gross_income: f64) -> Result<f64, ModelError> {
        let bracket_rate = self.marginal_tax_rate(gross_income)?;
        let levy_rate = if gross_income > self.rules.medicare_levy_threshold {
            self.rules.medicare_levy_rate
        } else {
            0.0
        };
        Ok(bracket_rate + levy_rate)
    }

    /// Losses are not offset. The discount needs a holding period strictly longer
    /// than the rule's minimum, so exactly 12 months is taxed in full.
    pub fn capital_gains_tax(
        &self,
        gain: f64,
        holding_period_months: u32,
        marginal_rate: f64,
    ) -> Result<f64, ModelError> {
        require_finite(gain, "capital gain")?;
        require_fraction(marginal_rate, "marginal rate")?;
        if gain <= 0.0 {
            return Ok(0.0);
        }
        let taxable_gain = if holding_period_months > self.rules.cgt_discount_min_holding_months {
            gain * self.rules.cgt_discount_factor
        } else {
            gain
        };
        Ok(taxable_gain * marginal_rate)
    }

    pub fn negative_gearing_tax_saving(
        &self,
        annual_loss: f64,
        marginal_rate: f64,
    ) -> Result<f64, ModelError> {
        require_finite(annual_loss, "annual loss")?;
        require_fraction(marginal_rate, "marginal rate")?;
        if annual_loss <= 0.0 {
            return Ok(0.0);
        }
        Ok(annual_loss * marginal_rate)
    }

    pub fn tax_summary(&self, gross_income: f64) -> Result<TaxSummary, ModelError> {
        let income_tax = self.income_tax(gross_income)?;
        let medicare_levy = self.medicare_levy(gross_income)?;
        let total_tax = income_tax + medicare_levy;
        Ok(TaxSummary {
            taxable_income: gross_income,
            income_tax,
            medicare_levy,
            total_tax,
            marginal_rate: self.effective_marginal_rate(gross_income)?,
            average_rate: if gross_income > 0.0 {
                total_tax / gross_income
            } else {
                0.0
            },
            after_tax_income: gross_income - total_tax,
        })
    }
}
