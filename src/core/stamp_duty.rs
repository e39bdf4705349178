use serde::Serialize;

use super::error::{ModelError, require_positive};
use super::rules::StampDutyRules;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampDutyBreakdown {
    pub purchase_price: f64,
    pub base_duty: f64,
    pub is_first_home_buyer: bool,
    pub first_home_buyer_saving: f64,
    pub final_duty: f64,
    pub effective_rate: f64,
}

#[derive(Debug, Clone)]
pub struct StampDutyCalculator {
    rules: StampDutyRules,
}

impl StampDutyCalculator {
    pub fn new(rules: StampDutyRules) -> Result<Self, ModelError> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &StampDutyRules {
        &self.rules
    }

    pub fn base_stamp_duty(&self, purchase_price: f64) -> Result<f64, ModelError> {
        require_positive(purchase_price, "purchase price")?;
        Ok(self
            .rules
            .brackets
            .evaluate(purchase_price)
            .max(self.rules.minimum_duty))
    }

    /// Duty payable. For first home buyers the concession schedule replaces the
    /// bracket result: nothing up to the exempt threshold, a linear phase-in up
    /// to the full threshold, then standard duty.
    pub fn stamp_duty(
        &self,
        purchase_price: f64,
        is_first_home_buyer: bool,
    ) -> Result<f64, ModelError> {
        let base = self.base_stamp_duty(purchase_price)?;
        if !is_first_home_buyer {
            return Ok(base);
        }

        let exempt = self.rules.fhb_exempt_threshold;
        let full = self.rules.fhb_full_threshold;
        if purchase_price <= exempt {
            Ok(0.0)
        } else if purchase_price < full {
            Ok(base * (purchase_price - exempt) / (full - exempt))
        } else {
            Ok(base)
        }
    }

    pub fn breakdown(
        &self,
        purchase_price: f64,
        is_first_home_buyer: bool,
    ) -> Result<StampDutyBreakdown, ModelError> {
        let base_duty = self.base_stamp_duty(purchase_price)?;
        let final_duty = self.stamp_duty(purchase_price, is_first_home_buyer)?;
        Ok(StampDutyBreakdown {
            purchase_price,
            base_duty,
            is_first_home_buyer,
            first_home_buyer_saving: base_duty - final_duty,
            final_duty,
            effective_rate: final_duty / purchase_price,
        })
    }
}
