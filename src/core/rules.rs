use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ModelError;

// Published duty tables round their bases to the dollar.
const CONTINUITY_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracket {
    pub lower: f64,
    pub upper: Option<f64>,
    /// Amount owed at `lower`.
    pub base: f64,
    /// Marginal rate per dollar above `lower`.
    pub rate: f64,
}

impl Bracket {
    pub const fn new(lower: f64, upper: Option<f64>, base: f64, rate: f64) -> Self {
        Self {
            lower,
            upper,
            base,
            rate,
        }
    }

    /// Bracket quoted the way duty schedules are: dollars per $100 above `lower`.
    pub fn per_hundred(lower: f64, upper: Option<f64>, base: f64, rate_per_100: f64) -> Self {
        Self::new(lower, upper, base, rate_per_100 / 100.0)
    }

    pub fn amount_at(&self, value: f64) -> f64 {
        self.base + (value - self.lower) * self.rate
    }

    fn includes(&self, value: f64) -> bool {
        self.upper.is_none_or(|upper| value <= upper)
    }
}

// Built only through `new` or deserialization, both of which validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bracket>", into = "Vec<Bracket>")]
pub struct BracketTable {
    brackets: Vec<Bracket>,
}

impl BracketTable {
    pub fn new(brackets: Vec<Bracket>) -> Result<Self, ModelError> {
        validate_brackets(&brackets)?;
        Ok(Self { brackets })
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    /// Bracket containing `value`. Upper bounds are inclusive, so a value sitting
    /// exactly on a boundary belongs to the lower bracket.
    pub fn bracket_for(&self, value: f64) -> &Bracket {
        self.brackets
            .iter()
            .find(|bracket| bracket.includes(value))
            .unwrap_or(&self.brackets[self.brackets.len() - 1])
    }

    pub fn evaluate(&self, value: f64) -> f64 {
        self.bracket_for(value).amount_at(value)
    }
}

impl TryFrom<Vec<Bracket>> for BracketTable {
    type Error = ModelError;

    fn try_from(brackets: Vec<Bracket>) -> Result<Self, Self::Error> {
        Self::new(brackets)
    }
}

impl From<BracketTable> for Vec<Bracket> {
    fn from(table: BracketTable) -> Self {
        table.brackets
    }
}

fn validate_brackets(brackets: &[Bracket]) -> Result<(), ModelError> {
    let Some(first) = brackets.first() else {
        return Err(ModelError::config("bracket table is empty"));
    };
    if first.lower != 0.0 {
        return Err(ModelError::config(format!(
            "first bracket must start at 0, starts at {}",
            first.lower
        )));
    }

    for (idx, bracket) in brackets.iter().enumerate() {
        if !bracket.lower.is_finite() || !bracket.base.is_finite() || !bracket.rate.is_finite() {
            return Err(ModelError::config(format!(
                "bracket {idx} has non-finite fields"
            )));
        }
        if bracket.base < 0.0 {
            return Err(ModelError::config(format!(
                "bracket {idx} has negative base {}",
                bracket.base
            )));
        }
        if !(0.0..=1.0).contains(&bracket.rate) {
            return Err(ModelError::config(format!(
                "bracket {idx} rate must be between 0 and 1, got {}",
                bracket.rate
            )));
        }

        let Some(next) = brackets.get(idx + 1) else {
            if bracket.upper.is_some() {
                return Err(ModelError::config("last bracket must be open-ended"));
            }
            break;
        };

        let Some(upper) = bracket.upper else {
            return Err(ModelError::config(format!(
                "bracket {idx} is open-ended but is not the last bracket"
            )));
        };
        if !upper.is_finite() || upper <= bracket.lower {
            return Err(ModelError::config(format!(
                "bracket {idx} upper bound {upper} must exceed lower bound {}",
                bracket.lower
            )));
        }
        if next.lower < upper {
            return Err(ModelError::config(format!(
                "bracket {} starts at {} and overlaps bracket {idx} ending at {upper}",
                idx + 1,
                next.lower
            )));
        }
        if next.lower > upper {
            return Err(ModelError::config(format!(
                "gap between bracket {idx} ending at {upper} and bracket {} starting at {}",
                idx + 1,
                next.lower
            )));
        }
        let carried = bracket.amount_at(upper);
        if (carried - next.base).abs() > CONTINUITY_TOLERANCE {
            return Err(ModelError::config(format!(
                "bracket {} base {} does not continue from {carried:.2}",
                idx + 1,
                next.base
            )));
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRules {
    pub brackets: BracketTable,
    pub medicare_levy_rate: f64,
    pub medicare_levy_threshold: f64,
    /// Fraction of a gain that remains taxable once the discount applies.
    pub cgt_discount_factor: f64,
    /// The discount needs a holding period strictly longer than this.
    pub cgt_discount_min_holding_months: u32,
}

impl TaxRules {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(0.0..=1.0).contains(&self.medicare_levy_rate) {
            return Err(ModelError::config(format!(
                "Medicare levy rate must be between 0 and 1, got {}",
                self.medicare_levy_rate
            )));
        }
        if !self.medicare_levy_threshold.is_finite() || self.medicare_levy_threshold < 0.0 {
            return Err(ModelError::config(format!(
                "Medicare levy threshold must be >= 0, got {}",
                self.medicare_levy_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.cgt_discount_factor) {
            return Err(ModelError::config(format!(
                "CGT discount factor must be between 0 and 1, got {}",
                self.cgt_discount_factor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampDutyRules {
    pub brackets: BracketTable,
    pub minimum_duty: f64,
    /// First home buyers pay nothing up to this price.
    pub fhb_exempt_threshold: f64,
    /// First home buyers pay full duty from this price.
    pub fhb_full_threshold: f64,
}

impl StampDutyRules {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.minimum_duty.is_finite() || self.minimum_duty < 0.0 {
            return Err(ModelError::config(format!(
                "minimum duty must be >= 0, got {}",
                self.minimum_duty
            )));
        }
        if !self.fhb_exempt_threshold.is_finite()
            || self.fhb_exempt_threshold < 0.0
            || !self.fhb_full_threshold.is_finite()
            || self.fhb_full_threshold <= self.fhb_exempt_threshold
        {
            return Err(ModelError::config(format!(
                "first home buyer thresholds must satisfy 0 <= exempt < full, got {} and {}",
                self.fhb_exempt_threshold, self.fhb_full_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub version: String,
    pub tax: TaxRules,
    pub stamp_duty: StampDutyRules,
}

impl RuleSet {
    /// Resident income tax rates for 2023-24 and a NSW-style transfer duty schedule.
    pub fn australia_2023_24() -> Result<Self, ModelError> {
        let tax_brackets = BracketTable::new(vec![
            Bracket::new(0.0, Some(18_200.0), 0.0, 0.0),
            Bracket::new(18_200.0, Some(45_000.0), 0.0, 0.19),
            Bracket::new(45_000.0, Some(120_000.0), 5_092.0, 0.325),
            Bracket::new(120_000.0, Some(180_000.0), 29_467.0, 0.37),
            Bracket::new(180_000.0, None, 51_667.0, 0.45),
        ])?;

        let duty_brackets = BracketTable::new(vec![
            Bracket::per_hundred(0.0, Some(17_000.0), 0.0, 1.25),
            Bracket::per_hundred(17_000.0, Some(36_000.0), 212.0, 1.50),
            Bracket::per_hundred(36_000.0, Some(97_000.0), 497.0, 1.75),
            Bracket::per_hundred(97_000.0, Some(364_000.0), 1_564.0, 3.50),
            Bracket::per_hundred(364_000.0, Some(1_212_000.0), 10_909.0, 4.50),
            Bracket::per_hundred(1_212_000.0, Some(3_636_000.0), 49_069.0, 5.50),
            Bracket::per_hundred(3_636_000.0, None, 182_390.0, 7.00),
        ])?;

        let rules = Self {
            version: "AU-2023-24".to_string(),
            tax: TaxRules {
                brackets: tax_brackets,
                medicare_levy_rate: 0.02,
                medicare_levy_threshold: 24_276.0,
                cgt_discount_factor: 0.5,
                cgt_discount_min_holding_months: 12,
            },
            stamp_duty: StampDutyRules {
                brackets: duty_brackets,
                minimum_duty: 20.0,
                fhb_exempt_threshold: 800_000.0,
                fhb_full_threshold: 1_000_000.0,
            },
        };
        rules.validate()?;
        debug!(version = %rules.version, "loaded rule set");
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.tax.validate()?;
        self.stamp_duty.validate()
    }
}
