use serde::Serialize;

use super::error::{ModelError, require_non_negative, require_positive};

pub const MAX_TERM_YEARS: u32 = 50;
// Daily compounding.
const MAX_PERIODS_PER_YEAR: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRecord {
    pub period: u32,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    /// Outstanding balance after this period's payment.
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualAmortization {
    pub year: u32,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub closing_balance: f64,
    pub cumulative_interest: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBreakdown {
    pub principal: f64,
    pub annual_rate: f64,
    pub term_years: u32,
    pub periodic_payment: f64,
    pub total_payments: f64,
    pub total_interest: f64,
    pub interest_to_principal_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmortizationSchedule {
    principal: f64,
    annual_rate: f64,
    term_years: u32,
    periods_per_year: u32,
    period_rate: f64,
    periods: u32,
    payment: f64,
}

pub fn amortization_schedule(
    principal: f64,
    annual_rate: f64,
    term_years: u32,
    periods_per_year: u32,
) -> Result<AmortizationSchedule, ModelError> {
    require_positive(principal, "loan principal")?;
    require_non_negative(annual_rate, "mortgage rate")?;
    if !(1..=MAX_TERM_YEARS).contains(&term_years) {
        return Err(ModelError::invalid(format!(
            "mortgage term must be between 1 and {MAX_TERM_YEARS} years, got {term_years}"
        )));
    }
    if !(1..=MAX_PERIODS_PER_YEAR).contains(&periods_per_year) {
        return Err(ModelError::invalid(format!(
            "periods per year must be between 1 and {MAX_PERIODS_PER_YEAR}, got {periods_per_year}"
        )));
    }
    let periods = term_years * periods_per_year;

    let period_rate = annual_rate / periods_per_year as f64;
    Ok(AmortizationSchedule {
        principal,
        annual_rate,
        term_years,
        periods_per_year,
        period_rate,
        periods,
        payment: periodic_payment(principal, period_rate, periods),
    })
}

/// Level payment that retires `principal` over `periods` at `period_rate`.
pub fn periodic_payment(principal: f64, period_rate: f64, periods: u32) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    if period_rate == 0.0 {
        return principal / periods as f64;
    }
    let growth = (1.0 + period_rate).powf(periods as f64);
    principal * period_rate * growth / (growth - 1.0)
}

pub fn outstanding_balance(
    principal: f64,
    annual_rate: f64,
    term_years: u32,
    periods_per_year: u32,
    periods_elapsed: u32,
) -> Result<f64, ModelError> {
    let schedule = amortization_schedule(principal, annual_rate, term_years, periods_per_year)?;
    Ok(schedule.balance_after(periods_elapsed))
}

impl AmortizationSchedule {
    pub fn principal(&self) -> f64 {
        self.principal
    }

    pub fn payment(&self) -> f64 {
        self.payment
    }

    pub fn periods(&self) -> u32 {
        self.periods
    }

    pub fn periods_per_year(&self) -> u32 {
        self.periods_per_year
    }

    pub fn period_rate(&self) -> f64 {
        self.period_rate
    }

    /// Fresh pass over the schedule; each call starts again from period 1.
    pub fn iter(&self) -> ScheduleIter {
        ScheduleIter {
            schedule: *self,
            period: 0,
            balance: self.principal,
        }
    }

    pub fn balance_after(&self, periods_elapsed: u32) -> f64 {
        if periods_elapsed >= self.periods {
            return 0.0;
        }
        if self.period_rate == 0.0 {
            return (self.principal - self.payment * periods_elapsed as f64).max(0.0);
        }
        let total_growth = (1.0 + self.period_rate).powf(self.periods as f64);
        let elapsed_growth = (1.0 + self.period_rate).powf(periods_elapsed as f64);
        (self.principal * (total_growth - elapsed_growth) / (total_growth - 1.0)).max(0.0)
    }

    pub fn breakdown(&self) -> PaymentBreakdown {
        let total_payments = self.iter().map(|record| record.payment).sum::<f64>();
        let total_interest = total_payments - self.principal;
        PaymentBreakdown {
            principal: self.principal,
            annual_rate: self.annual_rate,
            term_years: self.term_years,
            periodic_payment: self.payment,
            total_payments,
            total_interest,
            interest_to_principal_ratio: total_interest / self.principal,
        }
    }

    pub fn annual_rollup(&self) -> Vec<AnnualAmortization> {
        let mut years: Vec<AnnualAmortization> = Vec::with_capacity(self.term_years as usize);
        let mut cumulative_interest = 0.0;
        for record in self.iter() {
            let year = (record.period - 1) / self.periods_per_year + 1;
            cumulative_interest += record.interest;
            match years.last_mut() {
                Some(row) if row.year == year => {
                    row.payment += record.payment;
                    row.interest += record.interest;
                    row.principal += record.principal;
                    row.closing_balance = record.balance;
                    row.cumulative_interest = cumulative_interest;
                }
                _ => years.push(AnnualAmortization {
                    year,
                    payment: record.payment,
                    interest: record.interest,
                    principal: record.principal,
                    closing_balance: record.balance,
                    cumulative_interest,
                }),
            }
        }
        years
    }
}

impl IntoIterator for &AmortizationSchedule {
    type Item = PeriodRecord;
    type IntoIter = ScheduleIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleIter {
    schedule: AmortizationSchedule,
    period: u32,
    balance: f64,
}

impl Iterator for ScheduleIter {
    type Item = PeriodRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.period >= self.schedule.periods {
            return None;
        }
        self.period += 1;

        let interest = self.balance * self.schedule.period_rate;
        let (payment, principal) = if self.period == self.schedule.periods {
            // Final payment absorbs accumulated rounding.
            (interest + self.balance, self.balance)
        } else {
            let principal = self.schedule.payment - interest;
            (self.schedule.payment, principal)
        };
        self.balance = if self.period == self.schedule.periods {
            0.0
        } else {
            (self.balance - principal).max(0.0)
        };

        Some(PeriodRecord {
            period: self.period,
            payment,
            interest,
            principal,
            balance: self.balance,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.schedule.periods - self.period) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ScheduleIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn monthly_payment_matches_known_values() {
        let schedule = amortization_schedule(500_000.0, 0.06, 30, 12).unwrap();
        assert_approx_tol(schedule.payment(), 2_997.75, 0.01);

        let schedule = amortization_schedule(640_000.0, 0.06, 30, 12).unwrap();
        assert_approx_tol(schedule.payment(), 3_837.12, 0.01);
        assert_eq!(schedule.periods(), 360);
    }

    #[test]
    fn zero_rate_degenerates_to_equal_principal() {
        let schedule = amortization_schedule(360_000.0, 0.0, 30, 12).unwrap();
        assert_approx_tol(schedule.payment(), 1_000.0, 1e-9);
        for record in schedule.iter() {
            assert_approx_tol(record.interest, 0.0, 1e-12);
            assert_approx_tol(record.principal, 1_000.0, 1e-6);
        }
        assert_approx_tol(schedule.balance_after(12), 348_000.0, 1e-6);
    }

    #[test]
    fn first_year_interest_and_balance_match_hand_calculation() {
        let schedule = amortization_schedule(640_000.0, 0.06, 30, 12).unwrap();
        let first_year = &schedule.annual_rollup()[0];
        assert_approx_tol(first_year.interest, 38_186.21, 0.01);
        assert_approx_tol(first_year.closing_balance, 632_140.73, 0.01);
        assert_approx_tol(
            first_year.payment,
            first_year.interest + first_year.principal,
            1e-6,
        );
    }

    #[test]
    fn principal_components_sum_to_loan_and_balance_ends_at_zero() {
        let schedule = amortization_schedule(640_000.0, 0.06, 30, 12).unwrap();
        let records: Vec<PeriodRecord> = schedule.iter().collect();
        assert_eq!(records.len(), 360);
        let principal_sum: f64 = records.iter().map(|r| r.principal).sum();
        assert_approx_tol(principal_sum, 640_000.0, 0.01);
        assert_eq!(records.last().map(|r| r.balance), Some(0.0));
        for pair in records.windows(2) {
            assert!(pair[1].balance <= pair[0].balance);
        }
    }

    #[test]
    fn closed_form_balance_agrees_with_schedule_walk() {
        let schedule = amortization_schedule(455_500.0, 0.0725, 25, 12).unwrap();
        for record in schedule.iter() {
            let closed = outstanding_balance(455_500.0, 0.0725, 25, 12, record.period).unwrap();
            assert_approx_tol(closed, record.balance, 0.005);
        }
        assert_approx_tol(schedule.balance_after(0), 455_500.0, 1e-9);
        assert_approx_tol(schedule.balance_after(10_000), 0.0, 1e-12);
    }

    #[test]
    fn schedule_is_restartable() {
        let schedule = amortization_schedule(300_000.0, 0.05, 10, 12).unwrap();
        let first: Vec<PeriodRecord> = schedule.iter().take(5).collect();
        let second: Vec<PeriodRecord> = (&schedule).into_iter().take(5).collect();
        assert_eq!(first, second);
        assert_eq!(schedule.iter().len(), 120);
    }

    #[test]
    fn breakdown_totals_are_consistent() {
        let schedule = amortization_schedule(500_000.0, 0.06, 30, 12).unwrap();
        let breakdown = schedule.breakdown();
        assert_approx_tol(breakdown.total_payments, 2_997.7526 * 360.0, 0.1);
        assert_approx_tol(
            breakdown.total_interest,
            breakdown.total_payments - 500_000.0,
            1e-6,
        );
        let rollup = schedule.annual_rollup();
        assert_eq!(rollup.len(), 30);
        assert_approx_tol(
            rollup.last().map(|row| row.cumulative_interest).unwrap_or_default(),
            breakdown.total_interest,
            0.01,
        );
    }

    #[test]
    fn rejects_invalid_terms() {
        assert!(matches!(
            amortization_schedule(0.0, 0.05, 30, 12),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(matches!(
            amortization_schedule(100_000.0, -0.01, 30, 12),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(matches!(
            amortization_schedule(100_000.0, 0.05, 0, 12),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(matches!(
            outstanding_balance(-1.0, 0.05, 30, 12, 3),
            Err(ModelError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_terms_beyond_supported_length() {
        assert!(amortization_schedule(100_000.0, 0.05, MAX_TERM_YEARS, 12).is_ok());
        assert!(matches!(
            amortization_schedule(100_000.0, 0.05, MAX_TERM_YEARS + 1, 12),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(matches!(
            amortization_schedule(100_000.0, 0.05, u32::MAX, 12),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(matches!(
            amortization_schedule(100_000.0, 0.05, 30, u32::MAX),
            Err(ModelError::InvalidInput(_))
        ));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_schedule_retires_principal(
            principal in 1_000u32..3_000_000,
            rate_bp in 0u32..1_500,
            term_years in 1u32..41,
            monthly in proptest::bool::ANY
        ) {
            let principal = principal as f64;
            let periods_per_year = if monthly { 12 } else { 26 };
            let schedule = amortization_schedule(
                principal,
                rate_bp as f64 / 10_000.0,
                term_years,
                periods_per_year,
            ).unwrap();

            let mut principal_sum = 0.0;
            let mut previous = principal;
            let mut count = 0u32;
            for record in schedule.iter() {
                prop_assert!(record.balance <= previous + 1e-9);
                prop_assert!((record.balance - schedule.balance_after(record.period)).abs() <= 0.01);
                principal_sum += record.principal;
                previous = record.balance;
                count += 1;
            }
            prop_assert_eq!(count, term_years * periods_per_year);
            prop_assert!((principal_sum - principal).abs() <= 0.01);
            prop_assert_eq!(previous, 0.0);
        }
    }
}
