mod engine;
mod error;
mod mortgage;
mod rules;
mod stamp_duty;
mod stocks;
mod tax;
mod types;

pub use engine::{MILESTONE_YEARS, ScenarioCalculator, milestone_years, run_comparison};
pub use error::ModelError;
pub use mortgage::{
    AmortizationSchedule, AnnualAmortization, MAX_TERM_YEARS, PaymentBreakdown, PeriodRecord,
    ScheduleIter, amortization_schedule, outstanding_balance, periodic_payment,
};
pub use rules::{Bracket, BracketTable, RuleSet, StampDutyRules, TaxRules};
pub use stamp_duty::{StampDutyBreakdown, StampDutyCalculator};
pub use stocks::{
    DepositInvestment, GrowthYear, Portfolio, ReturnMetrics, capital_gain,
    equivalent_deposit_investment, project_growth, project_value, total_return,
};
pub use tax::{TaxCalculator, TaxSummary};
pub use types::{
    Comparison, Inputs, MAX_HORIZON_YEARS, Milestone, Strategy, StrategyProjection,
    StrategySummary, YearRecord,
};
