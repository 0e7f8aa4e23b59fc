//! Pure accrual calculator.
//!
//! Computes how much advance an employee has earned the right to request
//! as of a given date. Deterministic and side-effect free: eligibility is
//! checked at request time and must be reproducible for audits.
//!
//! Canonical model: 22-working-day accrual. The monthly ceiling is
//! `base_salary * max_advance_percentage / 100`; the accrued amount on a
//! date is the ceiling scaled by `min(working days elapsed, 22) / 22`,
//! where working days are Mon-Fri excluding configured holidays.
//! Weekends and holidays carry the previous working day's amount forward.
//! The result is floored to the nearest 100 units and capped at the
//! configured maximum.

use super::config::AdvanceConfig;
use super::employee::Employee;
use crate::error::{AdvanceError, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;

const WORKING_DAYS_PER_MONTH: u32 = 22;

/// One day of the month's accrual breakdown, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAccrual {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub weekend: bool,
    pub holiday: bool,
}

/// Maximum advance the employee may draw as of `as_of`.
///
/// Fails with a configuration error when the employee has no positive
/// base salary on record.
pub fn available_advance(
    employee: &Employee,
    as_of: NaiveDate,
    config: &AdvanceConfig,
) -> Result<Decimal> {
    let salary = base_salary(employee)?;
    let ceiling = salary * config.max_advance_percentage / Decimal::ONE_HUNDRED;
    let worked = working_days_elapsed(as_of, &config.holidays).min(WORKING_DAYS_PER_MONTH);
    let accrued =
        ceiling * Decimal::from(worked) / Decimal::from(WORKING_DAYS_PER_MONTH);
    Ok(floor_to_hundred(accrued).min(config.max_amount))
}

/// Full daily breakdown for the month containing `month_of`.
///
/// A derived, restartable, finite sequence with no hidden state.
pub fn monthly_breakdown(
    employee: &Employee,
    month_of: NaiveDate,
    config: &AdvanceConfig,
) -> Result<Vec<DailyAccrual>> {
    base_salary(employee)?;
    let mut days = Vec::new();
    let mut date = first_of_month(month_of);
    while date.month() == month_of.month() && date.year() == month_of.year() {
        days.push(DailyAccrual {
            date,
            amount: available_advance(employee, date, config)?,
            weekend: is_weekend(date),
            holiday: config.holidays.contains(&date),
        });
        date = date + Days::new(1);
    }
    Ok(days)
}

fn base_salary(employee: &Employee) -> Result<Decimal> {
    match employee.base_salary {
        Some(salary) if salary > Decimal::ZERO => Ok(salary),
        _ => Err(AdvanceError::Configuration(format!(
            "Employee {} has no positive base salary configured",
            employee.id
        ))),
    }
}

/// Working days in the month of `as_of`, from the 1st up to and
/// including `as_of`.
fn working_days_elapsed(as_of: NaiveDate, holidays: &[NaiveDate]) -> u32 {
    let mut count = 0;
    let mut date = first_of_month(as_of);
    while date <= as_of {
        if !is_weekend(date) && !holidays.contains(&date) {
            count += 1;
        }
        date = date + Days::new(1);
    }
    count
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn floor_to_hundred(value: Decimal) -> Decimal {
    (value / Decimal::ONE_HUNDRED).floor() * Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn employee(salary: Option<Decimal>) -> Employee {
        Employee {
            id: 1,
            name: "Jane Wanjiku".to_string(),
            phone: "254712345678".to_string(),
            email: "jane@example.com".to_string(),
            base_salary: salary,
            employment_end_date: None,
        }
    }

    fn config() -> AdvanceConfig {
        AdvanceConfig {
            max_advance_percentage: dec!(50),
            max_amount: dec!(100000),
            ..Default::default()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_missing_salary_is_configuration_error() {
        let err = available_advance(&employee(None), d(2026, 8, 10), &config()).unwrap_err();
        assert!(matches!(err, AdvanceError::Configuration(_)));
        let err =
            available_advance(&employee(Some(dec!(0))), d(2026, 8, 10), &config()).unwrap_err();
        assert!(matches!(err, AdvanceError::Configuration(_)));
    }

    #[test]
    fn test_working_day_accrual_floors_to_hundred() {
        // 2026-08-01 is a Saturday; Aug 3-7 are the first working week.
        // 5 of 22 working days of a 25000 ceiling = 5681.81.. -> 5600.
        let emp = employee(Some(dec!(50000)));
        let amount = available_advance(&emp, d(2026, 8, 7), &config()).unwrap();
        assert_eq!(amount, dec!(5600));
    }

    #[test]
    fn test_weekend_carries_last_working_day_forward() {
        let emp = employee(Some(dec!(50000)));
        let friday = available_advance(&emp, d(2026, 8, 7), &config()).unwrap();
        let saturday = available_advance(&emp, d(2026, 8, 8), &config()).unwrap();
        let sunday = available_advance(&emp, d(2026, 8, 9), &config()).unwrap();
        assert_eq!(friday, saturday);
        assert_eq!(friday, sunday);
    }

    #[test]
    fn test_holiday_skipped() {
        let emp = employee(Some(dec!(50000)));
        let mut cfg = config();
        cfg.holidays.push(d(2026, 8, 7));
        let with_holiday = available_advance(&emp, d(2026, 8, 7), &cfg).unwrap();
        let without = available_advance(&emp, d(2026, 8, 6), &cfg).unwrap();
        assert_eq!(with_holiday, without);
    }

    #[test]
    fn test_capped_at_max_amount() {
        let emp = employee(Some(dec!(1000000)));
        let mut cfg = config();
        cfg.max_amount = dec!(40000);
        let amount = available_advance(&emp, d(2026, 8, 31), &cfg).unwrap();
        assert_eq!(amount, dec!(40000));
    }

    #[test]
    fn test_deterministic() {
        let emp = employee(Some(dec!(73456.78)));
        let cfg = config();
        let first = available_advance(&emp, d(2026, 8, 19), &cfg).unwrap();
        let second = available_advance(&emp, d(2026, 8, 19), &cfg).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_monthly_breakdown_covers_month() {
        let emp = employee(Some(dec!(50000)));
        let breakdown = monthly_breakdown(&emp, d(2026, 8, 15), &config()).unwrap();
        assert_eq!(breakdown.len(), 31);
        assert_eq!(breakdown[0].date, d(2026, 8, 1));
        assert!(breakdown[0].weekend);
        // Amounts never decrease through the month.
        for pair in breakdown.windows(2) {
            assert!(pair[1].amount >= pair[0].amount);
        }
        // Aug 2026 has 21 working days: 25000 * 21/22 = 23863.63.. -> 23800.
        assert_eq!(breakdown[30].amount, dec!(23800));
    }
}
