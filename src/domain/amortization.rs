//! Annuity (fixed-installment) amortization.
//!
//! Everything here is pure decimal arithmetic; persisted values are rounded to
//! cents with [`round_money`].

use super::money::{Amount, round_money};
use crate::error::LedgerError;
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Longest term a credit may be issued for.
pub const MAX_TERM_MONTHS: u32 = 600;

/// Validated parameters of an installment credit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditTerms {
    pub principal: Amount,
    /// Nominal annual rate in percent, e.g. `12` for 12%.
    pub annual_rate: Decimal,
    pub term_months: u32,
}

impl CreditTerms {
    pub fn new(
        principal: Decimal,
        annual_rate: Decimal,
        term_months: u32,
    ) -> Result<Self, LedgerError> {
        let principal = Amount::new(principal)?;
        if annual_rate <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "annual rate must be positive, got {annual_rate}"
            )));
        }
        if term_months == 0 || term_months > MAX_TERM_MONTHS {
            return Err(LedgerError::InvalidAmount(format!(
                "term must be between 1 and {MAX_TERM_MONTHS} months, got {term_months}"
            )));
        }
        Ok(Self {
            principal,
            annual_rate,
            term_months,
        })
    }

    /// Periodic rate `r = annual_rate / 12 / 100`.
    pub fn monthly_rate(&self) -> Decimal {
        monthly_rate(self.annual_rate)
    }
}

pub fn monthly_rate(annual_rate: Decimal) -> Decimal {
    annual_rate / dec!(12) / dec!(100)
}

/// Fixed installment `P * r * (1+r)^n / ((1+r)^n - 1)`, rounded to cents.
///
/// A zero rate degenerates to `P / n`.
pub fn monthly_payment(
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
) -> Result<Decimal, LedgerError> {
    if term_months == 0 {
        return Err(LedgerError::InvalidAmount("term must be positive".to_string()));
    }
    let n = Decimal::from(term_months);
    if monthly_rate.is_zero() {
        return Ok(round_money(principal / n));
    }

    let overflow = || LedgerError::InvalidAmount(format!("annuity for {principal} overflows"));
    let base = Decimal::ONE + monthly_rate;
    let mut growth = Decimal::ONE;
    for _ in 0..term_months {
        growth = growth.checked_mul(base).ok_or_else(overflow)?;
    }

    let numerator = principal
        .checked_mul(monthly_rate)
        .and_then(|v| v.checked_mul(growth))
        .ok_or_else(overflow)?;
    let payment = numerator
        .checked_div(growth - Decimal::ONE)
        .ok_or_else(overflow)?;
    Ok(round_money(payment))
}

/// One row of an amortization table.
#[derive(Debug, Clone, PartialEq)]
pub struct Installment {
    /// 1-based position in the schedule.
    pub number: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Decimal,
    pub principal_portion: Decimal,
    pub interest_portion: Decimal,
}

/// Full repayment plan of a credit.
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationSchedule {
    pub monthly_payment: Decimal,
    pub installments: Vec<Installment>,
}

impl AmortizationSchedule {
    /// Builds the plan for credit terms issued at `issued_at`.
    ///
    /// Installments fall due one calendar month apart, the first one month
    /// after issuance. Every row's interest portion is the rounded interest on
    /// the outstanding principal, and `principal_portion + interest_portion`
    /// always equals `amount`. All rows but the last carry the fixed monthly
    /// payment; the last retires whatever principal remains plus its interest,
    /// so its amount may differ from the payment by the accumulated rounding.
    pub fn compute(terms: &CreditTerms, issued_at: DateTime<Utc>) -> Result<Self, LedgerError> {
        let rate = terms.monthly_rate();
        let payment = monthly_payment(terms.principal.value(), rate, terms.term_months)?;
        if payment <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "principal {} is too small for {} installments",
                terms.principal, terms.term_months
            )));
        }

        let mut outstanding = terms.principal.value();
        let mut installments = Vec::with_capacity(terms.term_months as usize);
        for number in 1..=terms.term_months {
            let due_date = issued_at
                .checked_add_months(Months::new(number))
                .ok_or_else(|| LedgerError::InvalidAmount("due date out of range".to_string()))?;

            let interest_portion = round_money(outstanding * rate);
            let principal_portion = if number == terms.term_months {
                outstanding
            } else {
                (payment - interest_portion).clamp(Decimal::ZERO, outstanding)
            };
            outstanding -= principal_portion;

            installments.push(Installment {
                number,
                due_date,
                amount: principal_portion + interest_portion,
                principal_portion,
                interest_portion,
            });
        }

        Ok(Self {
            monthly_payment: payment,
            installments,
        })
    }

    pub fn total_interest(&self) -> Decimal {
        self.installments.iter().map(|i| i.interest_portion).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_monthly_payment_reference_credit() {
        // 120 000 at 12% for a year: r = 1% per month.
        let payment = monthly_payment(dec!(120000), monthly_rate(dec!(12)), 12).unwrap();
        assert_eq!(payment, dec!(10661.85));
    }

    #[test]
    fn test_monthly_payment_zero_rate() {
        assert_eq!(monthly_payment(dec!(1200), Decimal::ZERO, 12).unwrap(), dec!(100));
        assert_eq!(monthly_payment(dec!(100), Decimal::ZERO, 3).unwrap(), dec!(33.33));
    }

    #[test]
    fn test_terms_validation() {
        assert!(CreditTerms::new(dec!(1000), dec!(10), 12).is_ok());
        assert!(matches!(
            CreditTerms::new(dec!(0), dec!(10), 12),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            CreditTerms::new(dec!(1000), dec!(0), 12),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            CreditTerms::new(dec!(1000), dec!(10), 0),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(CreditTerms::new(dec!(1000), dec!(10), MAX_TERM_MONTHS + 1).is_err());
    }

    #[test]
    fn test_schedule_principal_reconstructs() {
        let terms = CreditTerms::new(dec!(120000), dec!(12), 12).unwrap();
        let issued = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let schedule = AmortizationSchedule::compute(&terms, issued).unwrap();

        assert_eq!(schedule.installments.len(), 12);
        let (last, regular) = schedule.installments.split_last().unwrap();
        assert!(regular.iter().all(|i| i.amount == dec!(10661.85)));
        assert_eq!(last.amount, dec!(10661.91));

        let principal: Decimal = schedule.installments.iter().map(|i| i.principal_portion).sum();
        assert_eq!(principal, dec!(120000));

        // First month: 1% of 120 000.
        assert_eq!(schedule.installments[0].interest_portion, dec!(1200.00));
        assert_eq!(schedule.installments[0].principal_portion, dec!(9461.85));

        let paid: Decimal = schedule.installments.iter().map(|i| i.amount).sum();
        assert_eq!(paid, principal + schedule.total_interest());
    }

    #[test]
    fn test_long_term_rows_balance() {
        // 1.67 a month under-pays; the residual lands on the last row.
        let terms = CreditTerms::new(dec!(1000), dec!(0.01), MAX_TERM_MONTHS).unwrap();
        let issued = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let schedule = AmortizationSchedule::compute(&terms, issued).unwrap();

        assert_eq!(schedule.monthly_payment, dec!(1.67));
        for installment in &schedule.installments {
            assert!(installment.principal_portion <= installment.amount);
            assert!(installment.interest_portion >= Decimal::ZERO);
            assert_eq!(
                installment.principal_portion + installment.interest_portion,
                installment.amount
            );
        }

        let principal: Decimal = schedule.installments.iter().map(|i| i.principal_portion).sum();
        assert_eq!(principal, dec!(1000));
        let paid: Decimal = schedule.installments.iter().map(|i| i.amount).sum();
        assert_eq!(paid, dec!(1000) + schedule.total_interest());
        assert_eq!(schedule.installments.last().unwrap().amount, dec!(2.08));
    }

    #[test]
    fn test_payment_rounding_to_zero_is_rejected() {
        let terms = CreditTerms::new(dec!(0.01), dec!(1), 12).unwrap();
        let issued = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        assert!(matches!(
            AmortizationSchedule::compute(&terms, issued),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_schedule_due_dates_are_monthly() {
        let terms = CreditTerms::new(dec!(3000), dec!(7.5), 3).unwrap();
        let issued = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let schedule = AmortizationSchedule::compute(&terms, issued).unwrap();

        let dates: Vec<_> = schedule
            .installments
            .iter()
            .map(|i| (i.due_date.month(), i.due_date.day()))
            .collect();
        // Month-end issuance clamps to the last day of shorter months.
        assert_eq!(dates, vec![(2, 28), (3, 31), (4, 30)]);
        assert!(
            schedule
                .installments
                .windows(2)
                .all(|w| w[0].due_date < w[1].due_date)
        );
    }
}
