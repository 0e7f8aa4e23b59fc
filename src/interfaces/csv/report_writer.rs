use crate::domain::advance::Advance;
use crate::domain::payment::PaymentTransaction;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AdvanceRow {
    id: u32,
    employee: u32,
    amount: Decimal,
    total_repayment: Decimal,
    amount_repaid: Decimal,
    amount_withdrawn: Decimal,
    status: String,
}

#[derive(Serialize)]
struct PaymentRow {
    id: u64,
    direction: String,
    owner: String,
    amount: Decimal,
    phone: String,
    status: String,
    receipt: String,
}

/// Writes the final advance or payment state as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_advances(&mut self, advances: Vec<Advance>) -> Result<()> {
        for advance in advances {
            self.writer.serialize(AdvanceRow {
                id: advance.id,
                employee: advance.employee,
                amount: advance.amount.value().normalize(),
                total_repayment: advance.total_repayment.normalize(),
                amount_repaid: advance.amount_repaid.value().normalize(),
                amount_withdrawn: advance.amount_withdrawn.value().normalize(),
                status: advance.status.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_payments(&mut self, payments: Vec<PaymentTransaction>) -> Result<()> {
        for tx in payments {
            self.writer.serialize(PaymentRow {
                id: tx.id,
                direction: tx.direction.to_string(),
                owner: tx.owner.to_string(),
                amount: tx.amount.value().normalize(),
                phone: tx.phone.clone(),
                status: tx.status.to_string(),
                receipt: tx.receipt.clone().unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_advance_report_format() {
        let advance = Advance::new(
            1,
            7,
            Amount::new(dec!(20000)).unwrap(),
            dec!(5),
            3,
            NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
            "mobile".to_string(),
        )
        .unwrap();

        let mut buffer = Vec::new();
        ReportWriter::new(&mut buffer)
            .write_advances(vec![advance])
            .unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.starts_with(
            "id,employee,amount,total_repayment,amount_repaid,amount_withdrawn,status"
        ));
        assert!(output.contains("1,7,20000,20750,0,0,pending"));
    }
}
