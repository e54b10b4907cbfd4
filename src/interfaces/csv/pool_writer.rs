use crate::application::pools::PoolAudit;
use crate::domain::money::Currency;
use crate::domain::pool::{PoolId, PoolStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AuditRow<'a> {
    pool: PoolId,
    title: &'a str,
    status: PoolStatus,
    currency: Currency,
    collected: Decimal,
    settled: Decimal,
    completed: usize,
    pending: usize,
    failed: usize,
    consistent: bool,
}

/// Writes pool audits as CSV.
///
/// Amounts are normalized (`25000`, not `25000.00`) so the report diffs
/// cleanly between runs.
pub struct PoolReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PoolReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_audits<I>(&mut self, audits: I) -> Result<()>
    where
        I: IntoIterator<Item = PoolAudit>,
    {
        let mut wrote_any = false;
        for audit in audits {
            wrote_any = true;
            self.writer.serialize(AuditRow {
                pool: audit.pool_id,
                title: &audit.title,
                status: audit.status,
                currency: audit.currency,
                collected: audit.current_amount.0.normalize(),
                settled: audit.settled_total.0.normalize(),
                completed: audit.completed,
                pending: audit.pending,
                failed: audit.failed,
                consistent: audit.is_consistent(),
            })?;
        }
        // serialize() only emits the header alongside the first row
        if !wrote_any {
            self.writer.write_record([
                "pool",
                "title",
                "status",
                "currency",
                "collected",
                "settled",
                "completed",
                "pending",
                "failed",
                "consistent",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
