//! Human-readable summary of a deployment run.

use std::fmt;

use comfy_table::{Cell, Color, Table, presets::UTF8_FULL_CONDENSED};

use crate::{ExecutionReport, ExecutionStatus};

impl ExecutionReport {
    /// Render the records as a table: one row per unit with its status and address.
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_header(vec!["Unit", "Status", "Address", "Transaction", "Block"]);

        for record in &self.records {
            let status = Cell::new(record.status).fg(match record.status {
                ExecutionStatus::Deployed => Color::Green,
                ExecutionStatus::Skipped => Color::Grey,
                ExecutionStatus::Failed => Color::Red,
            });

            let row = match &record.outcome {
                Ok(result) => vec![
                    Cell::new(&record.unit),
                    status,
                    Cell::new(result.address),
                    Cell::new(result.transaction_hash),
                    Cell::new(result.block_number),
                ],
                Err(error) => vec![
                    Cell::new(&record.unit),
                    status,
                    Cell::new(error),
                    Cell::new("-"),
                    Cell::new("-"),
                ],
            };
            table.add_row(row);
        }

        table
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |status: ExecutionStatus| {
            self.records
                .iter()
                .filter(|record| record.status == status)
                .count()
        };

        writeln!(f, "Network: {}", self.network)?;
        writeln!(f, "{}", self.summary_table())?;
        write!(
            f,
            "{} deployed, {} skipped, {} failed",
            count(ExecutionStatus::Deployed),
            count(ExecutionStatus::Skipped),
            count(ExecutionStatus::Failed)
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
