use clap::Args;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;

use land_lease_core::export::{ExportError, SalesOrder, SalesOrderSink};
use land_lease_core::types::InvoiceId;

use super::{envelope, CommandResult};
use crate::book::{BookArgs, Session};

/// Arguments for building sales orders
#[derive(Args)]
pub struct SalesOrderArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Invoices to build orders for
    #[arg(long = "invoice", required = true, value_delimiter = ',')]
    pub invoices: Vec<u64>,

    /// Append the orders to this file as JSON lines
    #[arg(long)]
    pub export: Option<String>,
}

/// Appends one JSON document per order.
struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    fn create(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open '{}': {}", path, e))?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl SalesOrderSink for JsonLinesSink {
    fn send(&self, order: &SalesOrder) -> Result<(), ExportError> {
        let line =
            serde_json::to_string(order).map_err(|e| ExportError::Rejected(e.to_string()))?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(|e| ExportError::SinkUnavailable(e.to_string()))
    }
}

pub fn run_sales_order(args: SalesOrderArgs) -> CommandResult {
    let started = Instant::now();
    let ids: Vec<InvoiceId> = args.invoices.iter().copied().map(InvoiceId).collect();

    let orders = match args.export {
        Some(ref path) => {
            let sink: Arc<dyn SalesOrderSink> = Arc::new(JsonLinesSink::create(path)?);
            let session = Session::open_with_sink(&args.book, Some(sink))?;
            session.engine.export_invoices(&ids)?
        }
        None => {
            let session = Session::open(&args.book)?;
            ids.iter()
                .map(|&id| session.engine.build_sales_order(id))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    envelope(&orders, Vec::new(), started)
}
