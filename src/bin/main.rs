// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use payment_ledger::selection::Capacity;
use payment_ledger::{
    EventGuid, InMemoryLedgerStore, LedgerStore, Limit, Money, OrderRef, PaymentEvent,
    PaymentHistory, PaymentInstrument, PaymentStatus, PaymentsError, TransactionType,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Payment Ledger - Replay payment event CSV files
///
/// Reads payment events from a CSV file, folds each order's ledger and writes
/// per-instrument balances to stdout.
#[derive(Parser, Debug)]
#[command(name = "payment-ledger")]
#[command(about = "Folds payment ledgers and reports per-instrument balances", long_about = None)]
struct Args {
    /// Path to CSV file with payment events
    ///
    /// Expected format: guid,parent,instrument,provider,limit,type,status,amount,currency,reference
    /// Example: cargo run -- ledger.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Currency every order is reconciled in
    #[arg(long, default_value = "USD")]
    currency: String,

    /// Only report this order
    #[arg(long)]
    order: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let (store, orders) = match load_ledgers(BufReader::new(file)) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error reading ledger: {}", e);
            process::exit(1);
        }
    };

    let orders: Vec<OrderRef> = match &args.order {
        Some(order) => vec![OrderRef::from(order.as_str())],
        None => orders,
    };

    if let Err(e) = write_balances(&store, &orders, &args.currency, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    guid: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    parent: Option<String>,
    instrument: String,
    provider: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    limit: Option<Decimal>,
    #[serde(rename = "type")]
    event_type: String,
    status: String,
    amount: Decimal,
    currency: String,
    reference: String,
    #[serde(default)]
    multiple_charges: bool,
}

impl CsvRecord {
    /// Converts a CSV record to a payment event.
    ///
    /// Returns `None` for unknown event types or statuses.
    fn into_event(self) -> Option<PaymentEvent> {
        let transaction_type = match self.event_type.to_lowercase().as_str() {
            "reserve" => TransactionType::Reserve,
            "modify_reserve" => TransactionType::ModifyReserve,
            "cancel_reserve" => TransactionType::CancelReserve,
            "charge" => TransactionType::Charge,
            "credit" => TransactionType::Credit,
            "manual_credit" => TransactionType::ManualCredit,
            "reverse_charge" => TransactionType::ReverseCharge,
            _ => return None,
        };
        let status = match self.status.to_lowercase().as_str() {
            "approved" => PaymentStatus::Approved,
            "failed" => PaymentStatus::Failed,
            "skipped" => PaymentStatus::Skipped,
            _ => return None,
        };

        let mut instrument = match self.limit {
            Some(limit) => PaymentInstrument::limited(
                self.instrument.as_str(),
                self.provider.as_str(),
                Money::new(limit, self.currency.as_str()),
            ),
            None => PaymentInstrument::unlimited(self.instrument.as_str(), self.provider.as_str()),
        };
        instrument.supports_multiple_charges = self.multiple_charges;

        let event = PaymentEvent::new(
            transaction_type,
            status,
            instrument,
            Money::new(self.amount, self.currency),
            OrderRef::from(self.reference.as_str()),
        )
        .with_guid(self.guid);
        Some(match self.parent {
            Some(parent) if !parent.is_empty() => event.with_parent(&EventGuid::from(parent)),
            _ => event,
        })
    }
}

/// Loads payment events from a CSV reader into a ledger store.
///
/// Malformed rows, unknown types and events the store rejects (duplicate
/// guids, unknown parents) are skipped with a warning.
///
/// Returns the store and the orders in order of first appearance.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn load_ledgers<R: Read>(
    reader: R,
) -> Result<(InMemoryLedgerStore, Vec<OrderRef>), csv::Error> {
    let store = InMemoryLedgerStore::new();
    let mut orders: Vec<OrderRef> = Vec::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed row");
                continue;
            }
        };
        let Some(event) = record.into_event() else {
            tracing::warn!("skipping row with unknown type or status");
            continue;
        };
        let order = event.reference_id.clone();
        if let Err(e) = store.append(&order, std::slice::from_ref(&event)) {
            tracing::warn!(event = %event.guid, error = %e, "skipping event");
            continue;
        }
        if !orders.contains(&order) {
            orders.push(order);
        }
    }

    Ok((store, orders))
}

/// One output row: the balances of an instrument within an order.
#[derive(Debug, Serialize)]
struct BalanceRow {
    order: String,
    instrument: String,
    reserved: Decimal,
    charged: Decimal,
    credited: Decimal,
    capacity: String,
}

fn rounded(amount: Decimal) -> Decimal {
    amount.round_dp(Money::DECIMAL_PRECISION)
}

fn balance_rows(order: &OrderRef, history: &PaymentHistory) -> Vec<BalanceRow> {
    history
        .instruments()
        .iter()
        .map(|instrument| {
            let balance = history.balance(instrument);
            BalanceRow {
                order: order.to_string(),
                instrument: instrument.guid.to_string(),
                reserved: rounded(balance.reserved),
                charged: rounded(balance.charged),
                credited: rounded(balance.refunded),
                capacity: match (balance.capacity, &instrument.limit) {
                    (Capacity::Limited(capacity), Limit::Limited(_)) => {
                        rounded(capacity).to_string()
                    }
                    _ => "unlimited".to_string(),
                },
            }
        })
        .collect()
}

/// Writes per-instrument balances of `orders` as CSV.
///
/// Orders whose ledger does not fold are reported on stderr and left out.
///
/// # CSV Format
///
/// Columns: `order, instrument, reserved, charged, credited, capacity`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_balances<W: Write>(
    store: &impl LedgerStore,
    orders: &[OrderRef],
    currency: &str,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for order in orders {
        let history = match PaymentHistory::build(&store.load(order), currency) {
            Ok(history) => history,
            Err(e) => {
                report(order, &e);
                continue;
            }
        };
        for violation in history.invariant_violations() {
            tracing::warn!(order = %order, %violation, "ledger inconsistency");
        }
        for row in balance_rows(order, &history) {
            wtr.serialize(row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn report(order: &OrderRef, error: &PaymentsError) {
    tracing::error!(
        order = %order,
        error = %error,
        message_id = %error.message_id(),
        "cannot fold ledger"
    );
}
