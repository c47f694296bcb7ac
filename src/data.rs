//! Transaction loading and cleaning using Polars

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RfmError, ValidationError};
use crate::mapping::{ColumnMapping, CUSTOMER_ID, ORDER_VALUE, TRANSACTION_DATE};

/// Date formats tried in order after RFC 3339
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Frame column holding the key each row is counted under
pub(crate) const TRANSACTION_KEY: &str = "TransactionKey";

/// A single transaction row after column mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: String,
    pub transaction_date: NaiveDateTime,
    pub order_value: f64,
    /// Rows sharing an invoice number form one transaction
    pub invoice_no: Option<String>,
    /// Passthrough columns, never used for scoring
    pub attributes: BTreeMap<String, String>,
}

impl Transaction {
    pub fn new(
        customer_id: impl Into<String>,
        transaction_date: NaiveDateTime,
        order_value: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            transaction_date,
            order_value,
            invoice_no: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_invoice_no(mut self, invoice_no: impl Into<String>) -> Self {
        self.invoice_no = Some(invoice_no.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Cleaned transactions plus what was lost on the way
#[derive(Debug)]
pub struct LoadedTable {
    pub transactions: Vec<Transaction>,
    /// Source headers in file order
    pub headers: Vec<String>,
    /// Rows dropped for an empty customer id, an unparseable date/amount or
    /// a negative amount (refunds)
    pub dropped_rows: usize,
}

/// Read the CSV header row only
pub fn read_headers(file_path: impl AsRef<Path>) -> Result<Vec<String>, RfmError> {
    let df = read_csv(file_path.as_ref(), Some(1))?;
    Ok(column_names(&df))
}

/// Load a CSV file and map its rows into transactions
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `mapping` - Source column for each canonical field
///
/// # Returns
/// * `LoadedTable` with every row that survived cleaning
pub fn load_transactions(
    file_path: impl AsRef<Path>,
    mapping: &ColumnMapping,
) -> Result<LoadedTable, RfmError> {
    let df = read_csv(file_path.as_ref(), None)?;
    let headers = column_names(&df);
    let resolved = mapping.resolve(&headers)?;

    // Every column as strings; parsing happens per row below
    let columns = df
        .get_columns()
        .iter()
        .map(|s| s.cast(&DataType::String))
        .collect::<PolarsResult<Vec<Series>>>()?;
    let columns = columns
        .iter()
        .map(|s| s.str())
        .collect::<PolarsResult<Vec<&StringChunked>>>()?;

    let cell = |col: usize, row: usize| cell_value(&columns, col, row);

    let mut transactions = Vec::with_capacity(df.height());
    let mut dropped_rows = 0;

    for row in 0..df.height() {
        let parsed = cell(resolved.customer_id, row).and_then(|id| {
            let date = cell(resolved.transaction_date, row).and_then(parse_datetime)?;
            let amount = cell(resolved.order_value, row)
                .and_then(parse_amount)
                .filter(|v| *v >= 0.0)?;
            Some((id, date, amount))
        });

        let Some((customer_id, transaction_date, order_value)) = parsed else {
            dropped_rows += 1;
            continue;
        };

        let mut transaction = Transaction::new(customer_id, transaction_date, order_value + 0.0);
        transaction.invoice_no = resolved
            .invoice_no
            .and_then(|col| cell(col, row))
            .map(str::to_string);
        for (col, name) in &resolved.passthrough {
            if let Some(value) = cell(*col, row) {
                transaction.attributes.insert(name.clone(), value.to_string());
            }
        }
        transactions.push(transaction);
    }

    if dropped_rows > 0 {
        warn!(
            dropped_rows,
            "Dropped rows with a missing customer id, date or amount, or a negative amount"
        );
    }
    if transactions.is_empty() {
        return Err(ValidationError::EmptyInput.into());
    }
    debug!(rows = transactions.len(), "Loaded transactions");

    Ok(LoadedTable {
        transactions,
        headers,
        dropped_rows,
    })
}

/// Build a Polars frame from cleaned transactions
///
/// Dates are stored as epoch milliseconds. Each row is keyed by its invoice
/// number, or by a key of its own when it has none, so `n_unique` over
/// [`TRANSACTION_KEY`] counts transactions. Passthrough attributes become
/// nullable string columns; the returned pairs give the column of each
/// attribute name.
pub(crate) fn transaction_frame(
    transactions: &[Transaction],
) -> PolarsResult<(DataFrame, Vec<(String, String)>)> {
    let customer_ids: Vec<&str> = transactions
        .iter()
        .map(|t| t.customer_id.as_str())
        .collect();
    let dates: Vec<i64> = transactions
        .iter()
        .map(|t| t.transaction_date.and_utc().timestamp_millis())
        .collect();
    let keys: Vec<String> = transactions
        .iter()
        .enumerate()
        .map(|(row, t)| match &t.invoice_no {
            Some(invoice) => format!("invoice:{invoice}"),
            None => format!("row:{row}"),
        })
        .collect();
    let amounts: Vec<f64> = transactions.iter().map(|t| t.order_value).collect();

    let mut columns = vec![
        Series::new(CUSTOMER_ID, customer_ids),
        Series::new(TRANSACTION_DATE, dates),
        Series::new(TRANSACTION_KEY, keys),
        Series::new(ORDER_VALUE, amounts),
    ];

    let names: BTreeSet<&str> = transactions
        .iter()
        .flat_map(|t| t.attributes.keys().map(String::as_str))
        .collect();
    let mut attributes = Vec::with_capacity(names.len());
    for (i, name) in names.into_iter().enumerate() {
        let column = format!("attribute_{i}");
        let values: Vec<Option<&str>> = transactions
            .iter()
            .map(|t| {
                t.attributes
                    .get(name)
                    .map(String::as_str)
                    .filter(|v| !v.is_empty())
            })
            .collect();
        columns.push(Series::new(&column, values));
        attributes.push((name.to_string(), column));
    }

    Ok((DataFrame::new(columns)?, attributes))
}

fn cell_value<'a>(columns: &[&'a StringChunked], col: usize, row: usize) -> Option<&'a str> {
    columns[col].get(row).map(str::trim).filter(|v| !v.is_empty())
}

fn read_csv(path: &Path, n_rows: Option<usize>) -> Result<DataFrame, RfmError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_n_rows(n_rows)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Parse a date or datetime cell, dropping any timezone offset
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse an amount cell, tolerating a currency symbol and thousands separators
pub fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .trim_start_matches(&['$', '€', '£'][..])
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Invoice,Customer,Date,Amount,Email").unwrap();
        writeln!(file, "1001,C1,2024-01-05,100.0,c1@example.com").unwrap();
        writeln!(file, "1001,C1,2024-01-05,\"1,250.50\",").unwrap();
        writeln!(file, "1002,C2,2024-02-10T08:30:00Z,$75,c2@example.com").unwrap();
        writeln!(file, "1003,,2024-02-11,10,orphan@example.com").unwrap();
        writeln!(file, "1004,C3,not a date,10,c3@example.com").unwrap();
        writeln!(file, "1005,C3,2024-02-12,n/a,c3@example.com").unwrap();
        file
    }

    #[test]
    fn test_load_transactions() {
        let file = create_test_csv();
        let mapping = ColumnMapping::new("Customer", "Date", "Amount").with_invoice_no("Invoice");

        let table = load_transactions(file.path(), &mapping).unwrap();
        assert_eq!(table.transactions.len(), 3);
        assert_eq!(table.dropped_rows, 3);
        assert_eq!(table.headers, vec!["Invoice", "Customer", "Date", "Amount", "Email"]);

        let second = &table.transactions[1];
        assert_eq!(second.customer_id, "C1");
        assert_eq!(second.order_value, 1250.5);
        assert_eq!(second.invoice_no.as_deref(), Some("1001"));
        assert!(second.attributes.is_empty());

        let third = &table.transactions[2];
        assert_eq!(third.order_value, 75.0);
        assert_eq!(
            third.attributes.get("Email").map(String::as_str),
            Some("c2@example.com")
        );
    }

    #[test]
    fn test_load_drops_refunds() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Customer,Date,Amount").unwrap();
        writeln!(file, "C1,2024-01-05,40.00").unwrap();
        writeln!(file, "C1,2024-01-09,-40.00").unwrap();
        writeln!(file, "C2,2024-01-07,-0.00").unwrap();
        writeln!(file, "C2,2024-01-08,12.00").unwrap();

        let mapping = ColumnMapping::new("Customer", "Date", "Amount");
        let table = load_transactions(file.path(), &mapping).unwrap();
        assert_eq!(table.transactions.len(), 3);
        assert_eq!(table.dropped_rows, 1);
        assert!(table.transactions.iter().all(|t| t.order_value >= 0.0));
        assert!(table.transactions[1].order_value.is_sign_positive());

        // The cleaned table scores without a validation error
        let result = crate::compute_segmentation(
            &table.transactions,
            &crate::ScoringConfig::default(),
        )
        .unwrap();
        assert_eq!(result.kpis.total_customers, 2);
        assert_eq!(result.customer("C1").unwrap().monetary_total, 40.0);
    }

    #[test]
    fn test_transaction_frame() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let transactions = vec![
            Transaction::new("A", date, 1.0).with_invoice_no("INV-1"),
            Transaction::new("A", date, 2.0).with_attribute("Email", ""),
            Transaction::new("B", date, 3.0).with_attribute("Email", "b@example.com"),
        ];

        let (df, attributes) = transaction_frame(&transactions).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(attributes, vec![("Email".to_string(), "attribute_0".to_string())]);

        let keys = df.column(TRANSACTION_KEY).unwrap().str().unwrap();
        assert_eq!(keys.get(0), Some("invoice:INV-1"));
        assert_eq!(keys.get(1), Some("row:1"));

        let emails = df.column("attribute_0").unwrap().str().unwrap();
        assert_eq!(emails.get(1), None);
        assert_eq!(emails.get(2), Some("b@example.com"));
    }

    #[test]
    fn test_load_rejects_unknown_column() {
        let file = create_test_csv();
        let mapping = ColumnMapping::new("Client", "Date", "Amount");
        let err = load_transactions(file.path(), &mapping).unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_read_headers() {
        let file = create_test_csv();
        let headers = read_headers(file.path()).unwrap();
        assert_eq!(headers.len(), 5);
        assert_eq!(headers[1], "Customer");
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-03-01"), Some(expected));
        assert_eq!(parse_datetime("03/01/2024"), Some(expected));
        assert_eq!(parse_datetime("01.03.2024"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01 00:00:00"), Some(expected));
        // Offset dropped, wall-clock time kept
        assert_eq!(parse_datetime("2024-03-01T00:00:00+05:00"), Some(expected));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("42"), Some(42.0));
        assert_eq!(parse_amount(" $1,000.25 "), Some(1000.25));
        assert_eq!(parse_amount("-3.5"), Some(-3.5));
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("abc"), None);
    }
}
