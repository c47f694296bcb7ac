//! Column mapping from source headers to the canonical transaction fields

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const CUSTOMER_ID: &str = "CustomerID";
pub const TRANSACTION_DATE: &str = "InvoiceDate";
pub const ORDER_VALUE: &str = "Amount";
pub const INVOICE_NO: &str = "InvoiceNo";

const CUSTOMER_KEYWORDS: &[&str] = &["id", "cust"];
const DATE_KEYWORDS: &[&str] = &["date", "time"];
const AMOUNT_KEYWORDS: &[&str] = &["amount", "price", "total", "value"];
const INVOICE_KEYWORDS: &[&str] = &["invoice", "order"];

/// Source header for each canonical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub customer_id: String,
    pub transaction_date: String,
    pub order_value: String,
    /// Rows sharing an invoice number count as one transaction
    pub invoice_no: Option<String>,
}

/// Column indices after a mapping has been checked against the headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub customer_id: usize,
    pub transaction_date: usize,
    pub order_value: usize,
    pub invoice_no: Option<usize>,
    /// Passthrough columns as (source index, attribute name)
    pub passthrough: Vec<(usize, String)>,
}

impl ColumnMapping {
    pub fn new(
        customer_id: impl Into<String>,
        transaction_date: impl Into<String>,
        order_value: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            transaction_date: transaction_date.into(),
            order_value: order_value.into(),
            invoice_no: None,
        }
    }

    pub fn with_invoice_no(mut self, invoice_no: impl Into<String>) -> Self {
        self.invoice_no = Some(invoice_no.into());
        self
    }

    /// Guess a mapping from header names by keyword.
    ///
    /// Required fields fall back to the first header when nothing matches.
    /// The invoice column only considers headers no required field took and
    /// is left unmapped when none matches. Returns `None` for an empty
    /// header list.
    pub fn suggest<S: AsRef<str>>(headers: &[S]) -> Option<Self> {
        let first = headers.first()?.as_ref().to_string();
        let pick = |keywords: &[&str]| suggest_column(headers, keywords);

        let customer_id = pick(CUSTOMER_KEYWORDS).unwrap_or_else(|| first.clone());
        let transaction_date = pick(DATE_KEYWORDS).unwrap_or_else(|| first.clone());
        let order_value = pick(AMOUNT_KEYWORDS).unwrap_or_else(|| first.clone());

        let taken = [&customer_id, &transaction_date, &order_value];
        let free: Vec<&str> = headers
            .iter()
            .map(|h| h.as_ref())
            .filter(|h| !taken.iter().any(|t| t.as_str() == *h))
            .collect();
        let invoice_no = suggest_column(&free, INVOICE_KEYWORDS);

        Some(Self {
            customer_id,
            transaction_date,
            order_value,
            invoice_no,
        })
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("customer_id", self.customer_id.as_str()),
            ("transaction_date", self.transaction_date.as_str()),
            ("order_value", self.order_value.as_str()),
        ];
        if let Some(ref invoice) = self.invoice_no {
            fields.push(("invoice_no", invoice.as_str()));
        }
        fields
    }

    /// Check that every mapped column exists and no column is used twice
    pub fn validate<S: AsRef<str>>(&self, headers: &[S]) -> Result<(), ValidationError> {
        let fields = self.fields();
        for (i, &(name, column)) in fields.iter().enumerate() {
            if !headers.iter().any(|h| h.as_ref() == column) {
                return Err(ValidationError::MissingColumn {
                    column: column.to_string(),
                    available: headers
                        .iter()
                        .map(|h| h.as_ref())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            if let Some(&(other, _)) = fields[..i].iter().find(|(_, c)| *c == column) {
                return Err(ValidationError::DuplicateMapping {
                    column: column.to_string(),
                    first: other,
                    second: name,
                });
            }
        }
        Ok(())
    }

    /// Validate and resolve to column indices.
    ///
    /// Unmapped headers become passthrough attributes. An unmapped header
    /// that already carries a canonical name is kept as `<name>_Original`
    /// so it cannot be confused with the mapped field.
    pub fn resolve<S: AsRef<str>>(
        &self,
        headers: &[S],
    ) -> Result<ResolvedColumns, ValidationError> {
        self.validate(headers)?;

        let index_of = |column: &str| {
            headers
                .iter()
                .position(|h| h.as_ref() == column)
                .ok_or_else(|| ValidationError::MissingColumn {
                    column: column.to_string(),
                    available: String::new(),
                })
        };

        let customer_id = index_of(&self.customer_id)?;
        let transaction_date = index_of(&self.transaction_date)?;
        let order_value = index_of(&self.order_value)?;
        let invoice_no = match self.invoice_no {
            Some(ref column) => Some(index_of(column)?),
            None => None,
        };

        let mapped = [Some(customer_id), Some(transaction_date), Some(order_value), invoice_no];
        let passthrough = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !mapped.contains(&Some(*i)))
            .map(|(i, h)| {
                let name = h.as_ref();
                if [CUSTOMER_ID, TRANSACTION_DATE, ORDER_VALUE, INVOICE_NO].contains(&name) {
                    (i, format!("{name}_Original"))
                } else {
                    (i, name.to_string())
                }
            })
            .collect();

        Ok(ResolvedColumns {
            customer_id,
            transaction_date,
            order_value,
            invoice_no,
            passthrough,
        })
    }
}

/// First header whose lowercase form contains any keyword
pub fn suggest_column<S: AsRef<str>>(headers: &[S], keywords: &[&str]) -> Option<String> {
    headers
        .iter()
        .map(|h| h.as_ref())
        .find(|h| {
            let lowered = h.to_lowercase();
            keywords.iter().any(|k| lowered.contains(k))
        })
        .map(str::to_string)
}
