//! Command-line interface definitions and argument parsing

use chrono::NaiveDateTime;
use clap::Parser;

use crate::data::parse_datetime;
use crate::kpi::ClvScope;
use crate::mapping::ColumnMapping;
use crate::model::{ScoringConfig, WeightConfig};
use crate::segment::Segment;

/// RFM customer segmentation with weighted quantile scoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data.csv")]
    pub input: String,

    /// Recency, frequency and monetary weights (0-10 each)
    /// Example: --weights "8,5,3"
    #[arg(short, long, default_value = "5,5,5")]
    pub weights: String,

    /// Number of quantile bins per dimension
    #[arg(short, long, default_value = "5")]
    pub bins: u8,

    /// Reference date for recency (default: day after the last transaction)
    #[arg(short, long)]
    pub reference_date: Option<String>,

    /// Column holding the customer id (guessed from headers if omitted)
    #[arg(long)]
    pub customer_col: Option<String>,

    /// Column holding the transaction date
    #[arg(long)]
    pub date_col: Option<String>,

    /// Column holding the order value
    #[arg(long)]
    pub amount_col: Option<String>,

    /// Column holding the invoice number
    #[arg(long)]
    pub invoice_col: Option<String>,

    /// Restrict average CLV to these segments (repeatable)
    #[arg(long = "clv-segment")]
    pub clv_segments: Vec<String>,

    /// Number of customers shown in the leaderboard
    #[arg(short, long, default_value = "20")]
    pub top: usize,

    /// Print the full result as JSON instead of tables
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse weights from the weights string
    /// Expected format: "recency,frequency,monetary"
    pub fn parse_weights(&self) -> crate::Result<WeightConfig> {
        let parts: Vec<&str> = self.weights.split(',').collect();
        if parts.len() != 3 {
            anyhow::bail!("Weights must be in format 'recency,frequency,monetary'");
        }

        let parse = |label: &str, raw: &str| -> crate::Result<u8> {
            raw.trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid {} weight: {}", label, raw))
        };

        Ok(WeightConfig::new(
            parse("recency", parts[0])?,
            parse("frequency", parts[1])?,
            parse("monetary", parts[2])?,
        ))
    }

    pub fn parse_reference_date(&self) -> crate::Result<Option<NaiveDateTime>> {
        match self.reference_date {
            Some(ref raw) => parse_datetime(raw)
                .map(Some)
                .ok_or_else(|| anyhow::anyhow!("Invalid reference date: {}", raw)),
            None => Ok(None),
        }
    }

    pub fn parse_clv_scope(&self) -> crate::Result<ClvScope> {
        if self.clv_segments.is_empty() {
            return Ok(ClvScope::All);
        }
        let segments = self
            .clv_segments
            .iter()
            .map(|s| s.parse::<Segment>().map_err(anyhow::Error::msg))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(ClvScope::Segments(segments))
    }

    pub fn scoring_config(&self) -> crate::Result<ScoringConfig> {
        let mut config = ScoringConfig::new(self.parse_weights()?)
            .with_bin_count(self.bins)
            .with_clv_scope(self.parse_clv_scope()?);
        config.reference_date = self.parse_reference_date()?;
        Ok(config)
    }

    /// Explicit columns override the header-based suggestion
    pub fn column_mapping(&self, headers: &[String]) -> crate::Result<ColumnMapping> {
        let mut mapping = ColumnMapping::suggest(headers)
            .ok_or_else(|| anyhow::anyhow!("Input file has no columns"))?;
        if let Some(ref col) = self.customer_col {
            mapping.customer_id = col.clone();
        }
        if let Some(ref col) = self.date_col {
            mapping.transaction_date = col.clone();
        }
        if let Some(ref col) = self.amount_col {
            mapping.order_value = col.clone();
        }
        if self.invoice_col.is_some() {
            mapping.invoice_no = self.invoice_col.clone();
        }
        Ok(mapping)
    }
}
