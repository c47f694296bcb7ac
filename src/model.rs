//! RFM scoring engine: aggregation, quantile sub-scores, weighting and segmentation

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use polars::prelude::{col, lit, DataType, IntoLazy, StringChunked};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{transaction_frame, Transaction, TRANSACTION_KEY};
use crate::error::{ConfigurationError, RfmError, ValidationError};
use crate::kpi::{compute_kpis, ClvScope, Kpis, ObservationWindow};
use crate::mapping::{CUSTOMER_ID, ORDER_VALUE, TRANSACTION_DATE};
use crate::segment::{classify, classify_by_value, Segment};

const FIRST_PURCHASE: &str = "FirstPurchase";
const LAST_PURCHASE: &str = "LastPurchase";
const RECENCY: &str = "Recency";
const FREQUENCY: &str = "Frequency";
const MONETARY: &str = "Monetary";
const MS_PER_DAY: f64 = 86_400_000.0;

/// Importance of each dimension on a 0-10 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

impl WeightConfig {
    pub const MAX: u8 = 10;

    pub fn new(recency: u8, frequency: u8, monetary: u8) -> Self {
        Self {
            recency,
            frequency,
            monetary,
        }
    }

    pub fn total(&self) -> u32 {
        u32::from(self.recency) + u32::from(self.frequency) + u32::from(self.monetary)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (dimension, value) in [
            ("recency", self.recency),
            ("frequency", self.frequency),
            ("monetary", self.monetary),
        ] {
            if value > Self::MAX {
                return Err(ConfigurationError::WeightOutOfRange { dimension, value });
            }
        }
        if self.total() == 0 {
            return Err(ConfigurationError::ZeroWeights);
        }
        Ok(())
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self::new(5, 5, 5)
    }
}

/// Inputs to a scoring run other than the transactions themselves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: WeightConfig,
    /// Defaults to one day after the latest transaction
    pub reference_date: Option<NaiveDateTime>,
    pub bin_count: u8,
    pub clv_scope: ClvScope,
}

impl ScoringConfig {
    pub const DEFAULT_BIN_COUNT: u8 = 5;
    pub const MIN_BIN_COUNT: u8 = 2;
    pub const MAX_BIN_COUNT: u8 = 10;

    pub fn new(weights: WeightConfig) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    pub fn with_reference_date(mut self, reference_date: NaiveDateTime) -> Self {
        self.reference_date = Some(reference_date);
        self
    }

    pub fn with_bin_count(mut self, bin_count: u8) -> Self {
        self.bin_count = bin_count;
        self
    }

    pub fn with_clv_scope(mut self, clv_scope: ClvScope) -> Self {
        self.clv_scope = clv_scope;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.weights.validate()?;
        if !(Self::MIN_BIN_COUNT..=Self::MAX_BIN_COUNT).contains(&self.bin_count) {
            return Err(ConfigurationError::InvalidBinCount(self.bin_count));
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: WeightConfig::default(),
            reference_date: None,
            bin_count: Self::DEFAULT_BIN_COUNT,
            clv_scope: ClvScope::All,
        }
    }
}

/// Raw RFM values for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub recency_days: i64,
    pub frequency_count: usize,
    pub monetary_total: f64,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
    pub attributes: BTreeMap<String, String>,
}

/// A customer with sub-scores, composite and segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    pub customer_id: String,
    pub recency_days: i64,
    pub frequency_count: usize,
    pub monetary_total: f64,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    /// Weighted mean of the sub-scores, in [1, bin_count]
    pub composite_score: f64,
    /// Composite on a 0-100 scale, one decimal
    pub growth_score: f64,
    /// Sub-scores concatenated, e.g. "534"
    pub rfm_code: String,
    pub segment: Segment,
    pub attributes: BTreeMap<String, String>,
}

/// Result of a scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    /// Leaderboard order: composite descending, then customer id
    pub customers: Vec<ScoredCustomer>,
    pub kpis: Kpis,
}

impl Segmentation {
    pub fn customer(&self, customer_id: &str) -> Option<&ScoredCustomer> {
        self.customers.iter().find(|c| c.customer_id == customer_id)
    }
}

/// Score and segment every customer in `transactions`
///
/// # Arguments
/// * `transactions` - Non-empty list of mapped transaction rows
/// * `config` - Weights, optional reference date, bin count and CLV scope
///
/// # Returns
/// * `Segmentation` with the scored leaderboard and aggregate KPIs
pub fn compute_segmentation(
    transactions: &[Transaction],
    config: &ScoringConfig,
) -> Result<Segmentation, RfmError> {
    config.validate()?;
    validate_transactions(transactions)?;

    let first_transaction = transactions
        .iter()
        .map(|t| t.transaction_date)
        .min()
        .ok_or(ValidationError::EmptyInput)?;
    let last_transaction = transactions
        .iter()
        .map(|t| t.transaction_date)
        .max()
        .ok_or(ValidationError::EmptyInput)?;
    let reference_date = config
        .reference_date
        .unwrap_or(last_transaction + Duration::days(1));

    let aggregates = aggregate_customers(transactions, reference_date)?;
    debug!(
        customers = aggregates.len(),
        transactions = transactions.len(),
        %reference_date,
        "Aggregated customers"
    );

    let bins = config.bin_count;
    let recency_scores = quantile_scores(
        &aggregates.iter().map(|a| a.recency_days as f64).collect::<Vec<_>>(),
        bins,
        true,
    );
    let frequency_scores = quantile_scores(
        &aggregates.iter().map(|a| a.frequency_count as f64).collect::<Vec<_>>(),
        bins,
        false,
    );
    let monetary_scores = quantile_scores(
        &aggregates.iter().map(|a| a.monetary_total).collect::<Vec<_>>(),
        bins,
        false,
    );

    let weights = config.weights;
    if weights.recency == 0 {
        debug!("Recency weight is zero; using value-only segments");
    }

    let mut customers: Vec<ScoredCustomer> = aggregates
        .into_iter()
        .enumerate()
        .map(|(i, agg)| {
            score_customer(
                agg,
                [recency_scores[i], frequency_scores[i], monetary_scores[i]],
                &weights,
                bins,
            )
        })
        .collect();

    customers.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    let kpis = compute_kpis(
        &customers,
        &config.clv_scope,
        ObservationWindow {
            first_transaction,
            last_transaction,
            reference_date,
        },
    );
    debug!(
        loyalty_rate = kpis.loyalty_rate,
        churn_risk = kpis.churn_risk,
        "Segmentation complete"
    );

    Ok(Segmentation { customers, kpis })
}

fn validate_transactions(transactions: &[Transaction]) -> Result<(), ValidationError> {
    if transactions.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    for (row, t) in transactions.iter().enumerate() {
        if t.customer_id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                row,
                field: "customer_id",
            });
        }
        if !t.order_value.is_finite() || t.order_value < 0.0 {
            return Err(ValidationError::InvalidOrderValue {
                row,
                value: t.order_value,
            });
        }
    }
    Ok(())
}

/// Collapse transactions into one aggregate per customer, ordered by id
///
/// Grouping runs in Polars: first and last purchase are the min and max
/// date, frequency is the number of unique transaction keys, monetary is the
/// summed order value and recency is whole days from `reference_date` back to
/// the last purchase. Attributes keep their first non-empty value.
pub fn aggregate_customers(
    transactions: &[Transaction],
    reference_date: NaiveDateTime,
) -> Result<Vec<CustomerAggregate>, RfmError> {
    if let Some((row, t)) = transactions
        .iter()
        .enumerate()
        .find(|(_, t)| t.transaction_date > reference_date)
    {
        return Err(ValidationError::FutureTransaction {
            row,
            date: t.transaction_date,
            reference: reference_date,
        }
        .into());
    }

    let (df, attribute_columns) = transaction_frame(transactions)?;
    let reference_ms = reference_date.and_utc().timestamp_millis();

    let mut aggs = vec![
        col(TRANSACTION_DATE).min().alias(FIRST_PURCHASE),
        col(TRANSACTION_DATE).max().alias(LAST_PURCHASE),
        col(TRANSACTION_KEY).n_unique().alias(FREQUENCY),
        col(ORDER_VALUE).sum().alias(MONETARY),
    ];
    aggs.extend(
        attribute_columns
            .iter()
            .map(|(_, column)| col(column).drop_nulls().first()),
    );

    // Elapsed time is never negative, so the integer cast floors
    let rfm = df
        .lazy()
        .group_by([col(CUSTOMER_ID)])
        .agg(aggs)
        .with_columns([((lit(reference_ms) - col(LAST_PURCHASE)).cast(DataType::Float64)
            / lit(MS_PER_DAY))
        .cast(DataType::Int64)
        .alias(RECENCY)])
        .collect()?;

    let ids = rfm.column(CUSTOMER_ID)?.str()?;
    let first_seen = rfm.column(FIRST_PURCHASE)?.i64()?;
    let last_seen = rfm.column(LAST_PURCHASE)?.i64()?;
    let recency = rfm.column(RECENCY)?.i64()?;
    let frequency = rfm.column(FREQUENCY)?.cast(&DataType::UInt64)?;
    let frequency = frequency.u64()?;
    let monetary = rfm.column(MONETARY)?.f64()?;
    let mut attributes: Vec<(&String, &StringChunked)> = Vec::new();
    for (name, column) in &attribute_columns {
        attributes.push((name, rfm.column(column)?.str()?));
    }

    let mut aggregates = (0..rfm.height())
        .filter_map(|row| {
            Some(CustomerAggregate {
                customer_id: ids.get(row)?.to_string(),
                recency_days: recency.get(row)?,
                frequency_count: usize::try_from(frequency.get(row)?).ok()?,
                monetary_total: monetary.get(row)?,
                first_seen: first_seen.get(row).and_then(from_millis)?,
                last_seen: last_seen.get(row).and_then(from_millis)?,
                attributes: attributes
                    .iter()
                    .filter_map(|(name, values)| {
                        values.get(row).map(|v| ((*name).clone(), v.to_string()))
                    })
                    .collect(),
            })
        })
        .collect::<Vec<_>>();
    aggregates.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

    if aggregates.is_empty() {
        return Err(ValidationError::EmptyInput.into());
    }
    Ok(aggregates)
}

fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Score values into `[1, bin_count]` by dense-rank percentile
///
/// Distinct values are sorted and ranked; a value of rank `r` among `d`
/// distinct values scores `1 + floor(r * bin_count / (d - 1))`, capped at
/// `bin_count`. Equal values always share a score regardless of input order.
/// With a single distinct value everyone gets the midpoint score.
/// `inverse` flips the scale so smaller values score higher. Negative zero
/// ranks as zero.
pub fn quantile_scores(values: &[f64], bin_count: u8, inverse: bool) -> Vec<u8> {
    let bins = usize::from(bin_count.max(1));

    let values: Vec<f64> = values.iter().map(|v| v + 0.0).collect();
    let mut distinct = values.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup_by(|a, b| a.total_cmp(b).is_eq());

    if distinct.len() <= 1 {
        return vec![midpoint_score(bin_count); values.len()];
    }

    let span = distinct.len() - 1;
    values
        .iter()
        .map(|v| {
            let rank = distinct
                .binary_search_by(|probe| probe.total_cmp(v))
                .unwrap_or_else(|insert_at| insert_at.min(span));
            let score = (1 + rank * bins / span).min(bins);
            let score = if inverse { bins + 1 - score } else { score };
            u8::try_from(score).unwrap_or(bin_count)
        })
        .collect()
}

fn midpoint_score(bin_count: u8) -> u8 {
    ((u16::from(bin_count) + 1) / 2).max(1) as u8
}

fn normalized(score: u8, bin_count: u8) -> f64 {
    f64::from(score - 1) / f64::from(bin_count - 1)
}

fn score_customer(
    agg: CustomerAggregate,
    [recency_score, frequency_score, monetary_score]: [u8; 3],
    weights: &WeightConfig,
    bin_count: u8,
) -> ScoredCustomer {
    let weighted = u32::from(weights.recency) * u32::from(recency_score)
        + u32::from(weights.frequency) * u32::from(frequency_score)
        + u32::from(weights.monetary) * u32::from(monetary_score);
    let composite_score = f64::from(weighted) / f64::from(weights.total());
    let growth_score = (composite_score / f64::from(bin_count) * 1000.0).round() / 10.0;

    let segment = if weights.recency == 0 {
        classify_by_value(growth_score)
    } else {
        classify(
            normalized(recency_score, bin_count),
            normalized(frequency_score, bin_count),
            normalized(monetary_score, bin_count),
            (composite_score - 1.0) / f64::from(bin_count - 1),
        )
    };

    ScoredCustomer {
        customer_id: agg.customer_id,
        recency_days: agg.recency_days,
        frequency_count: agg.frequency_count,
        monetary_total: agg.monetary_total,
        recency_score,
        frequency_score,
        monetary_score,
        composite_score,
        growth_score,
        rfm_code: format!("{recency_score}{frequency_score}{monetary_score}"),
        segment,
        attributes: agg.attributes,
    }
}
