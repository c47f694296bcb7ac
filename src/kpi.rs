//! Aggregate KPIs over a scored customer population

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::ScoredCustomer;
use crate::segment::Segment;

/// Which customers the average CLV is taken over
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClvScope {
    #[default]
    All,
    Segments(Vec<Segment>),
}

impl ClvScope {
    fn includes(&self, segment: Segment) -> bool {
        match self {
            Self::All => true,
            Self::Segments(segments) => segments.contains(&segment),
        }
    }
}

/// Time span the transactions cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    pub first_transaction: NaiveDateTime,
    pub last_transaction: NaiveDateTime,
    pub reference_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_customers: usize,
    /// Share of customers in the loyal segments, in [0, 1]
    pub loyalty_rate: f64,
    /// Share of customers in the churn-risk segments, in [0, 1]
    pub churn_risk: f64,
    /// Mean monetary total over the CLV scope; `None` if the scope is empty
    pub average_clv: Option<f64>,
    pub total_revenue: f64,
    pub segment_counts: BTreeMap<Segment, usize>,
    pub first_transaction: NaiveDateTime,
    pub last_transaction: NaiveDateTime,
    pub reference_date: NaiveDateTime,
}

/// Reduce scored customers to KPIs
pub fn compute_kpis(
    customers: &[ScoredCustomer],
    clv_scope: &ClvScope,
    window: ObservationWindow,
) -> Kpis {
    let total_customers = customers.len();
    let share = |count: usize| {
        if total_customers == 0 {
            0.0
        } else {
            count as f64 / total_customers as f64
        }
    };

    let mut segment_counts = BTreeMap::new();
    for c in customers {
        *segment_counts.entry(c.segment).or_insert(0) += 1;
    }

    let loyal = customers.iter().filter(|c| c.segment.is_loyal()).count();
    let churning = customers.iter().filter(|c| c.segment.is_churn_risk()).count();

    let (clv_sum, clv_count) = customers
        .iter()
        .filter(|c| clv_scope.includes(c.segment))
        .fold((0.0, 0usize), |(sum, n), c| (sum + c.monetary_total, n + 1));
    let average_clv = (clv_count > 0).then(|| clv_sum / clv_count as f64);

    Kpis {
        total_customers,
        loyalty_rate: share(loyal),
        churn_risk: share(churning),
        average_clv,
        total_revenue: customers.iter().map(|c| c.monetary_total).sum(),
        segment_counts,
        first_transaction: window.first_transaction,
        last_transaction: window.last_transaction,
        reference_date: window.reference_date,
    }
}
