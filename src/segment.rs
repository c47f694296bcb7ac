//! Segment labels and the decision tables that assign them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Customer segment. Every score combination maps to exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    Champions,
    LoyalCustomers,
    PotentialLoyalists,
    NewCustomers,
    Promising,
    NeedAttention,
    CantLoseThem,
    AtRisk,
    AboutToSleep,
    Hibernating,
    Lost,
    Others,
    // Value-only labels, used when recency carries no weight
    TopSpenders,
    HighValue,
    MidValue,
    LowValue,
}

impl Segment {
    pub const ALL: [Segment; 16] = [
        Segment::Champions,
        Segment::LoyalCustomers,
        Segment::PotentialLoyalists,
        Segment::NewCustomers,
        Segment::Promising,
        Segment::NeedAttention,
        Segment::CantLoseThem,
        Segment::AtRisk,
        Segment::AboutToSleep,
        Segment::Hibernating,
        Segment::Lost,
        Segment::Others,
        Segment::TopSpenders,
        Segment::HighValue,
        Segment::MidValue,
        Segment::LowValue,
    ];

    /// Segments counted towards the loyalty rate
    pub const LOYAL: [Segment; 2] = [Segment::Champions, Segment::LoyalCustomers];

    /// Low-recency segments counted towards churn risk
    pub const CHURN_RISK: [Segment; 4] = [
        Segment::AtRisk,
        Segment::CantLoseThem,
        Segment::Hibernating,
        Segment::Lost,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Champions => "Champions",
            Self::LoyalCustomers => "Loyal Customers",
            Self::PotentialLoyalists => "Potential Loyalists",
            Self::NewCustomers => "New Customers",
            Self::Promising => "Promising",
            Self::NeedAttention => "Need Attention",
            Self::CantLoseThem => "Can't Lose Them",
            Self::AtRisk => "At Risk",
            Self::AboutToSleep => "About To Sleep",
            Self::Hibernating => "Hibernating",
            Self::Lost => "Lost",
            Self::Others => "Others",
            Self::TopSpenders => "Top Spenders",
            Self::HighValue => "High Value",
            Self::MidValue => "Mid Value",
            Self::LowValue => "Low Value",
        }
    }

    pub fn is_loyal(&self) -> bool {
        Self::LOYAL.contains(self)
    }

    pub fn is_churn_risk(&self) -> bool {
        Self::CHURN_RISK.contains(self)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Segment {
    type Err = String;

    /// Accepts the display label or a compact form ("cant-lose-them", "AtRisk")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize(s);
        Self::ALL
            .into_iter()
            .find(|seg| normalize(seg.label()) == key)
            .ok_or_else(|| format!("unknown segment '{s}'"))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Recency-aware table over sub-scores normalized to [0, 1].
///
/// `c` is the weighted composite normalized the same way, so the weight
/// configuration decides who clears the Champions and Loyal Customers bars
/// and who falls to Lost. Rules are checked in order; the first match wins.
pub fn classify(r: f64, f: f64, m: f64, c: f64) -> Segment {
    if r >= 0.75 && f >= 0.75 && c >= 0.75 {
        Segment::Champions
    } else if r >= 0.5 && f >= 0.75 && c >= 0.5 {
        Segment::LoyalCustomers
    } else if r >= 0.75 && f >= 0.5 {
        Segment::PotentialLoyalists
    } else if r >= 0.75 && f < 0.25 {
        Segment::NewCustomers
    } else if r >= 0.5 && f < 0.5 {
        Segment::Promising
    } else if r >= 0.5 {
        Segment::NeedAttention
    } else if r < 0.25 && (f >= 0.75 || m >= 0.75) {
        Segment::CantLoseThem
    } else if f >= 0.5 {
        Segment::AtRisk
    } else if r >= 0.25 {
        Segment::AboutToSleep
    } else if c < 0.25 {
        Segment::Lost
    } else if f >= 0.25 {
        Segment::Hibernating
    } else {
        Segment::Others
    }
}

/// Value-only table over the 0-100 growth score.
/// Without recency a churned big spender looks like a champion, so no
/// loyalty or churn labels are handed out here.
pub fn classify_by_value(growth_score: f64) -> Segment {
    if growth_score < 40.0 {
        Segment::LowValue
    } else if growth_score < 70.0 {
        Segment::MidValue
    } else if growth_score < 90.0 {
        Segment::HighValue
    } else {
        Segment::TopSpenders
    }
}
