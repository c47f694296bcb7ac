//! Console rendering of the KPI summary and customer leaderboard

use std::fmt;

use crate::model::Segmentation;

/// Passthrough columns shown in the leaderboard before it gets too wide
const MAX_EXTRA_COLUMNS: usize = 3;

/// KPI block and segment distribution
pub struct Summary<'a>(pub &'a Segmentation);

/// Top `limit` customers as an aligned table
pub struct Leaderboard<'a> {
    pub segmentation: &'a Segmentation,
    pub limit: usize,
}

/// Render the KPI block and segment distribution
pub fn render_summary(segmentation: &Segmentation) -> String {
    Summary(segmentation).to_string()
}

/// Render the top `limit` customers as an aligned table
pub fn render_leaderboard(segmentation: &Segmentation, limit: usize) -> String {
    Leaderboard {
        segmentation,
        limit,
    }
    .to_string()
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kpis = &self.0.kpis;

        writeln!(f, "=== RFM Summary ===")?;
        writeln!(f, "Customer base: {}", kpis.total_customers)?;
        writeln!(
            f,
            "Date range: {} - {}",
            kpis.first_transaction.format("%b %d, %Y"),
            kpis.last_transaction.format("%b %d, %Y")
        )?;
        writeln!(f, "Reference date: {}", kpis.reference_date.format("%Y-%m-%d"))?;
        match kpis.average_clv {
            Some(clv) => writeln!(f, "Avg CLV: ${clv:.0}")?,
            None => writeln!(f, "Avg CLV: n/a")?,
        }
        writeln!(f, "Total revenue: ${:.2}", kpis.total_revenue)?;
        writeln!(
            f,
            "Loyalty rate: {:.1}% (Champions + Loyal Customers)",
            kpis.loyalty_rate * 100.0
        )?;
        writeln!(
            f,
            "Churn risk: {:.1}% (At Risk + Can't Lose Them + Hibernating + Lost)",
            kpis.churn_risk * 100.0
        )?;

        writeln!(f, "\n=== Segment Distribution ===")?;
        let mut counts: Vec<_> = kpis.segment_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (segment, &count) in counts {
            let percentage = if kpis.total_customers == 0 {
                0.0
            } else {
                count as f64 / kpis.total_customers as f64 * 100.0
            };
            writeln!(f, "  {:<20} {:>6} ({:.1}%)", segment.label(), count, percentage)?;
        }
        Ok(())
    }
}

impl fmt::Display for Leaderboard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all = &self.segmentation.customers;
        let customers = &all[..self.limit.min(all.len())];

        let mut extra: Vec<&str> = Vec::new();
        for c in all {
            for name in c.attributes.keys() {
                if !extra.contains(&name.as_str()) {
                    extra.push(name);
                }
            }
        }
        if extra.len() > MAX_EXTRA_COLUMNS {
            extra.clear();
        }

        let id_width = customers
            .iter()
            .map(|c| c.customer_id.len())
            .max()
            .unwrap_or(0)
            .max("Customer".len());

        write!(
            f,
            "{:<id_width$} | {:<20} | {:>6} | {:>7} | {:>9} | {:>12}",
            "Customer", "Segment", "Growth", "Recency", "Frequency", "Monetary"
        )?;
        for name in &extra {
            write!(f, " | {name}")?;
        }
        writeln!(f)?;

        for c in customers {
            write!(
                f,
                "{:<id_width$} | {:<20} | {:>6.1} | {:>7} | {:>9} | {:>12.2}",
                c.customer_id,
                c.segment.label(),
                c.growth_score,
                c.recency_days,
                c.frequency_count,
                c.monetary_total
            )?;
            for name in &extra {
                let value = c.attributes.get(*name).map(String::as_str).unwrap_or("");
                write!(f, " | {value}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Serialize the whole segmentation as pretty JSON
pub fn to_json(segmentation: &Segmentation) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(segmentation)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Transaction;
    use crate::model::{compute_segmentation, ScoringConfig};
    use chrono::NaiveDate;

    fn segmentation() -> Segmentation {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 3, d)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        };
        let transactions = vec![
            Transaction::new("alice", day(1), 120.0)
                .with_attribute("Email", "alice@example.com"),
            Transaction::new("bob", day(10), 40.0),
            Transaction::new("bob", day(12), 60.0),
        ];
        compute_segmentation(&transactions, &ScoringConfig::default()).unwrap()
    }

    #[test]
    fn test_render_summary() {
        let summary = render_summary(&segmentation());
        assert!(summary.contains("Customer base: 2"));
        assert!(summary.contains("Date range: Mar 01, 2024 - Mar 12, 2024"));
        assert!(summary.contains("Reference date: 2024-03-13"));
        assert!(summary.contains("Avg CLV: $110"));
    }

    #[test]
    fn test_render_leaderboard() {
        let table = render_leaderboard(&segmentation(), 1);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Customer"));
        assert!(lines[0].ends_with("| Email"));
        assert!(lines[1].starts_with("bob"));
    }

    #[test]
    fn test_display_matches_render() {
        let segmentation = segmentation();
        let summary = format!("{}", Summary(&segmentation));
        assert_eq!(summary, render_summary(&segmentation));
        assert!(summary.ends_with("%)\n"));

        let board = Leaderboard {
            segmentation: &segmentation,
            limit: 10,
        };
        let lines: Vec<String> = board.to_string().lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("alice"));
        assert!(lines[2].ends_with("| alice@example.com"));
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&segmentation()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kpis"]["total_customers"], 2);
        assert_eq!(value["customers"][0]["customer_id"], "bob");
        assert_eq!(value["customers"][1]["attributes"]["Email"], "alice@example.com");
    }
}
