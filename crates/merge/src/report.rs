//! Human-readable merge report.

use std::fmt;

use serde::Serialize;

use crate::result::MergeStatistics;

/// Outcome of one family's merge at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailStatus {
    /// No duplicates were found.
    Success,
    /// Duplicates were found and settled.
    Warning,
}

impl fmt::Display for DetailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// One row of the report per record family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyDetail {
    pub family: String,
    pub status: DetailStatus,
    pub statistics: MergeStatistics,
}

/// Summary, per-family details and follow-up recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub summary: String,
    pub details: Vec<FamilyDetail>,
    pub recommendations: Vec<String>,
}

/// Build a report from per-family statistics.
#[must_use]
pub fn generate_report(families: &[(&str, MergeStatistics)]) -> MergeReport {
    let mut total = MergeStatistics::default();
    let details = families
        .iter()
        .map(|(family, statistics)| {
            total.absorb(statistics);
            FamilyDetail {
                family: (*family).to_string(),
                status: if statistics.duplicates_found == 0 {
                    DetailStatus::Success
                } else {
                    DetailStatus::Warning
                },
                statistics: *statistics,
            }
        })
        .collect();

    let summary = format!(
        "Merged {} families into {} records ({} original, {} new). Found {} duplicates and {} conflicts; {} conflicts resolved.",
        families.len(),
        total.total_merged,
        total.total_original,
        total.total_new,
        total.duplicates_found,
        total.conflicts_found,
        total.conflicts_resolved,
    );

    MergeReport {
        summary,
        details,
        recommendations: recommendations(&total),
    }
}

fn recommendations(total: &MergeStatistics) -> Vec<String> {
    let mut recommendations = Vec::new();

    if total.duplicates_found > 0 {
        recommendations.push(
            "Review duplicated records to confirm each identity key names one real-world record"
                .to_string(),
        );
    }
    if total.conflicts_found > 0 {
        recommendations.push(
            "Check that the conflict policy matches how much each source is trusted".to_string(),
        );
    }
    if total.conflicts_pending() > 0 {
        recommendations.push(format!(
            "Settle {} conflicts held for manual review",
            total.conflicts_pending()
        ));
    }
    if recommendations.is_empty() {
        recommendations.push("No duplicates or conflicts found; merged data is ready to use".to_string());
    }

    recommendations
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<20} {:>9} {:>9} {:>9} {:>11} {:>10}  status",
            "family", "original", "new", "merged", "duplicates", "conflicts"
        )?;
        for detail in &self.details {
            let s = &detail.statistics;
            writeln!(
                f,
                "{:<20} {:>9} {:>9} {:>9} {:>11} {:>10}  {}",
                detail.family,
                s.total_original,
                s.total_new,
                s.total_merged,
                s.duplicates_found,
                s.conflicts_found,
                detail.status
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Recommendations:")?;
        for recommendation in &self.recommendations {
            writeln!(f, "  - {recommendation}")?;
        }
        Ok(())
    }
}
