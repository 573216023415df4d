//! Cross-platform conflict detection.
//!
//! Compares order families against ad spend after a merge. Diagnostic only:
//! nothing here changes the records it reads.

use std::borrow::Borrow;

use adledger_core::{AdSpendRecord, FieldLookup, OrderRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Start dates further apart than this are reported as a mismatch.
const MAX_START_GAP_DAYS: i64 = 7;

/// ROI percentage below which performance is reported as anomalous.
const ANOMALOUS_ROI_PERCENT: i64 = -80;

/// Date columns tried on order records, in order.
const ORDER_DATE_FIELDS: &[&str] = &[
    "order_date",
    "date",
    "orderDate",
    "created_at",
    "purchase_date",
    "transaction_date",
];

/// Date columns tried on ad-spend records, in order.
const SPEND_DATE_FIELDS: &[&str] = &["date", "day", "date_start", "report_date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DateMismatch,
    PerformanceAnomaly,
}

/// One detected cross-platform conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossPlatformConflict {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    pub details: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictAnalysis {
    pub conflicts: Vec<CrossPlatformConflict>,
    pub recommendations: Vec<String>,
    /// Checks that could not run, such as totals too large to compare.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ConflictAnalysis {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Inclusive date span covered by a record family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Span of every parsable date, trying `fields` in order on each record.
    pub fn of<'a, R, I>(records: I, fields: &[&str]) -> Option<Self>
    where
        R: FieldLookup + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        records
            .into_iter()
            .filter_map(|record| record_date(record, fields))
            .fold(None, |span: Option<Self>, date| {
                Some(match span {
                    Some(span) => Self {
                        start: span.start.min(date),
                        end: span.end.max(date),
                    },
                    None => Self {
                        start: date,
                        end: date,
                    },
                })
            })
    }
}

/// Look for date-range mismatches and ROI anomalies between two order
/// families and one ad-spend family.
///
/// Every pair of dated families is compared, so misaligned order networks
/// are reported even when spend lines up with one of them.
pub fn detect_cross_platform_conflicts<O, S>(
    orders_a: &[O],
    orders_b: &[O],
    ad_spend: &[S],
) -> ConflictAnalysis
where
    O: Borrow<OrderRecord>,
    S: Borrow<AdSpendRecord>,
{
    let orders = || {
        orders_a
            .iter()
            .chain(orders_b)
            .map(<O as Borrow<OrderRecord>>::borrow)
    };
    let spend = || ad_spend.iter().map(<S as Borrow<AdSpendRecord>>::borrow);

    let mut analysis = ConflictAnalysis::default();

    let spans: Vec<(&'static str, DateSpan)> = [
        (
            "orders_a",
            DateSpan::of(
                orders_a.iter().map(<O as Borrow<OrderRecord>>::borrow),
                ORDER_DATE_FIELDS,
            ),
        ),
        (
            "orders_b",
            DateSpan::of(
                orders_b.iter().map(<O as Borrow<OrderRecord>>::borrow),
                ORDER_DATE_FIELDS,
            ),
        ),
        ("ad_spend", DateSpan::of(spend(), SPEND_DATE_FIELDS)),
    ]
    .into_iter()
    .filter_map(|(family, span)| span.map(|span| (family, span)))
    .collect();
    debug!(?spans, "Computed date spans");

    for (position, (first, first_span)) in spans.iter().enumerate() {
        for (second, second_span) in spans.iter().skip(position + 1) {
            let gap = (second_span.start - first_span.start).num_days().abs();
            if gap <= MAX_START_GAP_DAYS {
                continue;
            }
            warn!(first, second, gap_days = gap, "Family date ranges do not line up");
            analysis.conflicts.push(CrossPlatformConflict {
                kind: ConflictKind::DateMismatch,
                severity: Severity::Medium,
                description: format!(
                    "{first} starts {} and {second} starts {}, {gap} days apart",
                    first_span.start, second_span.start
                ),
                details: json!({
                    "families": [first, second],
                    "ranges": [first_span, second_span],
                    "gap_days": gap,
                }),
            });
        }
    }
    if !analysis.is_clean() {
        analysis.recommendations.push(
            "Align the order and ad spend date ranges before comparing performance".to_string(),
        );
    }

    let total_spend = checked_total(spend().map(|record| record.spend.to_decimal()));
    let total_commission = checked_total(orders().map(OrderRecord::earnings));
    let (Some(total_spend), Some(total_commission)) = (total_spend, total_commission) else {
        warn!("Totals overflow, skipping the return on spend check");
        analysis
            .warnings
            .push("Spend or commission totals are too large to compare; ROI not checked".to_string());
        return analysis;
    };

    if total_spend > Decimal::ZERO && total_commission > Decimal::ZERO {
        let Some(roi) = roi_percent(total_commission, total_spend) else {
            warn!(%total_commission, %total_spend, "ROI overflows, skipping the check");
            analysis.warnings.push(format!(
                "ROI of commission {total_commission} against spend {total_spend} is out of range; not checked"
            ));
            return analysis;
        };
        if roi < Decimal::from(ANOMALOUS_ROI_PERCENT) {
            let roi = roi.round_dp(2);
            warn!(%roi, "Return on spend far below expectations");
            analysis.conflicts.push(CrossPlatformConflict {
                kind: ConflictKind::PerformanceAnomaly,
                severity: Severity::High,
                description: format!(
                    "Commission {total_commission} against spend {total_spend} gives ROI {roi}%"
                ),
                details: json!({
                    "total_commission": total_commission,
                    "total_spend": total_spend,
                    "roi_percent": roi,
                }),
            });
            analysis.recommendations.push(
                "Review budget allocation: spend is far out of line with attributed commission"
                    .to_string(),
            );
        }
    }

    analysis
}

/// Sum that yields `None` instead of overflowing.
fn checked_total(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, Decimal::checked_add)
}

/// `(commission - spend) / spend * 100`, or `None` if any step overflows.
fn roi_percent(commission: Decimal, spend: Decimal) -> Option<Decimal> {
    commission
        .checked_sub(spend)?
        .checked_div(spend)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

fn record_date<R: FieldLookup>(record: &R, fields: &[&str]) -> Option<NaiveDate> {
    fields
        .iter()
        .find_map(|field| record.text_field(field))
        .and_then(|raw| parse_date(&raw))
}

/// Parse the date part of an ISO date or timestamp, or a slash-separated date.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}
