//! Record families reconciled by the merge engine.
//!
//! Records arrive from heterogeneous sources (CSV imports converted to JSON,
//! earlier API syncs) whose column names differ. Each record type names the
//! fields the merge engine keys on or aggregates, and keeps everything else
//! in `extra` so no source column is lost on the way through a merge.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::MetricValue;

/// Read access to a record's fields by source column name.
///
/// Used where the column name varies by source and callers probe a list of
/// candidates (date columns, mostly).
pub trait FieldLookup {
    /// The field's value rendered as text, if the record has it.
    fn text_field(&self, name: &str) -> Option<String>;
}

/// An affiliate/commerce order attributed to a campaign.
///
/// Identity: the platform order number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(
        default,
        alias = "orderNumber",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(
        default,
        alias = "subId",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_id: Option<String>,
    #[serde(default, alias = "campaignName", skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub commission: MetricValue,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub payout: MetricValue,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderRecord {
    /// Earnings attributed to this order: commission, or payout when the
    /// source reports no commission column.
    #[must_use]
    pub fn earnings(&self) -> Decimal {
        if self.commission.is_present() {
            self.commission.to_decimal()
        } else {
            self.payout.to_decimal()
        }
    }
}

impl FieldLookup for OrderRecord {
    fn text_field(&self, name: &str) -> Option<String> {
        match name {
            "order_number" => self.order_number.clone(),
            "platform" => self.platform.clone(),
            "sub_id" => self.sub_id.clone(),
            "campaign_name" => self.campaign_name.clone(),
            _ => extra_text(&self.extra, name),
        }
    }
}

/// Daily ad spend for one ad.
///
/// Identity: (campaign name, ad set name, ad name, date). The platform
/// exports have no single natural key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdSpendRecord {
    #[serde(default, alias = "campaignName", skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
    #[serde(
        default,
        alias = "adSetName",
        alias = "adset_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub ad_set_name: Option<String>,
    #[serde(default, alias = "adName", skip_serializing_if = "Option::is_none")]
    pub ad_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub spend: MetricValue,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub impressions: MetricValue,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub clicks: MetricValue,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldLookup for AdSpendRecord {
    fn text_field(&self, name: &str) -> Option<String> {
        match name {
            "campaign_name" => self.campaign_name.clone(),
            "ad_set_name" => self.ad_set_name.clone(),
            "ad_name" => self.ad_name.clone(),
            "date" => self.date.clone(),
            _ => extra_text(&self.extra, name),
        }
    }
}

/// Per-campaign performance row (orders, commission, spend, ROI).
///
/// Identity: the user sub-identifier, or (sub-identifier, platform) on the
/// cross-platform dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignPerformance {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        alias = "subId",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub orders: MetricValue,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub commission: MetricValue,
    #[serde(default, alias = "adSpend", skip_serializing_if = "MetricValue::is_absent")]
    pub ad_spend: MetricValue,
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub roi: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CampaignPerformance {
    /// Replace the metric fields with `newer`'s, keeping identity and extras.
    ///
    /// The metric set is replaced wholesale: a metric the newer row leaves
    /// out becomes absent rather than keeping the stale value.
    pub fn take_metrics_from(&mut self, newer: &Self) {
        self.name.clone_from(&newer.name);
        self.orders = newer.orders.clone();
        self.commission = newer.commission.clone();
        self.ad_spend = newer.ad_spend.clone();
        self.roi = newer.roi.clone();
        self.performance.clone_from(&newer.performance);
    }
}

impl FieldLookup for CampaignPerformance {
    fn text_field(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "sub_id" => self.sub_id.clone(),
            "platform" => self.platform.clone(),
            "name" => self.name.clone(),
            _ => extra_text(&self.extra, name),
        }
    }
}

fn extra_text(extra: &Map<String, Value>, name: &str) -> Option<String> {
    match extra.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accept identifiers exported either as strings or as bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_order_number_accepts_numbers() {
        let order: OrderRecord =
            serde_json::from_value(json!({"orderNumber": 1001, "commission": "4.50"})).unwrap();
        assert_eq!(order.order_number.as_deref(), Some("1001"));
        assert_eq!(order.earnings(), Decimal::new(450, 2));
    }

    #[test]
    fn test_blank_order_number_is_missing() {
        let order: OrderRecord = serde_json::from_value(json!({"order_number": "  "})).unwrap();
        assert!(order.order_number.is_none());
    }

    #[test]
    fn test_earnings_falls_back_to_payout() {
        let order: OrderRecord = serde_json::from_value(json!({"payout": 7})).unwrap();
        assert_eq!(order.earnings(), Decimal::from(7));
    }

    #[test]
    fn test_unknown_columns_kept_in_extra() {
        let spend: AdSpendRecord = serde_json::from_value(json!({
            "campaign_name": "C",
            "adset_name": "S",
            "ad_name": "A",
            "date": "2024-01-02",
            "spend": "3.00",
            "currency": "USD"
        }))
        .unwrap();

        assert_eq!(spend.ad_set_name.as_deref(), Some("S"));
        assert_eq!(spend.text_field("currency").as_deref(), Some("USD"));
        assert_eq!(spend.text_field("date").as_deref(), Some("2024-01-02"));

        let back = serde_json::to_value(&spend).unwrap();
        assert_eq!(back["currency"], "USD");
    }

    #[test]
    fn test_take_metrics_from_replaces_wholesale() {
        let mut older: CampaignPerformance = serde_json::from_value(json!({
            "id": "c-1",
            "sub_id": "sub1",
            "name": "Old",
            "orders": 3,
            "roi": "12.5"
        }))
        .unwrap();
        let newer: CampaignPerformance = serde_json::from_value(json!({
            "id": "c-2",
            "sub_id": "sub1",
            "name": "New",
            "orders": 5
        }))
        .unwrap();

        older.take_metrics_from(&newer);

        assert_eq!(older.id.as_deref(), Some("c-1"));
        assert_eq!(older.name.as_deref(), Some("New"));
        assert_eq!(older.orders.to_count(), 5);
        assert!(older.roi.is_absent());
    }
}
