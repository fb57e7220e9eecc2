use serde::{Deserialize, Serialize};

/// What the customer gets when the coupon is redeemed.
///
/// Stored as JSONB on the coupon row, snapshotted from the merchant's
/// landing-page configuration at claim time so later edits never change
/// an already-issued coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Offer {
    PercentOff {
        title: String,
        percent: u8,
    },
    AmountOff {
        title: String,
        amount_cents: i64,
    },
    FreeItem {
        title: String,
        item: String,
    },
    Custom {
        title: String,
        details: Option<String>,
    },
}

impl Offer {
    /// Staff-facing display text shown on the confirmation screen.
    pub fn title(&self) -> &str {
        match self {
            Offer::PercentOff { title, .. }
            | Offer::AmountOff { title, .. }
            | Offer::FreeItem { title, .. }
            | Offer::Custom { title, .. } => title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_json_is_tagged_by_type() {
        let offer = Offer::PercentOff {
            title: "20% off lunch".to_string(),
            percent: 20,
        };

        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["type"], "percent_off");
        assert_eq!(json["percent"], 20);

        let back: Offer = serde_json::from_value(json).unwrap();
        assert_eq!(back, offer);
    }

    #[test]
    fn test_unknown_offer_type_is_rejected() {
        let raw = r#"{"type":"mystery_box","title":"??"}"#;
        let result: Result<Offer, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
