use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Lifecycle status of a placed order. Any status may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Canceled,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Canceled,
        OrderStatus::Delivered,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidOrderStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_allowed_status() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
    }

    #[test]
    fn rejects_values_outside_the_set() {
        assert_eq!(
            "shipped".parse::<OrderStatus>(),
            Err(CoreError::InvalidOrderStatus("shipped".to_string()))
        );
        // Only the exact lowercase spelling is accepted.
        assert!("Pending".parse::<OrderStatus>().is_err());
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Delivered).expect("serialize");
        assert_eq!(json, "\"delivered\"");
    }
}
