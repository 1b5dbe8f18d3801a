//! Delivery status body.

use serde::{Deserialize, Serialize};

/// JSON body a sink replies with when it fails to handle a delivery.
///
/// ```text
/// {"message": "handle event error: ...", "code": 500}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub message: String,
    pub code: i32,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_shape() {
        let status = DeliveryStatus {
            message: "bad".to_string(),
            code: 400,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({"message": "bad", "code": 400}));
    }
}
