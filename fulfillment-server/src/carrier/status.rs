//! Vendor status vocabulary mapping
//!
//! Standalone pure function so the mapping is testable without any HTTP.

use crate::db::models::ShipmentStatus;

/// Map a DHL Unified API status code to the internal vocabulary.
///
/// Unrecognized codes map to `InTransit` — a conservative default that can
/// never push a shipment into a terminal state.
pub fn map_vendor_status(code: &str) -> ShipmentStatus {
    match code {
        "pre-transit" => ShipmentStatus::LabelCreated,
        "transit" => ShipmentStatus::InTransit,
        "out-for-delivery" => ShipmentStatus::OutForDelivery,
        "delivered" => ShipmentStatus::Delivered,
        "failure" => ShipmentStatus::Failed,
        "return" => ShipmentStatus::Returned,
        _ => ShipmentStatus::InTransit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(map_vendor_status("pre-transit"), ShipmentStatus::LabelCreated);
        assert_eq!(map_vendor_status("transit"), ShipmentStatus::InTransit);
        assert_eq!(
            map_vendor_status("out-for-delivery"),
            ShipmentStatus::OutForDelivery
        );
        assert_eq!(map_vendor_status("delivered"), ShipmentStatus::Delivered);
        assert_eq!(map_vendor_status("failure"), ShipmentStatus::Failed);
        assert_eq!(map_vendor_status("return"), ShipmentStatus::Returned);
    }

    #[test]
    fn test_unknown_code_defaults_to_in_transit() {
        assert_eq!(map_vendor_status("unknown"), ShipmentStatus::InTransit);
        assert_eq!(map_vendor_status(""), ShipmentStatus::InTransit);
        assert_eq!(map_vendor_status("some-new-code"), ShipmentStatus::InTransit);
    }

    #[test]
    fn test_unknown_code_is_never_terminal() {
        for code in ["", "unknown", "xyz", "DELIVERED", "Delivered"] {
            assert!(!map_vendor_status(code).is_terminal(), "code {:?}", code);
        }
    }
}
