use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scan head product family. Unknown codes round-trip through `Other` so a
/// client talking to newer firmware than it was built against does not fail
/// to deserialize a discovery or status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    Js50Wx,
    Js50Wsc,
    Other(u32),
}

impl From<u32> for ProductType {
    fn from(code: u32) -> Self {
        match code {
            1 => ProductType::Js50Wx,
            2 => ProductType::Js50Wsc,
            other => ProductType::Other(other),
        }
    }
}

impl From<ProductType> for u32 {
    fn from(value: ProductType) -> Self {
        match value {
            ProductType::Js50Wx => 1,
            ProductType::Js50Wsc => 2,
            ProductType::Other(code) => code,
        }
    }
}

/// Semantic-ish (major, minor, patch) firmware version, orderable so the
/// discovery service can apply the "ScanSync firmware < 2.1.0" rule from the
/// spec (absent IP/version fields on older modules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl FirmwareVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_version_orders_numerically_not_lexically() {
        let old = FirmwareVersion::new(2, 0, 9);
        let new = FirmwareVersion::new(2, 1, 0);
        assert!(old < new);
    }

    #[test]
    fn product_type_round_trips_unknown_codes() {
        let code = 9001u32;
        let product = ProductType::from(code);
        assert_eq!(product, ProductType::Other(code));
        assert_eq!(u32::from(product), code);
    }
}
