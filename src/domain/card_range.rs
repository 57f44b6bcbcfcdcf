use crate::error::ThreeDsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A protocol version such as `2.2.0`.
///
/// Ordered component-wise so version intervals can be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = ThreeDsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ThreeDsError::Validation(format!("invalid protocol version: {s}"));
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u16, ThreeDsError> {
            parts
                .next()
                .ok_or_else(invalid)?
                .parse::<u16>()
                .map_err(|_| invalid())
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = ThreeDsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProtocolVersion> for String {
    fn from(version: ProtocolVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A cardholder account number or card range boundary: 13 to 19 digits.
///
/// Boundaries are compared by numeric value, which fits in a `u64` for every
/// valid length. `Debug` masks the middle digits so account numbers can be
/// logged.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    pub const MIN_DIGITS: usize = 13;
    pub const MAX_DIGITS: usize = 19;

    pub fn new(digits: impl Into<String>) -> Result<Self, ThreeDsError> {
        let digits = digits.into();
        let digits = digits.trim();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len())
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ThreeDsError::Validation(format!(
                "account number must be {}-{} digits",
                Self::MIN_DIGITS,
                Self::MAX_DIGITS
            )));
        }
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the digit string.
    pub fn value(&self) -> u64 {
        // Construction guarantees at most 19 ASCII digits.
        self.0
            .bytes()
            .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'))
    }

    /// First six and last four digits, the rest masked.
    pub fn masked(&self) -> String {
        let len = self.0.len();
        format!("{}{}{}", &self.0[..6], "*".repeat(len - 10), &self.0[len - 4..])
    }
}

impl fmt::Debug for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccountNumber").field(&self.masked()).finish()
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl FromStr for AccountNumber {
    type Err = ThreeDsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = ThreeDsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountNumber> for String {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionIndicator {
    #[serde(rename = "A")]
    Add,
    #[serde(rename = "M")]
    Modify,
    #[serde(rename = "D")]
    Delete,
}

/// A block of card numbers served by one issuer authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRange {
    /// Issuer authentication service the range routes to.
    #[serde(rename = "acsID")]
    pub acs_id: String,
    pub start_range: AccountNumber,
    pub end_range: AccountNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ind: Option<ActionIndicator>,
    pub acs_start_protocol_version: ProtocolVersion,
    pub acs_end_protocol_version: ProtocolVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ds_start_protocol_version: Option<ProtocolVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ds_end_protocol_version: Option<ProtocolVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acs_info_ind: Option<Vec<String>>,
    #[serde(
        rename = "threeDSMethodURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub three_ds_method_url: Option<String>,
    /// Boundaries the range had before a modify, so incremental readers can
    /// find the row it replaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_range: Option<RangeKey>,
}

impl CardRange {
    /// Builds an `Add` range with the same protocol interval on both sides.
    pub fn new(
        acs_id: impl Into<String>,
        start_range: AccountNumber,
        end_range: AccountNumber,
        start_version: ProtocolVersion,
        end_version: ProtocolVersion,
    ) -> Self {
        Self {
            acs_id: acs_id.into(),
            start_range,
            end_range,
            action_ind: Some(ActionIndicator::Add),
            acs_start_protocol_version: start_version,
            acs_end_protocol_version: end_version,
            ds_start_protocol_version: Some(start_version),
            ds_end_protocol_version: Some(end_version),
            acs_info_ind: None,
            three_ds_method_url: None,
            previous_range: None,
        }
    }

    pub fn key(&self) -> RangeKey {
        RangeKey {
            acs_id: self.acs_id.clone(),
            start_range: self.start_range.clone(),
            end_range: self.end_range.clone(),
        }
    }

    /// Checks boundary order and protocol version intervals.
    pub fn validate(&self) -> Result<(), ThreeDsError> {
        if self.start_range.value() > self.end_range.value() {
            return Err(ThreeDsError::Validation(format!(
                "start range {} is above end range {}",
                self.start_range, self.end_range
            )));
        }
        if self.acs_start_protocol_version > self.acs_end_protocol_version {
            return Err(ThreeDsError::Validation(
                "ACS start protocol version is above end version".to_string(),
            ));
        }
        if let (Some(start), Some(end)) =
            (self.ds_start_protocol_version, self.ds_end_protocol_version)
            && start > end
        {
            return Err(ThreeDsError::Validation(
                "DS start protocol version is above end version".to_string(),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, number: &AccountNumber) -> bool {
        let value = number.value();
        self.start_range.value() <= value && value <= self.end_range.value()
    }

    pub fn overlaps(&self, other: &CardRange) -> bool {
        self.start_range.value() <= other.end_range.value()
            && other.start_range.value() <= self.end_range.value()
    }

    /// Number of card numbers in the range minus one; smaller is more specific.
    pub fn width(&self) -> u64 {
        self.end_range.value() - self.start_range.value()
    }

    /// Whether both the issuer service and the directory support `version`.
    pub fn supports(&self, version: ProtocolVersion) -> bool {
        let acs = self.acs_start_protocol_version <= version
            && version <= self.acs_end_protocol_version;
        let ds_start = self.ds_start_protocol_version.is_none_or(|v| v <= version);
        let ds_end = self.ds_end_protocol_version.is_none_or(|v| version <= v);
        acs && ds_start && ds_end
    }
}

/// Identifies an existing range by issuer target and boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeKey {
    #[serde(rename = "acsID")]
    pub acs_id: String,
    pub start_range: AccountNumber,
    pub end_range: AccountNumber,
}

impl RangeKey {
    pub fn matches(&self, range: &CardRange) -> bool {
        self.acs_id == range.acs_id
            && self.start_range.value() == range.start_range.value()
            && self.end_range.value() == range.end_range.value()
    }
}

/// A stored directory row: the range as last written, its write serial and
/// whether it is still active.
///
/// `id` is the serial of the `Add` that created the row and never changes;
/// `serial` moves forward on every write to the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRangeRecord {
    pub id: u64,
    pub serial: u64,
    pub active: bool,
    #[serde(flatten)]
    pub range: CardRange,
}

/// A provisioning write against the card range directory.
#[derive(Debug, Clone, PartialEq)]
pub enum CardRangeWrite {
    Add(CardRange),
    Modify {
        original: RangeKey,
        replacement: CardRange,
    },
    Delete(RangeKey),
}

impl CardRangeWrite {
    pub fn action(&self) -> ActionIndicator {
        match self {
            CardRangeWrite::Add(_) => ActionIndicator::Add,
            CardRangeWrite::Modify { .. } => ActionIndicator::Modify,
            CardRangeWrite::Delete(_) => ActionIndicator::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pan(s: &str) -> AccountNumber {
        AccountNumber::new(s).unwrap()
    }

    fn range(start: &str, end: &str) -> CardRange {
        CardRange::new(
            "ACS_1",
            pan(start),
            pan(end),
            ProtocolVersion::new(2, 1, 0),
            ProtocolVersion::new(2, 2, 0),
        )
    }

    #[test]
    fn test_protocol_version_parse_and_order() {
        let v210: ProtocolVersion = "2.1.0".parse().unwrap();
        let v220: ProtocolVersion = "2.2.0".parse().unwrap();
        assert!(v210 < v220);
        assert_eq!(v220.to_string(), "2.2.0");
        assert!("2.2".parse::<ProtocolVersion>().is_err());
        assert!("2.2.0.1".parse::<ProtocolVersion>().is_err());
        assert!("two.2.0".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn test_account_number_validation() {
        assert!(AccountNumber::new("4012000000001000").is_ok());
        assert!(AccountNumber::new("401200000000").is_err());
        assert!(AccountNumber::new("40120000000010000000").is_err());
        assert!(AccountNumber::new("40120000000010a0").is_err());
    }

    #[test]
    fn test_account_number_value_and_mask() {
        let number = pan("4012000000001234");
        assert_eq!(number.value(), 4_012_000_000_001_234);
        assert_eq!(number.masked(), "401200******1234");
        assert!(!format!("{number:?}").contains("0000001"));
        assert_eq!(pan("9999999999999999999").value(), 9_999_999_999_999_999_999);
    }

    #[test]
    fn test_range_contains_inclusive_bounds() {
        let r = range("4012000000001000", "4012000000001999");
        assert!(r.contains(&pan("4012000000001000")));
        assert!(r.contains(&pan("4012000000001999")));
        assert!(!r.contains(&pan("4012000000002000")));
        assert!(!r.contains(&pan("4012000000000999")));
    }

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        let a = range("4012000000001000", "4012000000001999");
        let b = range("4012000000002000", "4012000000002999");
        let c = range("4012000000001500", "4012000000002500");
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let r = range("4012000000001999", "4012000000001000");
        assert!(matches!(r.validate(), Err(ThreeDsError::Validation(_))));
    }

    #[test]
    fn test_supports_version_interval() {
        let r = range("4012000000001000", "4012000000001999");
        assert!(r.supports(ProtocolVersion::new(2, 1, 0)));
        assert!(r.supports(ProtocolVersion::new(2, 2, 0)));
        assert!(!r.supports(ProtocolVersion::new(2, 3, 0)));
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = CardRangeRecord {
            id: 3,
            serial: 7,
            active: false,
            range: range("4012000000001000", "4012000000001999"),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["serial"], 7);
        assert_eq!(json["active"], false);
        assert_eq!(json["startRange"], "4012000000001000");
        assert_eq!(json["acsID"], "ACS_1");
        assert_eq!(json["acsStartProtocolVersion"], "2.1.0");

        let back: CardRangeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
