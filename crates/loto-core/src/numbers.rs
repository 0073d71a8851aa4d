//! Number-set validation.
//!
//! Raw input arrives either as a delimited string (`"3, 7,12,19,25,40"`) or as
//! an explicit integer list. Both constructors converge on the same canonical
//! sorted set, so nothing downstream branches on the input shape.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lowest number on the board.
pub const MIN_NUMBER: u8 = 1;
/// Highest number on the board.
pub const MAX_NUMBER: u8 = 45;
/// Fewest numbers a ticket may pick.
pub const MIN_PICKS: usize = 6;
/// Most numbers a ticket may pick.
pub const MAX_PICKS: usize = 10;
/// Longest accepted owner identity.
pub const MAX_OWNER_ID_CHARS: usize = 20;

// ---------------------------------------------------------------------------
// TicketNumbers
// ---------------------------------------------------------------------------

/// 6 to 10 distinct numbers in `1..=45`, kept sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<u8>")]
pub struct TicketNumbers(Vec<u8>);

impl TicketNumbers {
    /// Parse a comma-separated list. Empty segments are ignored.
    pub fn from_csv(raw: &str) -> Result<Self, ValidationError> {
        Self::from_list(&parse_csv(raw)?)
    }

    /// Validate an explicit list. Rules are checked in order: count, duplicates, range.
    pub fn from_list(values: &[i64]) -> Result<Self, ValidationError> {
        if values.len() < MIN_PICKS || values.len() > MAX_PICKS {
            return Err(ValidationError::Count {
                found: values.len(),
                min: MIN_PICKS,
                max: MAX_PICKS,
            });
        }
        Ok(Self(canonical_set(values)?))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, n: u8) -> bool {
        self.0.binary_search(&n).is_ok()
    }
}

impl TryFrom<Vec<i64>> for TicketNumbers {
    type Error = ValidationError;

    fn try_from(v: Vec<i64>) -> Result<Self, Self::Error> {
        Self::from_list(&v)
    }
}

impl From<TicketNumbers> for Vec<u8> {
    fn from(t: TicketNumbers) -> Self {
        t.0
    }
}

// ---------------------------------------------------------------------------
// DrawnNumbers
// ---------------------------------------------------------------------------

/// Official results of a round: non-empty, distinct, each in `1..=45`, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<u8>")]
pub struct DrawnNumbers(Vec<u8>);

impl DrawnNumbers {
    pub fn from_list(values: &[i64]) -> Result<Self, ValidationError> {
        if values.is_empty() {
            return Err(ValidationError::EmptyDraw);
        }
        Ok(Self(canonical_set(values)?))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn contains(&self, n: u8) -> bool {
        self.0.binary_search(&n).is_ok()
    }
}

impl TryFrom<Vec<i64>> for DrawnNumbers {
    type Error = ValidationError;

    fn try_from(v: Vec<i64>) -> Result<Self, Self::Error> {
        Self::from_list(&v)
    }
}

impl From<DrawnNumbers> for Vec<u8> {
    fn from(d: DrawnNumbers) -> Self {
        d.0
    }
}

// ---------------------------------------------------------------------------
// OwnerId
// ---------------------------------------------------------------------------

/// Bettor-supplied identity, 1 to 20 characters as supplied and not blank.
/// Stored verbatim, so the limit matches the `varchar(20)` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let chars = if raw.trim().is_empty() { 0 } else { raw.chars().count() };
        if chars == 0 || chars > MAX_OWNER_ID_CHARS {
            return Err(ValidationError::OwnerId {
                found: chars,
                max: MAX_OWNER_ID_CHARS,
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OwnerId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<OwnerId> for String {
    fn from(o: OwnerId) -> Self {
        o.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RawNumbers
// ---------------------------------------------------------------------------

/// Ticket numbers as submitted, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumbers {
    /// `"3,7,12,19,25,40"`
    Csv(String),
    /// `[3, 7, 12, 19, 25, 40]`
    List(Vec<i64>),
}

impl RawNumbers {
    pub fn validate(&self) -> Result<TicketNumbers, ValidationError> {
        match self {
            RawNumbers::Csv(raw) => TicketNumbers::from_csv(raw),
            RawNumbers::List(values) => TicketNumbers::from_list(values),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_csv(raw: &str) -> Result<Vec<i64>, ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<i64>().map_err(|_| ValidationError::NotANumber {
                token: tok.to_string(),
            })
        })
        .collect()
}

/// Duplicates are reported before range so `"1,2,3,2,5,6"` names the `2`.
fn canonical_set(values: &[i64]) -> Result<Vec<u8>, ValidationError> {
    let mut seen: BTreeSet<i64> = BTreeSet::new();
    for &v in values {
        if !seen.insert(v) {
            return Err(ValidationError::Duplicate { value: v });
        }
    }

    let mut out = Vec::with_capacity(seen.len());
    for v in seen {
        match u8::try_from(v) {
            Ok(n) if (MIN_NUMBER..=MAX_NUMBER).contains(&n) => out.push(n),
            _ => {
                return Err(ValidationError::OutOfRange {
                    value: v,
                    min: MIN_NUMBER,
                    max: MAX_NUMBER,
                })
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
