//! Destination validation
//!
//! A destination is either a PSTN number in E.164 form (`+` and 7 to 15
//! digits) or an internal identity addressed as `client:<identity>`.
//! Validation happens before any SDK or network call.

use std::fmt;
use std::str::FromStr;

use crate::error::{ClientError, ClientResult};

pub const CLIENT_PREFIX: &str = "client:";

const MIN_PSTN_DIGITS: usize = 7;
const MAX_PSTN_DIGITS: usize = 15;

/// Operator hint shown when a destination is rejected
pub const INVALID_DESTINATION_HINT: &str = "Invalid number format. Use +countrycode or client:identity";

/// A validated call destination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// `+15551234567`
    Pstn(String),
    /// `client:alice`, stored with its prefix
    Client(String),
}

impl Destination {
    pub fn parse(raw: &str) -> ClientResult<Self> {
        let raw = raw.trim();
        if is_pstn(raw) {
            Ok(Destination::Pstn(raw.to_string()))
        } else if raw.starts_with(CLIENT_PREFIX) {
            Ok(Destination::Client(raw.to_string()))
        } else {
            Err(ClientError::invalid_address(raw))
        }
    }

    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    /// The address as sent to the SDK
    pub fn as_str(&self) -> &str {
        match self {
            Destination::Pstn(number) => number,
            Destination::Client(address) => address,
        }
    }

    /// Identity part of a `client:` destination
    pub fn identity(&self) -> Option<&str> {
        match self {
            Destination::Client(address) => address.strip_prefix(CLIENT_PREFIX),
            Destination::Pstn(_) => None,
        }
    }

    pub fn is_pstn(&self) -> bool {
        matches!(self, Destination::Pstn(_))
    }
}

fn is_pstn(raw: &str) -> bool {
    match raw.strip_prefix('+') {
        Some(digits) => {
            (MIN_PSTN_DIGITS..=MAX_PSTN_DIGITS).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

impl FromStr for Destination {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
