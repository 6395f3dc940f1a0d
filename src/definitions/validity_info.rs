//! The `ValidityInfo` structure of the Mobile Security Object.
//!
//! Dates are CBOR `tdate` values: tag 0 wrapping an RFC 3339 text string.

use ciborium::Value;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::cbor;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ValidityInfo {
    pub signed: OffsetDateTime,
    pub valid_from: OffsetDateTime,
    pub valid_until: OffsetDateTime,
    pub expected_update: Option<OffsetDateTime>,
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("when parsing a CBOR map, could not find required field: '{0}'")]
    MissingField(&'static str),
    #[error("expected to parse a CBOR map, received: '{0:?}'")]
    NotAMap(Value),
    #[error("expected to parse a CBOR text string, received: '{0:?}'")]
    NotATextString(Box<Value>),
    #[error("expected to parse a CBOR tag (number {0}), received: '{1:?}'")]
    NotATag(u64, Value),
    #[error("failed to parse date string as rfc3339 date: {0}")]
    UnableToParseDate(#[from] time::error::Parse),
    #[error("failed to format date as rfc3339: {0}")]
    UnableToFormatDate(#[from] time::error::Format),
}

impl ValidityInfo {
    /// Whether `now` lies within `validFrom ..= validUntil`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }
}

impl From<ValidityInfo> for Value {
    fn from(v: ValidityInfo) -> Value {
        let mut map = vec![
            (Value::Text("signed".into()), datetime_to_cbor(v.signed)),
            (Value::Text("validFrom".into()), datetime_to_cbor(v.valid_from)),
            (Value::Text("validUntil".into()), datetime_to_cbor(v.valid_until)),
        ];
        if let Some(expected_update) = v.expected_update {
            map.push((
                Value::Text("expectedUpdate".into()),
                datetime_to_cbor(expected_update),
            ));
        }
        Value::Map(map)
    }
}

impl TryFrom<Value> for ValidityInfo {
    type Error = Error;

    fn try_from(v: Value) -> Result<ValidityInfo> {
        let Value::Map(map) = v else {
            return Err(Error::NotAMap(v));
        };
        let field = |name: &'static str| cbor::map_get(&map, name).cloned();
        let required = |name: &'static str| {
            field(name)
                .ok_or(Error::MissingField(name))
                .and_then(cbor_to_datetime)
        };

        Ok(Self {
            signed: required("signed")?,
            valid_from: required("validFrom")?,
            valid_until: required("validUntil")?,
            expected_update: field("expectedUpdate").map(cbor_to_datetime).transpose()?,
        })
    }
}

fn datetime_to_cbor(date: OffsetDateTime) -> Value {
    // Whole seconds in UTC; a date that cannot be formatted is encoded as an empty string
    // and will fail to parse on the way back in.
    let text = date
        .replace_nanosecond(0)
        .unwrap_or(date)
        .to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_default();
    Value::Tag(0, Box::new(Value::Text(text)))
}

fn cbor_to_datetime(v: Value) -> Result<OffsetDateTime> {
    match v {
        Value::Tag(0, inner) => match *inner {
            Value::Text(date_str) => Ok(OffsetDateTime::parse(&date_str, &Rfc3339)?),
            other => Err(Error::NotATextString(Box::new(other))),
        },
        other => Err(Error::NotATag(0, other)),
    }
}
