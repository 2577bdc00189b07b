//! Data model for per-level dump rows and merged snapshots.
//!
//! Field values stay `String` throughout: the dump is replayed verbatim and
//! price/size conversion is the consumer's decision, not the parser's.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

use crate::error::ReadError;

/// Columns consumed into a [`BookLevel`]; everything else on a row is a
/// pass-through identity field.
pub const LEVEL_COLUMNS: [&str; 7] = [
    "level", "bidCount", "bidSize", "bidPrice", "askCount", "askSize", "askPrice",
];

/// One decoded row: header-labelled fields plus the 1-based source line it
/// came from.
#[derive(Debug, Clone)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
    line: u64,
}

impl RawRecord {
    pub fn new(fields: Vec<(String, String)>, line: u64) -> Self {
        Self { fields, line }
    }

    /// Value of the named column, if the row has it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 1-based line number in the source (header is line 1).
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The level counter, parsed. Non-numeric values are malformed data,
    /// an absent column is a missing-field error.
    pub fn level(&self) -> Result<u32, ReadError> {
        let raw = self.get("level").ok_or_else(|| ReadError::MissingField {
            line: self.line,
            field: "level",
            identity: self.identity_summary(),
        })?;
        raw.trim().parse().map_err(|_| ReadError::Malformed {
            line: self.line,
            reason: format!("level '{raw}' is not an integer"),
        })
    }

    /// Short identity string for diagnostics, e.g. `sym=EUR.USD time=09:00:00`.
    pub fn identity_summary(&self) -> String {
        let mut parts = Vec::new();
        for key in ["sym", "date", "time", "seqNum"] {
            if let Some(v) = self.get(key) {
                parts.push(format!("{key}={v}"));
            }
        }
        if parts.is_empty() {
            format!("line {}", self.line)
        } else {
            parts.join(" ")
        }
    }
}

/// One side of one price tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub count: String,
    pub size: String,
    pub price: String,
}

/// The bid/ask pair a single row contributes to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLevel {
    pub bid: Quote,
    pub ask: Quote,
}

impl BookLevel {
    /// Derive the level entry from a row, validating that all six quote
    /// columns are present.
    pub fn from_record(rec: &RawRecord) -> Result<Self, ReadError> {
        let take = |field: &'static str| -> Result<String, ReadError> {
            rec.get(field)
                .map(str::to_string)
                .ok_or_else(|| ReadError::MissingField {
                    line: rec.line(),
                    field,
                    identity: rec.identity_summary(),
                })
        };
        Ok(Self {
            bid: Quote {
                count: take("bidCount")?,
                size: take("bidSize")?,
                price: take("bidPrice")?,
            },
            ask: Quote {
                count: take("askCount")?,
                size: take("askSize")?,
                price: take("askPrice")?,
            },
        })
    }
}

/// One fully merged multi-level book update.
///
/// `fields` holds the identity columns shared by every merged row (first row
/// wins); `levels[0]` is the level at the source's base index. Serializing
/// flattens the levels back to the dump vocabulary: `bid{N}` / `ask{N}`
/// objects keyed `bidCount`/`bidSize`/`bidPrice` and the ask equivalents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub fields: BTreeMap<String, String>,
    pub levels: Vec<BookLevel>,
    base_level: u32,
}

impl Snapshot {
    pub fn new(base_level: u32) -> Self {
        Self {
            fields: BTreeMap::new(),
            levels: Vec::new(),
            base_level,
        }
    }

    /// Level index of `levels[0]` in the source's numbering.
    pub fn base_level(&self) -> u32 {
        self.base_level
    }
}

#[derive(serde::Serialize)]
struct BidEntry<'a> {
    #[serde(rename = "bidCount")]
    count: &'a str,
    #[serde(rename = "bidSize")]
    size: &'a str,
    #[serde(rename = "bidPrice")]
    price: &'a str,
}

#[derive(serde::Serialize)]
struct AskEntry<'a> {
    #[serde(rename = "askCount")]
    count: &'a str,
    #[serde(rename = "askSize")]
    size: &'a str,
    #[serde(rename = "askPrice")]
    price: &'a str,
}

impl Serialize for Snapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.levels.len() * 2))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        for (i, lvl) in self.levels.iter().enumerate() {
            let n = self.base_level + i as u32;
            map.serialize_entry(
                &format!("bid{n}"),
                &BidEntry {
                    count: &lvl.bid.count,
                    size: &lvl.bid.size,
                    price: &lvl.bid.price,
                },
            )?;
            map.serialize_entry(
                &format!("ask{n}"),
                &AskEntry {
                    count: &lvl.ask.count,
                    size: &lvl.ask.size,
                    price: &lvl.ask.price,
                },
            )?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)], line: u64) -> RawRecord {
        RawRecord::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            line,
        )
    }

    #[test]
    fn level_parses_and_reports_bad_values() {
        assert_eq!(rec(&[("level", "3")], 2).level().unwrap(), 3);
        assert_eq!(rec(&[("level", " 1 ")], 2).level().unwrap(), 1);

        let err = rec(&[("level", "one")], 7).level().unwrap_err();
        match err {
            ReadError::Malformed { line, reason } => {
                assert_eq!(line, 7);
                assert!(reason.contains("one"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = rec(&[("sym", "EUR.USD")], 4).level().unwrap_err();
        assert!(matches!(
            err,
            ReadError::MissingField { field: "level", line: 4, .. }
        ));
    }

    #[test]
    fn book_level_from_record_names_missing_column() {
        let full = rec(
            &[
                ("level", "1"),
                ("bidCount", "2"),
                ("bidSize", "100"),
                ("bidPrice", "1.31"),
                ("askCount", "1"),
                ("askSize", "50"),
                ("askPrice", "1.32"),
            ],
            2,
        );
        let lvl = BookLevel::from_record(&full).unwrap();
        assert_eq!(lvl.bid.price, "1.31");
        assert_eq!(lvl.ask.size, "50");

        let partial = rec(
            &[
                ("level", "1"),
                ("sym", "EUR.USD"),
                ("bidCount", "2"),
                ("bidSize", "100"),
                ("bidPrice", "1.31"),
                ("askSize", "50"),
                ("askPrice", "1.32"),
            ],
            5,
        );
        let err = BookLevel::from_record(&partial).unwrap_err();
        match err {
            ReadError::MissingField { field, identity, .. } => {
                assert_eq!(field, "askCount");
                assert!(identity.contains("sym=EUR.USD"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn identity_summary_falls_back_to_line() {
        assert_eq!(rec(&[("level", "1")], 9).identity_summary(), "line 9");
        assert!(rec(&[("sym", "X"), ("time", "t")], 9)
            .identity_summary()
            .contains("time=t"));
    }

    #[test]
    fn snapshot_serializes_with_flattened_level_keys() {
        let mut snap = Snapshot::new(1);
        snap.fields.insert("sym".into(), "EUR.USD".into());
        snap.fields.insert("time".into(), "09:00:00".into());
        snap.levels.push(BookLevel {
            bid: Quote { count: "2".into(), size: "100".into(), price: "1.31".into() },
            ask: Quote { count: "1".into(), size: "50".into(), price: "1.32".into() },
        });
        snap.levels.push(BookLevel {
            bid: Quote { count: "4".into(), size: "200".into(), price: "1.30".into() },
            ask: Quote { count: "3".into(), size: "80".into(), price: "1.33".into() },
        });

        let v: serde_json::Value = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["sym"], "EUR.USD");
        assert_eq!(v["bid1"]["bidPrice"], "1.31");
        assert_eq!(v["ask1"]["askCount"], "1");
        assert_eq!(v["bid2"]["bidSize"], "200");
        assert_eq!(v["ask2"]["askPrice"], "1.33");
        assert!(v.get("bid0").is_none());
        assert!(v.get("bid3").is_none());
    }
}
