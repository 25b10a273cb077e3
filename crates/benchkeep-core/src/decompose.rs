//! Compound unit-string decomposition.
//!
//! A single benchmark record often reports several correlated quantities in
//! one free-text unit field. Go's benchmark harness, for example, reports
//!
//! ```text
//! value = 3147699311
//! unit  = "ns/op\t  214536 B/op\t     609 allocs/op"
//! ```
//!
//! which is three measurements: the record's own value in `ns/op`, then
//! `214536 B/op` and `609 allocs/op`. [`decompose`] splits such a record
//! into independently trackable metric entries.
//!
//! # Algorithm
//!
//! 1. Always keep the record itself as the primary entry, unit untouched.
//! 2. Tokenize the unit string on whitespace.
//! 3. The leading non-numeric tokens name the unit of the record's value.
//! 4. Every later numeric token opens a new `(value, unit)` pair whose unit
//!    is the run of non-numeric tokens after it.
//! 5. With two or more pairs, emit one secondary entry per pair labelled
//!    `"<name> - <unit>"`. Anything else falls back to the primary entry.
//!
//! # Guarantees
//!
//! - Pure and total: never fails, same input gives the same output.
//! - The first entry is always the primary one, labelled with the record
//!   name.

use std::collections::HashMap;

use serde_json::Number;

use crate::models::{MetricEntry, RawBenchRecord, LABEL_SEPARATOR};

/// Result of decomposing one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Decomposition {
    /// The unit string is not a compound form; only the record itself.
    Simple(MetricEntry),
    /// The unit string carried several measurements.
    Compound {
        primary: MetricEntry,
        secondary: Vec<MetricEntry>,
    },
}

impl Decomposition {
    pub fn primary(&self) -> &MetricEntry {
        match self {
            Self::Simple(primary) | Self::Compound { primary, .. } => primary,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Simple(_) => 1,
            Self::Compound { secondary, .. } => 1 + secondary.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Flatten into the ordered entry list: primary first, then secondaries.
    pub fn into_entries(self) -> Vec<MetricEntry> {
        match self {
            Self::Simple(primary) => vec![primary],
            Self::Compound { primary, secondary } => {
                let mut entries = Vec::with_capacity(1 + secondary.len());
                entries.push(primary);
                entries.extend(secondary);
                entries
            }
        }
    }
}

/// Decompose a record into the tagged [`Decomposition`].
pub fn decompose_record(record: &RawBenchRecord) -> Decomposition {
    let primary = MetricEntry {
        label: record.name.clone(),
        value: record.value.clone(),
        unit: record.unit.clone(),
        extra: record.extra.clone(),
    };

    let pairs = match split_unit_pairs(&record.value, &record.unit) {
        Some(pairs) if pairs.len() >= 2 => pairs,
        _ => return Decomposition::Simple(primary),
    };

    let secondary = pairs
        .into_iter()
        .map(|(value, unit)| MetricEntry {
            label: format!("{}{}{}", record.name, LABEL_SEPARATOR, unit),
            value,
            unit,
            extra: record.extra.clone(),
        })
        .collect();

    Decomposition::Compound { primary, secondary }
}

/// Decompose a record into its ordered metric entries (at least one).
pub fn decompose(record: &RawBenchRecord) -> Vec<MetricEntry> {
    decompose_record(record).into_entries()
}

/// Name of the bench each stored entry belongs to, in entry order.
///
/// Labels are not split on the separator: a bench may itself be called
/// `"Parse - large"`. Instead every entry not already claimed is taken as a
/// primary and decomposed again; the secondary labels it yields claim the
/// entries that follow.
pub fn bench_owners(entries: &[MetricEntry]) -> Vec<&str> {
    let mut claimed: HashMap<String, &str> = HashMap::new();
    entries
        .iter()
        .map(|entry| {
            if let Some(bench) = claimed.remove(&entry.label) {
                return bench;
            }
            let record = RawBenchRecord {
                name: entry.label.clone(),
                value: entry.value.clone(),
                unit: entry.unit.clone(),
                extra: entry.extra.clone(),
            };
            if let Decomposition::Compound { secondary, .. } = decompose_record(&record) {
                for derived in secondary {
                    claimed.insert(derived.label, entry.label.as_str());
                }
            }
            entry.label.as_str()
        })
        .collect()
}

/// Split a unit string into `(value, unit)` pairs, the first pair taking
/// `value` from the record. Returns `None` when the string does not have
/// the `<unit> (<number> <unit>)*` shape.
fn split_unit_pairs(value: &Number, unit: &str) -> Option<Vec<(Number, String)>> {
    let mut pairs: Vec<(Number, Vec<&str>)> = vec![(value.clone(), Vec::new())];

    for token in unit.split_whitespace() {
        match parse_number(token) {
            Some(number) => {
                // a number must follow a labelled pair
                if pairs.last().map_or(true, |(_, label)| label.is_empty()) {
                    return None;
                }
                pairs.push((number, Vec::new()));
            }
            None => {
                if let Some((_, label)) = pairs.last_mut() {
                    label.push(token);
                }
            }
        }
    }

    if pairs.iter().any(|(_, label)| label.is_empty()) {
        return None;
    }

    Some(
        pairs
            .into_iter()
            .map(|(number, label)| (number, label.join(" ")))
            .collect(),
    )
}

/// Parse a token as a finite integer or decimal number.
pub fn parse_number(token: &str) -> Option<Number> {
    if let Ok(n) = token.parse::<u64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = token.parse::<i64>() {
        return Some(Number::from(n));
    }
    // Rust accepts "inf" and "NaN" as floats; those are labels here
    if !token
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .and_then(Number::from_f64)
}
