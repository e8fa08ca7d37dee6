//! Human-readable document numbers (`SOL-00000001`, `OC-00000042`).

use serde::{Deserialize, Serialize};

/// Generator for prefixed, zero-padded, monotonically increasing document numbers.
///
/// The next number is derived from the numbers already issued: the highest
/// trailing counter among existing numbers with the same prefix, plus one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberSequence {
    prefix: String,
    width: usize,
}

impl NumberSequence {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width: width.max(1),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next number of the form `PREFIX-000001`.
    pub fn next<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> String {
        let stem = format!("{}-", self.prefix);
        let next = highest_counter(&stem, existing) + 1;
        format!("{stem}{next:0width$}", width = self.width)
    }
}

fn highest_counter<'a>(stem: &str, existing: impl IntoIterator<Item = &'a str>) -> u64 {
    existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(stem))
        .filter(|counter| !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|counter| counter.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn next_never_reuses_an_issued_number(counters in prop::collection::vec(1u64..1_000_000, 0..20)) {
            let seq = NumberSequence::new("SOL", 8);
            let issued: Vec<String> = counters.iter().map(|c| format!("SOL-{c:08}")).collect();
            let next = seq.next(issued.iter().map(String::as_str));

            prop_assert!(!issued.contains(&next));
            let counter: u64 = next["SOL-".len()..].parse().unwrap();
            prop_assert_eq!(counter, counters.iter().copied().max().unwrap_or(0) + 1);
        }
    }
}
