use std::collections::BTreeMap;

/// Rounds to two decimal places, the precision shown on every chart.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Comparison key for geographic labels. Source spreadsheets mix case,
/// padding and numeric cells, so labels are compared trimmed and uppercased.
pub fn label_key(label: &str) -> String {
    label.trim().to_uppercase()
}

/// True when two labels name the same place.
pub fn same_label(a: &str, b: &str) -> bool {
    label_key(a) == label_key(b)
}

/// Distinct labels in ascending key order, keeping the first spelling seen.
pub fn distinct_labels<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for label in labels {
        if label.trim().is_empty() {
            continue;
        }
        seen.entry(label_key(label)).or_insert(label);
    }
    seen.into_values().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(73.333333), 73.33);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_same_label_ignores_case_and_padding() {
        assert!(same_label(" Tarqui", "TARQUI "));
        assert!(!same_label("TARQUI", "XIMENA"));
    }

    #[test]
    fn test_distinct_labels_sorted_and_deduplicated() {
        let labels = distinct_labels(vec!["ximena", "Tarqui", "TARQUI", "", "Ayacucho"]);
        assert_eq!(labels, vec!["Ayacucho", "Tarqui", "ximena"]);
    }
}
