use crate::analyzers::types::{LocationRecord, Ratio, Status};

/// Converts a completion ratio (percent) into a semaphore status.
///
/// | Range          | Status |
/// |----------------|--------|
/// | > 80           | Green  |
/// | 50 ..= 80      | Yellow |
/// | < 50           | Red    |
/// | undefined      | Red    |
pub fn grade(ratio: Ratio) -> Status {
    match ratio {
        Ratio::Defined(p) if p > 80.0 => Status::Green,
        Ratio::Defined(p) if p >= 50.0 => Status::Yellow,
        _ => Status::Red,
    }
}

/// Fills in `completion_ratio` and `status` for one location.
pub fn classify(mut location: LocationRecord) -> LocationRecord {
    location.completion_ratio = Ratio::percent(location.assigned_count, location.total_units);
    location.status = grade(location.completion_ratio);
    location
}

/// Classifies every location. Recomputes from the counts, so running it
/// twice gives the same table.
pub fn classify_all(locations: Vec<LocationRecord>) -> Vec<LocationRecord> {
    locations.into_iter().map(classify).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(assigned: u64, total: u64) -> LocationRecord {
        LocationRecord {
            location_code: "1".into(),
            assigned_count: assigned,
            total_units: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade(Ratio::Defined(100.0)), Status::Green);
        assert_eq!(grade(Ratio::Defined(80.01)), Status::Green);
        assert_eq!(grade(Ratio::Defined(80.0)), Status::Yellow);
        assert_eq!(grade(Ratio::Defined(50.0)), Status::Yellow);
        assert_eq!(grade(Ratio::Defined(49.99)), Status::Red);
        assert_eq!(grade(Ratio::Defined(0.0)), Status::Red);
        assert_eq!(grade(Ratio::Undefined), Status::Red);
    }

    #[test]
    fn test_classify_exact_boundaries_from_counts() {
        let half = classify(location(50, 100));
        assert_eq!(half.completion_ratio, Ratio::Defined(50.0));
        assert_eq!(half.status, Status::Yellow);

        let eighty = classify(location(80, 100));
        assert_eq!(eighty.completion_ratio, Ratio::Defined(80.0));
        assert_eq!(eighty.status, Status::Yellow);

        assert_eq!(classify(location(81, 100)).status, Status::Green);
        assert_eq!(classify(location(49, 100)).status, Status::Red);
    }

    #[test]
    fn test_classify_zero_capacity_does_not_panic() {
        let l = classify(location(3, 0));
        assert_eq!(l.completion_ratio, Ratio::Undefined);
        assert_eq!(l.status, Status::Red);
    }

    #[test]
    fn test_classify_over_capacity_is_green() {
        let l = classify(location(12, 10));
        assert_eq!(l.completion_ratio, Ratio::Defined(120.0));
        assert_eq!(l.status, Status::Green);
    }

    #[test]
    fn test_classify_all_is_idempotent() {
        let once = classify_all(vec![location(90, 100), location(20, 50), location(0, 0)]);
        let twice = classify_all(once.clone());
        assert_eq!(once, twice);
    }
}
