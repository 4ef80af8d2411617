// Axis label ordering for the data explorer.
//
// Category axes mix academic periods ("2016-1"), numeric codes and free text.
// A plain string sort misorders both periods ("2016-10" before "2016-2") and
// numbers ("10" before "2"), so comparison goes through three tiers:
// period-aware, then numeric, then lexical.

use std::cmp::Ordering;

/// An academic period in `YYYY-S` form, S in {1, 2}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AcademicPeriod {
    pub year: u16,
    pub semester: u8,
}

/// Parse a label as an academic period. Accepts exactly `\d{4}-[12]`.
pub fn parse_period(label: &str) -> Option<AcademicPeriod> {
    let bytes = label.as_bytes();
    if bytes.len() != 6 || bytes[4] != b'-' {
        return None;
    }
    if !bytes[..4].iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let semester = match bytes[5] {
        b'1' => 1,
        b'2' => 2,
        _ => return None,
    };
    let year: u16 = label[..4].parse().ok()?;
    Some(AcademicPeriod { year, semester })
}

pub fn is_academic_period(label: &str) -> bool {
    parse_period(label).is_some()
}

/// Compare two axis labels: periods chronologically, numbers numerically,
/// everything else as strings. Mixed pairs (one period, one not; one number,
/// one not) fall through to the string tier.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    if let (Some(pa), Some(pb)) = (parse_period(a), parse_period(b)) {
        return pa.cmp(&pb);
    }

    if let (Ok(na), Ok(nb)) = (a.parse::<f64>(), b.parse::<f64>()) {
        if na.is_finite() && nb.is_finite() {
            return na.partial_cmp(&nb).unwrap_or(Ordering::Equal);
        }
    }

    // Byte order, not locale collation: accented initials ("Óptica") sort
    // after the whole ASCII range. TODO: route this tier through icu
    // collation with an es locale if mis-sorted accented labels get reported.
    a.cmp(b)
}
