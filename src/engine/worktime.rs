//! Pure derivation of total/break/net/overtime durations from punch and
//! break timestamps. No I/O, deterministic.

use chrono::{DateTime, Utc};

use crate::model::session::Break;

/// A break interval as the calculator sees it. Open breaks (no end yet)
/// contribute zero until closed.
#[derive(Debug, Clone, Copy)]
pub struct BreakSpan {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&Break> for BreakSpan {
    fn from(b: &Break) -> Self {
        BreakSpan { started_at: b.started_at, ended_at: b.ended_at }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Durations {
    pub total_minutes: i64,
    pub break_minutes: i64,
    pub net_minutes: i64,
    pub overtime_minutes: i64,
    /// Punch-out preceded punch-in (device clock bug). Durations are
    /// zeroed and the caller flags the session for manual review instead
    /// of failing the clock-out.
    pub clock_skew: bool,
}

pub fn compute_durations(
    punched_in_at: DateTime<Utc>,
    punched_out_at: Option<DateTime<Utc>>,
    breaks: &[BreakSpan],
    standard_day_minutes: i64,
) -> Durations {
    let break_minutes: i64 = breaks
        .iter()
        .filter_map(|b| b.ended_at.map(|end| (end - b.started_at).num_minutes().max(0)))
        .sum();

    let Some(out) = punched_out_at else {
        return Durations { break_minutes, ..Durations::default() };
    };

    if out < punched_in_at {
        return Durations { clock_skew: true, ..Durations::default() };
    }

    let total_minutes = (out - punched_in_at).num_minutes();
    let net_minutes = (total_minutes - break_minutes).max(0);
    let overtime_minutes = (net_minutes - standard_day_minutes).max(0);

    Durations { total_minutes, break_minutes, net_minutes, overtime_minutes, clock_skew: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const STANDARD_DAY: i64 = 480;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, hour, min, 0).unwrap()
    }

    fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> BreakSpan {
        BreakSpan { started_at: start, ended_at: Some(end) }
    }

    #[test]
    fn standard_day_with_lunch_break() {
        // 09:00 -> 17:30 with a 12:00-12:30 break: 8.5h total, 0.5h break,
        // 8h net, no overtime.
        let d = compute_durations(
            at(9, 0),
            Some(at(17, 30)),
            &[closed(at(12, 0), at(12, 30))],
            STANDARD_DAY,
        );
        assert_eq!(d.total_minutes, 510);
        assert_eq!(d.break_minutes, 30);
        assert_eq!(d.net_minutes, 480);
        assert_eq!(d.overtime_minutes, 0);
        assert!(!d.clock_skew);
    }

    #[test]
    fn late_punch_out_accrues_overtime() {
        // Same day but out at 19:00: net 9.5h, overtime 1.5h.
        let d = compute_durations(
            at(9, 0),
            Some(at(19, 0)),
            &[closed(at(12, 0), at(12, 30))],
            STANDARD_DAY,
        );
        assert_eq!(d.net_minutes, 570);
        assert_eq!(d.overtime_minutes, 90);
    }

    #[test]
    fn open_break_contributes_zero() {
        let open = BreakSpan { started_at: at(12, 0), ended_at: None };
        let d = compute_durations(at(9, 0), Some(at(17, 0)), &[open], STANDARD_DAY);
        assert_eq!(d.break_minutes, 0);
        assert_eq!(d.net_minutes, 480);
    }

    #[test]
    fn missing_punch_out_yields_zero_total() {
        let d = compute_durations(at(9, 0), None, &[closed(at(12, 0), at(12, 30))], STANDARD_DAY);
        assert_eq!(d.total_minutes, 0);
        assert_eq!(d.break_minutes, 30);
        assert_eq!(d.net_minutes, 0);
        assert_eq!(d.overtime_minutes, 0);
    }

    #[test]
    fn clock_skew_zeroes_durations_and_flags() {
        let d = compute_durations(at(17, 0), Some(at(9, 0)), &[], STANDARD_DAY);
        assert!(d.clock_skew);
        assert_eq!(d.total_minutes, 0);
        assert_eq!(d.net_minutes, 0);
        assert_eq!(d.overtime_minutes, 0);
    }

    #[test]
    fn net_is_floored_at_zero() {
        // Break records exceeding the worked interval must not drive net
        // negative.
        let d = compute_durations(
            at(9, 0),
            Some(at(10, 0)),
            &[closed(at(8, 0), at(10, 30))],
            STANDARD_DAY,
        );
        assert_eq!(d.net_minutes, 0);
        assert_eq!(d.overtime_minutes, 0);
    }
}
