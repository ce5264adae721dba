use std::fmt;

use serde::{Deserialize, Serialize};

/// Resolution-time histogram bucket.
///
/// Variants are declared in rank order; the SQL classifier and the result
/// ordering are both generated from [`TimeBucket::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeBucket {
    #[serde(rename = "<1 Hour")]
    UnderOneHour,
    #[serde(rename = "1 Hour")]
    OneHour,
    #[serde(rename = "2 Hours")]
    TwoHours,
    #[serde(rename = "3 Hours")]
    ThreeHours,
    #[serde(rename = "4 to 11 Hours")]
    FourToElevenHours,
    #[serde(rename = "12 to 23 Hours")]
    TwelveToTwentyThreeHours,
    #[serde(rename = "1 Day")]
    OneDay,
    #[serde(rename = "2 Days")]
    TwoDays,
    #[serde(rename = "3 to 5 Days")]
    ThreeToFiveDays,
    #[serde(rename = "6 to 10 Days")]
    SixToTenDays,
    #[serde(rename = "10+ Days")]
    OverTenDays,
    #[serde(rename = "Not Resolved")]
    NotResolved,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 12] = [
        TimeBucket::UnderOneHour,
        TimeBucket::OneHour,
        TimeBucket::TwoHours,
        TimeBucket::ThreeHours,
        TimeBucket::FourToElevenHours,
        TimeBucket::TwelveToTwentyThreeHours,
        TimeBucket::OneDay,
        TimeBucket::TwoDays,
        TimeBucket::ThreeToFiveDays,
        TimeBucket::SixToTenDays,
        TimeBucket::OverTenDays,
        TimeBucket::NotResolved,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeBucket::UnderOneHour => "<1 Hour",
            TimeBucket::OneHour => "1 Hour",
            TimeBucket::TwoHours => "2 Hours",
            TimeBucket::ThreeHours => "3 Hours",
            TimeBucket::FourToElevenHours => "4 to 11 Hours",
            TimeBucket::TwelveToTwentyThreeHours => "12 to 23 Hours",
            TimeBucket::OneDay => "1 Day",
            TimeBucket::TwoDays => "2 Days",
            TimeBucket::ThreeToFiveDays => "3 to 5 Days",
            TimeBucket::SixToTenDays => "6 to 10 Days",
            TimeBucket::OverTenDays => "10+ Days",
            TimeBucket::NotResolved => "Not Resolved",
        }
    }

    /// 1-based position in the histogram output.
    pub fn rank(&self) -> u8 {
        *self as u8 + 1
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label)
    }

    /// Inclusive hour range, `None` on a side meaning unbounded. `NotResolved`
    /// has no range: it is the fallback for a missing duration.
    fn hour_range(&self) -> Option<(Option<i64>, Option<i64>)> {
        let range = match self {
            TimeBucket::UnderOneHour => (None, Some(0)),
            TimeBucket::OneHour => (Some(1), Some(1)),
            TimeBucket::TwoHours => (Some(2), Some(2)),
            TimeBucket::ThreeHours => (Some(3), Some(3)),
            TimeBucket::FourToElevenHours => (Some(4), Some(11)),
            TimeBucket::TwelveToTwentyThreeHours => (Some(12), Some(23)),
            TimeBucket::OneDay => (Some(24), Some(47)),
            TimeBucket::TwoDays => (Some(48), Some(71)),
            TimeBucket::ThreeToFiveDays => (Some(72), Some(143)),
            TimeBucket::SixToTenDays => (Some(144), Some(263)),
            TimeBucket::OverTenDays => (Some(264), None),
            TimeBucket::NotResolved => return None,
        };
        Some(range)
    }

    /// Classify a whole-hour resolution time, first matching bucket wins.
    ///
    /// The ranges cover every integer, so only a missing duration (the
    /// request was never closed) lands in `NotResolved`.
    pub fn classify(hours: Option<i64>) -> Self {
        let Some(hours) = hours else {
            return TimeBucket::NotResolved;
        };
        Self::ALL
            .into_iter()
            .find(|bucket| match bucket.hour_range() {
                Some((lo, hi)) => {
                    lo.map_or(true, |lo| hours >= lo) && hi.map_or(true, |hi| hours <= hi)
                }
                None => false,
            })
            .unwrap_or(TimeBucket::NotResolved)
    }

    /// SQL predicate over `column` matching this bucket's range.
    pub(crate) fn sql_condition(&self, column: &str) -> Option<String> {
        let condition = match self.hour_range()? {
            (None, Some(hi)) => format!("{column} <= {hi}"),
            (Some(lo), None) => format!("{column} >= {lo}"),
            (Some(lo), Some(hi)) if lo == hi => format!("{column} = {lo}"),
            (Some(lo), Some(hi)) => format!("{column} BETWEEN {lo} AND {hi}"),
            (None, None) => return None,
        };
        Some(condition)
    }

    /// `CASE` expression assigning each row of `column` to a bucket label.
    pub(crate) fn sql_classifier(column: &str) -> String {
        let mut sql = String::from("CASE\n");
        for bucket in Self::ALL {
            if let Some(condition) = bucket.sql_condition(column) {
                sql.push_str(&format!("            WHEN {condition} THEN '{}'\n", bucket.label()));
            }
        }
        sql.push_str(&format!(
            "            ELSE '{}'\n          END",
            TimeBucket::NotResolved.label()
        ));
        sql
    }

    /// `CASE` expression mapping a label column back to its rank.
    pub(crate) fn sql_rank(column: &str) -> String {
        let mut sql = format!("CASE {column}\n");
        for bucket in Self::ALL {
            sql.push_str(&format!(
                "            WHEN '{}' THEN {}\n",
                bucket.label(),
                bucket.rank()
            ));
        }
        sql.push_str("          END");
        sql
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
