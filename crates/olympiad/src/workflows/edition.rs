use chrono::NaiveDate;
use serde::Serialize;

/// Key dates of one edition. Unset dates are simply not shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditionCalendar {
    pub registration_opens: Option<NaiveDate>,
    pub registration_closes: Option<NaiveDate>,
    pub first_stage: Option<NaiveDate>,
    pub second_stage: Option<NaiveDate>,
}

/// Whole days from a given day to each calendar date; negative once a date has passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub registration_opens: Option<i64>,
    pub registration_closes: Option<i64>,
    pub first_stage: Option<i64>,
    pub second_stage: Option<i64>,
}

impl EditionCalendar {
    pub fn days_until(&self, today: NaiveDate) -> Countdown {
        let days = |date: Option<NaiveDate>| date.map(|date| (date - today).num_days());
        Countdown {
            registration_opens: days(self.registration_opens),
            registration_closes: days(self.registration_closes),
            first_stage: days(self.first_stage),
            second_stage: days(self.second_stage),
        }
    }

    /// Registration window check; an open-ended side never closes the window.
    pub fn registration_open(&self, today: NaiveDate) -> bool {
        let opened = self.registration_opens.map_or(true, |opens| today >= opens);
        let not_closed = self.registration_closes.map_or(true, |closes| today <= closes);
        opened && not_closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn calendar() -> EditionCalendar {
        EditionCalendar {
            registration_opens: Some(date("2024-06-15")),
            registration_closes: Some(date("2024-07-15")),
            first_stage: Some(date("2024-09-14")),
            second_stage: None,
        }
    }

    #[test]
    fn counts_down_and_past_dates_go_negative() {
        let countdown = calendar().days_until(date("2024-06-20"));
        assert_eq!(countdown.registration_opens, Some(-5));
        assert_eq!(countdown.registration_closes, Some(25));
        assert_eq!(countdown.first_stage, Some(86));
        assert_eq!(countdown.second_stage, None);
    }

    #[test]
    fn registration_window_is_inclusive() {
        let calendar = calendar();
        assert!(!calendar.registration_open(date("2024-06-14")));
        assert!(calendar.registration_open(date("2024-06-15")));
        assert!(calendar.registration_open(date("2024-07-15")));
        assert!(!calendar.registration_open(date("2024-07-16")));
        assert!(EditionCalendar::default().registration_open(date("2030-01-01")));
    }
}
