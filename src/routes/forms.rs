//! Manager form parsing and validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::{
    api::{club::ClubDraft, event::EventDraft},
    media::FormFields,
};

pub const CATEGORIES: [&str; 8] = [
    "Photography",
    "Sports",
    "Tech",
    "Music",
    "Art",
    "Books",
    "Travel",
    "Gaming",
];

fn required(value: &str, message: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(message.to_string());
    }
    Ok(value.to_string())
}

/// Builds a club draft from the create/update form. `banner` is the image
/// already resolved from an upload, a pasted URL or the current club.
pub fn club_draft(form: &FormFields, banner: Option<String>) -> Result<ClubDraft, String> {
    let club_name = required(form.text("clubName"), "Club name is required")?;
    let description = required(form.text("description"), "Description is required")?;
    let category = required(form.text("category"), "Category is required")?;
    let location = required(form.text("location"), "Location is required")?;
    let membership_fee = parse_fee(form.text("membershipFee"), "Membership fee")?;
    let banner_image = banner
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| "Banner image is required!".to_string())?;

    Ok(ClubDraft {
        club_name,
        description,
        category,
        location,
        membership_fee,
        banner_image,
        manager_email: None,
    })
}

fn parse_fee(raw: &str, label: &str) -> Result<f64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    let fee: f64 = raw
        .parse()
        .map_err(|_| format!("{label} must be a number"))?;
    if !fee.is_finite() || fee < 0.0 {
        return Err(format!("{label} cannot be negative"));
    }
    Ok(fee)
}

/// Accepts `2030-05-01`, `2030-05-01T18:00` and RFC 3339 timestamps.
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Some(at.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventForm {
    pub club_id: String,
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub location: String,
    pub is_paid: String,
    pub event_fee: String,
    pub max_attendees: String,
}

impl EventForm {
    pub fn into_draft(self) -> Result<EventDraft, String> {
        let club_id = required(&self.club_id, "Club is required")?;
        let title = required(&self.title, "Title is required")?;
        let description = required(&self.description, "Description is required")?;
        if self.event_date.trim().is_empty() {
            return Err("Event date is required".into());
        }
        let event_date =
            parse_event_date(&self.event_date).ok_or_else(|| "Please select a valid date".to_string())?;
        let location = required(&self.location, "Location is required")?;

        let is_paid = matches!(self.is_paid.trim(), "true" | "on" | "1");
        let event_fee = if is_paid {
            let fee = parse_fee(&self.event_fee, "Event fee")?;
            if fee <= 0.0 {
                return Err("Paid events need a fee".into());
            }
            fee
        } else {
            0.0
        };

        let max_attendees = match self.max_attendees.trim() {
            "" => None,
            raw => match raw.parse::<u32>() {
                Ok(0) | Err(_) => return Err("Max attendees must be a positive whole number".into()),
                Ok(n) => Some(n),
            },
        };

        Ok(EventDraft {
            club_id,
            title,
            description,
            event_date,
            location,
            is_paid,
            event_fee,
            max_attendees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_form() -> EventForm {
        EventForm {
            club_id: "c1".into(),
            title: "Night walk".into(),
            description: "Cameras and tripods".into(),
            event_date: "2030-05-01".into(),
            location: "Old town".into(),
            is_paid: "false".into(),
            event_fee: String::new(),
            max_attendees: String::new(),
        }
    }

    fn club_form() -> FormFields {
        FormFields::default()
            .with_text("clubName", "Shutterbugs")
            .with_text("description", "Weekly photo walks")
            .with_text("category", "Photography")
            .with_text("location", "Dhaka")
            .with_text("membershipFee", "25")
    }

    #[test]
    fn free_event_ignores_fee() {
        let draft = EventForm {
            event_fee: "99".into(),
            ..event_form()
        }
        .into_draft()
        .unwrap();
        assert!(!draft.is_paid);
        assert_eq!(draft.event_fee, 0.0);
        assert_eq!(draft.event_date, Utc.with_ymd_and_hms(2030, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn paid_event_needs_a_positive_fee() {
        let paid = EventForm {
            is_paid: "true".into(),
            ..event_form()
        };
        assert_eq!(paid.clone().into_draft().unwrap_err(), "Paid events need a fee");

        let negative = EventForm {
            event_fee: "-5".into(),
            ..paid.clone()
        };
        assert_eq!(negative.into_draft().unwrap_err(), "Event fee cannot be negative");

        let priced = EventForm {
            event_fee: "12.5".into(),
            ..paid
        };
        assert_eq!(priced.into_draft().unwrap().event_fee, 12.5);
    }

    #[test]
    fn malformed_dates_and_blank_fields_are_rejected() {
        let bad_date = EventForm {
            event_date: "next friday".into(),
            ..event_form()
        };
        assert_eq!(bad_date.into_draft().unwrap_err(), "Please select a valid date");

        let no_title = EventForm {
            title: "   ".into(),
            ..event_form()
        };
        assert_eq!(no_title.into_draft().unwrap_err(), "Title is required");

        let no_attendees = EventForm {
            max_attendees: "0".into(),
            ..event_form()
        };
        assert!(no_attendees.into_draft().is_err());
    }

    #[test]
    fn datetime_inputs_keep_the_time() {
        assert_eq!(
            parse_event_date("2030-05-01T18:30"),
            Some(Utc.with_ymd_and_hms(2030, 5, 1, 18, 30, 0).unwrap())
        );
        assert_eq!(
            parse_event_date("2030-05-01T18:30:00Z"),
            Some(Utc.with_ymd_and_hms(2030, 5, 1, 18, 30, 0).unwrap())
        );
    }

    #[test]
    fn club_form_validation() {
        let draft = club_draft(&club_form(), Some("https://img/banner.png".into())).unwrap();
        assert_eq!(draft.membership_fee, 25.0);
        assert_eq!(draft.club_name, "Shutterbugs");

        assert_eq!(
            club_draft(&club_form(), None).unwrap_err(),
            "Banner image is required!"
        );

        let negative = club_form().with_text("membershipFee", "-1");
        assert_eq!(
            club_draft(&negative, Some("https://img/banner.png".into())).unwrap_err(),
            "Membership fee cannot be negative"
        );

        let blank = club_form().with_text("clubName", " ");
        assert_eq!(
            club_draft(&blank, Some("https://img/banner.png".into())).unwrap_err(),
            "Club name is required"
        );
    }
}
