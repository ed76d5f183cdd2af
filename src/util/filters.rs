use chrono::{DateTime, NaiveDate, Utc};
use minijinja::Environment;

/// `{{ club.membershipFee | money }}` -> `$25.00`, zero reads `Free`.
pub fn money(value: f64) -> String {
    if value <= 0.0 {
        return "Free".to_string();
    }
    format!("${:.2}", value)
}

/// `{{ event.eventDate | date }}` -> `May 1, 2030`.
pub fn date(value: Option<String>) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return "-".to_string();
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&value) {
        return parsed.with_timezone(&Utc).format("%b %-d, %Y").to_string();
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        return parsed.format("%b %-d, %Y").to_string();
    }
    value
}

/// Value for `<input type="date">`.
pub fn input_date(value: Option<String>) -> String {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|parsed| parsed.with_timezone(&Utc).format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn register(env: &mut Environment<'_>) {
    env.add_filter("money", money);
    env.add_filter("date", date);
    env.add_filter("input_date", input_date);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_formats_fees() {
        assert_eq!(money(0.0), "Free");
        assert_eq!(money(25.0), "$25.00");
        assert_eq!(money(9.5), "$9.50");
    }

    #[test]
    fn dates_are_human_readable() {
        assert_eq!(date(Some("2030-05-01T18:00:00Z".into())), "May 1, 2030");
        assert_eq!(date(Some("2030-12-24".into())), "Dec 24, 2030");
        assert_eq!(date(None), "-");
        assert_eq!(date(Some("soon".into())), "soon");
    }

    #[test]
    fn input_dates_drop_the_time() {
        assert_eq!(input_date(Some("2030-05-01T18:00:00Z".into())), "2030-05-01");
        assert_eq!(input_date(None), "");
    }

    #[test]
    fn filters_render_in_templates() {
        let mut env = Environment::new();
        register(&mut env);
        let out = env
            .render_str("{{ fee | money }} on {{ at | date }}", minijinja::context! {
                fee => 12.0,
                at => "2030-05-01T18:00:00Z",
            })
            .unwrap();
        assert_eq!(out, "$12.00 on May 1, 2030");
    }
}
