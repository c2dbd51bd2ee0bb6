use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Employee record as kept in the `employees_data` blob.
///
/// `password` holds an argon2 PHC string and never leaves the service; API
/// responses go through [`EmployeeResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub email: String,
    /// Job role, free text ("Engineer", "HR Executive", ...).
    pub role: String,
    #[serde(with = "hhmm")]
    pub arrival_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Ayesha Rahman",
        "email": "ayesha.rahman@company.com",
        "role": "Engineer",
        "arrival_time": "09:00",
        "username": "ayesha"
    })
)]
pub struct EmployeeResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Ayesha Rahman")]
    pub name: String,
    #[schema(example = "ayesha.rahman@company.com")]
    pub email: String,
    #[schema(example = "Engineer")]
    pub role: String,
    #[schema(example = "09:00")]
    pub arrival_time: String,
    #[schema(example = "ayesha", nullable = true)]
    pub username: Option<String>,
}

impl From<&Employee> for EmployeeResponse {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            email: e.email.clone(),
            role: e.role.clone(),
            arrival_time: e.arrival_time.format(hhmm::FORMAT).to_string(),
            username: e.username.clone(),
        }
    }
}

/// `local@domain.tld`, no whitespace, exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Canonical form used wherever usernames are compared or indexed.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl Employee {
    pub fn has_username(&self, normalized: &str) -> bool {
        self.username
            .as_deref()
            .is_some_and(|u| normalize_username(u) == normalized)
    }
}

/// Strict 24-hour `HH:mm` with two-digit hours.
pub fn parse_arrival_time(value: &str) -> Option<NaiveTime> {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    NaiveTime::parse_from_str(value, hhmm::FORMAT).ok()
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("john.doe@company.com"));
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("john.doe@company"));
        assert!(!is_valid_email("john doe@company.com"));
        assert!(!is_valid_email("@company.com"));
        assert!(!is_valid_email("a@@b.com"));
        assert!(!is_valid_email("a@.com"));
    }

    #[test]
    fn usernames_compare_unicode_case_insensitively() {
        assert_eq!(normalize_username("  Émilie "), "émilie");
        let e = Employee {
            id: 1,
            name: "Émilie".into(),
            email: "emilie@company.com".into(),
            role: "HR".into(),
            arrival_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            username: Some("ÉMILIE".into()),
            password: None,
        };
        assert!(e.has_username(&normalize_username("émilie")));
        assert!(!e.has_username(&normalize_username("emilie")));
    }

    #[test]
    fn arrival_time_is_strict_hh_mm() {
        assert_eq!(parse_arrival_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_arrival_time("23:59"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_arrival_time("24:00"), None);
        assert_eq!(parse_arrival_time("9:30"), None);
        assert_eq!(parse_arrival_time("09:60"), None);
        assert_eq!(parse_arrival_time("0930"), None);
    }

    #[test]
    fn stored_record_keeps_hh_mm_and_hides_missing_credentials() {
        let e = Employee {
            id: 7,
            name: "Rafi".into(),
            email: "rafi@company.com".into(),
            role: "QA".into(),
            arrival_time: NaiveTime::from_hms_opt(8, 5, 0).unwrap(),
            username: None,
            password: None,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["arrival_time"], "08:05");
        assert!(json.get("username").is_none());

        let back: Employee = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn response_never_carries_password() {
        let e = Employee {
            id: 1,
            name: "Mitu".into(),
            email: "mitu@company.com".into(),
            role: "HR".into(),
            arrival_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            username: Some("mitu".into()),
            password: Some("$argon2id$...".into()),
        };
        let json = serde_json::to_value(EmployeeResponse::from(&e)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["arrival_time"], "09:00");
    }
}
