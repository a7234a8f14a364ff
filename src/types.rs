use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, str::FromStr};
use validator::{Validate, ValidationError};

lazy_static! {
    static ref DATE_FORMAT: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIME_FORMAT: Regex = Regex::new(r"^\d{2}:\d{2}$").unwrap();
}

/// Current time at the precision records are persisted with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamps are written with a fixed number of fractional digits so that
/// comparing the stored strings orders them chronologically.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that hold a slot.
    pub const ACTIVE: [AppointmentStatus; 2] = [Self::Pending, Self::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown appointment status '{other}'")),
        }
    }
}

/// Create payloads default absent fields so that validation reports each
/// missing required field by name instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StatusCheckCreate {
    #[validate(length(min = 1, max = 100))]
    pub client_name: String,
    #[validate(length(max = 500))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub id: String,
    pub client_name: String,
    pub message: Option<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ContactFormCreate {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub company: Option<String>,
    #[validate(length(max = 50))]
    pub industry: Option<String>,
    #[validate(length(max = 50))]
    pub service: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactForm {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub service: Option<String>,
    pub message: String,
    #[serde(serialize_with = "timestamp::serialize")]
    pub submitted_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppointmentCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 10, max = 20))]
    pub phone: String,
    #[validate(length(max = 100))]
    pub business: Option<String>,
    #[validate(length(max = 50))]
    pub industry: Option<String>,
    #[validate(length(max = 200))]
    pub service_interests: Option<String>,
    #[validate(custom(function = "validate_date"))]
    pub appointment_date: String,
    #[validate(custom(function = "validate_time"))]
    pub appointment_time: String,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub business: Option<String>,
    pub industry: Option<String>,
    pub service_interests: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub message: Option<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: DateTime<Utc>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: serde_json::Value,
}

impl StatusUpdate {
    pub fn requested_status(&self) -> &str {
        self.status.as_str().unwrap_or_default()
    }
}

/// Answer to an availability query. The shape depends on whether a time was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Availability {
    Slot {
        available: bool,
        date: String,
        time: String,
        message: String,
    },
    Day {
        date: String,
        booked_times: Vec<String>,
        message: String,
    },
}

fn validate_date(value: &str) -> Result<(), ValidationError> {
    let valid = DATE_FORMAT.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    if !valid {
        return Err(ValidationError::new("date")
            .with_message(Cow::Borrowed("Date must be a calendar date in YYYY-MM-DD format")));
    }
    Ok(())
}

fn validate_time(value: &str) -> Result<(), ValidationError> {
    let valid = TIME_FORMAT.is_match(value) && NaiveTime::parse_from_str(value, "%H:%M").is_ok();
    if !valid {
        return Err(ValidationError::new("time")
            .with_message(Cow::Borrowed("Time must be in HH:MM format")));
    }
    Ok(())
}
