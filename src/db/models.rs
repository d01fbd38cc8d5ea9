use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tour {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub duration_days: i32,
    pub price: f64,
    pub max_guests: i32,
    pub image_url: Option<String>,
    pub highlights: Vec<String>,
    pub included: Vec<String>,
    pub gallery_images: Vec<String>,
    pub gallery_videos: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values written by tour creation and update.
#[derive(Debug, Clone, PartialEq)]
pub struct TourRecord {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub duration_days: i32,
    pub price: f64,
    pub max_guests: i32,
    pub image_url: Option<String>,
    pub highlights: Vec<String>,
    pub included: Vec<String>,
    pub gallery_images: Vec<String>,
    pub gallery_videos: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TourCounts {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Error)]
#[error("unknown booking status: {0}")]
pub struct UnknownBookingStatus(pub String);

impl BookingStatus {
    pub const ALL: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownBookingStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownBookingStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub tour_id: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub guest_count: i32,
    pub preferred_date: Option<NaiveDate>,
    pub message: Option<String>,
    pub status: BookingStatus,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking joined with the title and location of its tour, as listed in
/// the back office.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingWithTour {
    #[serde(flatten)]
    pub booking: Booking,
    pub tour_title: Option<String>,
    pub tour_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub tour_id: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub guest_count: i32,
    pub preferred_date: Option<NaiveDate>,
    pub message: Option<String>,
    pub total_price: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct BookingCounts {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub confirmed_revenue: f64,
}

impl BookingCounts {
    pub(crate) fn add(&mut self, status: &str, count: i64) {
        self.total += count;
        match status.parse::<BookingStatus>() {
            Ok(BookingStatus::Pending) => self.pending += count,
            Ok(BookingStatus::Confirmed) => self.confirmed += count,
            Ok(BookingStatus::Cancelled) => self.cancelled += count,
            Err(_) => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAdminUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAdminSession {
    pub token_hash: String,
    pub admin_user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("pending", BookingStatus::Pending)]
    #[test_case("Confirmed", BookingStatus::Confirmed)]
    #[test_case(" cancelled ", BookingStatus::Cancelled)]
    fn booking_status_parses_known_values(input: &str, expected: BookingStatus) {
        assert_eq!(input.parse::<BookingStatus>().unwrap(), expected);
    }

    #[test]
    fn booking_status_rejects_unknown_value() {
        let err = "refunded".parse::<BookingStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown booking status: refunded");
    }

    #[test]
    fn booking_status_serializes_lowercase() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
    }

    #[test]
    fn booking_counts_accumulate_by_status() {
        let mut counts = BookingCounts::default();
        counts.add("pending", 3);
        counts.add("confirmed", 2);
        counts.add("cancelled", 1);

        assert_eq!(counts.total, 6);
        assert_eq!(counts.pending, 3);
        assert_eq!(counts.confirmed, 2);
        assert_eq!(counts.cancelled, 1);
    }

    #[test]
    fn booking_with_tour_flattens_booking_fields() {
        let now = Utc::now();
        let row = BookingWithTour {
            booking: Booking {
                id: 7,
                tour_id: 2,
                guest_name: "Sara".to_string(),
                guest_email: "sara@example.com".to_string(),
                guest_phone: "+966 55 123 4567".to_string(),
                guest_count: 2,
                preferred_date: None,
                message: None,
                status: BookingStatus::Pending,
                total_price: 900.0,
                created_at: now,
                updated_at: now,
            },
            tour_title: Some("AlUla Heritage".to_string()),
            tour_location: Some("AlUla".to_string()),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["status"], "pending");
        assert_eq!(value["tour_title"], "AlUla Heritage");
    }

    #[test]
    fn admin_user_never_serializes_password_hash() {
        let now = Utc::now();
        let admin = AdminUser {
            id: 1,
            username: "owner".to_string(),
            email: None,
            password_hash: "sha256$abc$def".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(&admin).unwrap();
        assert!(value.get("password_hash").is_none());
    }
}
