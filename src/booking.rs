//! Public booking requests: validation, pricing and the WhatsApp hand-off.

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::config::WhatsAppConfig;
use crate::db::{NewBooking, Tour};
use crate::utils::validation::{ValidationErrors, non_blank};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

const MAX_NAME_LEN: usize = 120;
const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub tour_id: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub guest_count: i32,
    #[serde(default)]
    pub preferred_date: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A request that passed the tour-independent checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidBookingRequest {
    pub tour_id: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub guest_count: i32,
    pub preferred_date: Option<NaiveDate>,
    pub message: Option<String>,
}

impl BookingRequest {
    /// `today` is the UTC date. The day before it is still accepted so a
    /// guest behind UTC can book their own local today.
    pub fn validate(self, today: NaiveDate) -> Result<ValidBookingRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let earliest = today.pred_opt().unwrap_or(today);

        let guest_name = self.guest_name.trim().to_string();
        if guest_name.is_empty() {
            errors.push("guest_name", "Name is required");
        } else if guest_name.chars().count() > MAX_NAME_LEN {
            errors.push(
                "guest_name",
                format!("Name must be at most {MAX_NAME_LEN} characters"),
            );
        }

        let guest_email = self.guest_email.trim().to_string();
        if !EMAIL_RE.is_match(&guest_email) {
            errors.push("guest_email", "Valid email is required");
        }

        let guest_phone = self.guest_phone.trim().to_string();
        if guest_phone.is_empty() {
            errors.push("guest_phone", "Phone number is required");
        } else if !is_plausible_phone(&guest_phone) {
            errors.push("guest_phone", "Phone number is not valid");
        }

        if self.guest_count < 1 {
            errors.push("guest_count", "At least 1 guest required");
        }

        let preferred_date = match non_blank(self.preferred_date) {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) if date < earliest => {
                    errors.push("preferred_date", "Preferred date cannot be in the past");
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push("preferred_date", "Preferred date must be YYYY-MM-DD");
                    None
                }
            },
        };

        let message = non_blank(self.message);
        if message
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_MESSAGE_LEN)
        {
            errors.push(
                "message",
                format!("Message must be at most {MAX_MESSAGE_LEN} characters"),
            );
        }

        errors.into_result(ValidBookingRequest {
            tour_id: self.tour_id,
            guest_name,
            guest_email,
            guest_phone,
            guest_count: self.guest_count,
            preferred_date,
            message,
        })
    }
}

impl ValidBookingRequest {
    /// Prices the request against the tour and checks the group fits.
    pub fn price_for(self, tour: &Tour) -> Result<NewBooking, ValidationErrors> {
        if self.guest_count > tour.max_guests {
            return Err(ValidationErrors::single(
                "guest_count",
                format!("This tour accepts at most {} guests", tour.max_guests),
            ));
        }

        Ok(NewBooking {
            tour_id: tour.id,
            total_price: total_price(tour.price, self.guest_count),
            guest_name: self.guest_name,
            guest_email: self.guest_email,
            guest_phone: self.guest_phone,
            guest_count: self.guest_count,
            preferred_date: self.preferred_date,
            message: self.message,
        })
    }
}

fn is_plausible_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    allowed && (6..=20).contains(&phone.len()) && digits >= 6
}

/// Unit price times guest count, rounded to cents.
pub fn total_price(unit_price: f64, guest_count: i32) -> f64 {
    (unit_price * f64::from(guest_count) * 100.0).round() / 100.0
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn whatsapp_message(
    tour: &Tour,
    booking: &NewBooking,
    booking_id: i64,
    currency: &str,
) -> String {
    let preferred_date = booking
        .preferred_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Flexible".to_string());

    format!(
        "🏛️ New Tour Booking Request!\n\n\
         Tour: {}\n\
         Guest: {}\n\
         Email: {}\n\
         Phone: {}\n\
         Guests: {}\n\
         Preferred Date: {}\n\
         Total Price: {} {}\n\
         Message: {}\n\n\
         Booking ID: {}",
        tour.title,
        booking.guest_name,
        booking.guest_email,
        booking.guest_phone,
        booking.guest_count,
        preferred_date,
        booking.total_price,
        currency,
        booking.message.as_deref().unwrap_or("None"),
        booking_id,
    )
}

/// `https://wa.me/<phone>?text=<message>` with the message percent-encoded.
pub fn whatsapp_url(config: &WhatsAppConfig, message: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse("https://wa.me/")?.join(&config.phone)?;
    url.set_query(Some(&format!("text={}", urlencoding::encode(message))));
    Ok(url)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_case::test_case;

    pub(crate) fn tour(price: f64, max_guests: i32) -> Tour {
        let now = Utc::now();
        Tour {
            id: 3,
            title: "Hegra Sunrise".to_string(),
            description: None,
            location: "AlUla".to_string(),
            duration_days: 2,
            price,
            max_guests,
            image_url: None,
            highlights: Vec::new(),
            included: Vec::new(),
            gallery_images: Vec::new(),
            gallery_videos: Vec::new(),
            is_featured: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn request() -> BookingRequest {
        BookingRequest {
            tour_id: 3,
            guest_name: "Noura Al-Harbi".to_string(),
            guest_email: "noura@example.com".to_string(),
            guest_phone: "+966 55 123 4567".to_string(),
            guest_count: 3,
            preferred_date: Some("2030-03-14".to_string()),
            message: Some("Vegetarian meals please".to_string()),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn valid_request_is_priced_per_guest() {
        let valid = request().validate(day("2030-01-01")).expect("valid request");
        let booking = valid.price_for(&tour(450.0, 10)).expect("fits the tour");

        assert_eq!(booking.total_price, 1350.0);
        assert_eq!(booking.preferred_date, Some(day("2030-03-14")));
        assert_eq!(booking.message.as_deref(), Some("Vegetarian meals please"));
    }

    #[test]
    fn rejects_group_larger_than_tour_capacity() {
        let valid = request().validate(day("2030-01-01")).unwrap();
        let errors = valid.price_for(&tour(450.0, 2)).unwrap_err();
        assert!(errors.has("guest_count"));
    }

    #[test_case("guest_name", |r: &mut BookingRequest| r.guest_name = "  ".to_string() ; "blank name")]
    #[test_case("guest_email", |r: &mut BookingRequest| r.guest_email = "not-an-email".to_string() ; "malformed email")]
    #[test_case("guest_phone", |r: &mut BookingRequest| r.guest_phone = String::new() ; "missing phone")]
    #[test_case("guest_phone", |r: &mut BookingRequest| r.guest_phone = "call me".to_string() ; "phone with letters")]
    #[test_case("guest_count", |r: &mut BookingRequest| r.guest_count = 0 ; "zero guests")]
    #[test_case("preferred_date", |r: &mut BookingRequest| r.preferred_date = Some("14/03/2030".to_string()) ; "non iso date")]
    #[test_case("preferred_date", |r: &mut BookingRequest| r.preferred_date = Some("2029-12-30".to_string()) ; "past date")]
    fn rejects_invalid_field(field: &str, mutate: fn(&mut BookingRequest)) {
        let mut input = request();
        mutate(&mut input);

        let errors = input.validate(day("2030-01-01")).unwrap_err();
        assert!(errors.has(field), "expected error on {field}, got {errors}");
    }

    #[test]
    fn yesterday_utc_is_still_bookable() {
        let mut input = request();
        input.preferred_date = Some("2029-12-31".to_string());

        let valid = input.validate(day("2030-01-01")).expect("local today west of UTC");
        assert_eq!(valid.preferred_date, Some(day("2029-12-31")));
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let mut input = request();
        input.preferred_date = Some(" ".to_string());
        input.message = Some(String::new());

        let valid = input.validate(day("2030-01-01")).unwrap();
        assert_eq!(valid.preferred_date, None);
        assert_eq!(valid.message, None);
    }

    #[test_case(450.0, 2, 900.0)]
    #[test_case(99.99, 3, 299.97)]
    #[test_case(0.0, 5, 0.0)]
    fn total_price_multiplies_unit_price(unit: f64, guests: i32, expected: f64) {
        assert_eq!(total_price(unit, guests), expected);
    }

    #[test]
    fn whatsapp_message_lists_booking_details() {
        let mut input = request();
        input.preferred_date = None;
        input.message = None;
        let booking = input
            .validate(day("2030-01-01"))
            .unwrap()
            .price_for(&tour(450.0, 10))
            .unwrap();

        let message = whatsapp_message(&tour(450.0, 10), &booking, 41, "SAR");

        assert!(message.contains("Tour: Hegra Sunrise\n"));
        assert!(message.contains("Guests: 3\n"));
        assert!(message.contains("Preferred Date: Flexible\n"));
        assert!(message.contains("Total Price: 1350 SAR\n"));
        assert!(message.contains("Message: None\n"));
        assert!(message.ends_with("Booking ID: 41"));
    }

    #[test]
    fn whatsapp_url_percent_encodes_message() {
        let config = WhatsAppConfig {
            phone: "966500000000".to_string(),
            currency: "SAR".to_string(),
        };

        let url = whatsapp_url(&config, "Tour: Hegra & Dadan\nGuests: 2").unwrap();

        assert_eq!(url.host_str(), Some("wa.me"));
        assert_eq!(url.path(), "/966500000000");
        assert_eq!(
            url.query(),
            Some("text=Tour%3A%20Hegra%20%26%20Dadan%0AGuests%3A%202")
        );
    }
}
