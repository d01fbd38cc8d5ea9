//! Tour payloads accepted by the back office and the JSON-array column
//! convention used for list fields.
//!
//! List fields (`highlights`, `included`, `gallery_images`,
//! `gallery_videos`) live in nullable text columns holding a JSON array.
//! Empty lists are stored as NULL and anything unreadable decodes to an
//! empty list.

use serde::Deserialize;
use tracing::warn;

use crate::db::TourRecord;
use crate::utils::validation::{ValidationErrors, non_blank};

const MAX_TITLE_LEN: usize = 200;
const MAX_DURATION_DAYS: i32 = 365;

pub fn encode_list(items: &[String]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    serde_json::to_string(items).ok()
}

pub fn decode_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(items) => items,
        Err(err) => {
            warn!("ignoring malformed list column value {:?}: {}", raw, err);
            Vec::new()
        }
    }
}

fn normalize_list(items: Option<Vec<String>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TourPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location: String,
    pub duration_days: i32,
    pub price: f64,
    pub max_guests: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub highlights: Option<Vec<String>>,
    #[serde(default)]
    pub included: Option<Vec<String>>,
    #[serde(default)]
    pub gallery_images: Option<Vec<String>>,
    #[serde(default)]
    pub gallery_videos: Option<Vec<String>>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TourPayload {
    pub fn validate(self) -> Result<TourRecord, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push("title", "Title is required");
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.push(
                "title",
                format!("Title must be at most {MAX_TITLE_LEN} characters"),
            );
        }

        let location = self.location.trim().to_string();
        if location.is_empty() {
            errors.push("location", "Location is required");
        }

        if !(1..=MAX_DURATION_DAYS).contains(&self.duration_days) {
            errors.push(
                "duration_days",
                format!("Duration must be between 1 and {MAX_DURATION_DAYS} days"),
            );
        }

        if !self.price.is_finite() || self.price < 0.0 {
            errors.push("price", "Price must be a non-negative number");
        }

        if self.max_guests < 1 {
            errors.push("max_guests", "At least 1 guest must be allowed");
        }

        errors.into_result(TourRecord {
            title,
            description: non_blank(self.description),
            location,
            duration_days: self.duration_days,
            price: self.price,
            max_guests: self.max_guests,
            image_url: non_blank(self.image_url),
            highlights: normalize_list(self.highlights),
            included: normalize_list(self.included),
            gallery_images: normalize_list(self.gallery_images),
            gallery_videos: normalize_list(self.gallery_videos),
            is_featured: self.is_featured,
            is_active: self.is_active,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_case::test_case;

    pub(crate) fn payload() -> TourPayload {
        TourPayload {
            title: "Edge of the World".to_string(),
            description: Some("Sunset hike over the Tuwaiq escarpment".to_string()),
            location: "Riyadh".to_string(),
            duration_days: 1,
            price: 350.0,
            max_guests: 12,
            image_url: Some("/api/files/tours/images/cover.jpg".to_string()),
            highlights: Some(vec!["Sunset views".to_string(), "Camp dinner".to_string()]),
            included: Some(vec!["Transport".to_string()]),
            gallery_images: None,
            gallery_videos: None,
            is_featured: true,
            is_active: true,
        }
    }

    #[test]
    fn encode_list_stores_empty_as_null() {
        assert_eq!(encode_list(&[]), None);
        assert_eq!(
            encode_list(&["a".to_string(), "b".to_string()]).as_deref(),
            Some(r#"["a","b"]"#)
        );
    }

    #[test_case(None, &[] ; "null column")]
    #[test_case(Some(""), &[] ; "empty text")]
    #[test_case(Some("not json"), &[] ; "malformed text")]
    #[test_case(Some(r#"["Guide","Lunch"]"#), &["Guide", "Lunch"] ; "json array")]
    fn decode_list_handles_column_values(raw: Option<&str>, expected: &[&str]) {
        assert_eq!(decode_list(raw), expected);
    }

    #[test]
    fn valid_payload_is_normalized() {
        let mut input = payload();
        input.title = "  Edge of the World ".to_string();
        input.description = Some("   ".to_string());
        input.included = Some(vec![" Transport ".to_string(), "".to_string()]);

        let record = input.validate().expect("valid payload");

        assert_eq!(record.title, "Edge of the World");
        assert_eq!(record.description, None);
        assert_eq!(record.included, vec!["Transport".to_string()]);
        assert!(record.gallery_images.is_empty());
    }

    #[test]
    fn invalid_payload_reports_every_field() {
        let mut input = payload();
        input.title = " ".to_string();
        input.location = String::new();
        input.duration_days = 0;
        input.price = -1.0;
        input.max_guests = 0;

        let errors = input.validate().unwrap_err();

        for field in ["title", "location", "duration_days", "price", "max_guests"] {
            assert!(errors.has(field), "missing error for {field}");
        }
    }

    #[test]
    fn rejects_non_finite_price() {
        let mut input = payload();
        input.price = f64::NAN;
        assert!(input.validate().unwrap_err().has("price"));
    }

    #[test]
    fn payload_defaults_to_active_when_flag_missing() {
        let input: TourPayload = serde_json::from_value(serde_json::json!({
            "title": "Jeddah Old Town",
            "location": "Jeddah",
            "duration_days": 1,
            "price": 200,
            "max_guests": 10
        }))
        .unwrap();

        assert!(input.is_active);
        assert!(!input.is_featured);
        assert!(input.highlights.is_none());
    }
}
