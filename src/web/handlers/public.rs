use salvo::prelude::*;
use serde_json::{Value, json};
use tracing::info;

use crate::booking::{BookingRequest, today, whatsapp_message, whatsapp_url};
use crate::utils::validation::ValidationErrors;
use crate::web::metrics::Metrics;
use crate::web::{ApiError, web_state};

const INVALID_BOOKING: &str = "Invalid booking data";

fn rejected_booking(errors: ValidationErrors) -> ApiError {
    Metrics::booking_rejected();
    ApiError::invalid(INVALID_BOOKING, errors)
}

pub(crate) fn path_id(req: &Request, what: &str) -> Result<i64, ApiError> {
    req.param::<i64>("id")
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {what} ID")))
}

#[handler]
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Catch-all for unknown `/api` paths, kept ahead of the static front end.
#[handler]
pub async fn api_not_found() -> ApiError {
    ApiError::not_found("Not found")
}

#[handler]
pub async fn list_tours(depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let state = web_state(depot)?;
    let tours = state
        .tours
        .list_tours(true)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch tours", e))?;

    Ok(Json(json!({ "tours": tours })))
}

#[handler]
pub async fn get_tour(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let id = path_id(req, "tour")?;
    let state = web_state(depot)?;

    let tour = state
        .tours
        .get_tour(id, true)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch tour", e))?
        .ok_or_else(|| ApiError::not_found("Tour not found"))?;

    Ok(Json(json!({ "tour": tour })))
}

#[handler]
pub async fn create_booking(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<Value>, ApiError> {
    let request = req
        .parse_json::<BookingRequest>()
        .await
        .map_err(|e| rejected_booking(ValidationErrors::single("body", e.to_string())))?;
    let state = web_state(depot)?;

    let valid = request.validate(today()).map_err(rejected_booking)?;
    let tour = state
        .tours
        .get_tour(valid.tour_id, true)
        .await?
        .ok_or_else(|| ApiError::not_found("Tour not found"))?;
    let booking = valid.price_for(&tour).map_err(rejected_booking)?;

    let booking_id = state.bookings.create_booking(&booking).await?;
    let message = whatsapp_message(&tour, &booking, booking_id, &state.config.whatsapp.currency);
    let whatsapp = whatsapp_url(&state.config.whatsapp, &message)
        .map_err(|e| ApiError::internal("Failed to create booking", e))?;

    Metrics::booking_created();
    info!(
        "booking {} created for tour {} ({} guests, total {})",
        booking_id, tour.id, booking.guest_count, booking.total_price
    );

    Ok(Json(json!({
        "success": true,
        "booking_id": booking_id,
        "whatsapp_url": whatsapp.as_str(),
        "total_price": booking.total_price,
    })))
}
