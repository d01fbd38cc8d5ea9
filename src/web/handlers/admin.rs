use salvo::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::auth::AuthError;
use crate::catalog::TourPayload;
use crate::db::{BookingStatus, TourRecord};
use crate::utils::validation::ValidationErrors;
use crate::web::handlers::public::path_id;
use crate::web::metrics::Metrics;
use crate::web::middleware::auth::{
    current_admin, expired_session_cookie, session_cookie, session_token,
};
use crate::web::{ApiError, web_state};

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: String,
}

fn parse_status(raw: &str) -> Result<BookingStatus, ApiError> {
    raw.parse::<BookingStatus>()
        .map_err(|e| ApiError::bad_request(format!("Invalid booking status: {}", e.0)))
}

#[handler]
pub async fn login(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<Value>, ApiError> {
    let body = req.parse_json::<LoginRequest>().await.unwrap_or_default();
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Username and password required"));
    }

    let state = web_state(depot)?;
    let (admin, token) = match state.auth.login(&body.username, &body.password).await {
        Ok(session) => session,
        Err(err) => {
            if matches!(err, AuthError::InvalidCredentials) {
                Metrics::login_failed();
            }
            return Err(err.into());
        }
    };

    Metrics::login_success();
    res.add_cookie(session_cookie(&state.config.session, token));

    Ok(Json(json!({
        "success": true,
        "admin": {
            "username": admin.username,
            "email": admin.email,
        }
    })))
}

#[handler]
pub async fn logout(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<Value>, ApiError> {
    let state = web_state(depot)?;

    if let Some(token) = session_token(req, &state.config.session) {
        if let Err(err) = state.auth.logout(&token).await {
            warn!("failed to delete admin session: {}", err);
        }
    }
    res.add_cookie(expired_session_cookie(&state.config.session));

    Ok(Json(json!({ "success": true })))
}

#[handler]
pub async fn me(depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let admin = current_admin(depot)?;
    Ok(Json(json!({
        "username": admin.username,
        "email": admin.email,
    })))
}

#[handler]
pub async fn stats(depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let state = web_state(depot)?;
    let tours = state.tours.tour_counts().await?;
    let bookings = state.bookings.booking_counts().await?;

    Ok(Json(json!({
        "tours": tours,
        "bookings": bookings,
    })))
}

#[handler]
pub async fn list_tours(depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let state = web_state(depot)?;
    let tours = state
        .tours
        .list_tours(false)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch tours", e))?;

    Ok(Json(json!({ "tours": tours })))
}

async fn tour_payload(req: &mut Request) -> Result<TourRecord, ApiError> {
    let payload = req
        .parse_json::<TourPayload>()
        .await
        .map_err(|e| {
            ApiError::invalid(
                "Invalid tour data",
                ValidationErrors::single("body", e.to_string()),
            )
        })?;
    payload
        .validate()
        .map_err(|errors| ApiError::invalid("Invalid tour data", errors))
}

#[handler]
pub async fn create_tour(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let record = tour_payload(req).await?;
    let state = web_state(depot)?;

    let id = state.tours.create_tour(&record).await?;
    info!("created tour {} ({})", id, record.title);

    Ok(Json(json!({ "success": true, "id": id })))
}

#[handler]
pub async fn update_tour(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let id = path_id(req, "tour")?;
    let record = tour_payload(req).await?;
    let state = web_state(depot)?;

    if !state.tours.update_tour(id, &record).await? {
        return Err(ApiError::not_found("Tour not found"));
    }
    info!("updated tour {}", id);

    Ok(Json(json!({ "success": true })))
}

#[handler]
pub async fn delete_tour(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let id = path_id(req, "tour")?;
    let state = web_state(depot)?;

    let bookings = state.bookings.count_bookings_for_tour(id).await?;
    if bookings > 0 {
        return Err(ApiError::Conflict(format!(
            "Tour has {bookings} booking(s) and cannot be deleted"
        )));
    }
    if !state.tours.delete_tour(id).await? {
        return Err(ApiError::not_found("Tour not found"));
    }
    info!("deleted tour {}", id);

    Ok(Json(json!({ "success": true })))
}

#[handler]
pub async fn list_bookings(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let status = req
        .query::<String>("status")
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_status(&s))
        .transpose()?;
    let state = web_state(depot)?;

    let bookings = state
        .bookings
        .list_bookings(status)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch bookings", e))?;

    Ok(Json(json!({ "bookings": bookings })))
}

#[handler]
pub async fn get_booking(req: &mut Request, depot: &mut Depot) -> Result<Json<Value>, ApiError> {
    let id = path_id(req, "booking")?;
    let state = web_state(depot)?;

    let booking = state
        .bookings
        .get_booking(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    Ok(Json(json!({ "booking": booking })))
}

#[handler]
pub async fn update_booking(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<Value>, ApiError> {
    let id = path_id(req, "booking")?;
    let update = req
        .parse_json::<StatusUpdate>()
        .await
        .map_err(|_| ApiError::bad_request("Status is required"))?;
    let status = parse_status(&update.status)?;
    let state = web_state(depot)?;

    if !state.bookings.update_booking_status(id, status).await? {
        return Err(ApiError::not_found("Booking not found"));
    }
    info!("booking {} marked {}", id, status);

    Ok(Json(json!({ "success": true })))
}

#[handler]
pub async fn delete_booking(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<Value>, ApiError> {
    let id = path_id(req, "booking")?;
    let state = web_state(depot)?;

    if !state.bookings.delete_booking(id).await? {
        return Err(ApiError::not_found("Booking not found"));
    }
    info!("deleted booking {}", id);

    Ok(Json(json!({ "success": true })))
}
