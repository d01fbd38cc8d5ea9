use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::DatabaseError;
use super::models::{
    AdminUser, BookingCounts, BookingStatus, BookingWithTour, NewAdminSession, NewAdminUser,
    NewBooking, Tour, TourCounts, TourRecord,
};

#[async_trait]
pub trait TourStore: Send + Sync {
    /// Active tours in catalog order when `active_only`, otherwise every
    /// tour newest first.
    async fn list_tours(&self, active_only: bool) -> Result<Vec<Tour>, DatabaseError>;
    async fn get_tour(&self, id: i64, active_only: bool) -> Result<Option<Tour>, DatabaseError>;
    async fn create_tour(&self, tour: &TourRecord) -> Result<i64, DatabaseError>;
    async fn update_tour(&self, id: i64, tour: &TourRecord) -> Result<bool, DatabaseError>;
    async fn delete_tour(&self, id: i64) -> Result<bool, DatabaseError>;
    async fn tour_counts(&self) -> Result<TourCounts, DatabaseError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_booking(&self, booking: &NewBooking) -> Result<i64, DatabaseError>;
    async fn get_booking(&self, id: i64) -> Result<Option<BookingWithTour>, DatabaseError>;
    async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingWithTour>, DatabaseError>;
    async fn update_booking_status(
        &self,
        id: i64,
        status: BookingStatus,
    ) -> Result<bool, DatabaseError>;
    async fn delete_booking(&self, id: i64) -> Result<bool, DatabaseError>;
    async fn count_bookings_for_tour(&self, tour_id: i64) -> Result<i64, DatabaseError>;
    async fn booking_counts(&self) -> Result<BookingCounts, DatabaseError>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn get_admin_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AdminUser>, DatabaseError>;
    async fn create_admin(&self, admin: &NewAdminUser) -> Result<i64, DatabaseError>;
    async fn count_admins(&self) -> Result<i64, DatabaseError>;
    async fn create_session(&self, session: &NewAdminSession) -> Result<(), DatabaseError>;
    /// Resolves an unexpired session to its admin, provided the admin is
    /// still active.
    async fn get_admin_by_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AdminUser>, DatabaseError>;
    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError>;
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;
}
