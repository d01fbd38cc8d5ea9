use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::dsl::{count_star, sum};
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::catalog::{decode_list, encode_list};
use crate::db::manager::Pool;
use crate::db::schema::{admin_sessions, admin_users, bookings, tours};

use super::{
    DatabaseError,
    error::query_error,
    models::{
        AdminUser, Booking, BookingCounts, BookingStatus, BookingWithTour, NewAdminSession,
        NewAdminUser, NewBooking, Tour, TourCounts, TourRecord,
    },
};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tours)]
struct DbTour {
    id: i64,
    title: String,
    description: Option<String>,
    location: String,
    duration_days: i32,
    price: f64,
    max_guests: i32,
    image_url: Option<String>,
    highlights: Option<String>,
    included: Option<String>,
    gallery_images: Option<String>,
    gallery_videos: Option<String>,
    is_featured: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbTour> for Tour {
    fn from(value: DbTour) -> Self {
        Self {
            id: value.id,
            highlights: decode_list(value.highlights.as_deref()),
            included: decode_list(value.included.as_deref()),
            gallery_images: decode_list(value.gallery_images.as_deref()),
            gallery_videos: decode_list(value.gallery_videos.as_deref()),
            title: value.title,
            description: value.description,
            location: value.location,
            duration_days: value.duration_days,
            price: value.price,
            max_guests: value.max_guests,
            image_url: value.image_url,
            is_featured: value.is_featured,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = tours, treat_none_as_null = true)]
struct TourRow<'a> {
    title: &'a str,
    description: Option<&'a str>,
    location: &'a str,
    duration_days: i32,
    price: f64,
    max_guests: i32,
    image_url: Option<&'a str>,
    highlights: Option<String>,
    included: Option<String>,
    gallery_images: Option<String>,
    gallery_videos: Option<String>,
    is_featured: bool,
    is_active: bool,
    updated_at: &'a DateTime<Utc>,
}

impl<'a> TourRow<'a> {
    fn new(record: &'a TourRecord, now: &'a DateTime<Utc>) -> Self {
        Self {
            title: &record.title,
            description: record.description.as_deref(),
            location: &record.location,
            duration_days: record.duration_days,
            price: record.price,
            max_guests: record.max_guests,
            image_url: record.image_url.as_deref(),
            highlights: encode_list(&record.highlights),
            included: encode_list(&record.included),
            gallery_images: encode_list(&record.gallery_images),
            gallery_videos: encode_list(&record.gallery_videos),
            is_featured: record.is_featured,
            is_active: record.is_active,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
struct DbBooking {
    id: i64,
    tour_id: i64,
    guest_name: String,
    guest_email: String,
    guest_phone: String,
    guest_count: i32,
    preferred_date: Option<NaiveDate>,
    message: Option<String>,
    status: String,
    total_price: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbBooking> for Booking {
    type Error = DatabaseError;

    fn try_from(value: DbBooking) -> Result<Self, Self::Error> {
        Ok(Self {
            status: value
                .status
                .parse::<BookingStatus>()
                .map_err(|e| DatabaseError::Query(e.to_string()))?,
            id: value.id,
            tour_id: value.tour_id,
            guest_name: value.guest_name,
            guest_email: value.guest_email,
            guest_phone: value.guest_phone,
            guest_count: value.guest_count,
            preferred_date: value.preferred_date,
            message: value.message,
            total_price: value.total_price,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

type BookingRow = (DbBooking, Option<String>, Option<String>);

fn into_booking_with_tour(row: BookingRow) -> Result<BookingWithTour, DatabaseError> {
    let (booking, tour_title, tour_location) = row;
    Ok(BookingWithTour {
        booking: booking.try_into()?,
        tour_title,
        tour_location,
    })
}

#[derive(Insertable)]
#[diesel(table_name = bookings)]
struct NewBookingRow<'a> {
    tour_id: i64,
    guest_name: &'a str,
    guest_email: &'a str,
    guest_phone: &'a str,
    guest_count: i32,
    preferred_date: Option<NaiveDate>,
    message: Option<&'a str>,
    status: &'a str,
    total_price: f64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = admin_users)]
struct DbAdminUser {
    id: i64,
    username: String,
    email: Option<String>,
    password_hash: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbAdminUser> for AdminUser {
    fn from(value: DbAdminUser) -> Self {
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            password_hash: value.password_hash,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = admin_users)]
struct NewAdminRow<'a> {
    username: &'a str,
    email: Option<&'a str>,
    password_hash: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = admin_sessions)]
struct NewSessionRow<'a> {
    token_hash: &'a str,
    admin_user_id: i64,
    expires_at: &'a DateTime<Utc>,
}

async fn with_connection<T, F>(pool: Pool, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

pub struct PostgresTourStore {
    pool: Pool,
}

impl PostgresTourStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::TourStore for PostgresTourStore {
    async fn list_tours(&self, active_only: bool) -> Result<Vec<Tour>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            let rows = if active_only {
                tours::table
                    .filter(tours::is_active.eq(true))
                    .order((
                        tours::is_featured.desc(),
                        tours::created_at.desc(),
                        tours::id.desc(),
                    ))
                    .select(DbTour::as_select())
                    .load::<DbTour>(conn)
            } else {
                tours::table
                    .order((tours::created_at.desc(), tours::id.desc()))
                    .select(DbTour::as_select())
                    .load::<DbTour>(conn)
            };

            rows.map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(query_error)
        })
        .await
    }

    async fn get_tour(&self, id: i64, active_only: bool) -> Result<Option<Tour>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            tours::table
                .find(id)
                .select(DbTour::as_select())
                .first::<DbTour>(conn)
                .optional()
                .map(|row| {
                    row.filter(|row| row.is_active || !active_only)
                        .map(Into::into)
                })
                .map_err(query_error)
        })
        .await
    }

    async fn create_tour(&self, tour: &TourRecord) -> Result<i64, DatabaseError> {
        let tour = tour.clone();
        with_connection(self.pool.clone(), move |conn| {
            let now = Utc::now();
            diesel::insert_into(tours::table)
                .values(TourRow::new(&tour, &now))
                .returning(tours::id)
                .get_result::<i64>(conn)
                .map_err(query_error)
        })
        .await
    }

    async fn update_tour(&self, id: i64, tour: &TourRecord) -> Result<bool, DatabaseError> {
        let tour = tour.clone();
        with_connection(self.pool.clone(), move |conn| {
            let now = Utc::now();
            diesel::update(tours::table.find(id))
                .set(TourRow::new(&tour, &now))
                .execute(conn)
                .map(|updated| updated > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn delete_tour(&self, id: i64) -> Result<bool, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            diesel::delete(tours::table.find(id))
                .execute(conn)
                .map(|deleted| deleted > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn tour_counts(&self) -> Result<TourCounts, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            let total = tours::table
                .count()
                .get_result::<i64>(conn)
                .map_err(query_error)?;
            let active = tours::table
                .filter(tours::is_active.eq(true))
                .count()
                .get_result::<i64>(conn)
                .map_err(query_error)?;
            Ok(TourCounts { total, active })
        })
        .await
    }
}

pub struct PostgresBookingStore {
    pool: Pool,
}

impl PostgresBookingStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::BookingStore for PostgresBookingStore {
    async fn create_booking(&self, booking: &NewBooking) -> Result<i64, DatabaseError> {
        let booking = booking.clone();
        with_connection(self.pool.clone(), move |conn| {
            let row = NewBookingRow {
                tour_id: booking.tour_id,
                guest_name: &booking.guest_name,
                guest_email: &booking.guest_email,
                guest_phone: &booking.guest_phone,
                guest_count: booking.guest_count,
                preferred_date: booking.preferred_date,
                message: booking.message.as_deref(),
                status: BookingStatus::Pending.as_str(),
                total_price: booking.total_price,
            };

            diesel::insert_into(bookings::table)
                .values(&row)
                .returning(bookings::id)
                .get_result::<i64>(conn)
                .map_err(query_error)
        })
        .await
    }

    async fn get_booking(&self, id: i64) -> Result<Option<BookingWithTour>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            bookings::table
                .left_join(tours::table)
                .filter(bookings::id.eq(id))
                .select((
                    DbBooking::as_select(),
                    tours::title.nullable(),
                    tours::location.nullable(),
                ))
                .first::<BookingRow>(conn)
                .optional()
                .map_err(query_error)?
                .map(into_booking_with_tour)
                .transpose()
        })
        .await
    }

    async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingWithTour>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            let mut query = bookings::table
                .left_join(tours::table)
                .select((
                    DbBooking::as_select(),
                    tours::title.nullable(),
                    tours::location.nullable(),
                ))
                .order((bookings::created_at.desc(), bookings::id.desc()))
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(bookings::status.eq(status.as_str()));
            }

            let rows = query.load::<BookingRow>(conn).map_err(query_error)?;
            rows.into_iter().map(into_booking_with_tour).collect()
        })
        .await
    }

    async fn update_booking_status(
        &self,
        id: i64,
        status: BookingStatus,
    ) -> Result<bool, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            diesel::update(bookings::table.find(id))
                .set((
                    bookings::status.eq(status.as_str()),
                    bookings::updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .map(|updated| updated > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn delete_booking(&self, id: i64) -> Result<bool, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            diesel::delete(bookings::table.find(id))
                .execute(conn)
                .map(|deleted| deleted > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn count_bookings_for_tour(&self, tour_id: i64) -> Result<i64, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            bookings::table
                .filter(bookings::tour_id.eq(tour_id))
                .count()
                .get_result::<i64>(conn)
                .map_err(query_error)
        })
        .await
    }

    async fn booking_counts(&self) -> Result<BookingCounts, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            let per_status = bookings::table
                .group_by(bookings::status)
                .select((bookings::status, count_star()))
                .load::<(String, i64)>(conn)
                .map_err(query_error)?;
            let revenue = bookings::table
                .filter(bookings::status.eq(BookingStatus::Confirmed.as_str()))
                .select(sum(bookings::total_price))
                .get_result::<Option<f64>>(conn)
                .map_err(query_error)?;

            let mut counts = BookingCounts::default();
            for (status, count) in per_status {
                counts.add(&status, count);
            }
            counts.confirmed_revenue = revenue.unwrap_or(0.0);
            Ok(counts)
        })
        .await
    }
}

pub struct PostgresAdminStore {
    pool: Pool,
}

impl PostgresAdminStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::AdminStore for PostgresAdminStore {
    async fn get_admin_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AdminUser>, DatabaseError> {
        let username = username.to_string();
        with_connection(self.pool.clone(), move |conn| {
            admin_users::table
                .filter(admin_users::username.eq(username))
                .select(DbAdminUser::as_select())
                .first::<DbAdminUser>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(query_error)
        })
        .await
    }

    async fn create_admin(&self, admin: &NewAdminUser) -> Result<i64, DatabaseError> {
        let admin = admin.clone();
        with_connection(self.pool.clone(), move |conn| {
            diesel::insert_into(admin_users::table)
                .values(&NewAdminRow {
                    username: &admin.username,
                    email: admin.email.as_deref(),
                    password_hash: &admin.password_hash,
                })
                .returning(admin_users::id)
                .get_result::<i64>(conn)
                .map_err(query_error)
        })
        .await
    }

    async fn count_admins(&self) -> Result<i64, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            admin_users::table
                .count()
                .get_result::<i64>(conn)
                .map_err(query_error)
        })
        .await
    }

    async fn create_session(&self, session: &NewAdminSession) -> Result<(), DatabaseError> {
        let session = session.clone();
        with_connection(self.pool.clone(), move |conn| {
            diesel::insert_into(admin_sessions::table)
                .values(&NewSessionRow {
                    token_hash: &session.token_hash,
                    admin_user_id: session.admin_user_id,
                    expires_at: &session.expires_at,
                })
                .execute(conn)
                .map(|_| ())
                .map_err(query_error)
        })
        .await
    }

    async fn get_admin_by_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AdminUser>, DatabaseError> {
        let token_hash = token_hash.to_string();
        with_connection(self.pool.clone(), move |conn| {
            admin_sessions::table
                .inner_join(admin_users::table)
                .filter(admin_sessions::token_hash.eq(token_hash))
                .filter(admin_sessions::expires_at.gt(now))
                .filter(admin_users::is_active.eq(true))
                .select(DbAdminUser::as_select())
                .first::<DbAdminUser>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(query_error)
        })
        .await
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError> {
        let token_hash = token_hash.to_string();
        with_connection(self.pool.clone(), move |conn| {
            diesel::delete(admin_sessions::table.filter(admin_sessions::token_hash.eq(token_hash)))
                .execute(conn)
                .map(|_| ())
                .map_err(query_error)
        })
        .await
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            diesel::delete(admin_sessions::table.filter(admin_sessions::expires_at.le(now)))
                .execute(conn)
                .map_err(query_error)
        })
        .await
    }
}
