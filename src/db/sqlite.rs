use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use diesel::connection::SimpleConnection;
use diesel::dsl::{count_star, sql, sum};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::catalog::{decode_list, encode_list};
use crate::db::schema_sqlite::{admin_sessions, admin_users, bookings, tours};

use super::{
    DatabaseError,
    error::query_error,
    models::{
        AdminUser, Booking, BookingCounts, BookingStatus, BookingWithTour, NewAdminSession,
        NewAdminUser, NewBooking, Tour, TourCounts, TourRecord,
    },
};

const DATE_FORMAT: &str = "%Y-%m-%d";

// Fixed width so text comparisons order the same way as the instants.
fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {}", e)))
}

fn string_to_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DatabaseError::Query(format!("invalid date format: {}", e)))
}

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
    created_at: String,
    updated_at: String,
}

impl DbTour {
    fn into_tour(self) -> Result<Tour, DatabaseError> {
        Ok(Tour {
            id: self.id,
            highlights: decode_list(self.highlights.as_deref()),
            included: decode_list(self.included.as_deref()),
            gallery_images: decode_list(self.gallery_images.as_deref()),
            gallery_videos: decode_list(self.gallery_videos.as_deref()),
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
            title: self.title,
            description: self.description,
            location: self.location,
            duration_days: self.duration_days,
            price: self.price,
            max_guests: self.max_guests,
            image_url: self.image_url,
            is_featured: self.is_featured,
            is_active: self.is_active,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = tours)]
struct NewTourRow<'a> {
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
    created_at: String,
    updated_at: String,
}

impl<'a> NewTourRow<'a> {
    fn new(record: &'a TourRecord, now: &DateTime<Utc>) -> Self {
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
            created_at: datetime_to_string(now),
            updated_at: datetime_to_string(now),
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = tours, treat_none_as_null = true)]
struct UpdateTourRow<'a> {
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
    updated_at: String,
}

impl<'a> UpdateTourRow<'a> {
    fn new(record: &'a TourRecord, now: &DateTime<Utc>) -> Self {
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
            updated_at: datetime_to_string(now),
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
    preferred_date: Option<String>,
    message: Option<String>,
    status: String,
    total_price: f64,
    created_at: String,
    updated_at: String,
}

impl DbBooking {
    fn into_booking(self) -> Result<Booking, DatabaseError> {
        Ok(Booking {
            id: self.id,
            tour_id: self.tour_id,
            preferred_date: self.preferred_date.as_deref().map(string_to_date).transpose()?,
            status: self
                .status
                .parse::<BookingStatus>()
                .map_err(|e| DatabaseError::Query(e.to_string()))?,
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
            guest_name: self.guest_name,
            guest_email: self.guest_email,
            guest_phone: self.guest_phone,
            guest_count: self.guest_count,
            message: self.message,
            total_price: self.total_price,
        })
    }
}

type BookingRow = (DbBooking, Option<String>, Option<String>);

fn into_booking_with_tour(row: BookingRow) -> Result<BookingWithTour, DatabaseError> {
    let (booking, tour_title, tour_location) = row;
    Ok(BookingWithTour {
        booking: booking.into_booking()?,
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
    preferred_date: Option<String>,
    message: Option<&'a str>,
    status: &'a str,
    total_price: f64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = admin_users)]
struct DbAdminUser {
    id: i64,
    username: String,
    email: Option<String>,
    password_hash: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl DbAdminUser {
    fn into_admin_user(self) -> Result<AdminUser, DatabaseError> {
        Ok(AdminUser {
            id: self.id,
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_active: self.is_active,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = admin_users)]
struct NewAdminRow<'a> {
    username: &'a str,
    email: Option<&'a str>,
    password_hash: &'a str,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = admin_sessions)]
struct NewSessionRow<'a> {
    token_hash: &'a str,
    admin_user_id: i64,
    created_at: String,
    expires_at: String,
}

pub(crate) fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    let mut conn =
        SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))?;
    conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    Ok(conn)
}

async fn with_connection<T, F>(db_path: Arc<String>, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = establish_connection(&db_path)?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

fn last_insert_id(conn: &mut SqliteConnection) -> QueryResult<i64> {
    diesel::select(sql::<BigInt>("last_insert_rowid()")).get_result(conn)
}

pub struct SqliteTourStore {
    db_path: Arc<String>,
}

impl SqliteTourStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::TourStore for SqliteTourStore {
    async fn list_tours(&self, active_only: bool) -> Result<Vec<Tour>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
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
            }
            .map_err(query_error)?;

            rows.into_iter().map(DbTour::into_tour).collect()
        })
        .await
    }

    async fn get_tour(&self, id: i64, active_only: bool) -> Result<Option<Tour>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            tours::table
                .find(id)
                .select(DbTour::as_select())
                .first::<DbTour>(conn)
                .optional()
                .map_err(query_error)?
                .filter(|row| row.is_active || !active_only)
                .map(DbTour::into_tour)
                .transpose()
        })
        .await
    }

    async fn create_tour(&self, tour: &TourRecord) -> Result<i64, DatabaseError> {
        let tour = tour.clone();
        with_connection(self.db_path.clone(), move |conn| {
            let row = NewTourRow::new(&tour, &Utc::now());
            conn.transaction(|conn| {
                diesel::insert_into(tours::table)
                    .values(&row)
                    .execute(conn)?;
                last_insert_id(conn)
            })
            .map_err(query_error)
        })
        .await
    }

    async fn update_tour(&self, id: i64, tour: &TourRecord) -> Result<bool, DatabaseError> {
        let tour = tour.clone();
        with_connection(self.db_path.clone(), move |conn| {
            diesel::update(tours::table.find(id))
                .set(UpdateTourRow::new(&tour, &Utc::now()))
                .execute(conn)
                .map(|updated| updated > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn delete_tour(&self, id: i64) -> Result<bool, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            diesel::delete(tours::table.find(id))
                .execute(conn)
                .map(|deleted| deleted > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn tour_counts(&self) -> Result<TourCounts, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
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

pub struct SqliteBookingStore {
    db_path: Arc<String>,
}

impl SqliteBookingStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::BookingStore for SqliteBookingStore {
    async fn create_booking(&self, booking: &NewBooking) -> Result<i64, DatabaseError> {
        let booking = booking.clone();
        with_connection(self.db_path.clone(), move |conn| {
            let now = datetime_to_string(&Utc::now());
            let row = NewBookingRow {
                tour_id: booking.tour_id,
                guest_name: &booking.guest_name,
                guest_email: &booking.guest_email,
                guest_phone: &booking.guest_phone,
                guest_count: booking.guest_count,
                preferred_date: booking
                    .preferred_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                message: booking.message.as_deref(),
                status: BookingStatus::Pending.as_str(),
                total_price: booking.total_price,
                created_at: now.clone(),
                updated_at: now,
            };

            conn.transaction(|conn| {
                diesel::insert_into(bookings::table)
                    .values(&row)
                    .execute(conn)?;
                last_insert_id(conn)
            })
            .map_err(query_error)
        })
        .await
    }

    async fn get_booking(&self, id: i64) -> Result<Option<BookingWithTour>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
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
        with_connection(self.db_path.clone(), move |conn| {
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
        with_connection(self.db_path.clone(), move |conn| {
            diesel::update(bookings::table.find(id))
                .set((
                    bookings::status.eq(status.as_str()),
                    bookings::updated_at.eq(datetime_to_string(&Utc::now())),
                ))
                .execute(conn)
                .map(|updated| updated > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn delete_booking(&self, id: i64) -> Result<bool, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            diesel::delete(bookings::table.find(id))
                .execute(conn)
                .map(|deleted| deleted > 0)
                .map_err(query_error)
        })
        .await
    }

    async fn count_bookings_for_tour(&self, tour_id: i64) -> Result<i64, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            bookings::table
                .filter(bookings::tour_id.eq(tour_id))
                .count()
                .get_result::<i64>(conn)
                .map_err(query_error)
        })
        .await
    }

    async fn booking_counts(&self) -> Result<BookingCounts, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
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

pub struct SqliteAdminStore {
    db_path: Arc<String>,
}

impl SqliteAdminStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::AdminStore for SqliteAdminStore {
    async fn get_admin_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AdminUser>, DatabaseError> {
        let username = username.to_string();
        with_connection(self.db_path.clone(), move |conn| {
            admin_users::table
                .filter(admin_users::username.eq(username))
                .select(DbAdminUser::as_select())
                .first::<DbAdminUser>(conn)
                .optional()
                .map_err(query_error)?
                .map(DbAdminUser::into_admin_user)
                .transpose()
        })
        .await
    }

    async fn create_admin(&self, admin: &NewAdminUser) -> Result<i64, DatabaseError> {
        let admin = admin.clone();
        with_connection(self.db_path.clone(), move |conn| {
            let now = datetime_to_string(&Utc::now());
            let row = NewAdminRow {
                username: &admin.username,
                email: admin.email.as_deref(),
                password_hash: &admin.password_hash,
                is_active: true,
                created_at: now.clone(),
                updated_at: now,
            };

            conn.transaction(|conn| {
                diesel::insert_into(admin_users::table)
                    .values(&row)
                    .execute(conn)?;
                last_insert_id(conn)
            })
            .map_err(query_error)
        })
        .await
    }

    async fn count_admins(&self) -> Result<i64, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            admin_users::table
                .count()
                .get_result::<i64>(conn)
                .map_err(query_error)
        })
        .await
    }

    async fn create_session(&self, session: &NewAdminSession) -> Result<(), DatabaseError> {
        let session = session.clone();
        with_connection(self.db_path.clone(), move |conn| {
            diesel::insert_into(admin_sessions::table)
                .values(&NewSessionRow {
                    token_hash: &session.token_hash,
                    admin_user_id: session.admin_user_id,
                    created_at: datetime_to_string(&Utc::now()),
                    expires_at: datetime_to_string(&session.expires_at),
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
        with_connection(self.db_path.clone(), move |conn| {
            admin_sessions::table
                .inner_join(admin_users::table)
                .filter(admin_sessions::token_hash.eq(token_hash))
                .filter(admin_sessions::expires_at.gt(datetime_to_string(&now)))
                .filter(admin_users::is_active.eq(true))
                .select(DbAdminUser::as_select())
                .first::<DbAdminUser>(conn)
                .optional()
                .map_err(query_error)?
                .map(DbAdminUser::into_admin_user)
                .transpose()
        })
        .await
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError> {
        let token_hash = token_hash.to_string();
        with_connection(self.db_path.clone(), move |conn| {
            diesel::delete(admin_sessions::table.filter(admin_sessions::token_hash.eq(token_hash)))
                .execute(conn)
                .map(|_| ())
                .map_err(query_error)
        })
        .await
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            diesel::delete(
                admin_sessions::table
                    .filter(admin_sessions::expires_at.le(datetime_to_string(&now))),
            )
            .execute(conn)
            .map_err(query_error)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_as_text() {
        let earlier = DateTime::parse_from_rfc3339("2030-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = earlier + chrono::Duration::milliseconds(1500);

        let (a, b) = (datetime_to_string(&earlier), datetime_to_string(&later));
        assert_eq!(a, "2030-01-01T09:00:00.000000Z");
        assert!(a < b);
        assert_eq!(string_to_datetime(&b).unwrap(), later);
    }

    #[test]
    fn rejects_malformed_stored_values() {
        assert!(string_to_datetime("yesterday").is_err());
        assert!(string_to_date("14/03/2030").is_err());
        assert_eq!(
            string_to_date("2030-03-14").unwrap(),
            NaiveDate::from_ymd_opt(2030, 3, 14).unwrap()
        );
    }
}
