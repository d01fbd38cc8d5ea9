use crate::config::{DatabaseConfig as ConfigDatabaseConfig, DbType as ConfigDbType};
use crate::db::{AdminStore, BookingStore, DatabaseError, TourStore};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "postgres")]
use crate::db::postgres::{PostgresAdminStore, PostgresBookingStore, PostgresTourStore};
#[cfg(feature = "postgres")]
use diesel::RunQueryDsl;
#[cfg(feature = "postgres")]
use diesel::pg::PgConnection;
#[cfg(feature = "postgres")]
use diesel::r2d2::{self, ConnectionManager};

#[cfg(feature = "postgres")]
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::{SqliteAdminStore, SqliteBookingStore, SqliteTourStore};

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "postgres")]
    postgres_pool: Option<Pool>,
    #[cfg(feature = "sqlite")]
    sqlite_path: Option<String>,
    tour_store: Arc<dyn TourStore>,
    booking_store: Arc<dyn BookingStore>,
    admin_store: Arc<dyn AdminStore>,
    db_type: DbType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl From<ConfigDbType> for DbType {
    fn from(value: ConfigDbType) -> Self {
        match value {
            ConfigDbType::Postgres => DbType::Postgres,
            ConfigDbType::Sqlite => DbType::Sqlite,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &ConfigDatabaseConfig) -> Result<Self, DatabaseError> {
        let db_type = DbType::from(config.db_type());

        match db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let manager = ConnectionManager::<PgConnection>::new(config.connection_string());

                let builder = r2d2::Pool::builder()
                    .max_size(config.max_connections().unwrap_or(10))
                    .min_idle(Some(config.min_connections().unwrap_or(1)));

                let pool = builder
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

                info!("using postgres database");
                Ok(Self {
                    tour_store: Arc::new(PostgresTourStore::new(pool.clone())),
                    booking_store: Arc::new(PostgresBookingStore::new(pool.clone())),
                    admin_store: Arc::new(PostgresAdminStore::new(pool.clone())),
                    postgres_pool: Some(pool),
                    #[cfg(feature = "sqlite")]
                    sqlite_path: None,
                    db_type,
                })
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = config.sqlite_path().filter(|p| !p.is_empty()).ok_or_else(|| {
                    DatabaseError::Connection("no sqlite database file configured".to_string())
                })?;
                let path_arc = Arc::new(path.clone());

                info!("using sqlite database at {}", path);
                Ok(Self {
                    #[cfg(feature = "postgres")]
                    postgres_pool: None,
                    tour_store: Arc::new(SqliteTourStore::new(path_arc.clone())),
                    booking_store: Arc::new(SqliteBookingStore::new(path_arc.clone())),
                    admin_store: Arc::new(SqliteAdminStore::new(path_arc)),
                    sqlite_path: Some(path),
                    db_type,
                })
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Connection(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Connection(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        match self.db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let pool = self.postgres_pool.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("postgres pool not initialized".to_string())
                })?;
                Self::migrate_postgres(pool).await
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = self.sqlite_path.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("sqlite path not initialized".to_string())
                })?;
                Self::migrate_sqlite(path).await
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Migration(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Migration(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    #[cfg(feature = "postgres")]
    async fn migrate_postgres(pool: &Pool) -> Result<(), DatabaseError> {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS tours (
                    id BIGSERIAL PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    location TEXT NOT NULL,
                    duration_days INTEGER NOT NULL,
                    price DOUBLE PRECISION NOT NULL,
                    max_guests INTEGER NOT NULL,
                    image_url TEXT,
                    highlights TEXT,
                    included TEXT,
                    gallery_images TEXT,
                    gallery_videos TEXT,
                    is_featured BOOLEAN NOT NULL DEFAULT FALSE,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id BIGSERIAL PRIMARY KEY,
                    tour_id BIGINT NOT NULL REFERENCES tours(id),
                    guest_name TEXT NOT NULL,
                    guest_email TEXT NOT NULL,
                    guest_phone TEXT NOT NULL,
                    guest_count INTEGER NOT NULL,
                    preferred_date DATE,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'confirmed', 'cancelled')),
                    total_price DOUBLE PRECISION NOT NULL,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS admin_users (
                    id BIGSERIAL PRIMARY KEY,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT,
                    password_hash TEXT NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS admin_sessions (
                    id BIGSERIAL PRIMARY KEY,
                    token_hash TEXT NOT NULL UNIQUE,
                    admin_user_id BIGINT NOT NULL REFERENCES admin_users(id) ON DELETE CASCADE,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    expires_at TIMESTAMP WITH TIME ZONE NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_tours_active ON tours(is_active, is_featured)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_tour ON bookings(tour_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_created ON bookings(created_at)",
                "CREATE INDEX IF NOT EXISTS idx_admin_sessions_expires ON admin_sessions(expires_at)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    #[cfg(feature = "sqlite")]
    async fn migrate_sqlite(path: &str) -> Result<(), DatabaseError> {
        use diesel::connection::SimpleConnection;

        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = crate::db::sqlite::establish_connection(&path)?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS tours (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    location TEXT NOT NULL,
                    duration_days INTEGER NOT NULL,
                    price REAL NOT NULL,
                    max_guests INTEGER NOT NULL,
                    image_url TEXT,
                    highlights TEXT,
                    included TEXT,
                    gallery_images TEXT,
                    gallery_videos TEXT,
                    is_featured BOOLEAN NOT NULL DEFAULT 0,
                    is_active BOOLEAN NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tour_id INTEGER NOT NULL REFERENCES tours(id),
                    guest_name TEXT NOT NULL,
                    guest_email TEXT NOT NULL,
                    guest_phone TEXT NOT NULL,
                    guest_count INTEGER NOT NULL,
                    preferred_date TEXT,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'confirmed', 'cancelled')),
                    total_price REAL NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS admin_users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT,
                    password_hash TEXT NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS admin_sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    token_hash TEXT NOT NULL UNIQUE,
                    admin_user_id INTEGER NOT NULL REFERENCES admin_users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    expires_at TEXT NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_tours_active ON tours(is_active, is_featured)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_tour ON bookings(tour_id)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_created ON bookings(created_at)",
                "CREATE INDEX IF NOT EXISTS idx_admin_sessions_expires ON admin_sessions(expires_at)",
            ];

            for statement in statements {
                conn.batch_execute(statement)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn tour_store(&self) -> Arc<dyn TourStore> {
        self.tour_store.clone()
    }

    pub fn booking_store(&self) -> Arc<dyn BookingStore> {
        self.booking_store.clone()
    }

    pub fn admin_store(&self) -> Arc<dyn AdminStore> {
        self.admin_store.clone()
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use tempfile::NamedTempFile;

    use super::{DatabaseManager, DbType};
    use crate::catalog::tests::payload;
    use crate::config::DatabaseConfig;
    use crate::db::{BookingStatus, NewBooking};

    async fn manager(file: &NamedTempFile) -> DatabaseManager {
        let config = DatabaseConfig::sqlite_file(file.path().to_string_lossy());
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        manager
    }

    fn booking_for(tour_id: i64, guest_count: i32, total_price: f64) -> NewBooking {
        NewBooking {
            tour_id,
            guest_name: "Faisal".to_string(),
            guest_email: "faisal@example.com".to_string(),
            guest_phone: "+966 50 111 2222".to_string(),
            guest_count,
            preferred_date: chrono::NaiveDate::from_ymd_opt(2030, 3, 14),
            message: None,
            total_price,
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = manager(&file).await;
        manager.migrate().await.expect("second migrate");
        assert_eq!(manager.db_type(), DbType::Sqlite);
    }

    #[tokio::test]
    async fn sqlite_tour_roundtrip() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = manager(&file).await;
        let tours = manager.tour_store();

        let record = payload().validate().expect("valid payload");
        let id = tours.create_tour(&record).await.expect("create tour");

        let stored = tours.get_tour(id, true).await.unwrap().expect("tour exists");
        assert_eq!(stored.title, "Edge of the World");
        assert_eq!(stored.highlights, vec!["Sunset views", "Camp dinner"]);
        assert!(stored.gallery_images.is_empty());

        let mut hidden = record.clone();
        hidden.is_active = false;
        hidden.description = None;
        assert!(tours.update_tour(id, &hidden).await.unwrap());
        assert!(!tours.update_tour(id + 100, &hidden).await.unwrap());

        assert!(tours.get_tour(id, true).await.unwrap().is_none());
        let updated = tours.get_tour(id, false).await.unwrap().expect("admin view");
        assert_eq!(updated.description, None);
        assert!(tours.list_tours(true).await.unwrap().is_empty());
        assert_eq!(tours.list_tours(false).await.unwrap().len(), 1);

        let counts = tours.tour_counts().await.unwrap();
        assert_eq!((counts.total, counts.active), (1, 0));

        assert!(tours.delete_tour(id).await.unwrap());
        assert!(!tours.delete_tour(id).await.unwrap());
    }

    #[tokio::test]
    async fn public_listing_puts_featured_first() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = manager(&file).await;
        let tours = manager.tour_store();

        let mut plain = payload().validate().unwrap();
        plain.is_featured = false;
        plain.title = "Plain".to_string();
        let mut featured = payload().validate().unwrap();
        featured.title = "Featured".to_string();

        tours.create_tour(&featured).await.unwrap();
        tours.create_tour(&plain).await.unwrap();

        let titles: Vec<String> = tours
            .list_tours(true)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Featured", "Plain"]);

        let admin_titles: Vec<String> = tours
            .list_tours(false)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(admin_titles, vec!["Plain", "Featured"]);
    }

    #[tokio::test]
    async fn sqlite_booking_roundtrip() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = manager(&file).await;
        let tour_id = manager
            .tour_store()
            .create_tour(&payload().validate().unwrap())
            .await
            .unwrap();
        let bookings = manager.booking_store();

        let first = bookings.create_booking(&booking_for(tour_id, 2, 700.0)).await.unwrap();
        let second = bookings.create_booking(&booking_for(tour_id, 1, 350.0)).await.unwrap();

        let fetched = bookings.get_booking(first).await.unwrap().expect("booking");
        assert_eq!(fetched.booking.status, BookingStatus::Pending);
        assert_eq!(fetched.booking.total_price, 700.0);
        assert_eq!(fetched.tour_title.as_deref(), Some("Edge of the World"));
        assert_eq!(fetched.tour_location.as_deref(), Some("Riyadh"));

        let listed = bookings.list_bookings(None).await.unwrap();
        assert_eq!(
            listed.iter().map(|b| b.booking.id).collect::<Vec<_>>(),
            vec![second, first]
        );

        assert!(bookings
            .update_booking_status(first, BookingStatus::Confirmed)
            .await
            .unwrap());
        assert!(!bookings
            .update_booking_status(first + 100, BookingStatus::Confirmed)
            .await
            .unwrap());

        let confirmed = bookings
            .list_bookings(Some(BookingStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].booking.id, first);

        let counts = bookings.booking_counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.confirmed, 1);
        assert_eq!(counts.confirmed_revenue, 700.0);

        assert_eq!(bookings.count_bookings_for_tour(tour_id).await.unwrap(), 2);
        assert!(bookings.delete_booking(second).await.unwrap());
        assert!(!bookings.delete_booking(second).await.unwrap());
    }

    #[tokio::test]
    async fn bookings_keep_their_tour() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = manager(&file).await;
        let tour_id = manager
            .tour_store()
            .create_tour(&payload().validate().unwrap())
            .await
            .unwrap();
        manager
            .booking_store()
            .create_booking(&booking_for(tour_id, 1, 350.0))
            .await
            .unwrap();

        let orphan = manager
            .booking_store()
            .create_booking(&booking_for(tour_id + 50, 1, 350.0))
            .await;
        assert!(orphan.is_err());

        let delete = manager.tour_store().delete_tour(tour_id).await;
        assert!(delete.is_err());
        assert!(manager.tour_store().get_tour(tour_id, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let id = {
            let manager = manager(&file).await;
            manager
                .tour_store()
                .create_tour(&payload().validate().unwrap())
                .await
                .unwrap()
        };

        let reopened = manager(&file).await;
        let tour = reopened.tour_store().get_tour(id, false).await.unwrap();
        assert!(tour.is_some());
    }
}
