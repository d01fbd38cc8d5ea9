use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;
use salvo::http::HeaderValue;
use salvo::http::header::CONTENT_TYPE;
use salvo::prelude::*;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

static BOOKINGS_CREATED: AtomicU64 = AtomicU64::new(0);
static BOOKINGS_REJECTED: AtomicU64 = AtomicU64::new(0);
static ADMIN_LOGINS_SUCCESS: AtomicU64 = AtomicU64::new(0);
static ADMIN_LOGINS_FAILED: AtomicU64 = AtomicU64::new(0);
static UPLOADS_STORED: AtomicU64 = AtomicU64::new(0);
static UPLOADS_REJECTED: AtomicU64 = AtomicU64::new(0);

pub struct Metrics;

impl Metrics {
    /// Pins the uptime origin; called once at startup.
    pub fn init() {
        Lazy::force(&STARTED_AT);
    }

    pub fn booking_created() {
        BOOKINGS_CREATED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn booking_rejected() {
        BOOKINGS_REJECTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_success() {
        ADMIN_LOGINS_SUCCESS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed() {
        ADMIN_LOGINS_FAILED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_stored() {
        UPLOADS_STORED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_rejected() {
        UPLOADS_REJECTED.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn format_prometheus() -> String {
    let uptime = STARTED_AT.elapsed().as_secs();
    let bookings_created = BOOKINGS_CREATED.load(Ordering::Relaxed);
    let bookings_rejected = BOOKINGS_REJECTED.load(Ordering::Relaxed);
    let logins_success = ADMIN_LOGINS_SUCCESS.load(Ordering::Relaxed);
    let logins_failed = ADMIN_LOGINS_FAILED.load(Ordering::Relaxed);
    let uploads_stored = UPLOADS_STORED.load(Ordering::Relaxed);
    let uploads_rejected = UPLOADS_REJECTED.load(Ordering::Relaxed);

    format!(
        r#"# HELP tour_booking_uptime_seconds Number of seconds the server has been running
# TYPE tour_booking_uptime_seconds gauge
tour_booking_uptime_seconds {}

# HELP bookings_created_total Booking requests stored
# TYPE bookings_created_total counter
bookings_created_total {}

# HELP bookings_rejected_total Booking requests rejected by validation
# TYPE bookings_rejected_total counter
bookings_rejected_total {}

# HELP admin_logins_success_total Successful back-office logins
# TYPE admin_logins_success_total counter
admin_logins_success_total {}

# HELP admin_logins_failed_total Rejected back-office logins
# TYPE admin_logins_failed_total counter
admin_logins_failed_total {}

# HELP media_uploads_total Media files stored
# TYPE media_uploads_total counter
media_uploads_total {}

# HELP media_uploads_rejected_total Media uploads refused for type or size
# TYPE media_uploads_rejected_total counter
media_uploads_rejected_total {}
"#,
        uptime,
        bookings_created,
        bookings_rejected,
        logins_success,
        logins_failed,
        uploads_stored,
        uploads_rejected,
    )
}

#[handler]
pub async fn metrics_endpoint(res: &mut Response) {
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    res.body(format_prometheus());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_increments_counters() {
        let before = BOOKINGS_CREATED.load(Ordering::Relaxed);
        let failed_before = ADMIN_LOGINS_FAILED.load(Ordering::Relaxed);

        Metrics::booking_created();
        Metrics::login_failed();

        assert!(BOOKINGS_CREATED.load(Ordering::Relaxed) > before);
        assert!(ADMIN_LOGINS_FAILED.load(Ordering::Relaxed) > failed_before);
    }

    #[test]
    fn format_prometheus_includes_all_metrics() {
        let output = format_prometheus();
        assert!(output.contains("tour_booking_uptime_seconds"));
        assert!(output.contains("bookings_created_total"));
        assert!(output.contains("bookings_rejected_total"));
        assert!(output.contains("admin_logins_failed_total"));
        assert!(output.contains("media_uploads_rejected_total"));
    }
}
