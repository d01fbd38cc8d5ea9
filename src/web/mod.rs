use std::sync::Arc;

use anyhow::Result;
use salvo::affix_state;
use salvo::cors::{AllowHeaders, AllowOrigin, Cors};
use salvo::http::header::{AUTHORIZATION, CONTENT_TYPE};
use salvo::http::request::SecureMaxSize;
use salvo::http::{HeaderValue, Method};
use salvo::logging::Logger;
use salvo::prelude::*;
use salvo::serve_static::StaticDir;
use tracing::info;

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{BookingStore, DatabaseManager, TourStore};
use crate::media::{MediaHandler, MediaStore};

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;

pub use self::error::ApiError;

use self::handlers::{admin, files, public};
use self::metrics::metrics_endpoint;
use self::middleware::auth::require_admin;

/// Shared request state, injected into every request's depot.
#[derive(Clone)]
pub struct WebState {
    pub config: Arc<Config>,
    pub tours: Arc<dyn TourStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub auth: AuthService,
    pub media: MediaHandler,
}

impl WebState {
    pub fn new(
        config: Arc<Config>,
        db_manager: &DatabaseManager,
        media_store: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            tours: db_manager.tour_store(),
            bookings: db_manager.booking_store(),
            auth: AuthService::new(db_manager.admin_store(), &config.session),
            media: MediaHandler::new(media_store, config.storage.clone()),
            config,
        }
    }
}

pub fn web_state(depot: &Depot) -> Result<&WebState, ApiError> {
    depot
        .obtain::<WebState>()
        .map_err(|_| ApiError::Internal("web state is not initialized".to_string()))
}

/// Multipart framing allowance on top of the largest accepted file.
const UPLOAD_OVERHEAD_BYTES: u64 = 64 * 1024;

fn api_router(upload_limit: u64) -> Router {
    Router::with_path("api")
        .push(Router::with_path("health").get(public::health_check))
        .push(
            Router::with_path("tours")
                .get(public::list_tours)
                .push(Router::with_path("{id}").get(public::get_tour)),
        )
        .push(Router::with_path("bookings").post(public::create_booking))
        .push(Router::with_path("files/{**path}").get(files::serve_file))
        .push(
            Router::with_path("admin")
                .push(Router::with_path("login").post(admin::login))
                .push(Router::with_path("logout").post(admin::logout))
                .push(
                    Router::new()
                        .hoop(require_admin)
                        .push(Router::with_path("me").get(admin::me))
                        .push(Router::with_path("stats").get(admin::stats))
                        .push(
                            Router::with_path("tours")
                                .get(admin::list_tours)
                                .post(admin::create_tour)
                                .push(
                                    Router::with_path("{id}")
                                        .put(admin::update_tour)
                                        .delete(admin::delete_tour),
                                ),
                        )
                        .push(
                            Router::with_path("bookings")
                                .get(admin::list_bookings)
                                .push(
                                    Router::with_path("{id}")
                                        .get(admin::get_booking)
                                        .put(admin::update_booking)
                                        .delete(admin::delete_booking),
                                ),
                        )
                        .push(
                            Router::with_path("upload")
                                .hoop(SecureMaxSize(upload_limit as usize))
                                .post(files::upload),
                        )
                        .push(Router::with_path("files/{**path}").delete(files::delete_file)),
                ),
        )
        .push(Router::with_path("{**rest}").goal(public::api_not_found))
}

pub fn create_router(state: WebState) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    let storage = &state.config.storage;
    let upload_limit =
        storage.max_image_bytes.max(storage.max_video_bytes) + UPLOAD_OVERHEAD_BYTES;

    let mut router = Router::new()
        .hoop(affix_state::inject(state))
        .push(Router::with_path("metrics").get(metrics_endpoint))
        .push(api_router(upload_limit));

    if let Some(dir) = static_dir {
        info!("serving front end from {}", dir.display());
        router = router.push(
            Router::with_path("{**path}").get(
                StaticDir::new([dir])
                    .defaults("index.html")
                    .fallback("index.html"),
            ),
        );
    }

    router
}

fn cors_handler(origins: &[String]) -> Cors {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    Cors::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([CONTENT_TYPE, AUTHORIZATION]))
        .allow_credentials(true)
}

pub fn create_service(state: WebState) -> Service {
    let origins = state.config.server.cors_origins.clone();
    let service = Service::new(create_router(state)).hoop(Logger::new());

    if origins.is_empty() {
        service
    } else {
        service.hoop(cors_handler(&origins).into_handler())
    }
}

#[derive(Clone)]
pub struct WebServer {
    state: WebState,
}

impl WebServer {
    pub fn new(state: WebState) -> Self {
        Self { state }
    }

    pub async fn start(&self) -> Result<()> {
        let server_config = &self.state.config.server;
        let bind_addr = format!("{}:{}", server_config.bind_address, server_config.port);
        info!("Starting web server on {}", bind_addr);
        if let Some(public_url) = &server_config.public_url {
            info!("public URL is {}", public_url);
        }

        let acceptor = TcpListener::new(bind_addr).bind().await;
        let server = Server::new(acceptor);
        let handle = server.handle();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested, draining connections");
                handle.stop_graceful(None);
            }
        });

        server.serve(create_service(self.state.clone())).await;
        info!("web server stopped");

        Ok(())
    }
}
