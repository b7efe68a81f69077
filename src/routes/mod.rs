use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{admin, auth, bookings, movies, payment};
use crate::middleware::auth::{auth_middleware, optional_auth_middleware, require_admin};
use crate::middleware::rate_limit::create_public_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // IP-based governor for routes reachable without authentication
    let public_governor = create_public_governor();

    // Public routes (with rate limiting per IP)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    // Public catalog routes
    let movie_routes = Router::new()
        .route("/movies", get(movies::list_movies))
        .route("/movies/{id}", get(movies::get_movie))
        .layer(public_governor.clone());

    // Booking routes are open to guests; a valid bearer token attaches the
    // caller's identity to the booking.
    let booking_routes = Router::new()
        .route("/", post(bookings::create_booking))
        .route("/{id}", get(bookings::get_booking))
        .route("/{id}/complete-card", put(bookings::complete_card_payment))
        .route(
            "/status/{movie_id}/{showtime}",
            get(bookings::reserved_seats),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ))
        .layer(public_governor.clone());

    // Payment routes; the callbacks are entered by the gateway's redirect
    let payment_routes = Router::new()
        .route("/esewa/prepare", post(payment::prepare_payment))
        .route(
            "/esewa/callback/success",
            get(payment::esewa_success_callback),
        )
        .route(
            "/esewa/callback/failure",
            get(payment::esewa_failure_callback),
        )
        .layer(public_governor);

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        // Movie catalog management
        .route("/movies", post(admin::create_movie))
        .route("/movies/{id}", put(admin::update_movie))
        .route("/movies/{id}", delete(admin::delete_movie))
        // Booking oversight
        .route("/bookings", get(admin::list_all_bookings))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", movie_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/payment", payment_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
}
