//! Route definitions for the Retail POS platform

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login is public)
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes
        .nest("/users", user_routes(state.clone()))
        .nest("/branches", branch_routes(state.clone()))
        .nest("/categories", category_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        .nest("/product-sale-branches", price_routes(state.clone()))
        .nest("/payment-methods", payment_method_routes(state.clone()))
        .nest("/customers", customer_routes(state.clone()))
        .nest("/customer-groups", customer_group_routes(state.clone()))
        .nest("/orders", order_routes(state.clone()))
        .nest("/stocks", stock_routes(state.clone()))
        .nest("/stock-histories", stock_history_routes(state.clone()))
        .nest("/deliveries", delivery_routes(state))
}

fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .merge(protected)
}

fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/:id", get(handlers::get_user))
        .route("/branch/:branch_id", get(handlers::list_users_by_branch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn branch_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_branches).post(handlers::create_branch),
        )
        .route("/:id", put(handlers::update_branch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn category_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/:id",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:id",
            get(handlers::get_product).put(handlers::update_product),
        )
        .route("/:id/retire", patch(handlers::retire_product))
        .route("/:id/restore", patch(handlers::restore_product))
        .route("/branch/:branch_id", get(handlers::list_products_by_branch))
        .route(
            "/branch/:branch_id/unpriced",
            get(handlers::list_unpriced_products_by_branch),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn price_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", put(handlers::set_sell_price))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn payment_method_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_payment_methods).post(handlers::create_payment_method),
        )
        .route(
            "/:id",
            put(handlers::update_payment_method).delete(handlers::remove_payment_method),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn customer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_customer))
        .route(
            "/:id",
            get(handlers::get_customer).put(handlers::update_customer),
        )
        .route("/branch/:branch_id", get(handlers::list_customers_by_branch))
        .route(
            "/branch/:branch_id/user/:user_id",
            get(handlers::list_customers_by_branch_and_user),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn customer_group_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_customer_groups).post(handlers::create_customer_group),
        )
        .route("/:id", put(handlers::update_customer_group))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/create", post(handlers::create_order))
        .route("/confirm", put(handlers::confirm_order))
        .route("/:id", get(handlers::get_order))
        .route("/:id/cancel", delete(handlers::cancel_order))
        .route("/branch/:branch_id", get(handlers::list_orders_by_branch))
        .route("/user/:user_id", get(handlers::list_orders_by_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/add", post(handlers::record_stock_in))
        .route("/branch/:branch_id", get(handlers::list_stocks_by_branch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn stock_history_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/branch/:branch_id", get(handlers::list_stock_in_histories))
        .route(
            "/out/branch/:branch_id",
            get(handlers::list_stock_out_histories),
        )
        .route(
            "/cancel/branch/:branch_id/:stock_in_history_id",
            patch(handlers::cancel_stock_in),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn delivery_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:order_id", post(handlers::create_delivery))
        .route("/:order_id/drivers", post(handlers::add_drivers))
        .route("/:order_id/done", patch(handlers::complete_delivery))
        .route(
            "/branch/:branch_id",
            get(handlers::list_deliveries_by_branch),
        )
        .route(
            "/branch/:branch_id/drivers/available",
            get(handlers::list_available_drivers),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
