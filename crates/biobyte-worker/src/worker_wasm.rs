use std::sync::Once;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_web::MakeWebConsoleWriter;
use worker::*;

#[path = "wasm/auth.rs"]
pub mod auth;
#[path = "wasm/brevo.rs"]
pub mod brevo;
#[path = "wasm/db/mod.rs"]
pub mod db;
#[path = "wasm/env.rs"]
pub mod env;
#[path = "wasm/handlers/mod.rs"]
pub mod handlers;
#[path = "wasm/http.rs"]
pub mod http;
#[path = "wasm/limits.rs"]
pub mod limits;
#[path = "wasm/outbound.rs"]
pub mod outbound;
#[path = "wasm/paypal_client.rs"]
pub mod paypal_client;

use http::{app_error_response, json_with_cors, not_found};

static LOGGING: Once = Once::new();

fn init_logging(worker_env: &Env) {
    LOGGING.call_once(|| {
        let filter = env::env_string(worker_env, "RUST_LOG").unwrap_or_else(|| "info".to_string());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .without_time()
            .with_writer(MakeWebConsoleWriter::new());
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt_layer)
            .try_init();
    });
}

/// Routes that must answer their caller even when a client IP is over budget.
fn exempt_from_api_limit(path: &str) -> bool {
    matches!(path, "/api/paypal/webhook" | "/api/wechatNotify")
}

async fn enforce_api_limit(req: &Request, env: &Env) -> Option<Result<Response>> {
    let result = match db::db_connect(env).await {
        Ok(conn) => limits::enforce(req, &conn, &crate::rate_limit::API).await,
        Err(e) => Err(e),
    };
    result.err().map(|e| app_error_response(req, &e))
}

#[event(fetch)]
pub async fn fetch(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();
    init_logging(&env);

    if req.method() == Method::Options {
        let resp = Response::empty()?.with_status(204);
        return json_with_cors(&req, resp);
    }

    let url = req.url()?;
    let path = url.path().to_string();
    let method = req.method();

    if method == Method::Get && path == "/health" {
        let body = serde_json::json!({
            "ok": true,
            "service": "biobyte",
        });
        let resp = Response::from_json(&body)?;
        return json_with_cors(&req, resp);
    }

    if method == Method::Post && path == "/v1/admin/migrations/up" {
        return handlers::migrations::handle_migrations_up(&req, &env).await;
    }
    if method == Method::Get && path == "/v1/admin/db/ping" {
        return handlers::admin::handle_db_ping(&req, &env).await;
    }

    if !path.starts_with("/api/") {
        return not_found(&req);
    }
    if !exempt_from_api_limit(&path) {
        if let Some(limited) = enforce_api_limit(&req, &env).await {
            return limited;
        }
    }

    use handlers::{accounts, admin, chat, content, orders, payments};
    match (method, path.as_str()) {
        // Accounts.
        (Method::Post, "/api/send-verification-code") => {
            accounts::handle_send_verification_code(req, &env).await
        }
        (Method::Post, "/api/register") => accounts::handle_register(req, &env).await,
        (Method::Post, "/api/login") => accounts::handle_login(req, &env).await,
        (Method::Get | Method::Post, "/api/auth/logout") => accounts::handle_logout(req, &env).await,
        (Method::Get | Method::Post, "/api/auth/check") => accounts::handle_auth_check(req, &env).await,
        (Method::Get, "/api/user") => accounts::handle_user(req, &env).await,
        (Method::Post, "/api/forgot-password") => accounts::handle_forgot_password(req, &env).await,
        (Method::Post, "/api/reset-password") => accounts::handle_reset_password(req, &env).await,
        (Method::Post, "/api/change-password") => accounts::handle_change_password(req, &env).await,

        // Catalog and content.
        (Method::Get, "/api/check-resource-access") => {
            content::handle_check_resource_access(req, &env).await
        }
        (Method::Get, "/api/getMindmapData") => content::handle_mindmap_data(req, &env).await,
        (Method::Get, "/api/searchMindmap") => content::handle_search_mindmap(req, &env).await,
        (Method::Get, "/api/getViewContent") => content::handle_view_content(req, &env).await,
        (Method::Get, "/api/secure-content") => content::handle_secure_content(req, &env).await,
        (Method::Get, "/api/getResource") => content::handle_get_resource(req, &env).await,
        (Method::Get, "/api/getstudyresourceid") => content::handle_study_resource_id(req, &env).await,
        (Method::Get, "/api/getRandomProducts") => content::handle_random_products(req, &env).await,

        // Orders and payments.
        (Method::Post, "/api/checkout") => orders::handle_checkout(req, &env).await,
        (Method::Get, "/api/orders") => orders::handle_orders(req, &env).await,
        (Method::Post, "/api/resend-order-email") => orders::handle_resend_order_email(req, &env).await,
        (Method::Post, "/api/paypal/create-order") => payments::handle_paypal_create_order(req, &env).await,
        (Method::Post, "/api/paypal/capture-order") => payments::handle_paypal_capture_order(req, &env).await,
        (Method::Post, "/api/paypal/webhook") => payments::handle_paypal_webhook(req, &env).await,
        (Method::Post, "/api/wechatPay") => payments::handle_wechat_pay(req, &env).await,
        (Method::Post, "/api/wechatNotify") => payments::handle_wechat_notify(req, &env).await,

        // Admin portal.
        (Method::Get, "/api/admin/verify") => admin::handle_verify(req, &env).await,
        (Method::Get, "/api/admin/users") => admin::handle_users(req, &env).await,
        (Method::Get, "/api/admin/resources") => admin::handle_resources(req, &env).await,
        (Method::Post, "/api/admin/grant-membership") => admin::handle_grant_membership(req, &env).await,
        (Method::Post, "/api/admin/grant-resource") => admin::handle_grant_resource(req, &env).await,

        (Method::Post, "/api/chat") => chat::handle_chat(req, &env).await,

        _ => not_found(&req),
    }
}
