//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() {
    // Inicializa o logger
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas públicas: login, assinatura de QR e documentação.
    // /create-qr-signature fica sem guarda de auth: o contrato dessa rota
    // só conhece 400/500/200.
    let public_routes = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/create-qr-signature", post(handlers::qr::create_qr_signature))
        .route("/api/docs/openapi.json", get(docs::serve_openapi));

    // Rotas do usuário autenticado (app e painel)
    let user_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::get_me))
        .route("/api/tenants/me", get(handlers::auth::get_my_tenant))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Rotas do motorista: scan, ativação, status e rastreamento
    let driver_routes = Router::new()
        .route("/validate-qr-code", post(handlers::qr::validate_qr_code))
        .route("/activate-load", post(handlers::activation::activate_load))
        .route("/update-order-status", post(handlers::qr::update_order_status))
        .route("/start-tracking", post(handlers::tracking::start_tracking))
        .route("/stop-tracking", post(handlers::tracking::stop_tracking))
        .route("/update-location", post(handlers::tracking::update_location))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Rotas do painel: criação de pedido e gestão de contas
    let dispatch_routes = Router::new()
        .route("/order_creation", post(handlers::orders::order_creation))
        .route(
            "/create-driver-account",
            post(handlers::accounts::create_driver_account),
        )
        .route(
            "/reset-driver-password",
            post(handlers::accounts::reset_driver_password),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // CORS permissivo: os apps chamam de origens variadas e o preflight
    // OPTIONS precisa responder 200 em todas as rotas.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Combina tudo no router principal
    let app = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(driver_routes)
        .merge(dispatch_routes)
        .layer(cors)
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
