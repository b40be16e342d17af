// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        ActivationRepository, AuditRepository, OrderRepository, QrCodeRepository,
        TenantRepository, TrackingRepository, UserRepository,
    },
    services::{
        activation::ActivationService,
        auth::AuthService,
        location::{LocationService, ThrottleConfig},
        order_creation::{OrderCreationService, PgCreationStore, PngQrRenderer},
        qr_lifecycle::QrLifecycleService,
        signature::SignatureService,
        storage::{build_client, ObjectStorage, S3Storage},
    },
};

// Toda a configuração vem do ambiente, lida UMA vez no startup.
// Variável obrigatória ausente derruba o processo antes de aceitar tráfego.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    // Segredo do HMAC dos QR Codes; nunca sai do processo.
    pub qr_signing_secret: String,
    pub storage_bucket: String,
    pub storage_public_url: String,
    pub aws_region: String,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub throttle: ThrottleConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let qr_signing_secret =
            env::var("QR_SIGNING_SECRET").context("QR_SIGNING_SECRET deve ser definido")?;
        let storage_bucket =
            env::var("STORAGE_BUCKET").context("STORAGE_BUCKET deve ser definido")?;
        let storage_public_url =
            env::var("STORAGE_PUBLIC_URL").context("STORAGE_PUBLIC_URL deve ser definida")?;

        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let mut throttle = ThrottleConfig::default();
        if let Ok(value) = env::var("LOCATION_MIN_INTERVAL_SECS") {
            throttle.min_interval_secs = value
                .parse()
                .context("LOCATION_MIN_INTERVAL_SECS deve ser um inteiro")?;
        }
        if let Ok(value) = env::var("LOCATION_MIN_DISTANCE_M") {
            throttle.min_distance_m = value
                .parse()
                .context("LOCATION_MIN_DISTANCE_M deve ser um número")?;
        }

        Ok(Self {
            database_url,
            jwt_secret,
            qr_signing_secret,
            storage_bucket,
            storage_public_url,
            aws_region,
            aws_endpoint_url: env::var("AWS_ENDPOINT_URL").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            throttle,
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação.
// Nada de singleton implícito: o grafo de dependências é montado aqui e
// injetado via State nos handlers.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub audit_repo: AuditRepository,
    pub tenant_repo: TenantRepository,
    pub auth_service: AuthService,
    pub signature_service: SignatureService,
    pub qr_lifecycle_service: QrLifecycleService,
    pub activation_service: ActivationService,
    pub order_creation_service: OrderCreationService,
    pub location_service: LocationService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = AppConfig::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let s3_client = build_client(&config).await?;
        let storage: Arc<dyn ObjectStorage> = Arc::new(S3Storage::new(
            s3_client,
            config.storage_bucket.clone(),
            config.storage_public_url.clone(),
        ));

        // --- Monta o grafo de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let order_repo = OrderRepository::new(db_pool.clone());
        let qr_repo = QrCodeRepository::new(db_pool.clone());
        let activation_repo = ActivationRepository::new(db_pool.clone());
        let tracking_repo = TrackingRepository::new(db_pool.clone());
        let audit_repo = AuditRepository::new(db_pool.clone());
        let tenant_repo = TenantRepository::new(db_pool.clone());

        let signature_service = SignatureService::new(config.qr_signing_secret.clone());
        let auth_service = AuthService::new(user_repo.clone(), config.jwt_secret.clone());
        let qr_lifecycle_service = QrLifecycleService::new(
            order_repo.clone(),
            activation_repo.clone(),
            audit_repo.clone(),
            signature_service.clone(),
        );
        let activation_service = ActivationService::new(
            order_repo.clone(),
            activation_repo.clone(),
            audit_repo.clone(),
        );
        let order_creation_service = OrderCreationService::new(
            Arc::new(PgCreationStore::new(order_repo.clone(), qr_repo.clone())),
            storage,
            Arc::new(PngQrRenderer),
            signature_service.clone(),
        );
        let location_service = LocationService::new(
            order_repo,
            tracking_repo,
            user_repo,
            audit_repo.clone(),
            config.throttle,
        );

        Ok(Self {
            db_pool,
            audit_repo,
            tenant_repo,
            auth_service,
            signature_service,
            qr_lifecycle_service,
            activation_service,
            order_creation_service,
            location_service,
        })
    }
}
