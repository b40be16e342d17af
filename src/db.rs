pub mod activation_repo;
pub use activation_repo::ActivationRepository;
pub mod audit_repo;
pub use audit_repo::AuditRepository;
pub mod order_repo;
pub use order_repo::OrderRepository;
pub mod qr_repo;
pub use qr_repo::QrCodeRepository;
pub mod tenancy_repo;
pub use tenancy_repo::TenantRepository;
pub mod tracking_repo;
pub use tracking_repo::TrackingRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
