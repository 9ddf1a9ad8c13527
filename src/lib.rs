/// Axum-based REST surface: router, extractors, handlers, error mapping.
pub mod api;
/// Password hashing and token key helpers.
pub mod auth;
/// Layered configuration (config.toml + TRACKD__* env overrides).
pub mod config;
/// SeaORM entities, the repository, and enum column types.
pub mod db;
