pub mod app_config;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod orders;
pub mod password;
pub mod shipping;
pub mod users;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use cart::{validate_add_quantity, CartUpdate, MAX_LINE_QUANTITY};
pub use catalog::{load_catalog, max_price, round_price, slugify, CatalogFile, ProductSeed, SlugCandidates};
pub use checkout::{price_lines, quote_order, CheckoutQuote, CustomerDetails, PricedLine, ProductSnapshot};
pub use config::{load_app_config, load_app_config_from_env};
pub use orders::OrderStatus;
pub use shipping::{delivery_fee, shipping_cities, ShippingCity, DEFAULT_DELIVERY_FEE_CENTS};
pub use users::{normalize_email, NewAccount, Role};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(#[from] serde_yaml::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid order status: {0}")]
    InvalidOrderStatus(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("{0}")]
    Validation(String),
}
