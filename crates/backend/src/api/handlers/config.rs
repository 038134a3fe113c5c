use axum::Json;
use contracts::api::ConfigResponse;

use crate::shared::config::config;

/// GET /api/config
pub async fn get_config() -> Json<ConfigResponse> {
    let cfg = config();
    Json(ConfigResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        categories: cfg.expense.categories.clone(),
        payment_methods: cfg.expense.payment_methods.clone(),
        providers: cfg.vision.providers.clone(),
        default_provider: cfg.vision.default_provider.clone(),
    })
}
