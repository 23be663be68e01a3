use axum::{response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Endpoints {
    auth: String,
    articles: String,
    users: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApiInfo {
    message: String,
    version: String,
    endpoints: Endpoints,
}

#[utoipa::path(
    get,
    path = "/api",
    responses(
        (status = 200, description = "API information", body = ApiInfo)
    ),
    tag = "agapedia"
)]
pub async fn root() -> impl IntoResponse {
    Json(ApiInfo {
        message: "Agapedia API - MediaWiki Integration".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            auth: "/api/auth".to_string(),
            articles: "/api/articles".to_string(),
            users: "/api/users".to_string(),
        },
    })
}
