use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Rejects requests without a valid operator or admin bearer token.
pub async fn operator_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let operator = validate_token(token, &config.operator_jwt_secret).map_err(AppError::Auth)?;

    if !operator.can_operate() {
        return Err(AppError::Forbidden(format!(
            "role {:?} may not perform operator actions",
            operator.role
        )));
    }

    request.extensions_mut().insert(operator);

    Ok(next.run(request).await)
}
