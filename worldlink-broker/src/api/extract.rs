//! Extractors that translate axum's own extraction failures into
//! [`ApiError`], so a missing or malformed parameter produces the same JSON
//! error contract as every other rejection instead of axum's default
//! plain-text rejection body.

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::errors::ApiError;

/// Wraps [`axum::extract::Query`], mapping a rejection to [`ApiError`].
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| rejection_to_api_error(&rejection.to_string()))?;
        Ok(Self(value))
    }
}

/// Wraps [`axum::Json`], mapping a rejection to [`ApiError`].
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| rejection_to_api_error(&rejection.to_string()))?;
        Ok(Self(value))
    }
}

/// `serde`'s "missing field `name`" text is the one stable signal that
/// distinguishes an absent required parameter from any other malformed
/// input; everything else falls back to a generic validation rejection.
fn rejection_to_api_error(message: &str) -> ApiError {
    match missing_field_name(message) {
        Some(name) => ApiError::MissingParameter(name),
        None => ApiError::ValidationRejected {
            error: message.to_owned(),
            suggestion: None,
        },
    }
}

fn missing_field_name(message: &str) -> Option<String> {
    let after = message.find("missing field `")? + "missing field `".len();
    let rest = &message[after..];
    let end = rest.find('`')?;
    Some(rest[..end].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_missing_field_name_in_query_rejection_text() {
        let msg = "Failed to deserialize query string: missing field `clientId`";
        assert_eq!(missing_field_name(msg), Some("clientId".to_owned()));
    }

    #[test]
    fn finds_missing_field_name_in_json_rejection_text() {
        let msg = "Failed to deserialize the JSON body: missing field `clientId` at line 1 column 40";
        assert_eq!(missing_field_name(msg), Some("clientId".to_owned()));
    }

    #[test]
    fn falls_through_for_non_missing_field_rejections() {
        assert_eq!(missing_field_name("invalid type: found string \"x\", expected u32"), None);
    }
}
