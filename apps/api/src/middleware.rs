use std::str::FromStr;

use atlas_core::{ActorIdentity, AppError, UserId};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiResult;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Resolves the caller from the trusted gateway header.
pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = actor_from_headers(request.headers(), &state.actor_header)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn actor_from_headers(
    headers: &HeaderMap,
    actor_header: &HeaderName,
) -> Result<ActorIdentity, AppError> {
    let name = actor_header.as_str();
    let raw = headers
        .get(actor_header)
        .ok_or_else(|| AppError::Unauthorized(format!("missing '{name}' header")))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("'{name}' header is not ASCII")))?;

    let user_id = UserId::from_str(raw)
        .map_err(|_| AppError::Unauthorized(format!("'{name}' is not a valid user id")))?;

    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    Ok(ActorIdentity::new(user_id, request_id))
}

#[cfg(test)]
mod tests {
    use atlas_core::{AppError, UserId};
    use axum::http::{HeaderMap, HeaderName, HeaderValue};

    use super::actor_from_headers;

    fn actor_header() -> HeaderName {
        HeaderName::from_static("x-actor-id")
    }

    #[test]
    fn resolves_actor_and_request_id() {
        let user_id = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            actor_header(),
            HeaderValue::from_str(user_id.to_string().as_str()).unwrap_or_else(|_| unreachable!()),
        );
        headers.insert("x-request-id", HeaderValue::from_static("req-42"));

        let identity = actor_from_headers(&headers, &actor_header());

        assert!(matches!(
            identity,
            Ok(ref identity) if identity.user_id() == user_id && identity.request_id() == Some("req-42")
        ));
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        let empty = HeaderMap::new();
        assert!(matches!(
            actor_from_headers(&empty, &actor_header()),
            Err(AppError::Unauthorized(_))
        ));

        let mut malformed = HeaderMap::new();
        malformed.insert(actor_header(), HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            actor_from_headers(&malformed, &actor_header()),
            Err(AppError::Unauthorized(_))
        ));
    }
}
