//! Per-request authentication layer.
//!
//! Authentication fails open: a request with a bad or missing token proceeds
//! as anonymous and is stopped later by the guard. Only system errors from
//! the session store or user lookups end the request here, with a 500.
use crate::api::error::{ApiError, api_internal_message};
use crate::app::AppState;
use crate::observability::{AuthnOutcome, record_authn};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use massok_authz::{ClientId, TokenType, extract_bearer};
use std::net::SocketAddr;

/// The caller's IP as seen by the listener; empty when the connection info
/// is unavailable, which fails session binding closed.
pub fn client_id(request: &Request) -> ClientId {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| ClientId::new(addr.ip().to_string()))
        .unwrap_or_else(|| ClientId::new(""))
}

/// Bearer token from the `Authorization` header, if well formed.
pub fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
        .map(str::to_string)
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_id(&request);
    let bearer = bearer_token(&request);

    let identity = match state
        .authenticator
        .authenticate(bearer.as_deref(), &client)
        .await
    {
        Ok(identity) => identity,
        Err(err) => {
            record_authn(AuthnOutcome::Error);
            tracing::error!(error = %err, client = %client, "authentication system error");
            return Err(api_internal_message("authentication unavailable"));
        }
    };
    record_authn(match identity.principal() {
        None => AuthnOutcome::Anonymous,
        Some(context) if context.token_type == TokenType::Refresh => AuthnOutcome::Refresh,
        Some(_) => AuthnOutcome::Access,
    });

    request.extensions_mut().insert(client);
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn client_id_uses_peer_ip_without_port() {
        let mut request = Request::new(Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 51234))));
        assert_eq!(client_id(&request), ClientId::new("192.0.2.7"));
    }

    #[test]
    fn missing_connect_info_is_an_empty_client() {
        let request = Request::new(Body::empty());
        assert!(client_id(&request).is_empty());
    }

    #[test]
    fn bearer_token_requires_bearer_scheme() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request).as_deref(), Some("abc.def.ghi"));

        let request = Request::builder()
            .header(AUTHORIZATION, "Token abc")
            .body(Body::empty())
            .unwrap();
        assert!(bearer_token(&request).is_none());
    }
}
