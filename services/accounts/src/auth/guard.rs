//! Authorization checks used by handlers.
//!
//! Outcomes map to HTTP as: anonymous caller 401, denial 403, missing
//! resource anywhere on the chain 404, resolver system error 500.
use crate::api::error::{
    ApiError, api_forbidden, api_internal_message, api_not_found, api_unauthorized,
};
use crate::app::AppState;
use crate::observability::{AuthzOutcome, record_authz};
use massok_authz::{AccessError, Identity, PrincipalContext, Resource};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Require an authenticated principal.
pub fn require_principal(identity: &Identity) -> Result<&PrincipalContext, ApiError> {
    identity
        .principal()
        .ok_or_else(|| api_unauthorized("authentication required"))
}

/// Check `action` on the root resource.
pub async fn authorize_root(
    state: &AppState,
    principal: &PrincipalContext,
    action: &str,
) -> Result<(), ApiError> {
    // Resolution stops if the request future is dropped.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    decide(state, &cancel, principal, None, action).await
}

/// Load `resource_type`/`resource_id` through the resolver and check
/// `action` on it. Loading and resolution share one cancellation token and
/// the resolver's per-lookup timeout.
pub async fn authorize_target(
    state: &AppState,
    principal: &PrincipalContext,
    resource_type: &str,
    resource_id: &str,
    action: &str,
) -> Result<(), ApiError> {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let resource = state
        .resolver
        .load(&cancel, resource_type, resource_id)
        .await
        .map_err(|err| access_error(action, err))?;
    decide(state, &cancel, principal, Some(resource), action).await
}

async fn decide(
    state: &AppState,
    cancel: &CancellationToken,
    principal: &PrincipalContext,
    resource: Option<Arc<dyn Resource>>,
    action: &str,
) -> Result<(), ApiError> {
    let decision = state
        .resolver
        .access_allowed(
            cancel,
            resource,
            action,
            &principal.principal_id,
            &principal.roles,
        )
        .await;
    match decision {
        Ok(true) => {
            record_authz(action, AuthzOutcome::Allowed);
            Ok(())
        }
        Ok(false) => {
            record_authz(action, AuthzOutcome::Denied);
            tracing::info!(principal = %principal.principal_id, action, "access denied");
            Err(api_forbidden("not permitted"))
        }
        Err(err) => Err(access_error(action, err)),
    }
}

fn access_error(action: &str, err: AccessError) -> ApiError {
    match err {
        AccessError::NotFound {
            resource_type,
            resource_id,
        } => {
            record_authz(action, AuthzOutcome::NotFound);
            tracing::debug!(
                %resource_type,
                %resource_id,
                action,
                "resource missing during resolution"
            );
            api_not_found(&format!("{resource_type} not found"))
        }
        err => {
            record_authz(action, AuthzOutcome::Error);
            tracing::error!(error = %err, action, "access resolution failed");
            api_internal_message("access resolution failed")
        }
    }
}
