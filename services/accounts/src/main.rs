//! massok accounts HTTP service entry point.
//!
//! # Purpose
//! Loads configuration, builds signing keys and storage, seeds the admin
//! user, then serves the API and the metrics listener until shutdown.
//!
//! # Notes
//! `build_state` keeps wiring testable without binding sockets.
use accounts::api::now_unix;
use accounts::app::{AppState, build_router};
use accounts::config::{AccountsConfig, AdminSeed, AuthConfig};
use accounts::model::{User, UserRecord};
use accounts::observability;
use accounts::store::memory::InMemoryStore;
use accounts::store::{AccountsStore, StoreError};
use anyhow::Context;
use massok_authz::{
    GLOBAL_ADMIN, KeyRing, KeySet, MemorySessionKeyStore, Roles, SigningKey, TokenKeys, USER_SELF,
    generate_signing_key, hash_password, signing_key_from_hex_seed,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AccountsConfig::from_env_or_yaml().context("accounts config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: AccountsConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("massok-accounts");
    let state = build_state(&config).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "accounts listening");
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        ) => {
            result?;
        }
        _ = &mut shutdown => {
            tracing::info!("accounts shutting down");
        }
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: &AccountsConfig) -> anyhow::Result<AppState> {
    let keys = KeyRing::new(build_token_keys(&config.auth)?).context("token keys")?;
    let store: Arc<dyn AccountsStore> = Arc::new(InMemoryStore::new());
    if let Some(admin) = &config.admin {
        seed_admin(store.as_ref(), admin).await?;
    }
    Ok(AppState::new(
        store,
        Arc::new(MemorySessionKeyStore::new()),
        Arc::new(keys),
        &config.auth,
    ))
}

fn build_token_keys(auth: &AuthConfig) -> anyhow::Result<TokenKeys> {
    let access = signing_key(auth.access_key_seed.as_deref(), "MASSOK_ACCESS_KEY_SEED")?;
    let refresh = signing_key(auth.refresh_key_seed.as_deref(), "MASSOK_REFRESH_KEY_SEED")?;
    Ok(TokenKeys {
        access: KeySet::new(access),
        refresh: KeySet::new(refresh),
    })
}

fn signing_key(seed: Option<&str>, name: &str) -> anyhow::Result<SigningKey> {
    match seed {
        Some(seed) => signing_key_from_hex_seed(seed).with_context(|| format!("parse {name}")),
        None => {
            tracing::warn!(key = name, "no seed configured; tokens will not survive a restart");
            Ok(generate_signing_key())
        }
    }
}

async fn seed_admin(store: &dyn AccountsStore, admin: &AdminSeed) -> anyhow::Result<()> {
    match store.find_user_by_email(&admin.email).await {
        Ok(existing) => {
            tracing::debug!(user_id = %existing.user.id, "admin already present");
            return Ok(());
        }
        Err(StoreError::NotFound(_)) => {}
        Err(err) => return Err(err).context("look up admin user"),
    }
    let password_hash = hash_password(&admin.password).context("hash admin password")?;
    let now = now_unix();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: admin.email.clone(),
        first_name: "Admin".to_string(),
        last_name: String::new(),
        roles: Roles::from([GLOBAL_ADMIN, USER_SELF]),
        phone: None,
        can_sms: None,
        birthday: None,
        created_at: now,
        updated_at: now,
        created_by: "system".to_string(),
        updated_by: "system".to_string(),
    };
    let user = store
        .create_user(UserRecord {
            user,
            password_hash,
        })
        .await
        .context("create admin user")?;
    tracing::info!(user_id = %user.id, email = %user.email, "admin user seeded");
    Ok(())
}
