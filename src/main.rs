//! Vault node - DID challenge-response authentication

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vault_node::{
    auth::AuthService,
    clock::{Clock, SystemClock},
    config::Args,
    db::MongoClient,
    did::{document::VAULT_SERVICE_TYPE, DidResolver, DocumentCache, FsDocumentCache, JwsToolkit},
    identity::IdentityContext,
    nonce::{MemoryNonceStore, MongoNonceStore, NonceStore},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vault_node={},info", log_level).into()),
        )
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Node identity: derived from the configured secret, ephemeral in dev mode
    let identity = match args.did_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => IdentityContext::from_secret(secret, &args.did_passphrase)?,
        None => {
            warn!("No DID_SECRET configured (dev mode) - using an ephemeral node identity");
            IdentityContext::generate()
        }
    };
    let identity = match &args.public_url {
        Some(url) => identity.with_service(VAULT_SERVICE_TYPE, url),
        None => identity,
    };
    let identity = Arc::new(identity);

    info!("======================================");
    info!("  Vault Node - DID authentication");
    info!("======================================");
    info!("DID: {}", identity.did());
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("DID data dir: {}", args.did_data_dir.display());
    info!(
        "Challenge TTL: {}s, access token TTL: {}s",
        args.auth_challenge_expired, args.access_token_expired
    );
    info!("======================================");

    // Nonce store (MongoDB, in-memory fallback in dev mode)
    let nonces: Arc<dyn NonceStore> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Arc::new(MongoNonceStore::new(&client).await?)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory nonces): {}", e);
                Arc::new(MemoryNonceStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let documents: Arc<dyn DocumentCache> = Arc::new(FsDocumentCache::new(&args.did_data_dir));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let resolver = Arc::new(DidResolver::new(documents.clone()));
    let toolkit = Arc::new(JwsToolkit::new(resolver, clock.clone()));

    let auth = Arc::new(AuthService::new(
        identity.clone(),
        toolkit,
        nonces,
        documents,
        clock,
        args.auth_config(),
    ));

    let state = Arc::new(AppState::new(args, identity, auth));
    server::run(state).await?;

    Ok(())
}
