//! Service wiring.
//!
//! Builds every service from one set of backends, so the HTTP layer and the
//! server binary share a single construction path.

use std::sync::Arc;

use crate::api_keys::ApiKeyService;
use crate::auth::issuer::TokenIssuer;
use crate::auth::refresh::RefreshCoordinator;
use crate::auth::session::SessionService;
use crate::auth::verifier::TokenVerifier;
use crate::auth::whitelist::WhitelistLedger;
use crate::config::{AuthConfig, ConfigError};
use crate::identity::{
    IdentityProvider, IdentityResolver, LearningPlatformResolver, ProviderResolver,
};
use crate::otp::OtpService;
use crate::roles::RoleService;
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;
use crate::store::{
    ApiKeyStore, LearningPlatformDirectory, OtpStore, RoleStore, UserStore, WhitelistStore,
};

/// Storage and identity collaborators.
#[derive(Clone)]
pub struct Backends {
    pub whitelist: Arc<dyn WhitelistStore>,
    pub roles: Arc<dyn RoleStore>,
    pub users: Arc<dyn UserStore>,
    pub learning_platform: Arc<dyn LearningPlatformDirectory>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub otp: Arc<dyn OtpStore>,
    pub provider: Arc<dyn IdentityProvider>,
}

impl Backends {
    /// Every store served by one in-memory backend.
    pub fn memory(store: Arc<MemoryStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            whitelist: store.clone(),
            roles: store.clone(),
            users: store.clone(),
            learning_platform: store.clone(),
            api_keys: store.clone(),
            otp: store,
            provider,
        }
    }

    /// Every store served by one PostgreSQL pool.
    pub fn postgres(store: PgStore, provider: Arc<dyn IdentityProvider>) -> Self {
        let store = Arc::new(store);
        Self {
            whitelist: store.clone(),
            roles: store.clone(),
            users: store.clone(),
            learning_platform: store.clone(),
            api_keys: store.clone(),
            otp: store,
            provider,
        }
    }
}

/// All services, cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<AuthConfig>,
    pub ledger: WhitelistLedger,
    pub issuer: TokenIssuer,
    pub verifier: TokenVerifier,
    pub refresh: RefreshCoordinator,
    pub sessions: SessionService,
    pub roles: RoleService,
    pub api_keys: ApiKeyService,
    pub otp: OtpService,
}

impl Services {
    pub fn new(config: AuthConfig, backends: Backends) -> Result<Self, ConfigError> {
        let config = Arc::new(config);
        let ledger = WhitelistLedger::new(backends.whitelist);
        let issuer = TokenIssuer::new(config.clone(), ledger.clone())?;
        let verifier = TokenVerifier::new(
            &config,
            backends.users.clone(),
            backends.roles.clone(),
            ledger.clone(),
        );

        let resolvers: Vec<Arc<dyn IdentityResolver>> = vec![
            Arc::new(ProviderResolver::new(backends.provider.clone())),
            Arc::new(LearningPlatformResolver::new(
                backends.learning_platform.clone(),
            )),
        ];
        let refresh =
            RefreshCoordinator::new(config.clone(), resolvers, issuer.clone(), ledger.clone());

        let otp = OtpService::new(backends.users.clone(), backends.otp);
        let sessions = SessionService::new(
            backends.provider,
            backends.users,
            backends.learning_platform.clone(),
            issuer.clone(),
            verifier.clone(),
            ledger.clone(),
        );

        Ok(Self {
            config,
            ledger,
            issuer,
            verifier,
            refresh,
            sessions,
            roles: RoleService::new(backends.roles),
            api_keys: ApiKeyService::new(backends.api_keys),
            otp,
        })
    }
}
