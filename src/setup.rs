// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet setup state machine.
//!
//! ```text
//! UNINITIALIZED -> SAFE_PREDICTED -> SAFE_DEPLOYED -> CREDENTIALS_READY -> FULLY_SET_UP
//!                  (CREATE2)         (relay + getCode) (API key)          (approvals relayed)
//! ```
//!
//! Every step persists the user record before returning and can be re-run.
//! A step whose effect is already in place (stored address, code on chain,
//! active API key, recorded approvals) advances the stage without side
//! effects. Approvals are re-sent in full after a partial failure; granting
//! an unlimited allowance twice is harmless on chain.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;

use crate::auth::{issue_api_key, IssuedCredentials};
use crate::blockchain::{
    generate_owner_key, polygon_trading_approvals, signer_from_blob, ApprovalTarget, BuildError,
    ChainClient, ChainQuery, ChainQueryError, SafeAddressDeriver, SafeContracts,
    SafeTransactionBuilder, SigningError,
};
use crate::config::{CoreConfig, RELAYER_URL_ENV};
use crate::crypto::{api_key::DEFAULT_PREFIX, KeyVault, VaultError};
use crate::error::CoreError;
use crate::models::{SetupStage, UserRecord};
use crate::relayer::RelayerClient;
use crate::state::AppState;
use crate::storage::{CustodyStore, StorageError};

/// Wallet setup errors.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    ChainQuery(#[from] ChainQueryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Relay failed: {0}")]
    Relay(String),

    #[error("Safe {0} has no code after deployment was relayed")]
    NotDeployed(Address),

    #[error("Setup step requires stage {required:?}, user is at {stage:?}")]
    OutOfOrder {
        stage: SetupStage,
        required: SetupStage,
    },

    #[error("Invalid address in user record: {0}")]
    InvalidAddress(String),
}

/// How long to wait for a relayed deployment to show up on chain.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(3),
        }
    }
}

/// Result of the deployment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Code was already present; nothing was relayed
    AlreadyDeployed,
    /// Deployment relayed and confirmed on chain
    Deployed { tx_hash: String },
}

/// Everything a full setup run produced.
#[derive(Debug)]
pub struct SetupReport {
    pub user: UserRecord,
    /// Present only when this run issued the key
    pub credentials: Option<IssuedCredentials>,
}

/// Drives a user from a fresh owner key to a trading-ready Safe.
pub struct WalletSetup<C> {
    store: Arc<dyn CustodyStore>,
    vault: Arc<KeyVault>,
    chain: C,
    relayer: RelayerClient,
    builder: SafeTransactionBuilder,
    approvals: Vec<ApprovalTarget>,
    api_key_prefix: String,
    confirmation: ConfirmationPolicy,
}

impl<C: ChainQuery> WalletSetup<C> {
    pub fn new(
        store: Arc<dyn CustodyStore>,
        vault: Arc<KeyVault>,
        chain: C,
        relayer: RelayerClient,
        contracts: SafeContracts,
    ) -> Self {
        Self {
            store,
            vault,
            chain,
            relayer,
            builder: SafeTransactionBuilder::new(contracts),
            approvals: polygon_trading_approvals(),
            api_key_prefix: DEFAULT_PREFIX.to_string(),
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn with_approvals(mut self, approvals: Vec<ApprovalTarget>) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn with_api_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_key_prefix = prefix.into();
        self
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Run every remaining step for `external_id`.
    pub async fn run(&self, external_id: &str) -> Result<SetupReport, SetupError> {
        let mut user = self.register(external_id)?;
        self.predict(&mut user)?;
        self.deploy(&mut user).await?;
        let credentials = self.issue_credentials(&mut user)?;
        self.approve(&mut user).await?;

        Ok(SetupReport { user, credentials })
    }

    /// Load the user, or create one with a fresh owner key.
    pub fn register(&self, external_id: &str) -> Result<UserRecord, SetupError> {
        match self.store.get_user_by_external_id(external_id) {
            Ok(user) => return Ok(user),
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let owner = generate_owner_key(&self.vault)?;
        let user = UserRecord::new(
            external_id,
            owner.address.to_string(),
            owner.encrypted_private_key,
        );
        self.store.create_user(&user)?;
        tracing::info!(user_id = %user.id, owner = %owner.address, "registered user");
        Ok(user)
    }

    /// UNINITIALIZED -> SAFE_PREDICTED
    pub fn predict(&self, user: &mut UserRecord) -> Result<Address, SetupError> {
        if let Some(stored) = &user.safe_address {
            return parse_address(stored);
        }

        let owner = parse_address(&user.eoa_address)?;
        let safe = SafeAddressDeriver::new(*self.builder.contracts()).predict(owner);

        user.safe_address = Some(safe.to_string());
        user.advance(SetupStage::SafePredicted);
        self.store.update_user(user)?;
        tracing::info!(user_id = %user.id, safe = %safe, "predicted safe address");
        Ok(safe)
    }

    /// SAFE_PREDICTED -> SAFE_DEPLOYED
    pub async fn deploy(&self, user: &mut UserRecord) -> Result<DeployOutcome, SetupError> {
        require_stage(user, SetupStage::SafePredicted)?;
        let safe = self.predict(user)?;

        if user.setup_stage >= SetupStage::SafeDeployed || self.chain.is_deployed(safe).await? {
            self.advance(user, SetupStage::SafeDeployed)?;
            return Ok(DeployOutcome::AlreadyDeployed);
        }

        let signer = signer_from_blob(&self.vault, &user.encrypted_private_key)?;
        let result = self.relayer.deploy_safe(&self.builder, &signer).await?;
        let tx_hash = match (result.success, result.tx_hash) {
            (true, Some(tx_hash)) => tx_hash,
            _ => {
                return Err(SetupError::Relay(
                    result.error.unwrap_or_else(|| "deployment was not accepted".to_string()),
                ))
            }
        };

        self.wait_for_code(safe).await?;
        self.advance(user, SetupStage::SafeDeployed)?;
        Ok(DeployOutcome::Deployed { tx_hash })
    }

    /// SAFE_DEPLOYED -> CREDENTIALS_READY
    ///
    /// Returns `None` when the user already holds an active key.
    pub fn issue_credentials(
        &self,
        user: &mut UserRecord,
    ) -> Result<Option<IssuedCredentials>, SetupError> {
        require_stage(user, SetupStage::SafeDeployed)?;
        if user.setup_stage >= SetupStage::CredentialsReady {
            return Ok(None);
        }

        let has_active_key = self
            .store
            .list_api_keys_for_user(&user.id)?
            .iter()
            .any(|key| key.is_active());
        if has_active_key {
            self.advance(user, SetupStage::CredentialsReady)?;
            return Ok(None);
        }

        let issued = issue_api_key(
            self.store.as_ref(),
            &self.vault,
            &user.id,
            &self.api_key_prefix,
        )?;
        self.advance(user, SetupStage::CredentialsReady)?;
        Ok(Some(issued))
    }

    /// CREDENTIALS_READY -> FULLY_SET_UP
    ///
    /// Returns the transaction hash of each relayed approval, keyed by name.
    pub async fn approve(
        &self,
        user: &mut UserRecord,
    ) -> Result<BTreeMap<String, String>, SetupError> {
        require_stage(user, SetupStage::CredentialsReady)?;
        if user.setup_stage >= SetupStage::FullySetUp {
            return Ok(BTreeMap::new());
        }

        let safe = self.predict(user)?;
        let signer = signer_from_blob(&self.vault, &user.encrypted_private_key)?;
        let requests = self
            .builder
            .build_approval_requests(&signer, safe, &self.approvals)
            .await?;

        let mut tx_hashes = BTreeMap::new();
        for (name, request) in requests {
            let result = self.relayer.relay(&request).await;
            match (result.success, result.tx_hash) {
                (true, Some(tx_hash)) => {
                    tx_hashes.insert(name, tx_hash);
                }
                _ => {
                    let reason = result.error.unwrap_or_default();
                    return Err(SetupError::Relay(format!("approval {name}: {reason}")));
                }
            }
        }

        self.advance(user, SetupStage::FullySetUp)?;
        Ok(tx_hashes)
    }

    async fn wait_for_code(&self, safe: Address) -> Result<(), SetupError> {
        for attempt in 1..=self.confirmation.attempts {
            if self.chain.is_deployed(safe).await? {
                return Ok(());
            }
            if attempt < self.confirmation.attempts {
                tokio::time::sleep(self.confirmation.interval).await;
            }
        }
        Err(SetupError::NotDeployed(safe))
    }

    fn advance(&self, user: &mut UserRecord, stage: SetupStage) -> Result<(), SetupError> {
        if user.setup_stage < stage {
            user.advance(stage);
            self.store.update_user(user)?;
            tracing::info!(user_id = %user.id, stage = ?stage, "setup stage advanced");
        }
        Ok(())
    }
}

impl WalletSetup<ChainClient> {
    /// Wire setup against the configured RPC endpoint and relayer.
    pub fn from_config(config: &CoreConfig, state: &AppState) -> Result<Self, CoreError> {
        let relayer_url = config.relayer_url.as_deref().ok_or_else(|| {
            CoreError::Config(format!("{RELAYER_URL_ENV} is required for wallet setup"))
        })?;
        let relayer = RelayerClient::new(relayer_url, config.relayer_timeout)?;
        let chain = ChainClient::new(&config.rpc_url)
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(Self::new(
            state.store.clone(),
            state.vault.clone(),
            chain,
            relayer,
            config.contracts,
        )
        .with_api_key_prefix(config.api_key_prefix.clone()))
    }
}

fn require_stage(user: &UserRecord, required: SetupStage) -> Result<(), SetupError> {
    if user.setup_stage < required {
        return Err(SetupError::OutOfOrder {
            stage: user.setup_stage,
            required,
        });
    }
    Ok(())
}

fn parse_address(value: &str) -> Result<Address, SetupError> {
    value
        .parse::<Address>()
        .map_err(|e| SetupError::InvalidAddress(format!("{value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::POLYGON_SAFE_PROXY_FACTORY;
    use crate::relayer::DEFAULT_RELAY_TIMEOUT;
    use crate::storage::InMemoryStore;
    use alloy::primitives::Bytes;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Deployed = Arc<Mutex<HashSet<Address>>>;

    #[derive(Clone, Default)]
    struct StubChain {
        deployed: Deployed,
    }

    impl ChainQuery for StubChain {
        fn get_code(
            &self,
            address: Address,
        ) -> impl Future<Output = Result<Bytes, ChainQueryError>> + Send {
            let code = if self.deployed.lock().unwrap().contains(&address) {
                Bytes::from_static(&[0x60, 0x80])
            } else {
                Bytes::new()
            };
            async move { Ok(code) }
        }
    }

    #[derive(Clone)]
    struct RelayStub {
        deployed: Deployed,
        calls: Arc<AtomicUsize>,
        /// Mark the Safe deployed when the factory call arrives
        lands_on_chain: bool,
        status: StatusCode,
        /// 1-based call number to reject with a 502; 0 rejects none
        fail_call: Arc<AtomicUsize>,
    }

    async fn relay_handler(
        State(stub): State<RelayStub>,
        Json(request): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let call = stub.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == stub.fail_call.load(Ordering::SeqCst) {
            return (StatusCode::BAD_GATEWAY, Json(json!({ "error": "upstream" })));
        }
        if !stub.status.is_success() {
            return (stub.status, Json(json!({ "error": "rejected" })));
        }

        let to: Address = request["to"].as_str().unwrap().parse().unwrap();
        if stub.lands_on_chain && to == POLYGON_SAFE_PROXY_FACTORY {
            let safe: Address = request["proxyWallet"].as_str().unwrap().parse().unwrap();
            stub.deployed.lock().unwrap().insert(safe);
        }
        (StatusCode::OK, Json(json!({ "txHash": "0xfeed" })))
    }

    struct Harness {
        setup: WalletSetup<StubChain>,
        store: Arc<InMemoryStore>,
        deployed: Deployed,
        calls: Arc<AtomicUsize>,
        fail_call: Arc<AtomicUsize>,
    }

    async fn harness(lands_on_chain: bool, status: StatusCode) -> Harness {
        let deployed = Deployed::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let fail_call = Arc::new(AtomicUsize::new(0));
        let stub = RelayStub {
            deployed: deployed.clone(),
            calls: calls.clone(),
            lands_on_chain,
            status,
            fail_call: fail_call.clone(),
        };

        let app = Router::new()
            .route("/relay", post(relay_handler))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = Arc::new(InMemoryStore::new());
        let vault = Arc::new(KeyVault::new(&"5a".repeat(32)).unwrap());
        let relayer = RelayerClient::new(&format!("http://{addr}"), DEFAULT_RELAY_TIMEOUT).unwrap();
        let chain = StubChain {
            deployed: deployed.clone(),
        };

        let setup = WalletSetup::new(
            store.clone(),
            vault,
            chain,
            relayer,
            SafeContracts::polygon(),
        )
        .with_confirmation(ConfirmationPolicy {
            attempts: 3,
            interval: Duration::from_millis(5),
        });

        Harness {
            setup,
            store,
            deployed,
            calls,
            fail_call,
        }
    }

    #[tokio::test]
    async fn full_run_reaches_fully_set_up() {
        let h = harness(true, StatusCode::OK).await;

        let report = h.setup.run("ext-1").await.unwrap();

        assert_eq!(report.user.setup_stage, SetupStage::FullySetUp);
        let credentials = report.credentials.expect("first run issues credentials");
        assert!(credentials.api_key.starts_with("qnt_"));
        // one deployment + six approvals
        assert_eq!(h.calls.load(Ordering::SeqCst), 7);

        let stored = h.store.get_user(&report.user.id).unwrap();
        assert_eq!(stored, report.user);
        let safe: Address = stored.safe_address.unwrap().parse().unwrap();
        assert!(h.deployed.lock().unwrap().contains(&safe));
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let h = harness(true, StatusCode::OK).await;
        let first = h.setup.run("ext-2").await.unwrap();
        let calls_after_first = h.calls.load(Ordering::SeqCst);

        let second = h.setup.run("ext-2").await.unwrap();

        assert_eq!(second.user.id, first.user.id);
        assert_eq!(second.user.safe_address, first.user.safe_address);
        assert!(second.credentials.is_none());
        assert_eq!(h.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(h.store.list_api_keys_for_user(&first.user.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn predicted_address_matches_owner() {
        let h = harness(true, StatusCode::OK).await;
        let mut user = h.setup.register("ext-3").unwrap();

        let safe = h.setup.predict(&mut user).unwrap();
        let owner: Address = user.eoa_address.parse().unwrap();
        assert_eq!(safe, SafeAddressDeriver::default().predict(owner));
        assert_eq!(user.setup_stage, SetupStage::SafePredicted);

        assert_eq!(h.setup.predict(&mut user).unwrap(), safe);
    }

    #[tokio::test]
    async fn existing_code_skips_deployment_relay() {
        let h = harness(true, StatusCode::OK).await;
        let mut user = h.setup.register("ext-4").unwrap();
        let safe = h.setup.predict(&mut user).unwrap();
        h.deployed.lock().unwrap().insert(safe);

        let outcome = h.setup.deploy(&mut user).await.unwrap();

        assert_eq!(outcome, DeployOutcome::AlreadyDeployed);
        assert_eq!(user.setup_stage, SetupStage::SafeDeployed);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn relay_rejection_leaves_stage_unchanged() {
        let h = harness(true, StatusCode::INTERNAL_SERVER_ERROR).await;
        let mut user = h.setup.register("ext-5").unwrap();
        h.setup.predict(&mut user).unwrap();

        let err = h.setup.deploy(&mut user).await.unwrap_err();

        match err {
            SetupError::Relay(msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            h.store.get_user(&user.id).unwrap().setup_stage,
            SetupStage::SafePredicted
        );
    }

    #[tokio::test]
    async fn deployment_that_never_lands_is_reported() {
        let h = harness(false, StatusCode::OK).await;
        let mut user = h.setup.register("ext-6").unwrap();
        let safe = h.setup.predict(&mut user).unwrap();

        let err = h.setup.deploy(&mut user).await.unwrap_err();

        assert!(matches!(err, SetupError::NotDeployed(addr) if addr == safe));
        assert_eq!(user.setup_stage, SetupStage::SafePredicted);
    }

    #[tokio::test]
    async fn last_failed_confirmation_does_not_sleep() {
        let h = harness(false, StatusCode::OK).await;
        let setup = h.setup.with_confirmation(ConfirmationPolicy {
            attempts: 1,
            interval: Duration::from_secs(30),
        });
        let mut user = setup.register("ext-10").unwrap();
        setup.predict(&mut user).unwrap();

        let started = std::time::Instant::now();
        let err = setup.deploy(&mut user).await.unwrap_err();

        assert!(matches!(err, SetupError::NotDeployed(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn failed_approval_is_retried_on_rerun() {
        let h = harness(true, StatusCode::OK).await;
        // call 1 deploys, calls 2..=7 are approvals
        h.fail_call.store(4, Ordering::SeqCst);

        let err = h.setup.run("ext-11").await.unwrap_err();
        match err {
            SetupError::Relay(msg) => assert!(msg.starts_with("approval ")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.calls.load(Ordering::SeqCst), 4);
        let stored = h.store.get_user_by_external_id("ext-11").unwrap();
        assert_eq!(stored.setup_stage, SetupStage::CredentialsReady);

        h.fail_call.store(0, Ordering::SeqCst);
        let report = h.setup.run("ext-11").await.unwrap();

        assert_eq!(report.user.id, stored.id);
        assert_eq!(report.user.setup_stage, SetupStage::FullySetUp);
        assert!(report.credentials.is_none());
        // no second deployment, all six approvals re-sent
        assert_eq!(h.calls.load(Ordering::SeqCst), 4 + 6);
        assert_eq!(h.store.list_api_keys_for_user(&stored.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn steps_refuse_to_run_out_of_order() {
        let h = harness(true, StatusCode::OK).await;
        let mut user = h.setup.register("ext-7").unwrap();

        let err = h.setup.issue_credentials(&mut user).unwrap_err();
        assert!(matches!(
            err,
            SetupError::OutOfOrder {
                stage: SetupStage::Uninitialized,
                required: SetupStage::SafeDeployed,
            }
        ));

        let err = h.setup.deploy(&mut user).await.unwrap_err();
        assert!(matches!(err, SetupError::OutOfOrder { .. }));
    }

    #[tokio::test]
    async fn existing_active_key_is_not_reissued() {
        let h = harness(true, StatusCode::OK).await;
        let mut user = h.setup.register("ext-8").unwrap();
        h.setup.predict(&mut user).unwrap();
        h.setup.deploy(&mut user).await.unwrap();

        // key issued but stage update lost
        issue_api_key(h.store.as_ref(), &KeyVault::new(&"5a".repeat(32)).unwrap(), &user.id, "qnt")
            .unwrap();

        assert!(h.setup.issue_credentials(&mut user).unwrap().is_none());
        assert_eq!(user.setup_stage, SetupStage::CredentialsReady);
        assert_eq!(h.store.list_api_keys_for_user(&user.id).unwrap().len(), 1);
    }

    #[test]
    fn from_config_requires_relayer_url() {
        let state = AppState::in_memory(KeyVault::new(&"5a".repeat(32)).unwrap());
        let config = CoreConfig::default();
        let err = WalletSetup::<ChainClient>::from_config(&config, &state).err().unwrap();
        assert_eq!(err.error_code(), "config_error");

        let config = CoreConfig {
            relayer_url: Some("http://127.0.0.1:9".to_string()),
            api_key_prefix: "tst".to_string(),
            ..CoreConfig::default()
        };
        let setup = WalletSetup::<ChainClient>::from_config(&config, &state).unwrap();
        assert_eq!(setup.api_key_prefix, "tst");
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let h = harness(true, StatusCode::OK).await;
        let first = h.setup.register("ext-9").unwrap();
        let second = h.setup.register("ext-9").unwrap();
        assert_eq!(first, second);
    }
}
