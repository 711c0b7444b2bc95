//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the connection set and resolve the signing identity
//! - Start the channel pool
//! - Wire client, gas policy, dispatcher and contract factory together
//!
//! # Design Decisions
//! - Fail fast: the first error aborts startup
//! - Everything that can fail without the network (endpoints, TLS material,
//!   identity) is checked before the pool dials any node

use std::sync::Arc;

use crate::channel::{ChannelConnectionSet, ConnectionPool, EndpointStatus};
use crate::config::loader::ConfigError;
use crate::config::validation::validate_config;
use crate::config::{LedgerConfig, ResourceResolver};
use crate::error::LedgerResult;
use crate::identity::{self, Identity, SignatureScheme};
use crate::ledger::{ContractFactory, GasPolicy, LedgerClient, TransactionDispatcher};

/// Everything a caller needs to talk to the ledger.
#[derive(Debug)]
pub struct LedgerContext {
    pool: Arc<ConnectionPool>,
    client: LedgerClient,
    identity: Option<Arc<Identity>>,
    scheme: SignatureScheme,
    gas: GasPolicy,
    dispatcher: TransactionDispatcher,
    contracts: ContractFactory,
}

impl LedgerContext {
    /// Run the startup sequence and return a connected context.
    pub async fn bootstrap(config: &LedgerConfig) -> LedgerResult<Self> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let resources = ResourceResolver::from_config(&config.resources);
        let scheme = SignatureScheme::try_from(config.system.encrypt_type)?;

        let set = ChannelConnectionSet::build(config, &resources)?;
        let identity = identity::resolve(&config.system, scheme, &resources)?;

        let pool = Arc::new(ConnectionPool::build(set, config.channel.clone())?);
        pool.start().await?;

        let client = LedgerClient::new(Arc::clone(&pool));
        let gas = GasPolicy::default();
        let dispatcher =
            TransactionDispatcher::new(client.clone(), identity.clone(), config.system.group_id, gas);
        let contracts = ContractFactory::new(client.clone(), identity.clone(), gas);

        tracing::info!(
            group_id = config.system.group_id,
            org_id = config.system.org_id,
            scheme = %scheme,
            identity = ?identity.as_ref().map(|id| id.address()),
            "Ledger context ready"
        );

        Ok(Self {
            pool,
            client,
            identity,
            scheme,
            gas,
            dispatcher,
            contracts,
        })
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.as_ref()
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn gas(&self) -> GasPolicy {
        self.gas
    }

    pub fn dispatcher(&self) -> &TransactionDispatcher {
        &self.dispatcher
    }

    pub fn contracts(&self) -> &ContractFactory {
        &self.contracts
    }

    pub fn status(&self) -> Vec<EndpointStatus> {
        self.pool.status()
    }

    /// Stop the pool's supervisors and close every connection.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
