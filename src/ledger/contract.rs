//! Contract access bound to one identity and gas policy.

use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;

use crate::error::{LedgerError, LedgerResult};
use crate::identity::Identity;
use crate::ledger::client::LedgerClient;
use crate::ledger::dispatcher::TransactionDispatcher;
use crate::ledger::gas::GasPolicy;
use crate::ledger::types::{CallOutput, TransactionReceipt};

/// Hands out dispatchers and contract handles sharing one client, identity and gas policy.
#[derive(Debug, Clone)]
pub struct ContractFactory {
    client: LedgerClient,
    identity: Option<Arc<Identity>>,
    gas: GasPolicy,
}

impl ContractFactory {
    pub fn new(client: LedgerClient, identity: Option<Arc<Identity>>, gas: GasPolicy) -> Self {
        Self {
            client,
            identity,
            gas,
        }
    }

    /// Dispatcher for the client's group.
    pub fn dispatcher(&self) -> TransactionDispatcher {
        TransactionDispatcher::new(
            self.client.clone(),
            self.identity.clone(),
            self.client.group_id(),
            self.gas,
        )
    }

    /// Handle to an already deployed contract.
    pub fn at(&self, address: Address) -> ContractHandle {
        ContractHandle {
            address,
            dispatcher: self.dispatcher(),
        }
    }

    /// Deploy `bytecode` (constructor arguments appended) and return a handle to it.
    pub async fn deploy(&self, bytecode: Bytes) -> LedgerResult<ContractHandle> {
        let receipt = self
            .dispatcher()
            .submit(None, bytecode, U256::ZERO, None)
            .await?;
        if !receipt.is_success() {
            return Err(LedgerError::Reverted {
                hash: receipt.transaction_hash,
                status: receipt.status,
            });
        }

        let address = receipt.deployed_address().ok_or_else(|| {
            LedgerError::Protocol(format!(
                "deployment receipt {} carries no contract address",
                receipt.transaction_hash
            ))
        })?;
        tracing::info!(contract = %address, tx_hash = %receipt.transaction_hash, "Contract deployed");
        Ok(self.at(address))
    }
}

/// A deployed contract reachable through the factory's dispatcher.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    address: Address,
    dispatcher: TransactionDispatcher,
}

impl ContractHandle {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Submit ABI-encoded `data` as a signed transaction.
    pub async fn send(&self, data: Bytes, nonce: Option<U256>) -> LedgerResult<TransactionReceipt> {
        self.dispatcher
            .submit(Some(self.address), data, U256::ZERO, nonce)
            .await
    }

    /// Read-only call; uses the zero address as sender when no identity is configured.
    pub async fn call(&self, data: Bytes) -> LedgerResult<CallOutput> {
        let from = self
            .dispatcher
            .identity()
            .map_or(Address::ZERO, |identity| identity.address());
        self.dispatcher.client().call(from, self.address, &data).await
    }
}
