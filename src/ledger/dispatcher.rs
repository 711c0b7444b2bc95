//! Transaction dispatcher: build, sign, submit and confirm.
//!
//! # Responsibilities
//! - Stamp chain id, group id, block limit and the gas policy on each transaction
//! - Take the nonce from the caller or query it from the node
//! - Sign with the configured identity, refusing early when there is none
//! - Surface node rejections with the sender and nonce attached
//!
//! # Design Decisions
//! - Submissions are not serialized; callers own nonce uniqueness
//! - Rejections are never retried

use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;

use crate::error::{LedgerError, LedgerResult};
use crate::identity::Identity;
use crate::ledger::client::LedgerClient;
use crate::ledger::gas::GasPolicy;
use crate::ledger::transaction::{RawTransaction, SignedTransaction};
use crate::ledger::types::{TransactionReceipt, BLOCK_LIMIT_DELTA, CHAIN_ID};
use crate::observability::metrics;

#[derive(Debug, Clone)]
pub struct TransactionDispatcher {
    client: LedgerClient,
    identity: Option<Arc<Identity>>,
    chain_id: u64,
    group_id: u32,
    gas: GasPolicy,
}

impl TransactionDispatcher {
    pub fn new(
        client: LedgerClient,
        identity: Option<Arc<Identity>>,
        group_id: u32,
        gas: GasPolicy,
    ) -> Self {
        Self {
            client,
            identity,
            chain_id: CHAIN_ID,
            group_id,
            gas,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn gas(&self) -> GasPolicy {
        self.gas
    }

    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.as_ref()
    }

    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    fn require_identity(&self, operation: &'static str) -> LedgerResult<&Arc<Identity>> {
        self.identity
            .as_ref()
            .ok_or(LedgerError::Identity { operation })
    }

    /// Build and sign a transaction without sending it.
    ///
    /// `to = None` deploys `payload` as contract code. Without an explicit
    /// `nonce` the node's transaction count for the sender is used.
    pub async fn sign(
        &self,
        to: Option<Address>,
        payload: Bytes,
        value: U256,
        nonce: Option<U256>,
    ) -> LedgerResult<SignedTransaction> {
        let identity = self.require_identity("sign")?;

        let nonce = match nonce {
            Some(nonce) => nonce,
            None => self.client.get_transaction_count(identity.address()).await?,
        };
        let block_number = self.client.get_block_number().await?;

        let raw = RawTransaction {
            nonce,
            gas_price: self.gas.price(),
            gas_limit: self.gas.limit(),
            block_limit: U256::from(block_number.saturating_add(BLOCK_LIMIT_DELTA)),
            to,
            value,
            data: payload,
            chain_id: self.chain_id,
            group_id: self.group_id,
            extra_data: Bytes::new(),
        };
        raw.sign(identity).await
    }

    /// Send a signed transaction and wait for its receipt.
    pub async fn send_signed(&self, signed: &SignedTransaction) -> LedgerResult<TransactionReceipt> {
        let sender = signed.recover_signer()?;
        let nonce = signed.nonce();

        let hash = match self.client.send_raw_transaction(&signed.encode()).await {
            Ok(hash) => hash,
            Err(LedgerError::Rpc { code, message }) => {
                metrics::record_transaction("rejected");
                tracing::warn!(
                    sender = %sender,
                    nonce = %nonce,
                    code,
                    reason = %message,
                    "Transaction rejected"
                );
                return Err(LedgerError::Rejected {
                    address: sender,
                    nonce,
                    code,
                    reason: message,
                });
            }
            Err(e) => {
                metrics::record_transaction("failed");
                return Err(e);
            }
        };

        let receipt = self.client.wait_for_receipt(hash).await.inspect_err(|_| {
            metrics::record_transaction("unconfirmed");
        })?;

        if receipt.is_success() {
            metrics::record_transaction("confirmed");
            tracing::info!(
                tx_hash = %hash,
                sender = %sender,
                nonce = %nonce,
                block_number = %receipt.block_number,
                "Transaction confirmed"
            );
        } else {
            metrics::record_transaction("reverted");
            tracing::warn!(tx_hash = %hash, status = %receipt.status, "Transaction executed with failure status");
        }
        Ok(receipt)
    }

    /// Build, sign, submit and wait for the receipt.
    ///
    /// Fails with `LedgerError::Identity` before any network traffic when no
    /// identity is configured.
    pub async fn submit(
        &self,
        to: Option<Address>,
        payload: Bytes,
        value: U256,
        nonce: Option<U256>,
    ) -> LedgerResult<TransactionReceipt> {
        self.require_identity("submit")?;
        let signed = self.sign(to, payload, value, nonce).await?;
        self.send_signed(&signed).await
    }
}
