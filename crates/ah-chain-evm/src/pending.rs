use ah_chain_client::{ChainError, ChainResult, PendingTransaction, TxReceipt};
use alloy::network::Ethereum;
use alloy::providers::PendingTransactionBuilder;
use alloy::transports::TransportError;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::wallet::USER_REJECTED_CODE;

/// Map a failed submit. A signing prompt declined in the wallet is not a
/// transaction failure.
pub(crate) fn send_error(method: &str, err: alloy::contract::Error) -> ChainError {
    if let alloy::contract::Error::TransportError(transport) = &err {
        if is_user_rejection(transport) {
            info!("{} declined in wallet", method);
            return ChainError::UserRejected;
        }
    }
    ChainError::transaction(method, err)
}

fn is_user_rejection(err: &TransportError) -> bool {
    err.as_error_resp()
        .is_some_and(|payload| payload.code == USER_REJECTED_CODE)
}

/// A broadcast transaction awaiting its receipt.
pub struct EvmPendingTx {
    method: &'static str,
    tx_hash: String,
    inner: PendingTransactionBuilder<Ethereum>,
    confirmations: u64,
}

impl EvmPendingTx {
    pub fn new(
        method: &'static str,
        inner: PendingTransactionBuilder<Ethereum>,
        confirmations: u64,
    ) -> Self {
        Self {
            method,
            tx_hash: inner.tx_hash().to_string(),
            inner,
            confirmations,
        }
    }
}

#[async_trait]
impl PendingTransaction for EvmPendingTx {
    fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    async fn confirm(self: Box<Self>) -> ChainResult<TxReceipt> {
        let Self {
            method,
            tx_hash,
            inner,
            confirmations,
        } = *self;

        let receipt = inner
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .map_err(|e| ChainError::transaction(method, e))?;

        debug!(
            "{} {} mined in block {:?} (status {})",
            method,
            tx_hash,
            receipt.block_number,
            receipt.status()
        );

        if !receipt.status() {
            return Err(ChainError::Reverted { tx_hash });
        }

        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number,
        })
    }
}
