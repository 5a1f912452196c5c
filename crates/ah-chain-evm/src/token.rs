use ah_api_types::{Address, U256};
use ah_chain_client::{Binding, ChainError, ChainResult, PaymentToken, PendingTx};
use alloy::providers::DynProvider;
use async_trait::async_trait;
use tracing::debug;

use crate::abi::IERC20;
use crate::pending::{EvmPendingTx, send_error};

/// ERC-20 handle for the marketplace's payment token.
pub struct EvmToken {
    address: Address,
    provider: DynProvider,
    binding: Binding,
    confirmations: u64,
}

impl EvmToken {
    pub fn new(
        address: Address,
        provider: DynProvider,
        binding: Binding,
        confirmations: u64,
    ) -> Self {
        Self {
            address,
            provider,
            binding,
            confirmations,
        }
    }

    fn contract(&self) -> IERC20::IERC20Instance<&DynProvider> {
        IERC20::new(self.address, &self.provider)
    }
}

#[async_trait]
impl PaymentToken for EvmToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance_of(&self, owner: Address) -> ChainResult<U256> {
        self.contract()
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| ChainError::call("balanceOf", e))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> ChainResult<U256> {
        self.contract()
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| ChainError::call("allowance", e))
    }

    async fn symbol(&self) -> ChainResult<String> {
        self.contract()
            .symbol()
            .call()
            .await
            .map_err(|e| ChainError::call("symbol", e))
    }

    async fn decimals(&self) -> ChainResult<u8> {
        self.contract()
            .decimals()
            .call()
            .await
            .map_err(|e| ChainError::call("decimals", e))
    }

    async fn approve(&self, spender: Address, amount: U256) -> ChainResult<PendingTx> {
        let from = self.binding.account().ok_or_else(|| ChainError::ReadOnly {
            operation: "approve".to_owned(),
        })?;

        let pending = self
            .contract()
            .approve(spender, amount)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("approve", e))?;

        debug!("approve submitted: {}", pending.tx_hash());
        Ok(Box::new(EvmPendingTx::new(
            "approve",
            pending,
            self.confirmations,
        )))
    }
}
