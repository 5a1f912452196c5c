//! Write-side orchestration: validate, submit, await confirmation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use ah_api_types::units::{AmountError, parse_amount, total_price, to_display_ether};
use ah_api_types::{Action, ActionPhase, ActionReport, Address, U256};
use ah_chain_client::{ChainError, PendingTx};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::contracts::ContractSession;

pub const WITHDRAW_MESSAGE: &str = "Your earnings have already been transferred to your wallet.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Pause before the withdraw acknowledgement is shown.
    pub withdraw_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            withdraw_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotConnected(&'static str),

    #[error("Insufficient token balance. Please add more tokens to your wallet.")]
    InsufficientBalance { required: U256, available: U256 },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl ActionError {
    fn invalid(message: &str) -> Self {
        Self::Validation(message.to_owned())
    }
}

/// What a successful action produced.
#[derive(Debug, Default)]
struct Executed {
    tx_hashes: Vec<String>,
    message: Option<String>,
}

/// Runs one action at a time through `Idle → Submitting → AwaitingConfirmation
/// → Reloading → Idle`, publishing every transition. Concurrent dispatches
/// queue behind the one in flight.
pub struct ActionDispatcher {
    config: DispatchConfig,
    phase: watch::Sender<ActionPhase>,
    in_flight: Mutex<()>,
}

impl ActionDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let (phase, _) = watch::channel(ActionPhase::Idle);
        Self {
            config,
            phase,
            in_flight: Mutex::new(()),
        }
    }

    pub fn phase(&self) -> ActionPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionPhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: ActionPhase) {
        debug!("action phase -> {:?}", phase);
        self.phase.send_replace(phase);
    }

    /// Execute `action`; on success run `reload` and hand back its result.
    ///
    /// Withdraw never reloads. A failed reload does not turn a confirmed
    /// action into a failure.
    pub async fn dispatch<V, E, F, Fut>(
        &self,
        contracts: &ContractSession,
        action: &Action,
        reload: F,
    ) -> (ActionReport, Option<V>)
    where
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let action_id = Uuid::new_v4();
        let _turn = self.in_flight.lock().await;
        info!("action {} ({}) started", action.name(), action_id);

        let result = self.execute(contracts, action).await;
        let report = |success: bool, message: Option<String>, tx_hashes: Vec<String>| ActionReport {
            action_id,
            action: action.name().to_owned(),
            success,
            message,
            tx_hashes,
        };

        match result {
            Ok(executed) => {
                info!(
                    "action {} ({}) confirmed: {:?}",
                    action.name(),
                    action_id,
                    executed.tx_hashes
                );
                let view = if matches!(action, Action::WithdrawEarnings) {
                    None
                } else {
                    self.enter(ActionPhase::Reloading);
                    match reload().await {
                        Ok(view) => Some(view),
                        Err(err) => {
                            warn!("reload after {} failed: {}", action.name(), err);
                            None
                        }
                    }
                };
                self.enter(ActionPhase::Idle);
                (report(true, executed.message, executed.tx_hashes), view)
            }
            Err(err) => {
                self.enter(ActionPhase::Idle);
                let message = failure_message(action, &err);
                match &message {
                    Some(_) => warn!("action {} ({}) failed: {}", action.name(), action_id, err),
                    None => info!("action {} ({}) rejected by user", action.name(), action_id),
                }
                (report(false, message, Vec::new()), None)
            }
        }
    }

    async fn execute(
        &self,
        contracts: &ContractSession,
        action: &Action,
    ) -> Result<Executed, ActionError> {
        validate(action)?;

        if let Action::WithdrawEarnings = action {
            self.enter(ActionPhase::Submitting);
            tokio::time::sleep(self.config.withdraw_delay).await;
            return Ok(Executed {
                tx_hashes: Vec::new(),
                message: Some(WITHDRAW_MESSAGE.to_owned()),
            });
        }

        let Some(account) = contracts.signer() else {
            let message = match action {
                Action::Purchase { .. } => "Please connect your wallet to make a purchase",
                _ => "Please connect your wallet to continue",
            };
            return Err(ActionError::NotConnected(message));
        };

        self.enter(ActionPhase::Submitting);
        let market = contracts.marketplace();

        match action {
            Action::RegisterFarmer => {
                let tx = self.confirm(market.register_as_farmer().await?).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: None,
                })
            }
            Action::ContributeProduct {
                hub,
                product_id,
                quantity,
                price,
            } => {
                let price = parse_price(price)?;
                let pending = market
                    .contribute_product(*hub, U256::from(*product_id), U256::from(*quantity), price)
                    .await?;
                let tx = self.confirm(pending).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: Some("Your produce has been listed successfully!".to_owned()),
                })
            }
            Action::WithdrawEarnings => Ok(Executed::default()),
            Action::RegisterHub { name, location } => {
                let pending = market.register_as_hub(name.trim(), location.trim()).await?;
                let tx = self.confirm(pending).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: None,
                })
            }
            Action::CreateProduct { name } => {
                let name = name.trim();
                let tx = self.confirm(market.create_product(name).await?).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: Some(format!("Successfully created product: {name}")),
                })
            }
            Action::AddProductToHub { product_id } => {
                let pending = market.add_product_to_hub(U256::from(*product_id)).await?;
                let tx = self.confirm(pending).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: Some("Successfully added product to hub".to_owned()),
                })
            }
            Action::ToggleProductStatus { product_id } => {
                let product_id = U256::from(*product_id);
                let current = market.hub_product_details(account, product_id).await?;
                debug!(
                    "toggling product {} at {} (active: {})",
                    product_id, account, current.active
                );
                let pending = market
                    .toggle_product_status(product_id, !current.active)
                    .await?;
                let tx = self.confirm(pending).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: None,
                })
            }
            Action::SendRequest {
                to_hub,
                product_id,
                quantity,
            } => {
                let pending = market
                    .request_product_from_hub(*to_hub, U256::from(*product_id), U256::from(*quantity))
                    .await?;
                let tx = self.confirm(pending).await?;
                let message = match market.hub_info(*to_hub).await {
                    Ok(hub) if !hub.name.is_empty() => format!("Request sent to {}", hub.name),
                    _ => format!("Request sent to {to_hub}"),
                };
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: Some(message),
                })
            }
            Action::AcceptRequest {
                from_hub,
                product_id,
                request_index,
            } => {
                let pending = market
                    .fulfill_product_request(
                        *from_hub,
                        U256::from(*product_id),
                        U256::from(*request_index),
                    )
                    .await?;
                let tx = self.confirm(pending).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: None,
                })
            }
            Action::DenyRequest {
                from_hub,
                product_id,
                request_index,
            } => {
                let pending = market
                    .deny_product_request(
                        *from_hub,
                        U256::from(*product_id),
                        U256::from(*request_index),
                    )
                    .await?;
                let tx = self.confirm(pending).await?;
                Ok(Executed {
                    tx_hashes: vec![tx],
                    message: None,
                })
            }
            Action::Purchase {
                hub,
                product_id,
                quantity,
                unit_price,
            } => {
                self.purchase(
                    contracts,
                    account,
                    *hub,
                    U256::from(*product_id),
                    U256::from(*quantity),
                    unit_price,
                )
                .await
            }
        }
    }

    /// Balance check, then approve-and-confirm if the allowance is short, then purchase.
    async fn purchase(
        &self,
        contracts: &ContractSession,
        buyer: Address,
        hub: Address,
        product_id: U256,
        quantity: U256,
        unit_price: &str,
    ) -> Result<Executed, ActionError> {
        let token = contracts.token().ok_or_else(|| {
            ChainError::Configuration("payment token address is not resolved".to_owned())
        })?;
        let market = contracts.marketplace();
        let spender = market.address();

        let unit_price = parse_price(unit_price)?;
        let required = total_price(unit_price, quantity)
            .ok_or_else(|| ActionError::invalid("Purchase total is too large"))?;

        let available = token.balance_of(buyer).await?;
        if available < required {
            return Err(ActionError::InsufficientBalance {
                required,
                available,
            });
        }

        let mut tx_hashes = Vec::new();
        let allowance = token.allowance(buyer, spender).await?;
        if allowance < required {
            info!(
                "allowance {} below {}; approving {}",
                to_display_ether(allowance),
                to_display_ether(required),
                spender
            );
            let approval = token.approve(spender, required).await?;
            tx_hashes.push(self.confirm(approval).await?);
            self.enter(ActionPhase::Submitting);
        }

        let pending = market.purchase_product(hub, product_id, quantity).await?;
        tx_hashes.push(self.confirm(pending).await?);

        Ok(Executed {
            tx_hashes,
            message: Some("Purchase successful!".to_owned()),
        })
    }

    async fn confirm(&self, pending: PendingTx) -> Result<String, ChainError> {
        debug!("awaiting confirmation of {}", pending.tx_hash());
        self.enter(ActionPhase::AwaitingConfirmation);
        let receipt = pending.confirm().await?;
        Ok(receipt.tx_hash)
    }
}

fn parse_price(input: &str) -> Result<U256, ActionError> {
    parse_amount(input).map_err(|err| match err {
        AmountError::Empty => ActionError::invalid("Please fill all fields"),
        AmountError::Invalid { .. } => ActionError::Validation(format!("Invalid price: {err}")),
    })
}

/// Required-field checks, before anything touches the chain.
fn validate(action: &Action) -> Result<(), ActionError> {
    match action {
        Action::ContributeProduct {
            hub,
            quantity,
            price,
            ..
        } => {
            if hub.is_zero() || *quantity == 0 || price.trim().is_empty() {
                return Err(ActionError::invalid("Please fill all fields"));
            }
        }
        Action::RegisterHub { name, location } => {
            if name.trim().is_empty() || location.trim().is_empty() {
                return Err(ActionError::invalid("Please fill in both name and location"));
            }
        }
        Action::CreateProduct { name } => {
            if name.trim().is_empty() {
                return Err(ActionError::invalid("Please enter a product name"));
            }
        }
        Action::SendRequest {
            to_hub, quantity, ..
        } => {
            if to_hub.is_zero() || *quantity == 0 {
                return Err(ActionError::invalid("Please fill all required fields"));
            }
        }
        Action::Purchase {
            hub,
            quantity,
            unit_price,
            ..
        } => {
            if hub.is_zero() || *quantity == 0 || unit_price.trim().is_empty() {
                return Err(ActionError::invalid("Please select a product and quantity"));
            }
        }
        Action::RegisterFarmer
        | Action::WithdrawEarnings
        | Action::AddProductToHub { .. }
        | Action::ToggleProductStatus { .. }
        | Action::AcceptRequest { .. }
        | Action::DenyRequest { .. } => {}
    }
    Ok(())
}

/// The alert shown for a failed action. `None` when the user declined the prompt.
fn failure_message(action: &Action, err: &ActionError) -> Option<String> {
    match err {
        ActionError::Chain(chain) if chain.is_user_rejection() => None,
        ActionError::Chain(_) => Some(failure_alert(action).to_owned()),
        other => Some(other.to_string()),
    }
}

fn failure_alert(action: &Action) -> &'static str {
    match action {
        Action::RegisterFarmer => "Failed to register as farmer. Please try again.",
        Action::ContributeProduct { .. } => "Failed to list product. Please try again.",
        Action::WithdrawEarnings => "Failed to withdraw earnings. Please try again.",
        Action::RegisterHub { .. } => "Failed to register as hub. Please try again.",
        Action::CreateProduct { .. } => "Failed to create product. Please try again.",
        Action::AddProductToHub { .. } => "Failed to add product to hub. Please try again.",
        Action::ToggleProductStatus { .. } => "Failed to update product status. Please try again.",
        Action::SendRequest { .. } => "Failed to send request. Please try again.",
        Action::AcceptRequest { .. } => "Failed to accept request. Please try again.",
        Action::DenyRequest { .. } => "Failed to deny request. Please try again.",
        Action::Purchase { .. } => "Failed to purchase product. Please try again.",
    }
}
