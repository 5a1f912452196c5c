use ah_api_types::{
    Action, ActionPhase, ActionResponse, Address, FarmerView, HubView, MarketplaceView, Role,
    Session, SessionStatusResponse, ViewSnapshot,
};
use ah_chain_client::{ChainError, ChainResult};
use thiserror::Error;

use crate::contracts::{ContractSession, ContractSessionFactory};
use crate::dispatcher::ActionDispatcher;
use crate::loader::DataLoader;
use crate::session::WalletSessionManager;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no wallet connected")]
    NotConnected,

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Session, contract handles and the services that use them, passed around
/// explicitly. Contract handles are rebuilt whenever the session changes.
pub struct MarketplaceApp {
    wallet: WalletSessionManager,
    factory: ContractSessionFactory,
    contracts: ContractSession,
    loader: DataLoader,
    dispatcher: ActionDispatcher,
}

impl MarketplaceApp {
    pub async fn start(
        wallet: WalletSessionManager,
        factory: ContractSessionFactory,
        loader: DataLoader,
        dispatcher: ActionDispatcher,
    ) -> ChainResult<Self> {
        let contracts = factory.open(wallet.session().as_ref()).await?;
        Ok(Self {
            wallet,
            factory,
            contracts,
            loader,
            dispatcher,
        })
    }

    pub fn status(&self) -> SessionStatusResponse {
        let session = self.wallet.session();
        SessionStatusResponse {
            connected: session.is_some(),
            address: session.map(|s| s.address),
            read_only: self.contracts.is_read_only(),
            token_resolved: self.contracts.token().is_some(),
        }
    }

    pub async fn check_existing(&mut self) -> ChainResult<Option<Session>> {
        let session = self.wallet.check_existing().await;
        if session.is_some() {
            self.rebind().await?;
        }
        Ok(session)
    }

    pub async fn connect(&mut self) -> ChainResult<Session> {
        let session = self.wallet.connect().await?;
        self.rebind().await?;
        Ok(session)
    }

    /// Forget the session and fall back to read-only handles.
    pub async fn disconnect(&mut self) -> ChainResult<()> {
        self.wallet.disconnect();
        self.rebind().await
    }

    async fn rebind(&mut self) -> ChainResult<()> {
        self.contracts = self.factory.open(self.wallet.session().as_ref()).await?;
        Ok(())
    }

    fn account(&self) -> Result<Address, AppError> {
        self.wallet
            .session()
            .map(|s| s.address)
            .ok_or(AppError::NotConnected)
    }

    pub async fn farmer_view(&self, selected_hub: Option<Address>) -> Result<FarmerView, AppError> {
        let account = self.account()?;
        Ok(self
            .loader
            .load_farmer_view(&self.contracts, account, selected_hub)
            .await?)
    }

    pub async fn hub_view(&self) -> Result<HubView, AppError> {
        let account = self.account()?;
        Ok(self.loader.load_hub_view(&self.contracts, account).await?)
    }

    pub async fn marketplace_view(&self) -> ChainResult<MarketplaceView> {
        self.loader
            .load_marketplace_view(&self.contracts, self.wallet.session().as_ref())
            .await
    }

    pub async fn view_for(
        &self,
        role: Role,
        selected_hub: Option<Address>,
    ) -> Result<ViewSnapshot, AppError> {
        Ok(match role {
            Role::Farmer => ViewSnapshot::Farmer(self.farmer_view(selected_hub).await?),
            Role::Hub => ViewSnapshot::Hub(self.hub_view().await?),
            Role::Shopper => ViewSnapshot::Marketplace(self.marketplace_view().await?),
        })
    }

    /// Run `action` and reload the view of the role it belongs to.
    pub async fn perform(&self, action: &Action) -> ActionResponse {
        let role = action.role();
        let selected_hub = match action {
            Action::ContributeProduct { hub, .. } => Some(*hub),
            _ => None,
        };

        let app = self;
        let (report, view) = self
            .dispatcher
            .dispatch(&self.contracts, action, move || async move {
                app.view_for(role, selected_hub).await
            })
            .await;

        ActionResponse { report, view }
    }

    pub fn phase(&self) -> ActionPhase {
        self.dispatcher.phase()
    }
}
