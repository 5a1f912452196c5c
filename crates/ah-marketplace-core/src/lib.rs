//! Session, contract binding, view loading and action dispatch for the
//! AgriHub marketplace.

pub mod app;
pub mod contracts;
pub mod dispatcher;
pub mod fanout;
pub mod loader;
pub mod session;

pub use app::{AppError, MarketplaceApp};
pub use contracts::{ContractSession, ContractSessionFactory};
pub use dispatcher::{ActionDispatcher, ActionError, DispatchConfig};
pub use fanout::{Aggregate, fan_out};
pub use loader::{DataLoader, FixedRating, LoaderConfig, PlaceholderRating, RatingSource};
pub use session::WalletSessionManager;
