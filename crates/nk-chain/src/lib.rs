//! Chain lifecycle: supervising a node process from construction through
//! readiness to teardown, and deriving web3 provider settings from it.

pub mod provider;
pub mod supervisor;
pub mod variants;

#[cfg(test)]
pub(crate) mod test_support;

pub use provider::{ProviderClass, ProviderConfigResolver};
pub use supervisor::{ChainContext, ChainState, ChainSupervisor, ProcessFactory};
pub use variants::ChainVariant;
