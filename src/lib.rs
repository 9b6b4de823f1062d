//! Recipe Box client
//!
//! Read/write consistency layer for the Recipe Box recipe service: a
//! session-scoped query cache, a mutation coordinator that patches and
//! invalidates cached views, the tab membership model and the library view
//! composer.

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod membership;
pub mod models;
pub mod mutation;
pub mod notices;
pub mod optimistic;
pub mod remote;
pub mod session;
pub mod view;

pub use cache::{Freshness, QueryCache, QueryFamily, QueryKey, QueryValue};
pub use config::Config;
pub use errors::{ClientError, ClientResult};
pub use membership::{Collections, MembershipChange};
pub use mutation::{Mutation, MutationCoordinator, MutationOutcome};
pub use optimistic::ResultList;
pub use remote::{HttpRecipeService, RecipeService};
pub use session::RecipeSession;
pub use view::ViewState;

#[cfg(test)]
mod tests;
