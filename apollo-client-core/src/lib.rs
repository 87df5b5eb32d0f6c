//! Request chain, normalized store and query watcher for a GraphQL client.
//!
//! The three pieces compose as: a [`transport::ApolloClient`] builds an
//! [`interceptor::RequestChain`] per operation from an
//! [`transport::InterceptorProvider`]'s ordered list of
//! [`interceptor::Interceptor`]s; the [`interceptor::standard`] stages read
//! and write a [`store::ApolloStore`]; a [`watcher::QueryWatcher`] subscribes
//! to that store and resubmits an operation whenever a key it depends on
//! changes.

pub mod cache_key;
pub mod data_dict;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod operation;
pub mod store;
pub mod transport;
pub mod watcher;

pub use cache_key::CacheKey;
pub use error::ChainError;
pub use store::ApolloStore;
