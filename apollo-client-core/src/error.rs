//! The closed set of error kinds surfaced by the request chain and store.
//!
//! Modeled on [`juniper::GraphQLError`]: a `derive_more`-driven `Display`
//! plus a hand-written [`std::error::Error::source`] that forwards to the
//! wrapped transport/decode error where one exists.

use derive_more::{Display, From};

use crate::http::GraphQLError as ResponseError;

/// Errors surfaced by [`crate::interceptor::RequestChain`] and
/// [`crate::store::ApolloStore`].
#[derive(Debug, Display, From)]
pub enum ChainError {
    /// The chain was built with an empty interceptor list.
    #[display("request chain has no interceptors")]
    NoInterceptors,

    /// A local-only cache policy found the store incomplete.
    #[display("cache miss at `{_0}`")]
    CacheMiss(String),

    /// The HTTP transport returned a non-2xx status code.
    #[display("invalid response code {status}")]
    InvalidResponseCode {
        /// The HTTP status code returned by the server.
        status: u16,
        /// The raw response body, for diagnostics.
        body: String,
    },

    /// A parsed [`crate::http::GraphQLResult`] was expected at the end of the
    /// chain but none was present.
    #[display("no parsed response was produced by the chain")]
    NoParsedResponse,

    /// The server rejected a persisted-query hash and requested the full
    /// document.
    #[display("persisted query not found")]
    ApqNotFound,

    /// The configured retry threshold was exceeded.
    #[display("exceeded maximum of {max} retries")]
    TooManyRetries {
        /// The configured maximum.
        max: u32,
    },

    /// The response carried GraphQL errors with no `data`, and
    /// [`crate::interceptor::standard::GraphqlErrorElevationInterceptor`]
    /// elevated that into a failure. Standard chains that omit that
    /// interceptor instead deliver a success result with `errors` populated.
    #[display("response contained {} graphql error(s)", _0.len())]
    GraphqlErrors(Vec<ResponseError>),

    /// The underlying HTTP transport failed.
    #[display("transport error: {_0}")]
    #[from]
    Transport(reqwest::Error),

    /// The response body could not be decoded as the expected JSON envelope.
    #[display("failed to decode response body: {_0}")]
    #[from]
    Decode(serde_json::Error),

    /// A multipart response chunk was malformed.
    #[display("malformed multipart chunk: {_0}")]
    MalformedMultipart(String),
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::NoInterceptors
            | Self::CacheMiss(_)
            | Self::InvalidResponseCode { .. }
            | Self::NoParsedResponse
            | Self::ApqNotFound
            | Self::TooManyRetries { .. }
            | Self::GraphqlErrors(_)
            | Self::MalformedMultipart(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_miss_display_includes_path() {
        let err = ChainError::CacheMiss("hero.name".into());
        assert_eq!(err.to_string(), "cache miss at `hero.name`");
    }

    #[test]
    fn too_many_retries_display_includes_max() {
        let err = ChainError::TooManyRetries { max: 3 };
        assert_eq!(err.to_string(), "exceeded maximum of 3 retries");
    }
}
