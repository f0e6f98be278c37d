//! Token endpoint middleware: exchanges form-posted credentials for a signed JWT.
//!
//! Authentication and extra claims are delegated to a [`ClaimsProvider`] and an optional
//! [`ClaimsAugmenter`]; everything else (path gate, request checks, claim assembly,
//! signing, response shaping) happens here.

pub mod claims;
pub mod error;
pub mod issuer;
pub mod middleware;
pub mod options;
pub mod provider;
pub mod request;
pub mod signing;

pub use claims::{Claim, ClaimSet, Identity};
pub use error::{ConfigError, ErrorKind, IssueError};
pub use issuer::{IssuedToken, IssuedTokenResponse, Outcome, TokenIssuer, TokenIssuerBuilder};
pub use middleware::{token_endpoint, TokenEndpointExt};
pub use options::IssuerOptions;
pub use provider::{ClaimsAugmenter, ClaimsProvider};
pub use request::{FormFields, TokenRequest};
pub use signing::{parse_algorithm, SigningAlgorithm, SigningCredentials, SigningKey};
