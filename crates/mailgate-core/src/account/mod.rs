//! Account management module.
//!
//! Persisted accounts, the credential records sealed inside them, and
//! validation of those records.

mod model;
mod repository;
mod validation;

pub use model::{
    Account, AccountId, ActiveIdentity, CredentialRecord, Endpoint, Identities, Identity,
    NewAccount, Security,
};
pub use repository::AccountRepository;
pub use validation::{ValidationError, ValidationResult, validate_record};
