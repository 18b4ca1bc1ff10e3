//! Station Core - Entity Types and Credential Primitives
//!
//! Data structures, the error taxonomy, and the pieces of the credential
//! lifecycle that need no I/O: key generation and parsing, secret digesting,
//! password hashing and the accept/reject decisions built on them.
//! All other crates depend on this.

mod apikey;
mod auth;
mod digest;
mod entities;
mod enums;
mod error;
mod identity;
mod password;
mod validation;

pub use apikey::*;
pub use auth::*;
pub use digest::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use password::*;
pub use validation::*;
