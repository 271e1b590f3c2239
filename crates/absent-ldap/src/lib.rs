//! LDAP directory backend for vacation policy lookup.
//!
//! One connection is opened per [`LdapLookup::resolve`] call and unbound
//! before it returns; nothing outlives the invocation.

mod attrs;
mod lookup;
mod time;

pub mod error;

pub use error::{Error, Result};
pub use lookup::{LdapConfig, LdapLookup};
pub use time::parse_generalized_time;
