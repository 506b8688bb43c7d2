//! Domain model for the application portal.
//!
//! Canonical entities: Agent, StudentApplication, University. Request and
//! response types for the JSON API live in `requests`. Everything here is
//! plain data; persistence lives in `crate::db`.

mod entities;
mod requests;

pub use entities::*;
pub use requests::*;

#[cfg(test)]
mod tests;
