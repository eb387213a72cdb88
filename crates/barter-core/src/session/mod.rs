//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: authenticated session and principal types
//! - `credentials`: sign-in/sign-up form validation

mod credentials;
mod model;

pub use credentials::Credentials;
pub use model::{Principal, Session, SessionChange};
