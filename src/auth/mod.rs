//! Authentication for the recruiting backend
//!
//! Credentials come from `/login`, live in the token store, and are renewed
//! through `/refresh` when the backend answers 401.

pub mod jwt;
pub mod refresh;
pub mod session;
pub mod tokens;

pub use refresh::{RefreshError, Refresher};
pub use session::{login, logout, status, Credentials};
pub use tokens::{Storage, TokenStore};
