//! Data models for recruiting entities

mod candidate;
mod user;
mod vacancy;

pub use candidate::*;
pub use user::*;
pub use vacancy::*;
