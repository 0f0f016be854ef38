//! Common types shared by the BiliNote client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
