//! Persistence for securities and daily prices.
//!
//! Repositories hold a [`ConnectionManager`](crate::ConnectionManager) and acquire a fresh
//! scoped handle per call; no handle outlives the call that opened it.

mod price;
mod security;

pub use price::PriceRepository;
pub use security::{read_reference_file, SecurityRepository};
