//! Frontdesk Core — domain models, store contracts, and error taxonomy
//! for the hotel back-office authorization system.
//!
//! This crate has no I/O dependencies. Persistence lives behind the
//! repository traits in [`store`]; the database crate implements them.

pub mod error;
pub mod models;
pub mod store;
