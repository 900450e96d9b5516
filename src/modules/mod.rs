pub mod account;
pub mod auth;
pub mod notification;

mod router;
pub use router::get_router;
