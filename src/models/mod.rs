pub mod actor;
pub mod asset;
pub mod balance;
pub mod error;
pub mod notification;
pub mod price;
pub mod transaction;
