pub use super::balances::Entity as Balances;
pub use super::notifications::Entity as Notifications;
pub use super::transactions::Entity as Transactions;
