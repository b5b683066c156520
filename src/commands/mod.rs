pub mod inventory;
pub mod purge;
