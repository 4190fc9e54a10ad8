pub mod authorization;
pub mod calldata;
pub mod delegation;
pub mod gas;
pub mod sponsor;
pub mod transaction;
pub mod validate;
