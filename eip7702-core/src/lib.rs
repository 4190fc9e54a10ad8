pub mod authorization;
pub mod calldata;
pub mod constants;
pub mod delegated_account;
pub mod draft;
pub mod encoding;
pub mod executor;
pub mod submit;
pub mod transaction;
