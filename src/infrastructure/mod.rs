pub mod env_validator;
pub mod logging;
pub mod object_store;
pub mod secrets;
