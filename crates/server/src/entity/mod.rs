pub mod gateway_api_key;
pub mod gateway_identity;
pub mod gateway_user;
