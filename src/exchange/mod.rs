//! Exchange connectivity

pub mod auth;
pub mod messages;
pub mod rest;
pub mod symbols;

pub use rest::RestGateway;
