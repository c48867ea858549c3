// NOUS API lib.rs
//
// HTTP surface of the NOUS AI gateway: routes, public entities and the
// OpenAPI document.

pub mod api;
pub mod entities;
pub mod openapi;

pub use api::{create_application, Application};
