//! HTTP handlers, one module per area. Handlers load data, hand it to `render`, and turn
//! state changes into a flash plus a redirect.
pub mod accounts;
pub mod blog;
pub mod pages;
pub mod pets;
pub mod plans;
