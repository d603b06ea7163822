//! Authentication and session lifecycle subsystem of the ERP backend.
//!
//! This crate owns login, token refresh, logout and password change for the
//! suite. It is mounted by the API service, which supplies routing, request
//! validation middleware and cookie transport; everything here is reachable
//! through [`services::AuthService`] and the composition points in
//! [`config`], [`store`] and [`services`].

pub mod config;
pub mod db;
pub mod dtos;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use services::{AuthService, JwtService, ServiceError, SessionLifecycle};
pub use store::{AuthStore, AuthTx};
