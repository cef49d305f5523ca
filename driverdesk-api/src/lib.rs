//! # DriverDesk API Server Library
//!
//! HTTP surface of the driver account API: login, registration, profile
//! and settings retrieval, profile updates and password resets.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `response`: Success envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
