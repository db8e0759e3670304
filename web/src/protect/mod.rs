//! This module provides protection mechanisms for the live-update endpoints.
//!
//! Each submodule holds middleware intended to be given to
//! `axum::middleware::from_fn_with_state` in the router. They run after the
//! caller has been authenticated and decide whether that caller may proceed.

pub(crate) mod admin;
