//! Origin client for ordo-sw.
//!
//! This crate provides the HTTP fetch pipeline the worker uses to reach the
//! origin, behind the [`Origin`] trait so strategies can be exercised without
//! a network.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, Origin, OriginRequest, UrlError, canonicalize};

pub use reqwest::{Method, StatusCode, header};
