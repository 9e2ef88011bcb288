//! Common test utilities and helpers
//!
//! Shared by the integration tests: a scripted HTTP transport that stands in for a
//! Bitbucket Server, and fixtures for services and local git repositories.

#![allow(dead_code)]

pub mod mock_services;
pub mod test_fixtures;
