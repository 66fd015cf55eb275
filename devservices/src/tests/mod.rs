//! Service tests for devservices
//!
//! This module contains tests for the key, lifecycle and registry services.

pub mod fixtures;
pub mod key;
