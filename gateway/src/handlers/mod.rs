//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Service description, health check and model listing
//! - `speech` - OpenAI-compatible speech synthesis
//! - `admin` - Model reload
//! - `extract` - JSON extractor with OpenAI-style error bodies

pub mod admin;
pub mod api;
pub mod extract;
pub mod speech;
