// Core Gemini image-generation functionality

// API client for Gemini, under either calling convention
pub mod client;
pub use client::*;

// Client-side chat sessions
pub mod chat;
pub use chat::ChatSession;

// Request/response data structures
pub mod types;
pub use types::*;

// Credential resolution and access tokens
pub mod auth;
pub use auth::{CallingConvention, TokenSource};

// Configuration loading
pub mod config;
pub use config::*;

// Shared error types
pub mod errors;
pub use errors::*;
