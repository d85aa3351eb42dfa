pub mod client_ctx;
pub mod csrf;

pub use client_ctx::ClientCtx;
