//! Campus helpdesk: role-gated ticketing for students, support agents,
//! and managers.
//!
//! The interesting parts live in [`role`] (who may do what) and
//! [`tickets`] (the ticket lifecycle service). Everything else is the
//! plumbing that carries a request to them: configuration, sessions,
//! storage, entities, and the actix-web handlers under [`web`].

pub mod app_config;
pub mod attachment;
pub mod constants;
pub mod db;
pub mod group;
pub mod middleware;
pub mod orm;
pub mod role;
pub mod session;
pub mod storage;
pub mod tickets;
pub mod user;
pub mod web;
