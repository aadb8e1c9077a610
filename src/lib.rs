pub mod api;
pub mod auth;
pub mod config;
pub mod countdown;
pub mod db;
pub mod guard;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod poller;
pub mod session;
pub mod sound;
pub mod state;
