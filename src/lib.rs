//! site-cms - Content-management backend for a static marketing site
//!
//! This crate provides an admin API that lets a single administrator sign in,
//! edit the site's `content.json`, upload images and publish the result
//! through git or the GitHub contents API.

pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod github;
pub mod logging;
pub mod publish;
pub mod server;
pub mod upload;
