//! Web Annotator
//!
//! Durable text anchoring for web pages: annotations are stored as a
//! linear character offset plus a quote with surrounding context, painted
//! into the page as wrapper elements and re-found after the page changes.

pub mod anchoring;
pub mod annotations;
pub mod config;
pub mod db;
pub mod dom;
pub mod error;
pub mod html;
pub mod interchange;
pub mod routes;
pub mod session;
pub mod state;
