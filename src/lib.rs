//! Self-service administration portal for the payments platform.
//!
//! The portal fronts three internal services: the admin-users API for
//! identities and team membership, the payment connector for charges and
//! refunds, and the notification service for SMS one-time codes. It owns
//! no data of record; every page is a thin layer of validation and
//! response mapping over one outbound call.

pub mod api;
pub mod cli;
pub mod clients;
pub mod currency;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
