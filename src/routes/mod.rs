pub mod auth;
pub mod certificate;
pub mod expert;
pub mod upload;
pub mod user;
