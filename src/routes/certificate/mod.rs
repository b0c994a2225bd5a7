mod handler;
pub mod model;

pub use handler::{
    create_certificate, delete_certificate, get_certificate, list_certificates, update_certificate,
};
