#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub mod aes_ctr;
pub mod error;
pub mod hmac_tag;
pub mod measure;
pub mod security;

pub use aes_ctr::AesCtrMeasure;
pub use error::SecurityError;
pub use hmac_tag::HmacMeasure;
pub use measure::Measure;
pub use security::Security;
