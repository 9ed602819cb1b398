pub mod download;
pub mod quota;
pub mod upload;
