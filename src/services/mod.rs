pub mod artifact;
pub mod parser;
pub mod scheduler;
pub mod uploader;
