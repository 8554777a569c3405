pub mod api;
pub mod classifier;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod filter;
pub mod guide_override;
pub mod parser;
pub mod preprocessing;
pub mod report;
pub mod resolver;
pub mod serializer;
pub mod source;
