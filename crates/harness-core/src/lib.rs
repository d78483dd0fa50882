pub mod collector;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod materialize;
pub mod model;
pub mod report;
pub mod sanitize;
