pub mod config;
pub mod context;
pub mod credentials;
pub mod file_cleaner;
pub mod jnc_url;
pub mod logging;
pub mod part_range;
