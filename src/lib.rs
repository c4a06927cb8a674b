//! Library crate for the extraction plugin host

pub mod error;
pub mod plugins;
pub mod services;

// Core modules
pub mod core {
    pub mod config;
    pub mod version;
}

// CLI modules
pub mod cli {
    pub mod args;
}

// Format modules
pub mod formats {
    pub mod csv;
    pub mod json;
    pub mod jsonl;
    pub mod text;
    pub mod traits;
}
