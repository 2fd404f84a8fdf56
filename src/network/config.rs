use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Server-side settings, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address; port 0 picks a free port.
    pub bind_addr: String,

    /// Paillier and GM modulus size in bits.
    pub key_bits: usize,

    /// Statistical security parameter for the blinding masks.
    pub lambda: usize,

    /// How many Paillier randomizers to precompute at startup.
    pub precomputed_randomizers: usize,

    /// The server-side operand for standalone bit-comparison requests.
    pub comparison_value: u64,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:1990".to_string(),
            key_bits: 1024,
            lambda: 100,
            precomputed_randomizers: 64,
            comparison_value: 20,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> ServerConfig {
        let content = fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("Failed to read the configuration file: {}", path.display()));
        toml::from_str(&content)
            .unwrap_or_else(|_| panic!("Failed to parse the configuration file: {}", path.display()))
    }
}
