use std::path::PathBuf;

/// Bitcoin chain type.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BitcoinChain {
    /// Bitcoin mainnet.
    #[default]
    Mainnet,
    /// Bitcoin testnet.
    Testnet,
    /// Bitcoin signet.
    Signet,
    /// Local regression test network.
    Regtest,
}

impl BitcoinChain {
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Self::Mainnet => bitcoin::Network::Bitcoin,
            Self::Testnet => bitcoin::Network::Testnet,
            Self::Signet => bitcoin::Network::Signet,
            Self::Regtest => bitcoin::Network::Regtest,
        }
    }

    /// Subdirectory bitcoind keeps the chain's data in, relative to its data directory.
    pub fn datadir_subdir(&self) -> Option<&'static str> {
        match self {
            Self::Mainnet => None,
            Self::Testnet => Some("testnet3"),
            Self::Signet => Some("signet"),
            Self::Regtest => Some("regtest"),
        }
    }
}

/// Default bitcoind data directory of the host platform.
#[cfg(target_os = "linux")]
pub fn default_datadir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bitcoin"))
}

/// Default bitcoind data directory of the host platform.
///
/// `~/Library/Application Support/Bitcoin` on macOS and `%APPDATA%\Bitcoin` on Windows.
#[cfg(any(target_os = "macos", target_os = "windows"))]
pub fn default_datadir() -> Option<PathBuf> {
    dirs::data_dir().map(|data| data.join("Bitcoin"))
}

/// Default bitcoind data directory of the host platform.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn default_datadir() -> Option<PathBuf> {
    None
}
