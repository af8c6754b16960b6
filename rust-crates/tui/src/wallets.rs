use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use ethers::signers::{
    LocalWallet,
    MnemonicBuilder,
    Signer,
    coins_bip39::English,
};
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

/// A keystore file in the wallet directory, named after the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => Ok(expand_path(raw)),
        None => default_wallet_dir(),
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Keystores are plain files; `cast wallet import` writes them without an
/// extension, older tools with `.json`.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }
        let name = file_name
            .strip_suffix(".json")
            .unwrap_or(file_name)
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor, chain_id: u64) -> Result<LocalWallet> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;

    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    let wallet = wallet_from_secret(&secret)
        .ok_or_else(|| {
            eyre!(
                "Wallet '{}' contained unsupported key material",
                descriptor.name
            )
        })?
        .with_chain_id(chain_id);
    tracing::info!(
        wallet = %descriptor.name,
        address = %ethers::utils::to_checksum(&wallet.address(), None),
        "wallet unlocked"
    );
    Ok(wallet)
}

/// Accepts a raw 32-byte key or a mnemonic of at least 12 words.
fn wallet_from_secret(secret: &[u8]) -> Option<LocalWallet> {
    if secret.len() == 32 {
        if let Ok(wallet) = LocalWallet::from_bytes(secret) {
            return Some(wallet);
        }
    }
    let phrase = std::str::from_utf8(secret).ok()?;
    if phrase.split_whitespace().count() < 12 {
        return None;
    }
    MnemonicBuilder::<English>::default()
        .phrase(phrase.trim())
        .build()
        .ok()
}
