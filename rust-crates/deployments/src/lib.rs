use anyhow::{
    Context,
    Result,
    anyhow,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    BaseSepolia,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::BaseSepolia => "base-sepolia",
            DeploymentEnv::Local => "local",
        }
    }

    pub fn chain_id(self) -> u64 {
        match self {
            DeploymentEnv::BaseSepolia => 84_532,
            DeploymentEnv::Local => 31_337,
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            DeploymentEnv::BaseSepolia => "https://sepolia.base.org",
            DeploymentEnv::Local => "http://localhost:8545",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::BaseSepolia => "Base Sepolia",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// Contracts the client talks to, in the order they are reported.
pub const CONTRACT_NAMES: [&str; 9] = [
    "hub", "coinflip", "rift", "anvil", "altar", "plinko", "pegs", "cascade", "runes",
];

/// Addresses of one casino deployment, kept as the hex strings written by the
/// deploy tooling.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentRecord {
    #[serde(default)]
    pub recorded_at: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub network_url: Option<String>,
    #[serde(default)]
    pub hub: Option<String>,
    #[serde(default)]
    pub coinflip: Option<String>,
    #[serde(default)]
    pub rift: Option<String>,
    #[serde(default)]
    pub anvil: Option<String>,
    #[serde(default)]
    pub altar: Option<String>,
    #[serde(default)]
    pub plinko: Option<String>,
    #[serde(default)]
    pub pegs: Option<String>,
    #[serde(default)]
    pub cascade: Option<String>,
    #[serde(default)]
    pub runes: Option<String>,
}

impl DeploymentRecord {
    pub fn address_of(&self, contract: &str) -> Option<&str> {
        let slot = match contract {
            "hub" => &self.hub,
            "coinflip" => &self.coinflip,
            "rift" => &self.rift,
            "anvil" => &self.anvil,
            "altar" => &self.altar,
            "plinko" => &self.plinko,
            "pegs" => &self.pegs,
            "cascade" => &self.cascade,
            "runes" => &self.runes,
            _ => return None,
        };
        slot.as_deref().filter(|s| !s.trim().is_empty())
    }

    fn slot_mut(&mut self, contract: &str) -> Option<&mut Option<String>> {
        match contract {
            "hub" => Some(&mut self.hub),
            "coinflip" => Some(&mut self.coinflip),
            "rift" => Some(&mut self.rift),
            "anvil" => Some(&mut self.anvil),
            "altar" => Some(&mut self.altar),
            "plinko" => Some(&mut self.plinko),
            "pegs" => Some(&mut self.pegs),
            "cascade" => Some(&mut self.cascade),
            "runes" => Some(&mut self.runes),
            _ => None,
        }
    }

    pub fn missing_contracts(&self) -> Vec<&'static str> {
        CONTRACT_NAMES
            .iter()
            .copied()
            .filter(|name| self.address_of(name).is_none())
            .collect()
    }

    /// Overrides entries from `CHAOS_<NAME>_ADDRESS` style variables, returning the
    /// names that were replaced.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<&'static str> {
        let mut replaced = Vec::new();
        for name in CONTRACT_NAMES {
            let var = env_var_name(name);
            let Some(value) = lookup(&var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            if let Some(slot) = self.slot_mut(name) {
                *slot = Some(value.trim().to_string());
                replaced.push(name);
            }
        }
        replaced
    }

    pub fn apply_env_overrides(&mut self) -> Vec<&'static str> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }
}

pub fn env_var_name(contract: &str) -> String {
    format!("CHAOS_{}_ADDRESS", contract.to_ascii_uppercase())
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }
}

pub fn ensure_structure(root: impl AsRef<Path>) -> Result<()> {
    for env in [DeploymentEnv::BaseSepolia, DeploymentEnv::Local] {
        let _ = ensure_store(root.as_ref(), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let root = root.join(DEPLOYMENTS_ROOT);
    if !root.exists() {
        fs::create_dir_all(&root).context("Failed to create .deployments directory")?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create .deployments/{} directory", env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) || data.is_empty() {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}
