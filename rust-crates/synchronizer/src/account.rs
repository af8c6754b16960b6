use std::{
    fmt,
    str::FromStr,
};

use anyhow::Context;
use ethers::{
    types::Address,
    utils::to_checksum,
};
use serde::{
    Deserialize,
    Serialize,
};

/// The connected wallet. Every piece of per-user state is scoped by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Account(pub Address);

impl Account {
    pub fn address(&self) -> Address {
        self.0
    }

    /// `0x1234…abcd`, for headers and notices.
    pub fn short(&self) -> String {
        let full = to_checksum(&self.0, None);
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl FromStr for Account {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address::from_str(s.trim())
            .with_context(|| format!("`{s}` is not a valid account address"))?;
        Ok(Self(address))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_checksum(&self.0, None))
    }
}
