use chaos_casino::{
    telemetry,
    wallets,
};
use clap::{
    Parser,
    ValueEnum,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use std::{
    fs,
    path::PathBuf,
    str::FromStr,
};
use synchronizer::{
    Account,
    GameId,
    SyncConfig,
    chain::ContractBook,
};

mod client;
mod ui;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Network {
    BaseSepolia,
    Local,
}

impl From<Network> for DeploymentEnv {
    fn from(network: Network) -> Self {
        match network {
            Network::BaseSepolia => DeploymentEnv::BaseSepolia,
            Network::Local => DeploymentEnv::Local,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Terminal client for the Chaos Casino contracts", long_about = None)]
struct Args {
    /// Network whose deployment record and default RPC are used
    #[arg(long, value_enum, default_value_t = Network::BaseSepolia)]
    network: Network,

    /// Override the RPC URL of the selected network
    #[arg(long)]
    rpc_url: Option<String>,

    /// Keystore to play with; repeat to cycle accounts with `a`
    #[arg(long = "wallet")]
    wallets: Vec<String>,

    /// Keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Follow an address read-only, without a wallet
    #[arg(long)]
    watch: Option<Account>,

    /// Where pending items and logs are kept
    #[arg(long, default_value = "~/.chaos-casino")]
    data_dir: String,

    /// Page to open first (a game name or `collection`)
    #[arg(long)]
    game: Option<String>,

    /// Pending items exported from the browser client, as `<game>=<file>`
    #[arg(long = "import-legacy", value_parser = parse_import)]
    imports: Vec<(GameId, PathBuf)>,
}

fn parse_import(raw: &str) -> std::result::Result<(GameId, PathBuf), String> {
    let (game, file) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <game>=<file>, got `{raw}`"))?;
    let game = GameId::from_str(game).map_err(|err| err.to_string())?;
    if file.is_empty() {
        return Err("missing file after `=`".to_string());
    }
    Ok((game, PathBuf::from(file)))
}

fn read_imports(imports: Vec<(GameId, PathBuf)>) -> Result<Vec<client::LegacyImport>> {
    imports
        .into_iter()
        .map(|(game, file)| {
            let source = wallets::expand_path(&file.to_string_lossy());
            let json = fs::read_to_string(&source)
                .wrap_err_with(|| format!("Failed to read {}", source.display()))?;
            Ok(client::LegacyImport { game, source, json })
        })
        .collect()
}

fn start_view(game: Option<&str>) -> Result<client::View> {
    match game {
        None => Ok(client::View::Game(GameId::Buy)),
        Some(name) if name.eq_ignore_ascii_case("collection") => Ok(client::View::Collection),
        Some(name) => GameId::from_str(name)
            .map(client::View::Game)
            .map_err(|err| eyre!("{err}")),
    }
}

fn contract_book(env: DeploymentEnv) -> Result<ContractBook> {
    let store = DeploymentStore::new(".", env)
        .map_err(|err| eyre!("{err:#}"))
        .wrap_err("Failed to prepare the deployments directory")?;
    let mut record = store
        .load()
        .map_err(|err| eyre!("{err:#}"))?
        .unwrap_or_default();
    let overridden = record.apply_env_overrides();
    if !overridden.is_empty() {
        tracing::info!(contracts = ?overridden, "contract addresses overridden from the environment");
    }
    let missing = record.missing_contracts();
    if !missing.is_empty() {
        return Err(eyre!(
            "No {env} address for {}. Add them to {} or set {}.",
            missing.join(", "),
            store.path().display(),
            missing
                .iter()
                .map(|name| deployments::env_var_name(name))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    ContractBook::from_record(&record).map_err(|err| eyre!("{err:#}"))
}

fn build_config(args: Args) -> Result<client::AppConfig> {
    let env = DeploymentEnv::from(args.network);
    let data_dir = wallets::expand_path(&args.data_dir);
    telemetry::init_file_logging(&data_dir.join("logs"))?;
    tracing::info!(network = %env, "starting chaos-casino client");

    let start = start_view(args.game.as_deref())?;
    let imports = read_imports(args.imports)?;
    let book = contract_book(env)?;
    let rpc_url = args
        .rpc_url
        .unwrap_or_else(|| env.default_rpc_url().to_string());

    let mut accounts = Vec::new();
    if !args.wallets.is_empty() {
        let dir = wallets::resolve_wallet_dir(args.wallet_dir.as_deref())?;
        for name in &args.wallets {
            let descriptor = wallets::find_wallet(&dir, name)?;
            let wallet = wallets::unlock_wallet(&descriptor, env.chain_id())?;
            accounts.push(client::AccountConfig::Wallet {
                name: descriptor.name,
                wallet,
            });
        }
    }
    if let Some(account) = args.watch {
        accounts.push(client::AccountConfig::Watch(account));
    }
    if accounts.is_empty() {
        return Err(eyre!(
            "Specify --wallet <name> to play or --watch <address> to follow an account"
        ));
    }

    Ok(client::AppConfig {
        network: env,
        rpc_url,
        book,
        accounts,
        data_dir,
        start,
        sync: SyncConfig::default(),
        imports,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    deployments::ensure_structure(".").map_err(|e| eyre!(e))?;
    let args = Args::parse();
    let app_config = build_config(args)?;
    client::run_app(app_config).await
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn args__parse_repeated_wallets_and_network() {
        // given
        let argv = [
            "chaos-casino",
            "--network",
            "local",
            "--wallet",
            "alice",
            "--wallet",
            "bob",
            "--game",
            "anvil",
        ];

        // when
        let args = Args::try_parse_from(argv).unwrap();

        // then
        assert!(matches!(args.network, Network::Local));
        assert_eq!(args.wallets, vec!["alice", "bob"]);
        assert_eq!(args.data_dir, "~/.chaos-casino");
        assert_eq!(
            start_view(args.game.as_deref()).unwrap(),
            client::View::Game(GameId::Anvil)
        );
    }

    #[test]
    fn args__watch_rejects_a_malformed_address() {
        // given
        let argv = ["chaos-casino", "--watch", "0x1234"];

        // when
        let parsed = Args::try_parse_from(argv);

        // then
        assert!(parsed.is_err());
    }

    #[test]
    fn args__import_legacy_splits_game_and_file() {
        // given
        let argv = [
            "chaos-casino",
            "--import-legacy",
            "rift=bets.json",
            "--import-legacy",
            "anvil=~/strikes.json",
        ];

        // when
        let args = Args::try_parse_from(argv).unwrap();

        // then
        assert_eq!(
            args.imports,
            vec![
                (GameId::Rift, PathBuf::from("bets.json")),
                (GameId::Anvil, PathBuf::from("~/strikes.json")),
            ]
        );
    }

    #[test]
    fn args__import_legacy_rejects_malformed_values() {
        for value in ["rift", "roulette=bets.json", "anvil="] {
            let parsed = Args::try_parse_from(["chaos-casino", "--import-legacy", value]);
            assert!(parsed.is_err(), "{value} should be rejected");
        }
    }

    #[test]
    fn read_imports__missing_file_names_the_path() {
        // given
        let imports = vec![(GameId::Rift, PathBuf::from("/nonexistent/bets.json"))];

        // when
        let err = read_imports(imports).unwrap_err();

        // then
        assert!(format!("{err:#}").contains("/nonexistent/bets.json"));
    }

    #[test]
    fn start_view__accepts_the_collection_page() {
        assert_eq!(
            start_view(Some("Collection")).unwrap(),
            client::View::Collection
        );
        assert!(start_view(Some("roulette")).is_err());
    }
}
