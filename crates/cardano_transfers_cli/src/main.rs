//! cardano-transfers CLI: fetch, tokens, parse, report, verify.

use cardano_transfers::audit::verify_bundle_hash;
use cardano_transfers::{
    reproducibility_hash, AuditBundle, Cache, Fetcher, KoiosTx, ReportData, TokenListStore,
    TransferParser, TransfersConfig,
};
use cardano_transfers_report::render_report;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    let config = TransfersConfig::load();
    match cli.command {
        Command::Fetch(args) => run_fetch(&config, args),
        Command::Tokens(args) => run_tokens(&config, args),
        Command::Parse(args) => run_parse(&config, args),
        Command::Report(args) => run_report(args),
        Command::Verify(args) => run_verify(args),
    }
}

#[derive(Parser)]
#[command(name = "cardano-transfers")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Normalized transfer events from Cardano transactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch transactions of an address from Koios and cache them.
    Fetch(FetchArgs),
    /// Download the token list into the local store.
    Tokens(TokensArgs),
    /// Parse transactions into transfer events and write an audit bundle.
    Parse(ParseArgs),
    /// Generate an HTML report from a bundle.
    Report(ReportArgs),
    /// Verify a bundle's reproducibility hash.
    Verify(VerifyArgs),
}

#[derive(Parser)]
struct FetchArgs {
    #[arg(long)]
    address: String,
    #[arg(long, default_value_t = 0)]
    after_block: u64,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    #[arg(long)]
    offline: bool,
}

#[derive(Parser)]
struct TokensArgs {
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    /// Overrides the configured token list URL.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Parser)]
struct ParseArgs {
    /// Parse every transaction of this address.
    #[arg(long, conflicts_with = "tx")]
    address: Option<String>,
    /// Parse these transaction hashes.
    #[arg(long, num_args = 1.., required_unless_present = "address")]
    tx: Vec<String>,
    #[arg(long, default_value_t = 0)]
    after_block: u64,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    #[arg(long)]
    offline: bool,
    #[arg(long, default_value = "./reports")]
    reports_dir: PathBuf,
}

#[derive(Parser)]
struct ReportArgs {
    #[arg(long)]
    bundle: PathBuf,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser)]
struct VerifyArgs {
    #[arg(long)]
    bundle: PathBuf,
}

fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("cache.sqlite")
}

fn fetcher(
    config: &TransfersConfig,
    cache_dir: &Path,
    offline: bool,
) -> Result<Fetcher, Box<dyn std::error::Error>> {
    let cache = Cache::open(cache_path(cache_dir))?;
    Ok(Fetcher::new(config.fetch_config(offline), Some(cache))?)
}

fn file_stem_for(source: &str) -> String {
    source
        .chars()
        .take(20)
        .collect::<String>()
        .replace([' ', ':', '/'], "_")
}

async fn fetch_txs(
    fetcher: &Fetcher,
    address: &str,
    after_block: u64,
) -> Result<Vec<KoiosTx>, Box<dyn std::error::Error>> {
    let rows = fetcher.all_address_txs(address, after_block).await?;
    let hashes: Vec<String> = rows.into_iter().map(|r| r.tx_hash).collect();
    Ok(fetcher.tx_info(&hashes).await?)
}

fn run_fetch(config: &TransfersConfig, args: FetchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = fetcher(config, &args.cache_dir, args.offline)?;
    let rt = tokio::runtime::Runtime::new()?;
    let txs = rt.block_on(fetch_txs(&fetcher, &args.address, args.after_block))?;
    info!(
        count = txs.len(),
        requests = fetcher.request_count(),
        "fetch complete"
    );
    Ok(())
}

fn run_tokens(config: &TransfersConfig, args: TokensArgs) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = Fetcher::new(config.fetch_config(false), None)?;
    let store = TokenListStore::new(Cache::open(cache_path(&args.cache_dir))?);
    let url = args.url.as_deref().unwrap_or(&config.token_list_url);
    let rt = tokio::runtime::Runtime::new()?;
    let count = rt.block_on(store.refresh(&fetcher, url))?;
    println!("{}", count);
    Ok(())
}

fn run_parse(config: &TransfersConfig, args: ParseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = fetcher(config, &args.cache_dir, args.offline)?;
    let store = TokenListStore::new(Cache::open(cache_path(&args.cache_dir))?);
    let parser =
        TransferParser::new(Arc::new(store)).with_logo_base_url(config.logo_base_url.clone());
    let rt = tokio::runtime::Runtime::new()?;

    let (source, txs) = match &args.address {
        Some(address) => (
            address.clone(),
            rt.block_on(fetch_txs(&fetcher, address, args.after_block))?,
        ),
        None => ("tx-list".to_string(), rt.block_on(fetcher.tx_info(&args.tx))?),
    };

    let parsed = rt.block_on(async {
        let mut parsed = Vec::with_capacity(txs.len());
        for tx in &txs {
            match parser.parse_koios(tx).await {
                Ok(p) => parsed.push(p),
                Err(e) => warn!(tx = %tx.tx_hash, error = %e, "skipping transaction"),
            }
        }
        parsed
    });

    let bundle = AuditBundle::new(source.clone(), parsed);
    let hash = reproducibility_hash(&bundle)?;
    std::fs::create_dir_all(&args.reports_dir)?;
    let stem = file_stem_for(&source);
    let bundle_path = args.reports_dir.join(format!("{}.bundle.json", stem));
    let hash_path = args.reports_dir.join(format!("{}.sha256", stem));
    std::fs::write(&bundle_path, serde_json::to_string_pretty(&bundle)?)?;
    std::fs::write(&hash_path, format!("{}\n", hash))?;
    info!(
        transactions = bundle.transactions.len(),
        transfers = bundle.transfer_count(),
        ?bundle_path,
        ?hash_path,
        "parse complete"
    );

    let events: Vec<_> = bundle
        .transactions
        .iter()
        .map(|t| {
            serde_json::json!({
                "tx_hash": t.tx_hash,
                "transfers": t.transfers,
                "withdrawals": t.withdrawals,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}

fn load_bundle(path: &Path) -> Result<AuditBundle, Box<dyn std::error::Error>> {
    let bundle_json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&bundle_json)?)
}

/// `<dir>/<name>.bundle.json` -> `<dir>/<name>`.
fn bundle_base(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let base = name
        .strip_suffix(".bundle.json")
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name.as_str());
    path.parent().unwrap_or(Path::new(".")).join(base)
}

fn run_report(args: ReportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = load_bundle(&args.bundle)?;
    let data = ReportData::new(bundle)?;
    let html_path = args
        .out
        .unwrap_or_else(|| bundle_base(&args.bundle).with_extension("html"));
    render_report(&data, &html_path)?;
    if !data.imbalances.is_empty() {
        warn!(
            transactions = data.imbalances.len(),
            "conservation imbalances in bundle"
        );
    }
    info!(?html_path, "report complete");
    println!("Report written to {}", html_path.display());
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = load_bundle(&args.bundle)?;
    let sha256_path = bundle_base(&args.bundle).with_extension("sha256");
    let expected = std::fs::read_to_string(sha256_path).ok();
    let result = verify_bundle_hash(&bundle, expected.as_deref())?;
    if result.matches {
        println!("OK\t{}", result.bundle_hash);
    } else {
        eprintln!(
            "MISMATCH\tcomputed={}\texpected={:?}",
            result.bundle_hash, result.expected_hash
        );
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_base_strips_suffix() {
        assert_eq!(
            bundle_base(Path::new("reports/addr1.bundle.json")),
            PathBuf::from("reports/addr1")
        );
        assert_eq!(
            bundle_base(Path::new("reports/addr1.bundle.json")).with_extension("sha256"),
            PathBuf::from("reports/addr1.sha256")
        );
        assert_eq!(bundle_base(Path::new("b.json")), PathBuf::from("b"));
    }

    #[test]
    fn file_stem_is_path_safe() {
        assert_eq!(file_stem_for("addr1:x/y z"), "addr1_x_y_z");
        assert_eq!(file_stem_for(&"a".repeat(64)).len(), 20);
    }

    #[test]
    fn cli_requires_address_or_tx() {
        assert!(Cli::try_parse_from(["cardano-transfers", "parse"]).is_err());
        let cli = Cli::try_parse_from(["cardano-transfers", "parse", "--tx", "a", "b"]).unwrap();
        match cli.command {
            Command::Parse(args) => assert_eq!(args.tx, vec!["a", "b"]),
            _ => panic!("expected parse"),
        }
    }
}
