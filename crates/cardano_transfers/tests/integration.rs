//! Integration tests using saved Koios-like fixtures.

use cardano_transfers::chain::{Cache, FetchConfig, Fetcher, NormalizeError};
use cardano_transfers::metadata::DEFAULT_LOGO_BASE_URL;
use cardano_transfers::transfers::{Attribution, AttributionRule, UnattributedReason};
use cardano_transfers::{
    conservation_report, reproducibility_hash, AssetId, AuditBundle, CardanoToken, KoiosAddressTx,
    KoiosTx, ParseError, ParsedTransaction, Party, StaticTokenList, TokenListStore, TransferKind,
    TransferParser,
};
use std::path::Path;
use std::sync::Arc;

const MINT_POLICY: &str = "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c6";
const INDY_POLICY: &str = "f43a62fdc3965df486de8a0d32fe800963589c41b38946602a0dc535";

#[derive(serde::Deserialize)]
struct TokenListFile {
    tokens: Vec<CardanoToken>,
}

fn load_fixture<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../testdata");
    let full = root.join(path);
    let s =
        std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("read {}: {}", full.display(), e));
    serde_json::from_str(&s).unwrap_or_else(|e| panic!("parse {}: {}", path, e))
}

fn fixture_tx(hash: &str) -> KoiosTx {
    let txs: Vec<KoiosTx> = load_fixture("tx_info.json");
    txs.into_iter()
        .find(|t| t.tx_hash == hash)
        .unwrap_or_else(|| panic!("no fixture tx {}", hash))
}

async fn parse(hash: &str) -> ParsedTransaction {
    TransferParser::default()
        .parse_koios(&fixture_tx(hash))
        .await
        .unwrap()
}

fn events(parsed: &ParsedTransaction) -> Vec<(TransferKind, String, String, u128)> {
    parsed
        .transfers
        .iter()
        .map(|e| (e.kind, e.from.to_string(), e.to.to_string(), e.amount))
        .collect()
}

#[test]
fn integration_fixture_address_txs_parse() {
    let txs: Vec<KoiosAddressTx> = load_fixture("address_txs.json");
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].tx_hash, "simple_transfer");
    assert_eq!(txs[1].block_height, Some(102));
}

#[test]
fn integration_fixture_tx_info_parse() {
    let txs: Vec<KoiosTx> = load_fixture("tx_info.json");
    assert_eq!(txs.len(), 8);
    let mint = fixture_tx("token_mint");
    assert_eq!(mint.assets_minted.as_ref().unwrap().len(), 1);
    assert_eq!(
        mint.outputs[0].asset_list.as_ref().unwrap()[0]
            .quantity
            .as_deref(),
        Some("50")
    );
}

#[tokio::test]
async fn stake_registration_single_account() {
    let parsed = parse("stake_registration").await;
    assert_eq!(
        events(&parsed),
        vec![
            (TransferKind::Fee, "addr1_solo".into(), "".into(), 200_000),
            (TransferKind::Stake, "addr1_solo".into(), "".into(), 500_000),
        ]
    );
    assert_eq!(parsed.transfers[0].instruction_order(), -1);
    assert_eq!(parsed.transfers[1].instruction_order(), 0);
}

#[tokio::test]
async fn simple_transfer_pairs_sender_and_receiver() {
    let parsed = parse("simple_transfer").await;
    assert_eq!(
        events(&parsed),
        vec![
            (
                TransferKind::Transfer,
                "addr1_alice".into(),
                "addr1_bob".into(),
                1_000_000
            ),
            (TransferKind::Fee, "addr1_alice".into(), "".into(), 170_000),
        ]
    );
    assert_eq!(
        parsed.changes.delta("addr1_alice", &AssetId::Native),
        -1_170_000
    );
    assert_eq!(parsed.after.balance("addr1_bob", &AssetId::Native), 1_000_000);
    assert_eq!(parsed.before.balance("addr1_bob", &AssetId::Native), 0);
}

#[tokio::test]
async fn mint_and_burn_use_nobody() {
    let minted = parse("token_mint").await;
    let token = AssetId::token(MINT_POLICY, "4d494e54");
    assert_eq!(
        events(&minted),
        vec![
            (TransferKind::Fee, "addr1_carol".into(), "".into(), 200_000),
            (TransferKind::Mint, "".into(), "addr1_carol".into(), 50),
        ]
    );
    assert_eq!(minted.transfers[1].asset, token);
    assert_eq!(minted.catalog.get(&token).unwrap().symbol, "MINT");

    let burned = parse("token_burn").await;
    let burn = burned
        .transfers
        .iter()
        .find(|e| e.kind == TransferKind::Burn)
        .unwrap();
    assert_eq!(burn.from, Party::account("addr1_carol"));
    assert_eq!(burn.to, Party::Nobody);
    assert_eq!(burn.amount, 20);
}

#[tokio::test]
async fn many_to_many_routes_through_multi_account() {
    let parsed = parse("many_to_many").await;
    let token = AssetId::token(INDY_POLICY, "494e4459");
    let token_events: Vec<_> = parsed
        .transfers
        .iter()
        .filter(|e| e.asset == token)
        .map(|e| (e.from.to_string(), e.to.to_string(), e.amount))
        .collect();
    assert_eq!(
        token_events,
        vec![
            ("addr1_s1".into(), "multiAccount".into(), 10),
            ("addr1_s2".into(), "multiAccount".into(), 20),
            ("addr1_s3".into(), "multiAccount".into(), 5),
            ("multiAccount".into(), "addr1_r1".into(), 20),
            ("multiAccount".into(), "addr1_r2".into(), 15),
        ]
    );
    // Several ADA senders and none alone: nobody is charged the fee.
    assert!(parsed.transfers.iter().all(|e| e.kind != TransferKind::Fee));
}

#[tokio::test]
async fn emitted_flows_conserve_every_token() {
    let txs: Vec<KoiosTx> = load_fixture("tx_info.json");
    let parser = TransferParser::default();
    for tx in &txs {
        let parsed = parser.parse_koios(tx).await.unwrap();
        assert!(
            conservation_report(&parsed).is_empty(),
            "imbalance in {}",
            tx.tx_hash
        );
        assert!(parsed.transfers.iter().all(|e| e.amount > 0));
    }
}

#[tokio::test]
async fn reward_withdrawal_attributed_and_zero_skipped() {
    let parsed = parse("reward_withdrawal").await;
    assert_eq!(
        events(&parsed),
        vec![
            (TransferKind::Fee, "addr1_dave".into(), "".into(), 200_000),
            (
                TransferKind::WithdrawStake,
                "".into(),
                "addr1_dave".into(),
                2_000_000
            ),
        ]
    );
    assert_eq!(
        parsed.withdrawals[0].attribution,
        Attribution::Attributed {
            address: "addr1_dave".into(),
            rule: AttributionRule::SingleCandidate
        }
    );
    assert_eq!(parsed.withdrawals[1].attribution, Attribution::Skipped);
}

#[tokio::test]
async fn ambiguous_withdrawals_emit_no_reward_events() {
    let parsed = parse("ambiguous_withdrawals").await;
    assert!(parsed
        .transfers
        .iter()
        .all(|e| e.kind != TransferKind::WithdrawStake));
    assert_eq!(parsed.withdrawals.len(), 2);
    for outcome in &parsed.withdrawals {
        assert_eq!(
            outcome.attribution,
            Attribution::Unattributable {
                reason: UnattributedReason::Ambiguous
            }
        );
    }
}

#[tokio::test]
async fn undecodable_name_keeps_hex_and_empty_symbol() {
    let parsed = parse("undecodable_name").await;
    let token = AssetId::token(INDY_POLICY, "fffe");
    let info = parsed.catalog.get(&token).unwrap();
    assert_eq!(info.symbol, "");
    assert_eq!(info.name, "fffe");
    assert_eq!(parsed.catalog.display_symbol(&token), None);
    let event = parsed.transfers.iter().find(|e| e.asset == token).unwrap();
    assert_eq!(event.token_symbol(), "fffe");
    assert_eq!(event.amount, 7);
}

#[tokio::test]
async fn malformed_quantity_fails_whole_transaction() {
    let txs: Vec<KoiosTx> = load_fixture("tx_info_malformed.json");
    let err = TransferParser::default()
        .parse_koios(&txs[0])
        .await
        .unwrap_err();
    assert!(matches!(err, ParseError::Malformed(_)));
}

#[tokio::test]
async fn missing_fee_fails_only_its_own_transaction() {
    let cache = Cache::in_memory().unwrap();
    let good = fixture_tx("simple_transfer");
    let mut bad = serde_json::to_value(fixture_tx("token_mint")).unwrap();
    bad.as_object_mut().unwrap().remove("fee");
    let hashes = vec!["simple_transfer".to_string(), "token_mint".to_string()];
    let req = serde_json::json!({ "tx_info": hashes });
    let key = Cache::key_for(&serde_json::to_string(&req).unwrap());
    let body = serde_json::json!([good, bad]);
    cache
        .set_json(&key, &serde_json::to_string(&body).unwrap())
        .unwrap();

    let config = FetchConfig {
        offline: true,
        ..Default::default()
    };
    let fetcher = Fetcher::new(config, Some(cache)).unwrap();
    let txs = fetcher.tx_info(&hashes).await.unwrap();
    assert_eq!(txs.len(), 2);

    let parser = TransferParser::default();
    let parsed = parser.parse_koios(&txs[0]).await.unwrap();
    assert_eq!(parsed.tx_hash, "simple_transfer");
    assert_eq!(parsed.transfers.len(), 2);
    let err = parser.parse_koios(&txs[1]).await.unwrap_err();
    assert!(matches!(
        err,
        ParseError::Malformed(NormalizeError::Missing { field: "fee", .. })
    ));
}

#[tokio::test]
async fn token_list_metadata_attached_from_store() {
    let list: TokenListFile = load_fixture("token_list.json");
    let store = TokenListStore::new(Cache::in_memory().unwrap());
    for token in &list.tokens {
        store.save(token).unwrap();
    }
    let parser = TransferParser::new(Arc::new(store));
    let parsed = parser
        .parse_koios(&fixture_tx("many_to_many"))
        .await
        .unwrap();
    let token = AssetId::token(INDY_POLICY, "494e4459");
    for event in parsed.transfers.iter().filter(|e| e.asset == token) {
        let meta = event.metadata.as_ref().unwrap();
        assert_eq!(meta.ticker.as_deref(), Some("INDY"));
        assert_eq!(meta.decimals, Some(6));
        assert_eq!(
            meta.logo.as_deref(),
            Some(format!("{}logos/indy.png", DEFAULT_LOGO_BASE_URL).as_str())
        );
    }

    // The mint test token has no logo; the field stays absent.
    let parser = TransferParser::new(Arc::new(StaticTokenList::new(list.tokens)));
    let minted = parser.parse_koios(&fixture_tx("token_mint")).await.unwrap();
    let meta = minted.transfers[1].metadata.as_ref().unwrap();
    assert_eq!(meta.ticker.as_deref(), Some("MINT"));
    assert!(meta.logo.is_none());
}

#[tokio::test]
async fn offline_fetch_then_parse() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = Cache::open(tmp.path().join("cache.sqlite")).unwrap();
    let hashes = vec!["simple_transfer".to_string(), "token_mint".to_string()];
    let rows: Vec<KoiosTx> = hashes.iter().map(|h| fixture_tx(h)).collect();
    let req = serde_json::json!({ "tx_info": hashes });
    let key = Cache::key_for(&serde_json::to_string(&req).unwrap());
    cache
        .set_json(&key, &serde_json::to_string(&rows).unwrap())
        .unwrap();

    let config = FetchConfig {
        offline: true,
        ..Default::default()
    };
    let fetcher = Fetcher::new(config, Some(cache)).unwrap();
    let txs = fetcher.tx_info(&hashes).await.unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(fetcher.request_count(), 0);

    let parsed = TransferParser::default().parse_koios(&txs[0]).await.unwrap();
    assert_eq!(parsed.transfers.len(), 2);
}

#[tokio::test]
async fn bundle_hash_deterministic() {
    let txs: Vec<KoiosTx> = load_fixture("tx_info.json");
    let parser = TransferParser::default();
    let mut forward = Vec::new();
    for tx in &txs {
        forward.push(parser.parse_koios(tx).await.unwrap());
    }
    let mut backward = Vec::new();
    for tx in txs.iter().rev() {
        backward.push(parser.parse_koios(tx).await.unwrap());
    }
    assert_eq!(forward.last(), backward.first());

    let a = AuditBundle::new("addr1".to_string(), forward);
    let b = AuditBundle::new("addr1".to_string(), backward);
    let h1 = reproducibility_hash(&a).unwrap();
    let h2 = reproducibility_hash(&b).unwrap();
    assert_eq!(h1, h2);
    assert_eq!(a.transactions[0].tx_hash, "stake_registration");

    let json = serde_json::to_string(&a).unwrap();
    let back: AuditBundle = serde_json::from_str(&json).unwrap();
    assert_eq!(reproducibility_hash(&back).unwrap(), h1);
}
