//! Static HTML report generation from an audit bundle.

use cardano_transfers::transfers::{Attribution, WithdrawalOutcome};
use cardano_transfers::{ParsedTransaction, ReportData, TransferEvent};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

/// Render a static HTML report to `out_path`. Embeds the full report JSON for verification.
pub fn render_report(data: &ReportData, out_path: impl AsRef<Path>) -> Result<(), ReportError> {
    let html = build_html(data)?;
    let mut f = std::fs::File::create(out_path.as_ref()).map_err(ReportError::Io)?;
    f.write_all(html.as_bytes()).map_err(ReportError::Io)?;
    Ok(())
}

/// Build HTML string from report data (for testing or in-memory use).
pub fn build_html(data: &ReportData) -> Result<String, ReportError> {
    let json_embed = serde_json::to_string(&data).map_err(ReportError::Json)?;
    let json_escaped = escape_html(&json_embed);
    let bundle = &data.bundle;

    let mut transactions = String::new();
    for tx in &bundle.transactions {
        transactions.push_str(&tx_section(tx));
    }
    if transactions.is_empty() {
        transactions.push_str("<p class=\"label\">No transactions.</p>\n");
    }

    let conservation = if data.imbalances.is_empty() {
        "<p>Every account's emitted token flows match its balance change.</p>".to_string()
    } else {
        let mut rows = String::new();
        for tx in &data.imbalances {
            for imb in &tx.imbalances {
                let _ = writeln!(
                    rows,
                    "<tr><td class=\"mono\">{}</td><td class=\"mono\">{}</td><td class=\"mono\">{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&tx.tx_hash),
                    escape_html(&imb.account),
                    escape_html(&imb.asset.to_string()),
                    imb.expected,
                    imb.emitted
                );
            }
        }
        format!(
            "<table><tr><th>Tx</th><th>Account</th><th>Asset</th><th>Balance change</th><th>Emitted</th></tr>\n{}</table>",
            rows
        )
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>Transfers – {source}</title>
<style>
:root {{ font-family: system-ui, sans-serif; background: #0f1419; color: #e6edf3; }}
body {{ max-width: 960px; margin: 0 auto; padding: 1.5rem; }}
h1 {{ font-size: 1.4rem; margin-bottom: 0.5rem; }}
h2 {{ font-size: 1.1rem; margin-top: 1.5rem; color: #8b949e; }}
h3 {{ font-size: 0.95rem; margin: 0 0 0.5rem 0; }}
.mono {{ font-family: ui-monospace, monospace; font-size: 0.9em; word-break: break-all; }}
.card {{ background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; margin: 0.5rem 0; }}
.grid {{ display: grid; grid-template-columns: auto 1fr; gap: 0.25rem 1rem; }}
.label {{ color: #8b949e; }}
.hash {{ font-size: 0.85em; }}
.footer {{ margin-top: 2rem; font-size: 0.85rem; color: #8b949e; }}
table {{ width: 100%; border-collapse: collapse; font-size: 0.85rem; }}
th, td {{ text-align: left; padding: 0.2rem 0.4rem; border-bottom: 1px solid #30363d; vertical-align: top; }}
</style>
</head>
<body>
<h1>Transfer Report</h1>
<p class="mono">{source}</p>
<p>Generated: {created}</p>

<h2>Reproducibility</h2>
<div class="card">
  <div class="mono hash">SHA-256: {hash}</div>
  <p class="footer">Anyone can verify this report by re-running <code>cardano-transfers verify --bundle &lt;file&gt;</code> and comparing the hash.</p>
</div>

<h2>Summary</h2>
<div class="card">
  <div class="grid">
    <span class="label">Transactions</span><span>{tx_count}</span>
    <span class="label">Transfer events</span><span>{event_count}</span>
    <span class="label">Withdrawals</span><span>{withdrawal_count}</span>
    <span class="label">Unattributed withdrawals</span><span>{unattributed}</span>
  </div>
</div>

<h2>Conservation</h2>
<div class="card">
{conservation}
</div>

<h2>Transactions</h2>
{transactions}
<h2>Audit bundle (embedded)</h2>
<div class="card">
  <p class="footer">The full audit bundle is embedded below for verification. Do not edit.</p>
  <script type="application/json" id="audit-bundle">{json_embed}</script>
</div>

<div class="footer">
  <p>Generated by cardano-transfers. Read-only tool; public ledger data only.</p>
</div>
</body>
</html>"#,
        source = escape_html(&bundle.source),
        created = escape_html(&bundle.created_utc_rfc3339),
        hash = escape_html(&data.reproducibility_hash_sha256),
        tx_count = bundle.transactions.len(),
        event_count = bundle.transfer_count(),
        withdrawal_count = bundle
            .transactions
            .iter()
            .map(|t| t.withdrawals.len())
            .sum::<usize>(),
        unattributed = bundle
            .transactions
            .iter()
            .flat_map(|t| &t.withdrawals)
            .filter(|w| matches!(w.attribution, Attribution::Unattributable { .. }))
            .count(),
        conservation = conservation,
        transactions = transactions,
        json_embed = json_escaped,
    );
    Ok(html)
}

fn tx_section(tx: &ParsedTransaction) -> String {
    let mut out = String::new();
    let height = tx
        .block_height
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
        out,
        "<div class=\"card\">\n<h3 class=\"mono\">{}</h3>\n<p class=\"label\">Block {}</p>",
        escape_html(&tx.tx_hash),
        height
    );
    if tx.transfers.is_empty() {
        out.push_str("<p class=\"label\">No transfer events.</p>\n");
    } else {
        out.push_str(
            "<table><tr><th>Kind</th><th>From</th><th>To</th><th>Amount</th><th>Asset</th></tr>\n",
        );
        for event in &tx.transfers {
            out.push_str(&event_row(tx, event));
        }
        out.push_str("</table>\n");
    }
    if !tx.withdrawals.is_empty() {
        out.push_str("<table><tr><th>Stake address</th><th>Amount</th><th>Attribution</th></tr>\n");
        for w in &tx.withdrawals {
            out.push_str(&withdrawal_row(w));
        }
        out.push_str("</table>\n");
    }
    out.push_str("</div>\n");
    out
}

fn event_row(tx: &ParsedTransaction, event: &TransferEvent) -> String {
    let asset = match tx.catalog.display_symbol(&event.asset) {
        Some(symbol) => symbol.to_string(),
        None => event.asset.to_string(),
    };
    let asset = match event.metadata.as_ref().and_then(|m| m.ticker.as_deref()) {
        Some(ticker) => ticker.to_string(),
        None => asset,
    };
    format!(
        "<tr><td>{:?}</td><td class=\"mono\">{}</td><td class=\"mono\">{}</td><td>{}</td><td class=\"mono\">{}</td></tr>\n",
        event.kind,
        escape_html(event.from.as_str()),
        escape_html(event.to.as_str()),
        event.amount,
        escape_html(&asset)
    )
}

fn withdrawal_row(w: &WithdrawalOutcome) -> String {
    let attribution = match &w.attribution {
        Attribution::Attributed { address, rule } => {
            format!("{} ({:?})", escape_html(address), rule)
        }
        Attribution::Unattributable { reason } => format!("unattributable: {:?}", reason),
        Attribution::Skipped => "skipped".to_string(),
    };
    format!(
        "<tr><td class=\"mono\">{}</td><td>{}</td><td>{}</td></tr>\n",
        escape_html(&w.stake_address),
        w.amount,
        attribution
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "io: {}", e),
            ReportError::Json(e) => write!(f, "json: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}
