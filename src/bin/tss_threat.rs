//! Narzędzie dymne: czyta linie ze stdin.
//! Zwykła linia => `CheckText`, wynik jako JSON.
//! Linia z obiektem JSON (`{"kind":..,"actorId":..,"timestamp":..}`) => `Observe`
//! na oknie ostatnich akcji, wynik jako JSON. Niepoprawne linie JSON są logowane i pomijane.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use tigris_threat::antinuke::{ActionDescriptor, TracingSink};
use tigris_threat::{AppContext, config::Settings};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let scope = std::env::args().nth(1).unwrap_or_else(|| "cli".to_string());
    let settings = Settings::load()?;
    let ctx = AppContext::bootstrap(settings, Arc::new(TracingSink)).await?;
    let max_window = ctx.settings.antinuke.max_sequence_len;

    let mut window: VecDeque<ActionDescriptor> = VecDeque::with_capacity(max_window);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let json = if line.starts_with('{') {
            let Some(action) = parse_action(line) else {
                continue;
            };
            let (front, back) = window.as_slices();
            let prior: Vec<ActionDescriptor> = front.iter().chain(back).cloned().collect();
            let obs = ctx.observe(&scope, &action.actor_id, &action, &prior);
            window.push_back(action);
            while window.len() >= max_window {
                window.pop_front();
            }
            serde_json::to_string(&obs)?
        } else {
            serde_json::to_string(&ctx.check_text(&scope, line).await)?
        };
        out.write_all(json.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;

    ctx.flush_signatures().await?;
    Ok(())
}

/// `None` (z ostrzeżeniem w logu) dla linii, która nie jest poprawną akcją.
fn parse_action(line: &str) -> Option<ActionDescriptor> {
    match serde_json::from_str(line) {
        Ok(action) => Some(action),
        Err(e) => {
            warn!(%line, error = %e, "skipping malformed action line");
            None
        }
    }
}
