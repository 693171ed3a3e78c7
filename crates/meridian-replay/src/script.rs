//! Plain-text command scripts.
//!
//! One command per line:
//!
//! ```text
//! # comment
//! B 10050 100 7     buy 100 @ 10050 for owner 7
//! S 10060 40 3      sell
//! C 12              cancel order 12
//! ```
//!
//! Anything after `#` is ignored. Verbs are case-insensitive and may be
//! spelled out (`BUY`, `SELL`, `CANCEL`).

use std::str::SplitWhitespace;

use meridian_core::Command;

use crate::error::ReplayError;

/// Parse a whole script.
pub fn parse_script(source: &str) -> Result<Vec<Command>, ReplayError> {
    let mut commands = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        if let Some(command) = parse_line(raw, index + 1)? {
            commands.push(command);
        }
    }
    Ok(commands)
}

/// Parse one line; blank and comment-only lines yield `None`.
fn parse_line(raw: &str, line: usize) -> Result<Option<Command>, ReplayError> {
    let content = raw.split('#').next().unwrap_or_default();
    let mut fields = content.split_whitespace();
    let Some(verb) = fields.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_uppercase().as_str() {
        "B" | "BUY" => {
            let (price, quantity, owner) = order_fields(&mut fields, line)?;
            Command::buy(price, quantity, owner)
        }
        "S" | "SELL" => {
            let (price, quantity, owner) = order_fields(&mut fields, line)?;
            Command::sell(price, quantity, owner)
        }
        "C" | "CANCEL" => Command::cancel(number(&mut fields, line, "order id")?),
        other => return Err(ReplayError::script(line, format!("unknown command `{other}`"))),
    };

    if let Some(extra) = fields.next() {
        return Err(ReplayError::script(line, format!("unexpected field `{extra}`")));
    }
    Ok(Some(command))
}

fn order_fields(fields: &mut SplitWhitespace<'_>, line: usize) -> Result<(u64, u64, u64), ReplayError> {
    let price = number(fields, line, "price")?;
    let quantity = number(fields, line, "quantity")?;
    let owner = number(fields, line, "owner")?;
    Ok((price, quantity, owner))
}

fn number(fields: &mut SplitWhitespace<'_>, line: usize, what: &str) -> Result<u64, ReplayError> {
    let field = fields
        .next()
        .ok_or_else(|| ReplayError::script(line, format!("missing {what}")))?;
    field
        .parse()
        .map_err(|_| ReplayError::script(line, format!("invalid {what} `{field}`")))
}
