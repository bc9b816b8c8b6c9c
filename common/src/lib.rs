// Shared building blocks for driving a multinode permissioned ledger:
// identifiers, fixed-precision amounts, commands, transactions, queries,
// signatures and the JSON-RPC envelope spoken by node gateways.

#![allow(clippy::module_inception)]

pub mod account;
pub mod asset;
pub mod block;
pub mod config;
pub mod crypto;
pub mod error;
pub mod permission;
pub mod query;
pub mod rpc;
pub mod time;
pub mod transaction;

#[cfg(feature = "prompt")]
pub mod prompt;

#[cfg(feature = "clap")]
// If clap feature is enabled, build the correct style for CLI
pub fn get_cli_styles() -> clap::builder::Styles {
    use clap::builder::styling::*;

    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .header(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
}
