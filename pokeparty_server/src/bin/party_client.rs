// Interactive terminal client.
//
// Connects, announces the player's name, prints the catalogue's types and
// creatures as numbered menus, and submits a three-creature roster. Any bad
// answer ends the session with an error. Finally offers the start-game
// prompt, whose answer is sent without waiting for a reply.

use std::io::{self, BufRead};

use anyhow::Context;
use clap::Parser;
use pokeparty_server::picker::Prompter;
use pokeparty_server::{PartyClient, init_tracing};

#[derive(Parser)]
#[command(name = "party-client")]
#[command(author, version, about = "Pick a creature roster on a party server", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, env = "POKEPARTY_SERVER", default_value = "localhost:8080")]
    addr: String,

    /// Display name (prompted for when omitted)
    #[arg(short, long)]
    name: Option<String>,
}

fn main() -> anyhow::Result<()> {
    init_tracing("warn");
    let cli = Cli::parse();

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    run(&cli, &mut prompter)
}

fn run<R: BufRead, W: io::Write>(cli: &Cli, prompter: &mut Prompter<R, W>) -> anyhow::Result<()> {
    let name = match &cli.name {
        Some(name) => name.trim().to_owned(),
        None => prompter.ask_name()?,
    };

    let (mut client, catalogue) = PartyClient::connect(&cli.addr, &name, None)
        .with_context(|| format!("connecting to {}", cli.addr))?;

    let group = prompter.choose_type(&catalogue)?;
    let selection = prompter.choose_roster(&name, group)?;
    client.submit(&selection).context("sending roster")?;

    if let Some(start_name) = prompter.ask_start_game()? {
        client.send_start_game(&start_name).context("sending start-game line")?;
    }
    Ok(())
}
