use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use paxos_core::{ProposalMessage, Status};
use paxos_server::cli::{run_client, run_server, Cli, Commands};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let builder = tracing_subscriber::fmt().with_max_level(level);

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let (node, request) = match cli.command {
        Commands::Serve(args) => {
            run_server(&args)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Put { node, key, value } => (node, ProposalMessage::put(key, value)),
        Commands::Delete { node, key } => (node, ProposalMessage::delete(key)),
        Commands::Get { node, key } => (node, ProposalMessage::get(key)),
    };

    let reply = run_client(&node, request, CLIENT_TIMEOUT)?;
    println!("{} key={} value={} clock={}", reply.status, reply.key, reply.value, reply.logical_clock);

    Ok(if reply.status == Status::Ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
