mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // deobscope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("deobscope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Tokens { expression } => commands::tokens::run(expression, &cli.global),
        Command::Parse { expression } => commands::parse::run(expression, &cli.global),
        Command::Corpus { path, list } => commands::corpus::run(path, *list, &cli.global),
        Command::Generate {
            dir,
            variables,
            terms,
            limit,
        } => commands::generate::run(dir, *variables, *terms, *limit, &cli.global),
        Command::Simplify {
            corpus,
            expressions,
            width,
            consistent,
            template,
        } => commands::simplify::run(
            &commands::simplify::SimplifyOptions {
                corpus,
                expressions,
                width: *width,
                consistent: *consistent,
                template: *template,
            },
            &cli.global,
        ),
    }
}
