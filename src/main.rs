//! # Quire CLI
//!
//! Usage:
//!   quire input.json -o output.pdf
//!   echo '{ ... }' | quire -o output.pdf
//!   quire input.json --config config.json
//!   quire input.json --commands -o commands.json
//!
//! Set `RUST_LOG=debug` to trace formatting and pagination.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use quire::config::EngineConfig;
use quire::error::Result;
use quire::model::Document;

fn option_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

fn run(args: &[String]) -> Result<(usize, String)> {
    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1])?
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    };

    let config = match option_value(args, "--config") {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let commands = args.iter().any(|a| a == "--commands");
    let output_path = option_value(args, "-o").unwrap_or_else(|| {
        if commands {
            "commands.json".to_string()
        } else {
            "output.pdf".to_string()
        }
    });

    let document: Document = serde_json::from_str(&input)?;
    let bytes = if commands {
        quire::render_commands(&document, &config)?
    } else {
        quire::render_with_config(&document, &config)?
    };
    fs::write(&output_path, &bytes)?;
    Ok((bytes.len(), output_path))
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    match run(&args) {
        Ok((size, path)) => eprintln!("✓ Written {} bytes to {}", size, path),
        Err(e) => {
            eprintln!("✗ {}", e);
            process::exit(1);
        }
    }
}
