//! ASCII world viewer and interactive elevation sampler.
//!
//! Generates a world from `--seed` (wall clock when omitted), renders the
//! elevation bands as glyphs, optionally writes the world chunk JSON to
//! `--out`, and in `--interactive` mode answers `x y` queries until
//! `quit`/`exit`.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use color_eyre::Result;

use adventure_core::{WorldGenConfig, WorldState};
use world_schema::{elevation_glyph, encode_world_chunk_json};

#[derive(Parser, Debug)]
#[command(author, version, about = "Everwilds world viewer", long_about = None)]
struct Cli {
    /// World width in tiles.
    #[arg(long, default_value_t = 40)]
    width: u32,

    /// World height in tiles.
    #[arg(long, default_value_t = 20)]
    height: u32,

    /// World seed; defaults to the wall clock.
    #[arg(long)]
    seed: Option<u64>,

    /// Read `x y` pairs from stdin and answer with elevations.
    #[arg(long)]
    interactive: bool,

    /// Write the world chunk JSON to this path.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    let config = WorldGenConfig::sized(cli.width.max(1), cli.height.max(1), seed);
    let state = WorldState::generate(&config);
    tracing::info!(
        target: "everwilds::cli",
        width = config.width,
        height = config.height,
        seed,
        checksum = state.checksum,
        "world generated"
    );

    render_ascii(&state);

    if let Some(path) = &cli.out {
        let chunk = state.chunk();
        fs::write(path, encode_world_chunk_json(&chunk)?)?;
        println!("wrote {}", path.display());
    }

    if cli.interactive {
        sample_loop(&state)?;
    }

    Ok(())
}

fn render_ascii(state: &WorldState) {
    let content = &state.content;
    let mut line = String::with_capacity(content.width as usize);
    for y in 0..content.height {
        line.clear();
        for x in 0..content.width {
            line.push(elevation_glyph(
                content.elevation[(y * content.width + x) as usize],
            ));
        }
        println!("{line}");
    }
    println!("seed={} checksum={:016x}", content.seed, state.checksum);
}

fn sample_loop(state: &WorldState) -> Result<()> {
    let field = state.elevation_field();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(());
        }
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            return Ok(());
        }
        match parse_pair(trimmed) {
            Some((x, y)) => match field.get(x, y) {
                Some(elevation) => println!("elevation={elevation:.4}"),
                None => println!("Out of bounds"),
            },
            None => println!("Invalid input. Use: x y"),
        }
    }
}

fn parse_pair(input: &str) -> Option<(u32, u32)> {
    let mut parts = input.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_parsing_accepts_only_two_coordinates() {
        assert_eq!(parse_pair("4 9"), Some((4, 9)));
        assert_eq!(parse_pair("  12   3 "), Some((12, 3)));
        assert_eq!(parse_pair("4"), None);
        assert_eq!(parse_pair("4 9 2"), None);
        assert_eq!(parse_pair("a b"), None);
        assert_eq!(parse_pair("-1 3"), None);
    }
}
