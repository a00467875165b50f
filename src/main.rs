// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CLI entry point for xkbcomp
//!
//! Compiles one keymap file and writes the resolved keymap back out as
//! source text.

use anyhow::Context;
use clap::Parser;
use colored::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use xkb_compiler::config::{expand_path, write_output, CompilerConfig, MAX_WARNING_LEVEL};
use xkb_compiler::{dump_keymap, logging};

#[derive(Parser)]
#[command(name = "xkbcomp")]
#[command(author, version, about = "Compile an XKB keymap description", long_about = None)]
struct Cli {
    /// Warning level (0 = quiet, 10 = everything)
    #[arg(
        short = 'w',
        value_name = "LEVEL",
        default_value_t = 0,
        value_parser = clap::value_parser!(u32).range(0..=MAX_WARNING_LEVEL as i64)
    )]
    warning_level: u32,

    /// Root directory searched first for included files
    #[arg(short = 'R', value_name = "DIR")]
    root: Option<PathBuf>,

    /// Additional include directory, may be repeated
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Text printed in front of every diagnostic line
    #[arg(long = "emp", value_name = "MSG")]
    message_prefix: Option<String>,

    /// Text printed after the diagnostics if there were errors
    #[arg(long = "eml", value_name = "MSG")]
    error_footer: Option<String>,

    /// Input file, optionally followed by a map name: `file(map)`
    input: String,

    /// Output file; `-` or nothing writes to stdout
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

/// Split `file(map)` into the file and the map name
fn split_map_spec(spec: &str) -> (&str, Option<&str>) {
    if let (Some(open), true) = (spec.find('('), spec.ends_with(')')) {
        let map = &spec[open + 1..spec.len() - 1];
        if open > 0 && !map.is_empty() {
            return (&spec[..open], Some(map));
        }
    }
    (spec, None)
}

fn build_config(cli: &Cli) -> CompilerConfig {
    let mut config = CompilerConfig::new().with_warning_level(cli.warning_level);
    if let Some(root) = &cli.root {
        config = config.with_root(root);
    }
    for dir in &cli.include {
        config = config.with_include_dir(dir);
    }
    if let Some(prefix) = &cli.message_prefix {
        config = config.with_message_prefix(prefix);
    }
    if let Some(footer) = &cli.error_footer {
        config = config.with_error_footer(footer);
    }
    config
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    logging::init(cli.warning_level)?;

    let config = build_config(cli);
    let mut compiler = config.build()?;

    let (file, map) = split_map_spec(&cli.input);
    let input = expand_path(Path::new(file))?;

    let result = compiler.compile_file(&input, map);
    for line in config.format_diagnostics(compiler.diagnostics(), result.is_err(), true) {
        eprintln!("{}", line);
    }
    let keymap = result.with_context(|| format!("Failed to compile {}", input.display()))?;
    let text = dump_keymap(&keymap);

    match cli.output.as_deref() {
        None => write_stdout(&text),
        Some(path) if path == Path::new("-") => write_stdout(&text),
        Some(path) => {
            let path = expand_path(path)?;
            write_output(&path, &text)?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
            Ok(())
        }
    }
}

fn write_stdout(text: &str) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write to stdout")
}
