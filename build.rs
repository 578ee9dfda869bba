//! Renders the `mqframe(1)` man page from the demo CLI.
//!
//! The page lands in `OUT_DIR`, or in `MQFRAME_MAN_DIR` when that is set
//! (packaging scripts point it at their staging tree).

use std::{env, fs, path::PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

fn man_dir() -> Result<PathBuf, env::VarError> {
    env::var("MQFRAME_MAN_DIR").or_else(|_| env::var("OUT_DIR")).map(PathBuf::from)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=MQFRAME_MAN_DIR");

    let dir = man_dir()?;
    fs::create_dir_all(&dir)?;

    let mut page = Vec::new();
    Man::new(cli::Cli::command()).render(&mut page)?;
    fs::write(dir.join("mqframe.1"), page)?;
    Ok(())
}
