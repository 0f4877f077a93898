// Writes man pages for lotledger and each of its subcommands.
//
// Usage: generate-man [OUT_DIR]   (default: ./man)

use anyhow::{Context, Result};
use clap::CommandFactory;
use lotledger::cli::Cli;
use std::fs;
use std::path::{Path, PathBuf};

fn render(cmd: &clap::Command, name: &str, out_dir: &Path) -> Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut buffer)
        .with_context(|| format!("Failed to render man page for {}", name))?;

    let path = out_dir.join(format!("{}.1", name));
    fs::write(&path, buffer)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());

    for sub in cmd.get_subcommands() {
        let sub_name = format!("{}-{}", name, sub.get_name());
        render(&sub.clone().name(sub_name.clone()), &sub_name, out_dir)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let cmd = Cli::command();
    render(&cmd, "lotledger", &out_dir)
}
