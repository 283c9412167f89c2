//! Renders the riceprog command line to a roff manual page.
//!
//! `cargo run --bin gen-manpage -- [DIR]` writes `riceprog.1` into `DIR`,
//! `man/` when no directory is given.

use clap::CommandFactory;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;

fn render_manual() -> io::Result<Vec<u8>> {
    let mut roff = Vec::new();
    clap_mangen::Man::new(cli::Cli::command()).render(&mut roff)?;
    Ok(roff)
}

fn main() -> io::Result<()> {
    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&dir)?;

    let page = dir.join("riceprog.1");
    fs::write(&page, render_manual()?)?;

    println!("wrote {}", page.display());
    println!("read it with: man -l {}", page.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_renders_the_cli() {
        let roff = render_manual().unwrap();
        let text = String::from_utf8_lossy(&roff);
        assert!(text.contains("riceprog"));
        assert!(text.contains("BITMAP_FILE"));
    }
}
