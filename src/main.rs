// SPDX-License-Identifier: MIT
//
// ncsdis
//
// A small tool to parse compiled NWScript (NCS) images used by the BioWare
// Aurora engine games and render them in four views:
//  - list: full disassembly listing (addresses, raw bytes, mnemonics)
//  - asm:  bare assembly (mnemonics only)
//  - dot:  GraphViz control-flow graph, clustered by subroutine
//  - nss:  best-effort source reconstruction

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use ncsdis::emit::Disassembler;
use ncsdis::game::GameId;
use ncsdis::loader::load_ncs;
use ncsdis::model::NcsProgram;

#[derive(Parser)]
#[command(name = "ncsdis", version, about = "NWScript bytecode disassembler (BioWare Aurora)")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Disassemble into a full listing with addresses and raw bytes.
    List {
        file: PathBuf,
        /// Game the script belongs to (drives opcode and function tables).
        #[arg(long, default_value = "nwn")]
        game: GameId,
        /// Dump the analysed stack frame above each instruction.
        #[arg(long)]
        stack: bool,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Disassemble into bare assembly, mnemonics only.
    Asm {
        file: PathBuf,
        #[arg(long, default_value = "nwn")]
        game: GameId,
        #[arg(long)]
        stack: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the control-flow graph as a GraphViz dot file.
    Dot {
        file: PathBuf,
        #[arg(long, default_value = "nwn")]
        game: GameId,
        /// Prefix each block with its control-structure annotations.
        #[arg(long)]
        control_types: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reconstruct a partial NSS source view (needs stack analysis).
    Nss {
        file: PathBuf,
        #[arg(long, default_value = "nwn")]
        game: GameId,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::List {
            file,
            game,
            stack,
            output,
        } => {
            let program = load(&file, game)?;
            let text = Disassembler::new(&program).listing(stack)?;
            write_output(output.as_deref(), &text)?;
        }

        Command::Asm {
            file,
            game,
            stack,
            output,
        } => {
            let program = load(&file, game)?;
            let text = Disassembler::new(&program).assembly(stack)?;
            write_output(output.as_deref(), &text)?;
        }

        Command::Dot {
            file,
            game,
            control_types,
            output,
        } => {
            let program = load(&file, game)?;
            let text = Disassembler::new(&program).dot(control_types)?;
            write_output(output.as_deref(), &text)?;
        }

        Command::Nss { file, game, output } => {
            let program = load(&file, game)?;
            if !program.has_stack_analysis {
                bail!("NSS reconstruction requires a stack-analysed script");
            }
            let text = Disassembler::new(&program).nss()?;
            write_output(output.as_deref(), &text)?;
        }
    }

    Ok(())
}

fn load(path: &Path, game: GameId) -> Result<NcsProgram> {
    let data = fs::read(path).with_context(|| format!("read {:?}", path))?;
    load_ncs(&data, game).context("parse NCS bytecode")
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(p) => fs::write(p, text).with_context(|| format!("write {:?}", p))?,
        None => print!("{}", text),
    }
    Ok(())
}
