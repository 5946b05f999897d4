//! Chain inspection command.

use super::DataDir;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use medichain_core::{Block, BlockData};
use std::path::PathBuf;

#[derive(Args)]
pub struct ChainArgs {
    #[command(subcommand)]
    command: ChainCommand,
}

#[derive(Subcommand)]
enum ChainCommand {
    /// Show recent blocks, or one block in detail
    Show {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Block index to show in detail
        index: Option<u64>,

        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
    /// Verify every block's hash and link
    Validate {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

pub fn run(args: ChainArgs) -> Result<()> {
    match args.command {
        ChainCommand::Show {
            data_dir,
            index: Some(index),
            ..
        } => show_block(DataDir::new(data_dir), index),
        ChainCommand::Show {
            data_dir, count, ..
        } => list_blocks(DataDir::new(data_dir), count),
        ChainCommand::Validate { data_dir } => validate(DataDir::new(data_dir)),
    }
}

fn list_blocks(dir: DataDir, count: usize) -> Result<()> {
    let ledger = dir.load_ledger()?;
    let stats = ledger.stats();

    println!();
    println!("{}", "Ledger:".bold().cyan());
    println!("  Blocks:       {}", stats.length.to_string().bright_cyan());
    println!("  Transactions: {}", stats.transaction_count.to_string().bright_cyan());
    println!("  Difficulty:   {}", stats.difficulty.to_string().bright_cyan());
    println!("  Tip:          {}", stats.tip_hash.to_hex().bright_yellow());
    println!();
    println!("{}", "Recent Blocks:".bold().cyan());
    println!();

    let blocks = ledger.blocks();
    let start = blocks.len().saturating_sub(count);
    for block in blocks[start..].iter().rev() {
        println!(
            "  {} {}  {} tx  {}",
            format!("#{}", block.index()).bright_cyan(),
            block.hash().to_hex()[..16].bright_yellow(),
            block.tx_count(),
            block.timestamp().bright_black()
        );
    }
    println!();
    Ok(())
}

fn show_block(dir: DataDir, index: u64) -> Result<()> {
    let ledger = dir.load_ledger()?;
    let block = ledger
        .get_block(index)
        .with_context(|| format!("Block not found: #{}", index))?;
    print_block(&block);
    Ok(())
}

fn print_block(block: &Block) {
    println!();
    println!("{}", format!("Block #{}", block.index()).bold().cyan());
    println!("  Hash:          {}", block.hash().to_hex().bright_yellow());
    println!("  Previous Hash: {}", block.previous_hash().to_string().bright_black());
    println!("  Timestamp:     {}", block.timestamp());
    println!("  Nonce:         {}", block.nonce());
    println!(
        "  Sealed:        {}",
        if block.is_sealed() {
            "yes".green()
        } else {
            "NO".red().bold()
        }
    );

    match block.data() {
        BlockData::Sentinel(s) => println!("  Data:          {}", s),
        BlockData::Transactions(txs) => {
            println!("  Transactions:  {}", txs.len());
            for tx in txs {
                println!(
                    "    • {} → {}  {}",
                    tx.doctor_id.bright_yellow(),
                    tx.patient_id.bright_yellow(),
                    tx.content_pointer.bright_black()
                );
            }
        }
    }
    println!();
}

fn validate(dir: DataDir) -> Result<()> {
    let ledger = dir.load_ledger()?;
    match ledger.verify() {
        Ok(()) => {
            println!(
                "{}  Chain is valid ({} blocks)",
                "✓".green().bold(),
                ledger.len()
            );
            Ok(())
        }
        Err(err) => bail!("Chain is invalid: {}", err),
    }
}
