//! Initialize ledger command.

use super::DataDir;
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use medichain_chain::{Ledger, LedgerConfig};
use medichain_core::{Doctor, Keypair, Patient, PatientDirectory};
use medichain_storage::{KeyStore, RegistryStore};
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct InitArgs {
    /// Directory to store ledger data
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Leading zero hex digits required of each mined block
    #[arg(long, default_value = "4")]
    difficulty: u32,

    /// Upper bound on nonces tried per block
    #[arg(long)]
    max_attempts: Option<u64>,

    /// Seed demo patients, doctors and access grants
    #[arg(long)]
    samples: bool,

    /// Overwrite an existing ledger
    #[arg(long)]
    force: bool,
}

const SAMPLE_PATIENTS: [(&str, &str, u32, &str, &str); 3] = [
    ("PAT001", "John Doe", 35, "Male", "john.doe@email.com"),
    ("PAT002", "Jane Smith", 28, "Female", "jane.smith@email.com"),
    ("PAT003", "Robert Johnson", 45, "Male", "robert.j@email.com"),
];

const SAMPLE_DOCTORS: [(&str, &str, &str, &str, &str); 3] = [
    ("DOC001", "Alice Brown", "Cardiology", "LIC001", "City General Hospital"),
    ("DOC002", "Michael Wilson", "Neurology", "LIC002", "Metropolitan Medical Center"),
    ("DOC003", "Sarah Davis", "Pediatrics", "LIC003", "Children's Hospital"),
];

const SAMPLE_GRANTS: [(&str, &str); 3] = [
    ("PAT001", "DOC001"),
    ("PAT001", "DOC002"),
    ("PAT002", "DOC001"),
];

pub fn run(args: InitArgs) -> Result<()> {
    println!("{}", "Initializing medichain...".bold().cyan());
    println!();

    let dir = DataDir::new(&args.data_dir);
    fs::create_dir_all(dir.root())
        .with_context(|| format!("Failed to create data directory: {:?}", dir.root()))?;
    let storage = dir.open_storage()?;

    if dir.ledger_file().exists() && !args.force {
        bail!(
            "A ledger already exists in {}. Use --force to overwrite it.",
            dir.root().display()
        );
    }
    println!("{}  Created data directory", "✓".green().bold());

    let config = LedgerConfig {
        difficulty: args.difficulty,
        max_attempts: args.max_attempts,
    };
    let ledger = Ledger::new(config).context("Invalid ledger configuration")?;
    let genesis = ledger.tip();

    dir.save_ledger(&ledger)?;
    println!();
    println!("{}  Created genesis block", "✓".green().bold());
    println!("    Hash:       {}", genesis.hash().to_hex().bright_yellow());
    println!("    Difficulty: {}", args.difficulty.to_string().bright_cyan());

    let config_path = dir.save_config(&config)?;
    println!(
        "{}  Saved config to: {}",
        "✓".green().bold(),
        config_path.display().to_string().bright_black()
    );

    if args.samples {
        seed_samples(&RegistryStore::new(&storage), &dir.keys())?;
    }
    storage.flush()?;

    println!();
    println!("{}", "Ledger initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  • Use {} to add patients",
        "medichain patient register".bright_cyan()
    );
    println!(
        "  • Use {} to authorize a doctor",
        "medichain access grant".bright_cyan()
    );
    println!(
        "  • Use {} to commit a record",
        "medichain record create".bright_cyan()
    );

    Ok(())
}

fn seed_samples(registry: &RegistryStore, keys: &KeyStore) -> Result<()> {
    println!();
    println!("{}", "Seeding sample data...".bold());

    for (id, name, age, gender, contact) in SAMPLE_PATIENTS {
        let keypair = Keypair::generate();
        let patient = Patient::new(id, name, age, gender, contact, keypair.public_key.clone());
        let stored = registry.register_patient(&patient)?;
        if stored == patient {
            keys.save(id, &keypair)?;
        }
        println!("  Patient {}: {}", id.bright_yellow(), name);
    }

    for (id, name, specialization, license, hospital) in SAMPLE_DOCTORS {
        let keypair = Keypair::generate();
        let doctor = Doctor::new(id, name, specialization, license, hospital, keypair.public_key.clone());
        let stored = registry.register_doctor(&doctor)?;
        if stored == doctor {
            keys.save(id, &keypair)?;
        }
        println!("  Doctor  {}: {}", id.bright_yellow(), name);
    }

    for (patient_id, doctor_id) in SAMPLE_GRANTS {
        registry.grant_access(patient_id, doctor_id)?;
        println!(
            "  {} → {}",
            patient_id.bright_yellow(),
            doctor_id.bright_yellow()
        );
    }

    println!("{}  Sample data ready", "✓".green().bold());
    Ok(())
}
