//! Access grant command.

use super::DataDir;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use medichain_chain::AuthorizationGate;
use medichain_storage::RegistryStore;
use std::path::PathBuf;

#[derive(Args)]
pub struct AccessArgs {
    #[command(subcommand)]
    command: AccessCommand,
}

#[derive(Subcommand)]
enum AccessCommand {
    /// Authorize a doctor to create records for a patient
    Grant {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        patient_id: String,
        doctor_id: String,
    },
    /// Withdraw a doctor's authorization
    Revoke {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        patient_id: String,
        doctor_id: String,
    },
}

pub fn run(args: AccessArgs) -> Result<()> {
    match args.command {
        AccessCommand::Grant {
            data_dir,
            patient_id,
            doctor_id,
        } => change(DataDir::new(data_dir), &patient_id, &doctor_id, true),
        AccessCommand::Revoke {
            data_dir,
            patient_id,
            doctor_id,
        } => change(DataDir::new(data_dir), &patient_id, &doctor_id, false),
    }
}

fn change(dir: DataDir, patient_id: &str, doctor_id: &str, grant: bool) -> Result<()> {
    let (storage, ledger) = dir.open_for_update()?;
    let registry = RegistryStore::new(&storage);
    let gate = AuthorizationGate::new(&ledger, &registry, &registry);

    if grant {
        gate.grant_access(patient_id, doctor_id)?;
    } else {
        gate.revoke_access(patient_id, doctor_id)?;
    }
    storage.flush()?;

    println!(
        "{}  {} {} for patient {}",
        "✓".green().bold(),
        if grant { "Granted access to" } else { "Revoked access from" },
        doctor_id.bright_yellow(),
        patient_id.bright_yellow()
    );
    Ok(())
}
