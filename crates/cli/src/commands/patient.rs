//! Patient management command.

use super::DataDir;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use medichain_core::{Keypair, Patient, PatientDirectory};
use medichain_storage::{KeyStore, RegistryStore};
use std::path::PathBuf;

#[derive(Args)]
pub struct PatientArgs {
    #[command(subcommand)]
    command: PatientCommand,
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Register a new patient and generate their key pair
    Register {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Patient identifier
        patient_id: String,

        /// Full name
        #[arg(long)]
        name: String,

        #[arg(long)]
        age: u32,

        #[arg(long)]
        gender: String,

        /// Contact details
        #[arg(long)]
        contact: String,
    },
    /// Show a patient and their authorized doctors
    Show {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Patient identifier
        patient_id: String,
    },
    /// List registered patients
    List {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

pub fn run(args: PatientArgs) -> Result<()> {
    match args.command {
        PatientCommand::Register {
            data_dir,
            patient_id,
            name,
            age,
            gender,
            contact,
        } => register(DataDir::new(data_dir), patient_id, name, age, gender, contact),
        PatientCommand::Show {
            data_dir,
            patient_id,
        } => show(DataDir::new(data_dir), &patient_id),
        PatientCommand::List { data_dir } => list(DataDir::new(data_dir)),
    }
}

fn register(
    dir: DataDir,
    patient_id: String,
    name: String,
    age: u32,
    gender: String,
    contact: String,
) -> Result<()> {
    KeyStore::check_id(&patient_id)?;
    let storage = dir.open_storage()?;
    let registry = RegistryStore::new(&storage);

    let keypair = Keypair::generate();
    let patient = Patient::new(&patient_id, name, age, gender, contact, keypair.public_key.clone());
    let stored = registry.register_patient(&patient)?;

    if stored != patient {
        println!(
            "{}  Patient {} already registered; keeping the existing record",
            "!".yellow().bold(),
            patient_id.bright_yellow()
        );
        return Ok(());
    }

    let key_file = dir.keys().save(&patient_id, &keypair)?;
    storage.flush()?;

    println!("{}  Registered patient {}", "✓".green().bold(), patient_id.bright_yellow());
    println!("    Public Key: {}", patient.public_key.to_hex().bright_black());
    println!(
        "    Key file:   {}",
        key_file.display().to_string().bright_black()
    );
    println!();
    println!("{}", "Keep your private key safe!".yellow().bold());
    Ok(())
}

fn show(dir: DataDir, patient_id: &str) -> Result<()> {
    let storage = dir.open_storage()?;
    let registry = RegistryStore::new(&storage);
    let patient = registry
        .get_patient(patient_id)?
        .with_context(|| format!("Patient not found: {}", patient_id))?;

    println!();
    println!("{}", "Patient:".bold().cyan());
    println!("  ID:         {}", patient.patient_id.bright_yellow());
    println!("  Name:       {}", patient.name);
    println!("  Age:        {}", patient.age);
    println!("  Gender:     {}", patient.gender);
    println!("  Contact:    {}", patient.contact_info);
    println!("  Public Key: {}", patient.public_key.to_hex().bright_black());
    if patient.authorized_doctors.is_empty() {
        println!("  Authorized: {}", "none".bright_black());
    } else {
        let doctors: Vec<&str> = patient.authorized_doctors.iter().map(String::as_str).collect();
        println!("  Authorized: {}", doctors.join(", ").bright_cyan());
    }
    println!();
    Ok(())
}

fn list(dir: DataDir) -> Result<()> {
    let storage = dir.open_storage()?;
    let patients = RegistryStore::new(&storage).list_patients()?;

    println!();
    println!("{}", "Patients:".bold().cyan());
    if patients.is_empty() {
        println!("  {}", "No patients registered.".bright_black());
    }
    for patient in patients {
        println!(
            "  {}  {} ({} doctors authorized)",
            patient.patient_id.bright_yellow(),
            patient.name,
            patient.authorized_doctors.len()
        );
    }
    println!();
    Ok(())
}
