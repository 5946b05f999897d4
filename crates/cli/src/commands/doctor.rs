//! Doctor management command.

use super::DataDir;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use medichain_core::{Doctor, DoctorDirectory, Keypair};
use medichain_storage::{KeyStore, RegistryStore};
use std::path::PathBuf;

#[derive(Args)]
pub struct DoctorArgs {
    #[command(subcommand)]
    command: DoctorCommand,
}

#[derive(Subcommand)]
enum DoctorCommand {
    /// Register a new doctor and generate their signing key
    Register {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Doctor identifier
        doctor_id: String,

        /// Full name
        #[arg(long)]
        name: String,

        #[arg(long)]
        specialization: String,

        /// Medical license number
        #[arg(long)]
        license: String,

        #[arg(long)]
        hospital: String,
    },
    /// Show a doctor
    Show {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Doctor identifier
        doctor_id: String,
    },
    /// List registered doctors
    List {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

pub fn run(args: DoctorArgs) -> Result<()> {
    match args.command {
        DoctorCommand::Register {
            data_dir,
            doctor_id,
            name,
            specialization,
            license,
            hospital,
        } => {
            let doctor_key = Keypair::generate();
            let doctor = Doctor::new(
                &doctor_id,
                name,
                specialization,
                license,
                hospital,
                doctor_key.public_key.clone(),
            );
            register(DataDir::new(data_dir), doctor, doctor_key)
        }
        DoctorCommand::Show {
            data_dir,
            doctor_id,
        } => show(DataDir::new(data_dir), &doctor_id),
        DoctorCommand::List { data_dir } => list(DataDir::new(data_dir)),
    }
}

fn register(dir: DataDir, doctor: Doctor, keypair: Keypair) -> Result<()> {
    KeyStore::check_id(&doctor.doctor_id)?;
    let storage = dir.open_storage()?;
    let stored = RegistryStore::new(&storage).register_doctor(&doctor)?;

    if stored != doctor {
        println!(
            "{}  Doctor {} already registered; keeping the existing record",
            "!".yellow().bold(),
            doctor.doctor_id.bright_yellow()
        );
        return Ok(());
    }

    let key_file = dir.keys().save(&doctor.doctor_id, &keypair)?;
    storage.flush()?;

    println!(
        "{}  Registered doctor {}",
        "✓".green().bold(),
        doctor.doctor_id.bright_yellow()
    );
    println!("    Public Key: {}", doctor.public_key.to_hex().bright_black());
    println!(
        "    Key file:   {}",
        key_file.display().to_string().bright_black()
    );
    Ok(())
}

fn show(dir: DataDir, doctor_id: &str) -> Result<()> {
    let storage = dir.open_storage()?;
    let doctor = RegistryStore::new(&storage)
        .get_doctor(doctor_id)?
        .with_context(|| format!("Doctor not found: {}", doctor_id))?;

    println!();
    println!("{}", "Doctor:".bold().cyan());
    println!("  ID:             {}", doctor.doctor_id.bright_yellow());
    println!("  Name:           {}", doctor.name);
    println!("  Specialization: {}", doctor.specialization);
    println!("  License:        {}", doctor.license_number);
    println!("  Hospital:       {}", doctor.hospital);
    println!("  Public Key:     {}", doctor.public_key.to_hex().bright_black());
    println!(
        "  Signing key:    {}",
        if dir.keys().contains(doctor_id) {
            "present".green()
        } else {
            "missing".red()
        }
    );
    println!();
    Ok(())
}

fn list(dir: DataDir) -> Result<()> {
    let storage = dir.open_storage()?;
    let doctors = RegistryStore::new(&storage).list_doctors()?;

    println!();
    println!("{}", "Doctors:".bold().cyan());
    if doctors.is_empty() {
        println!("  {}", "No doctors registered.".bright_black());
    }
    for doctor in doctors {
        println!(
            "  {}  {} ({}, {})",
            doctor.doctor_id.bright_yellow(),
            doctor.name,
            doctor.specialization,
            doctor.hospital
        );
    }
    println!();
    Ok(())
}
