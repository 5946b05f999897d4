//! Medical record command.

use super::DataDir;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use medichain_chain::{AuthorizationGate, RecordRequest};
use medichain_core::{
    current_timestamp, Block, DoctorDirectory, PatientDirectory, PrivateKey, PublicKey,
    Transaction, TransactionFilter,
};
use medichain_storage::{ContentStore, RegistryStore, SledContentStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Args)]
pub struct RecordArgs {
    #[command(subcommand)]
    command: RecordCommand,
}

#[derive(Subcommand)]
enum RecordCommand {
    /// Store a record, sign it as the doctor and commit it to the ledger
    Create {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        #[arg(long)]
        patient: String,

        /// Signing doctor (key file in keys/)
        #[arg(long)]
        doctor: String,

        #[arg(long)]
        diagnosis: String,

        #[arg(long, default_value = "")]
        prescription: String,

        #[arg(long, default_value = "")]
        notes: String,

        /// Record identifier (defaults to EMR_<patient>_<n>)
        #[arg(long)]
        record_id: Option<String>,
    },
    /// List committed records
    List {
        /// Directory to store ledger data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        #[arg(long)]
        patient: Option<String>,

        #[arg(long)]
        doctor: Option<String>,

        /// Fetch and decode each record's content
        #[arg(long)]
        decode: bool,
    },
}

/// Clinical content of a record, kept off-chain in the content store.
#[derive(Debug, Serialize, Deserialize)]
struct MedicalRecord {
    record_id: String,
    patient_id: String,
    doctor_id: String,
    diagnosis: String,
    prescription: String,
    notes: String,
    timestamp: String,
}

/// Number of hex characters of the patient's public key used as key material.
const KEY_MATERIAL_LEN: usize = 32;

/// Placeholder sealing of a record for storage.
///
/// This is hex encoding, NOT encryption: anyone holding the content store can
/// read the record. `key_material` is derived from the patient's public key
/// and protects nothing.
fn seal_record(record: &MedicalRecord, patient_key: &PublicKey) -> Result<(Vec<u8>, String)> {
    let ciphertext = hex::encode(serde_json::to_vec(record)?).into_bytes();
    let key_material = patient_key.to_hex()[..KEY_MATERIAL_LEN].to_string();
    Ok((ciphertext, key_material))
}

fn open_record(ciphertext: &[u8]) -> Result<MedicalRecord> {
    let json = hex::decode(ciphertext).context("Stored record is not hex")?;
    serde_json::from_slice(&json).context("Stored record is not a medical record")
}

pub fn run(args: RecordArgs) -> Result<()> {
    match args.command {
        RecordCommand::Create {
            data_dir,
            patient,
            doctor,
            diagnosis,
            prescription,
            notes,
            record_id,
        } => {
            let record = MedicalRecord {
                record_id: record_id.unwrap_or_default(),
                patient_id: patient,
                doctor_id: doctor,
                diagnosis,
                prescription,
                notes,
                timestamp: current_timestamp(),
            };
            create(DataDir::new(data_dir), record)
        }
        RecordCommand::List {
            data_dir,
            patient,
            doctor,
            decode,
        } => {
            let filter = TransactionFilter {
                patient_id: patient,
                doctor_id: doctor,
            };
            list(DataDir::new(data_dir), &filter, decode)
        }
    }
}

/// Store `ciphertext`, sign its pointer as the doctor and run the request
/// through the gate.
///
/// On rejection the blob is removed again, unless an earlier record had
/// already stored the same content.
fn submit<P, D>(
    gate: &AuthorizationGate<'_, P, D>,
    content: &impl ContentStore,
    record: &MedicalRecord,
    ciphertext: &[u8],
    key_material: String,
    doctor_key: &PrivateKey,
) -> Result<(String, Block)>
where
    P: PatientDirectory + ?Sized,
    D: DoctorDirectory + ?Sized,
{
    let (pointer, created) = content.insert(ciphertext)?;
    let result = RecordRequest::signed(
        &record.patient_id,
        &record.doctor_id,
        &pointer,
        key_material,
        doctor_key,
    )
    .map_err(anyhow::Error::from)
    .and_then(|request| gate.process(request).map_err(anyhow::Error::from));

    match result {
        Ok(block) => Ok((pointer, block)),
        Err(err) => {
            if created {
                content.delete(&pointer)?;
            }
            Err(err)
        }
    }
}

fn create(dir: DataDir, mut record: MedicalRecord) -> Result<()> {
    let (storage, ledger) = dir.open_for_update()?;
    let registry = RegistryStore::new(&storage);
    let content = SledContentStore::new(&storage);

    let patient = registry
        .get_patient(&record.patient_id)?
        .with_context(|| format!("Patient not found: {}", record.patient_id))?;
    let doctor_key = dir
        .keys()
        .load(&record.doctor_id)
        .with_context(|| format!("No signing key for doctor {}", record.doctor_id))?;

    if record.record_id.is_empty() {
        let existing = ledger
            .query_transactions(&TransactionFilter::all().patient(&record.patient_id))
            .len();
        record.record_id = format!("EMR_{}_{}", record.patient_id, existing + 1);
    }

    let (ciphertext, key_material) = seal_record(&record, &patient.public_key)?;

    println!("{}", "Mining block...".bright_black());
    let gate = AuthorizationGate::new(&ledger, &registry, &registry);
    let (pointer, block) = submit(
        &gate,
        &content,
        &record,
        &ciphertext,
        key_material,
        doctor_key.private_key(),
    )?;

    dir.save_ledger(&ledger)?;
    storage.flush()?;

    println!(
        "{}  Committed record {}",
        "✓".green().bold(),
        record.record_id.bright_yellow()
    );
    println!("    Block:   #{}", block.index().to_string().bright_cyan());
    println!("    Hash:    {}", block.hash().to_hex().bright_yellow());
    println!("    Nonce:   {}", block.nonce());
    println!("    Pointer: {}", pointer.bright_black());
    Ok(())
}

fn list(dir: DataDir, filter: &TransactionFilter, decode: bool) -> Result<()> {
    let ledger = dir.load_ledger()?;
    let transactions = ledger.query_transactions(filter);

    println!();
    println!("{}", "Medical Records:".bold().cyan());
    println!();
    if transactions.is_empty() {
        println!("  {}", "No records found.".bright_black());
        println!();
        return Ok(());
    }

    let storage = if decode { Some(dir.open_storage()?) } else { None };
    let content = storage.as_ref().map(SledContentStore::new);

    for (i, tx) in transactions.iter().enumerate() {
        print_transaction(i + 1, tx);
        if let Some(content) = &content {
            print_content(content, &tx.content_pointer)?;
        }
        println!();
    }
    Ok(())
}

fn print_transaction(n: usize, tx: &Transaction) {
    println!(
        "  {} patient {} by {}",
        format!("#{}", n).bright_cyan(),
        tx.patient_id.bright_yellow(),
        tx.doctor_id.bright_yellow()
    );
    println!("    Timestamp: {}", tx.timestamp);
    println!("    Pointer:   {}", tx.content_pointer.bright_black());
    println!("    Key:       {}", tx.encrypted_key_material.bright_black());
}

fn print_content(content: &impl ContentStore, pointer: &str) -> Result<()> {
    match content.retrieve(pointer)? {
        Some(bytes) => {
            let record = open_record(&bytes)?;
            println!("    Record:       {}", record.record_id);
            println!("    Diagnosis:    {}", record.diagnosis);
            println!("    Prescription: {}", record.prescription);
            println!("    Notes:        {}", record.notes);
        }
        None => println!("    {}", "Content missing from store".red()),
    }
    Ok(())
}
