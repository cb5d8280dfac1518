use crate::{emit_success, open_store, OutputMode};
use owo_colors::OwoColorize;
use patient_records::config::{self, PatientRecordsConfig};
use patient_records::consistency::audit_roles;
use patient_records::seed::{self, SeedOptions};
use patient_records::storage::SqliteStore;
use patient_records::ui::{self, theme, Icons, Spinner};
use patient_records::{ImpactPlanner, Table};
use std::path::Path;
use uuid::Uuid;

pub fn run_init(
    output_mode: OutputMode,
    database: Option<&Path>,
    config_path: Option<&Path>,
    force: bool,
) -> anyhow::Result<()> {
    let (store, path) = open_store(database, config_path)?;

    // An existing config is kept unless --force
    let config_file = config_path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
    let wrote_config = force || !config_file.exists();
    if wrote_config {
        let cfg = PatientRecordsConfig { database: Some(path.display().to_string()) };
        config::write_config(&config_file, &cfg, force)?;
    }

    let stats = store.stats()?;
    if output_mode.is_human() {
        ui::header("Record store ready");
        ui::status(Icons::DATABASE, "Database", &path.display().to_string());
        let note = if wrote_config { "written" } else { "kept existing (use --force to overwrite)" };
        ui::status(Icons::WRENCH, "Config", &format!("{} ({})", config_file.display(), note));
        ui::summary_row("Tables", &Table::all().len().to_string());
        ui::summary_row("Users", &stats.users.to_string());
    } else {
        let data = serde_json::json!({
            "database": path.display().to_string(),
            "config": config_file.display().to_string(),
            "config_written": wrote_config,
            "stats": stats,
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

pub fn run_seed(output_mode: OutputMode, store: &SqliteStore, options: &SeedOptions) -> anyhow::Result<()> {
    let spinner = output_mode.is_human().then(|| Spinner::new("Seeding demo data..."));
    let report = seed::seed(store, options)?;
    let elapsed = spinner.map(|s| s.finish_and_clear());

    if output_mode.is_human() {
        if report.skipped {
            ui::warn(&format!(
                "Store already holds {} users; nothing was written",
                report.stats.users
            ));
        } else {
            println!("{} {}", Icons::SEED, "Demo data created".style(theme().success.clone()));
            println!("{}", ui::stats_table(&report.stats.rows()));
            println!(
                "  {} {}",
                ui::dim("Password hash for all seeded users:"),
                seed::SEED_PASSWORD_HASH
            );
        }
        if let Some(elapsed) = elapsed {
            ui::timing(&elapsed);
        }
    } else {
        emit_success(output_mode, "seed", &report)?;
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, store: &SqliteStore, path: &Path) -> anyhow::Result<()> {
    let stats = store.stats()?;
    if output_mode.is_human() {
        println!(
            "{} {} {}",
            Icons::STATS,
            "Record store statistics".style(theme().header.clone()),
            ui::muted(&format!("({})", path.display()))
        );
        println!("{}", ui::stats_table(&stats.rows()));
    } else {
        emit_success(output_mode, "stats", &stats)?;
    }
    Ok(())
}

pub fn run_hospitals(output_mode: OutputMode, store: &SqliteStore, skip: usize, limit: usize) -> anyhow::Result<()> {
    let hospitals = store.list_hospitals(skip, limit)?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "hospitals", &hospitals);
    }

    if hospitals.is_empty() {
        ui::info("Hospitals", "none");
        return Ok(());
    }
    let mut rows = Vec::with_capacity(hospitals.len());
    for h in &hospitals {
        rows.push(vec![
            h.id.to_string(),
            h.name.clone(),
            h.address.clone(),
            store.count_hospital_doctors(h.id)?.to_string(),
            if h.is_active { "yes".to_string() } else { "no".to_string() },
        ]);
    }
    println!("{} {}", Icons::HOSPITAL, "Hospitals".style(theme().header.clone()));
    println!("{}", ui::record_table(&["Id", "Name", "Address", "Doctors", "Active"], rows));
    Ok(())
}

pub fn run_patients(output_mode: OutputMode, store: &SqliteStore, query: &str) -> anyhow::Result<()> {
    let patients = store.search_patients(query)?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "patients", &patients);
    }

    println!("{} Searching patients for '{}'...", Icons::SEARCH, query);
    if patients.is_empty() {
        ui::warn("No patients found.");
        return Ok(());
    }
    let rows = patients
        .iter()
        .map(|p| {
            vec![
                p.user_id.to_string(),
                p.full_name(),
                p.date_of_birth.map(|d| d.to_string()).unwrap_or_default(),
                p.blood_type.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!("{}", ui::record_table(&["Id", "Name", "Born", "Blood"], rows));
    ui::summary_row("Matches", &patients.len().to_string());
    Ok(())
}

pub fn run_records(
    output_mode: OutputMode,
    store: &SqliteStore,
    patient: &str,
    skip: usize,
    limit: usize,
) -> anyhow::Result<()> {
    let patient_id = Uuid::parse_str(patient.trim())
        .map_err(|e| patient_records::Error::InvalidKey(format!("patient '{}': {}", patient, e)))?;
    let profile = store
        .get_patient_profile(patient_id)?
        .ok_or_else(|| anyhow::anyhow!("patient profile not found: {}", patient_id))?;
    let records = store.patient_records(patient_id, skip, limit)?;

    if !output_mode.is_human() {
        let data = serde_json::json!({ "patient": profile, "records": records });
        return emit_success(output_mode, "records", data);
    }

    println!(
        "{} {} {}",
        Icons::RECORD,
        profile.full_name().style(theme().header.clone()),
        ui::muted(&format!("({} of {} visits)", records.len(), store.count_medical_records(patient_id)?))
    );
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.date_of_visit.format("%Y-%m-%d %H:%M").to_string(),
                r.diagnosis.clone(),
                r.medications.as_ref().map(Vec::len).unwrap_or(0).to_string(),
            ]
        })
        .collect();
    println!("{}", ui::record_table(&["Id", "Visited", "Diagnosis", "Medications"], rows));
    Ok(())
}

pub fn run_impact(output_mode: OutputMode, store: &SqliteStore, table: &str, key: &str) -> anyhow::Result<()> {
    let table: Table = table.parse()?;
    let key = table.parse_key(key)?;
    let plan = ImpactPlanner::new(store).plan(table, key)?;

    if !output_mode.is_human() {
        let data = serde_json::json!({
            "plan": plan,
            "blocked": plan.is_blocked(),
            "cascaded_rows": plan.cascaded_rows(),
            "nulled_rows": plan.nulled_rows(),
        });
        return emit_success(output_mode, "impact", data);
    }

    println!("{} Impact of deleting {} {}", Icons::LINK, table, key.style(theme().key.clone()));
    if plan.effects.is_empty() {
        ui::success("No other rows are affected.");
        return Ok(());
    }
    for entry in plan.cascades() {
        ui::cascaded(entry.table.as_str(), entry.column, entry.rows, entry.depth);
    }
    for entry in plan.nullifications() {
        ui::nulled(entry.table.as_str(), entry.column, entry.rows);
    }
    for entry in plan.blockers() {
        ui::blocked(entry.table.as_str(), entry.column, entry.rows);
    }
    println!();
    if plan.is_blocked() {
        ui::warn("Delete would be rejected while the rows above reference it.");
    } else {
        ui::success(&format!(
            "Delete would remove {} dependent row(s) and clear {} reference(s).",
            plan.cascaded_rows(),
            plan.nulled_rows()
        ));
    }
    Ok(())
}

pub fn run_delete(output_mode: OutputMode, store: &SqliteStore, table: &str, key: &str) -> anyhow::Result<()> {
    let table: Table = table.parse()?;
    let key = table.parse_key(key)?;
    let plan = ImpactPlanner::new(store).plan(table, key)?;

    store.transaction(|store| store.delete_row(table, key))?;

    if output_mode.is_human() {
        println!("{} Deleted {} {}", Icons::DEL, table, key.style(theme().key.clone()));
        ui::summary_row("Cascaded rows", &plan.cascaded_rows().to_string());
        ui::summary_row("Cleared references", &plan.nulled_rows().to_string());
    } else {
        let data = serde_json::json!({
            "table": table,
            "key": key,
            "cascaded_rows": plan.cascaded_rows(),
            "nulled_rows": plan.nulled_rows(),
        });
        emit_success(output_mode, "delete", data)?;
    }
    Ok(())
}

pub fn run_check(output_mode: OutputMode, store: &SqliteStore) -> anyhow::Result<()> {
    let findings = audit_roles(store)?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "check", &findings);
    }

    if findings.is_empty() {
        ui::success("Every user has exactly the profile its role requires.");
        return Ok(());
    }
    ui::section("Role inconsistencies");
    for finding in &findings {
        println!("  {} {}", Icons::PERSON, finding);
    }
    anyhow::bail!("{} role inconsistencies found", findings.len());
}
