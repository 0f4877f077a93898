use clap::{Parser, Subcommand};
use rusqlite::Connection;
use crate::config::Config;
use crate::db::DbConnection;
use crate::models::{Company, Dealer, Lot, Role, Section, Stage};
use crate::repo::{CompanyRepo, DealerRepo, DealerUpdate, LotFilter, LotRepo, UserRepo, UserUpdate};
use crate::cli::output::{
    format_company_table, format_dashboard, format_dealer_table, format_field_name,
    format_lot_detail, format_lot_table, format_menu, format_user_table,
};
use crate::cli::error::{
    parse_field_assignment, user_error, validate_email, validate_id, validate_lot_code,
    validate_name, validate_non_empty,
};
use crate::utils::fuzzy;
use std::collections::HashMap;
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "lotledger")]
#[command(about = "Lot Ledger - track material lots through the processing pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Company management commands (admin)
    Companies {
        #[command(subcommand)]
        subcommand: CompanyCommands,
    },
    /// Dealer management commands
    Dealers {
        #[command(subcommand)]
        subcommand: DealerCommands,
    },
    /// User management commands (admin)
    Users {
        #[command(subcommand)]
        subcommand: UserCommands,
    },
    /// Lot request commands
    Lots {
        #[command(subcommand)]
        subcommand: LotCommands,
    },
    /// Show pipeline totals and per-stage counts
    Dashboard {
        /// Also list the lots currently at this stage
        #[arg(long)]
        stage: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// List the sections available to the configured role
    Menu,
}

#[derive(Subcommand)]
pub enum CompanyCommands {
    /// Create a new company
    Add {
        /// Company name
        name: String,
    },
    /// List companies
    List {
        /// Case-insensitive search on the company name
        #[arg(long)]
        search: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Rename a company
    Rename {
        /// Current company name or ID
        company: String,
        /// New company name
        new_name: String,
    },
    /// Delete a company without dealers or lots
    Delete {
        /// Company name or ID
        company: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum DealerCommands {
    /// Create a new dealer
    Add {
        /// Dealer name
        name: String,
        /// Owning company (name or ID)
        #[arg(long)]
        company: String,
        /// Contact email
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// List dealers
    List {
        /// Only dealers of this company (name or ID)
        #[arg(long)]
        company: Option<String>,
        /// Case-insensitive search on name and email
        #[arg(long)]
        search: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Modify a dealer (empty phone/address clears the field)
    Modify {
        /// Dealer ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Delete a dealer without lots
    Delete {
        /// Dealer ID
        id: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Add {
        /// Display name
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        /// Dealer the user works for (name or ID)
        #[arg(long)]
        dealer: Option<String>,
        /// Role: user or admin
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// List users
    List {
        /// Case-insensitive search on name and email
        #[arg(long)]
        search: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show one user
    Show {
        /// User ID
        id: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Modify a user (empty phone/dealer clears the field)
    Modify {
        /// User ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        dealer: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Delete a user
    Delete {
        /// User ID
        id: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum LotCommands {
    /// Create a lot request
    Add {
        /// Owning company (name or ID)
        #[arg(long)]
        company: String,
        /// Owning dealer (name or ID)
        #[arg(long)]
        dealer: String,
        /// Lot code (default: LOT<id>)
        #[arg(long)]
        code: Option<String>,
        /// Request fields (e.g. lotWeightKg=120 catalystName=Pt)
        fields: Vec<String>,
    },
    /// List lots
    List {
        /// Only lots at this stage
        #[arg(long)]
        stage: Option<String>,
        /// Only lots of this company (name or ID)
        #[arg(long)]
        company: Option<String>,
        /// Case-insensitive search on lot code, company and dealer
        #[arg(long)]
        search: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show lot header, stage progress and stage details
    Show {
        /// Lot code
        code: String,
        /// Stage to show details for (default: current stage)
        #[arg(long)]
        stage: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Record field values for a completed or current stage
    Record {
        /// Lot code
        code: String,
        /// Stage to record against
        stage: String,
        /// Field assignments (e.g. lotWeightKg=98.5 clientApproved=yes)
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Move a lot forward in the pipeline
    Advance {
        /// Lot code
        code: String,
        /// Target stage (default: next stage)
        #[arg(long)]
        to: Option<String>,
    },
    /// Delete a lot and its stage data
    Delete {
        /// Lot code
        code: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    log::debug!("Acting role: {}", config.role.as_str());
    handle_command(cli, &config)
}

fn handle_command(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Commands::Companies { subcommand } => {
            require_section(config, Section::Company);
            handle_companies(config, subcommand)
        }
        Commands::Dealers { subcommand } => {
            require_section(config, Section::Dealer);
            handle_dealers(config, subcommand)
        }
        Commands::Users { subcommand } => {
            require_section(config, Section::User);
            handle_users(config, subcommand)
        }
        Commands::Lots { subcommand } => {
            require_section(config, Section::Request);
            handle_lots(config, subcommand)
        }
        Commands::Dashboard { stage, json } => {
            require_section(config, Section::Dashboard);
            handle_dashboard(config, stage, json)
        }
        Commands::Menu => {
            println!("Sections for role '{}':", config.role.as_str());
            print!("{}", format_menu(&Section::visible_to(config.role)));
            Ok(())
        }
    }
}

/// Exit with a user error unless the configured role may use `section`
fn require_section(config: &Config, section: Section) {
    if !section.is_visible_to(config.role) {
        user_error(&format!(
            "The {} section requires the admin role (current role: {})",
            section.label(),
            config.role.as_str()
        ));
    }
}

fn connect(config: &Config) -> Result<Connection> {
    DbConnection::connect_at(&config.data_location)
        .context("Failed to connect to database")
}

/// Ask a yes/no question on stderr; anything but y/yes is a no
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N]: ", prompt);
    std::io::Write::flush(&mut std::io::stderr())
        .map_err(|e| anyhow::anyhow!("Failed to flush stderr: {}", e))?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)
        .map_err(|e| anyhow::anyhow!("Failed to read input: {}", e))?;

    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn parse_stage_arg(input: &str) -> Stage {
    match Stage::from_user_input(input) {
        Ok(stage) => stage,
        Err(e) => {
            let names: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
            let normalized = input.trim().to_uppercase().replace(['-', ' '], "_");
            user_error(&format!("{}.{}", e, fuzzy::did_you_mean(&normalized, &names)));
        }
    }
}

fn parse_role_arg(input: &str) -> Role {
    Role::from_str(input)
        .unwrap_or_else(|| user_error(&format!("Invalid role: '{}'. Expected 'user' or 'admin'.", input)))
}

fn parse_assignments(args: &[String]) -> Vec<(String, String)> {
    args.iter()
        .map(|arg| parse_field_assignment(arg).unwrap_or_else(|e| user_error(&e)))
        .collect()
}

/// Empty string clears an optional field
fn optional_update(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v.trim().is_empty() { None } else { Some(v) })
}

/// Find a company by ID or exact name
fn resolve_company(conn: &Connection, name_or_id: &str) -> Result<Company> {
    let found = match name_or_id.parse::<i64>() {
        Ok(id) => CompanyRepo::get_by_id(conn, id)?,
        Err(_) => CompanyRepo::get_by_name(conn, name_or_id)?,
    };
    match found {
        Some(company) => Ok(company),
        None => {
            let names: Vec<String> = CompanyRepo::list(conn, None)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            user_error(&format!("Company '{}' not found.{}", name_or_id, fuzzy::did_you_mean(name_or_id, &names)));
        }
    }
}

/// Find a dealer by ID or exact name (optionally within one company)
fn resolve_dealer(conn: &Connection, name_or_id: &str, company_id: Option<i64>) -> Result<Dealer> {
    if let Ok(id) = name_or_id.parse::<i64>() {
        return match DealerRepo::get_by_id(conn, id)? {
            Some(dealer) => Ok(dealer),
            None => user_error(&format!("Dealer {} not found", id)),
        };
    }

    let mut matches = DealerRepo::find_by_name(conn, name_or_id, company_id)?;
    match matches.len() {
        0 => {
            let names: Vec<String> = DealerRepo::list(conn, company_id, None)?
                .into_iter()
                .map(|d| d.name)
                .collect();
            user_error(&format!("Dealer '{}' not found.{}", name_or_id, fuzzy::did_you_mean(name_or_id, &names)));
        }
        1 => Ok(matches.remove(0)),
        n => user_error(&format!(
            "Dealer name '{}' matches {} dealers. Use the dealer ID or --company.",
            name_or_id, n
        )),
    }
}

fn resolve_lot(conn: &Connection, code: &str) -> Result<Lot> {
    match LotRepo::get_by_code(conn, code)? {
        Some(lot) => Ok(lot),
        None => {
            let codes = LotRepo::codes(conn)?;
            user_error(&format!("Lot '{}' not found.{}", code, fuzzy::did_you_mean(code, &codes)));
        }
    }
}

fn company_names(conn: &Connection) -> Result<HashMap<i64, String>> {
    Ok(CompanyRepo::list(conn, None)?
        .into_iter()
        .filter_map(|c| c.id.map(|id| (id, c.name)))
        .collect())
}

fn dealer_names(conn: &Connection) -> Result<HashMap<i64, String>> {
    Ok(DealerRepo::list(conn, None, None)?
        .into_iter()
        .filter_map(|d| d.id.map(|id| (id, d.name)))
        .collect())
}

fn handle_companies(config: &Config, cmd: CompanyCommands) -> Result<()> {
    let conn = connect(config)?;

    match cmd {
        CompanyCommands::Add { name } => {
            if let Err(e) = validate_name(&name, "Company") {
                user_error(&e);
            }
            if CompanyRepo::get_by_name(&conn, &name)?.is_some() {
                user_error(&format!("Company '{}' already exists", name));
            }

            let company = CompanyRepo::create(&conn, &name)?;
            println!("Created company '{}' (id: {})", company.name, company.id.unwrap_or_default());
            Ok(())
        }
        CompanyCommands::List { search, json } => {
            let companies = CompanyRepo::list(&conn, search.as_deref())
                .context("Failed to list companies")?;

            if json {
                let json_companies: Vec<serde_json::Value> = companies.iter().map(|company| {
                    serde_json::json!({
                        "id": company.id,
                        "name": company.name,
                        "created_ts": company.created_ts,
                        "modified_ts": company.modified_ts,
                    })
                }).collect();
                println!("{}", serde_json::to_string_pretty(&json_companies)?);
            } else {
                println!("{}", format_company_table(&companies).trim_end());
            }
            Ok(())
        }
        CompanyCommands::Rename { company, new_name } => {
            if let Err(e) = validate_name(&new_name, "Company") {
                user_error(&e);
            }
            let existing = resolve_company(&conn, &company)?;
            if CompanyRepo::get_by_name(&conn, &new_name)?.is_some() {
                user_error(&format!("Company '{}' already exists", new_name));
            }

            CompanyRepo::rename(&conn, existing.id.unwrap_or_default(), &new_name)
                .context("Failed to rename company")?;
            println!("Renamed company '{}' to '{}'", existing.name, new_name);
            Ok(())
        }
        CompanyCommands::Delete { company, yes } => {
            let existing = resolve_company(&conn, &company)?;
            let id = existing.id.unwrap_or_default();
            let (dealers, lots) = CompanyRepo::reference_counts(&conn, id)?;
            if dealers > 0 || lots > 0 {
                user_error(&format!(
                    "Company '{}' still has {} dealer(s) and {} lot(s). Remove them first.",
                    existing.name, dealers, lots
                ));
            }
            if !yes && !confirm(&format!("Delete company '{}'?", existing.name))? {
                println!("Cancelled.");
                return Ok(());
            }

            CompanyRepo::delete(&conn, id)?;
            println!("Deleted company '{}'", existing.name);
            Ok(())
        }
    }
}

fn handle_dealers(config: &Config, cmd: DealerCommands) -> Result<()> {
    let conn = connect(config)?;

    match cmd {
        DealerCommands::Add { name, company, email, phone, address } => {
            if let Err(e) = validate_name(&name, "Dealer").and_then(|_| validate_email(&email)) {
                user_error(&e);
            }
            let company = resolve_company(&conn, &company)?;
            let company_id = company.id.unwrap_or_default();
            if !DealerRepo::find_by_name(&conn, &name, Some(company_id))?.is_empty() {
                user_error(&format!("Dealer '{}' already exists for company '{}'", name, company.name));
            }

            let dealer = DealerRepo::create(
                &conn,
                company_id,
                &name,
                &email,
                phone.as_deref().filter(|p| !p.trim().is_empty()),
                address.as_deref().filter(|a| !a.trim().is_empty()),
            )?;
            println!(
                "Created dealer '{}' (id: {}) for company '{}'",
                dealer.name,
                dealer.id.unwrap_or_default(),
                company.name
            );
            Ok(())
        }
        DealerCommands::List { company, search, json } => {
            let company_id = match company {
                Some(name_or_id) => resolve_company(&conn, &name_or_id)?.id,
                None => None,
            };
            let dealers = DealerRepo::list(&conn, company_id, search.as_deref())
                .context("Failed to list dealers")?;
            let companies = company_names(&conn)?;

            if json {
                let json_dealers: Vec<serde_json::Value> = dealers.iter().map(|dealer| {
                    serde_json::json!({
                        "id": dealer.id,
                        "company_id": dealer.company_id,
                        "company": companies.get(&dealer.company_id),
                        "name": dealer.name,
                        "email": dealer.email,
                        "phone": dealer.phone,
                        "address": dealer.address,
                    })
                }).collect();
                println!("{}", serde_json::to_string_pretty(&json_dealers)?);
            } else {
                println!("{}", format_dealer_table(&dealers, &companies).trim_end());
            }
            Ok(())
        }
        DealerCommands::Modify { id, name, email, phone, address } => {
            let id = validate_id(&id, "dealer").unwrap_or_else(|e| user_error(&e));
            if let Some(name) = &name {
                if let Err(e) = validate_name(name, "Dealer") {
                    user_error(&e);
                }
            }
            if let Some(email) = &email {
                if let Err(e) = validate_email(email) {
                    user_error(&e);
                }
            }
            let dealer = DealerRepo::get_by_id(&conn, id)?
                .unwrap_or_else(|| user_error(&format!("Dealer {} not found", id)));
            if let Some(name) = &name {
                let clash = DealerRepo::find_by_name(&conn, name, Some(dealer.company_id))?
                    .into_iter()
                    .any(|other| other.id != Some(id));
                if clash {
                    let company = CompanyRepo::get_by_id(&conn, dealer.company_id)?
                        .map(|c| c.name)
                        .unwrap_or_else(|| dealer.company_id.to_string());
                    user_error(&format!("Dealer '{}' already exists for company '{}'", name, company));
                }
            }

            let update = DealerUpdate {
                name,
                email,
                phone: optional_update(phone),
                address: optional_update(address),
            };
            DealerRepo::update(&conn, id, &update)?;
            println!("Modified dealer {}", id);
            Ok(())
        }
        DealerCommands::Delete { id, yes } => {
            let id = validate_id(&id, "dealer").unwrap_or_else(|e| user_error(&e));
            let dealer = DealerRepo::get_by_id(&conn, id)?
                .unwrap_or_else(|| user_error(&format!("Dealer {} not found", id)));
            let lots = DealerRepo::lot_count(&conn, id)?;
            if lots > 0 {
                user_error(&format!("Dealer '{}' still owns {} lot(s). Remove them first.", dealer.name, lots));
            }
            if !yes && !confirm(&format!("Delete dealer '{}'?", dealer.name))? {
                println!("Cancelled.");
                return Ok(());
            }

            DealerRepo::delete(&conn, id)?;
            println!("Deleted dealer '{}'", dealer.name);
            Ok(())
        }
    }
}

fn user_json(user: &crate::models::User, dealers: &HashMap<i64, String>) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "phone": user.phone,
        "role": user.role.as_str(),
        "dealer_id": user.dealer_id,
        "dealer": user.dealer_id.and_then(|id| dealers.get(&id)),
        "created_ts": user.created_ts,
        "modified_ts": user.modified_ts,
    })
}

fn handle_users(config: &Config, cmd: UserCommands) -> Result<()> {
    let conn = connect(config)?;

    match cmd {
        UserCommands::Add { name, email, phone, dealer, role } => {
            if let Err(e) = validate_non_empty(&name, "User name").and_then(|_| validate_email(&email)) {
                user_error(&e);
            }
            let role = parse_role_arg(&role);
            if UserRepo::get_by_email(&conn, &email)?.is_some() {
                user_error(&format!("A user with email '{}' already exists", email));
            }
            let dealer_id = match dealer {
                Some(name_or_id) => resolve_dealer(&conn, &name_or_id, None)?.id,
                None => None,
            };

            let user = UserRepo::create(
                &conn,
                &name,
                &email,
                phone.as_deref().filter(|p| !p.trim().is_empty()),
                dealer_id,
                role,
            )?;
            println!("Created user '{}' (id: {}, role: {})", user.name, user.id.unwrap_or_default(), user.role.as_str());
            Ok(())
        }
        UserCommands::List { search, json } => {
            let users = UserRepo::list(&conn, search.as_deref())
                .context("Failed to list users")?;
            let dealers = dealer_names(&conn)?;

            if json {
                let json_users: Vec<serde_json::Value> = users.iter().map(|u| user_json(u, &dealers)).collect();
                println!("{}", serde_json::to_string_pretty(&json_users)?);
            } else {
                println!("{}", format_user_table(&users, &dealers).trim_end());
            }
            Ok(())
        }
        UserCommands::Show { id, json } => {
            let id = validate_id(&id, "user").unwrap_or_else(|e| user_error(&e));
            let user = UserRepo::get_by_id(&conn, id)?
                .unwrap_or_else(|| user_error(&format!("User {} not found", id)));
            let dealers = dealer_names(&conn)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&user_json(&user, &dealers))?);
            } else {
                println!("User {}", id);
                println!("  {:<8} {}", "Name:", user.name);
                println!("  {:<8} {}", "Email:", user.email);
                println!("  {:<8} {}", "Phone:", user.phone.as_deref().unwrap_or("N/A"));
                println!("  {:<8} {}", "Role:", user.role.as_str());
                let dealer = user.dealer_id
                    .and_then(|d| dealers.get(&d).cloned())
                    .unwrap_or_else(|| "N/A".to_string());
                println!("  {:<8} {}", "Dealer:", dealer);
            }
            Ok(())
        }
        UserCommands::Modify { id, name, email, phone, dealer, role } => {
            let id = validate_id(&id, "user").unwrap_or_else(|e| user_error(&e));
            if UserRepo::get_by_id(&conn, id)?.is_none() {
                user_error(&format!("User {} not found", id));
            }
            if let Some(email) = &email {
                if let Err(e) = validate_email(email) {
                    user_error(&e);
                }
                if let Some(other) = UserRepo::get_by_email(&conn, email)? {
                    if other.id != Some(id) {
                        user_error(&format!("A user with email '{}' already exists", email));
                    }
                }
            }
            if let Some(name) = &name {
                if let Err(e) = validate_non_empty(name, "User name") {
                    user_error(&e);
                }
            }
            let dealer_id = match dealer {
                Some(name_or_id) if name_or_id.trim().is_empty() => Some(None),
                Some(name_or_id) => Some(resolve_dealer(&conn, &name_or_id, None)?.id),
                None => None,
            };

            let update = UserUpdate {
                name,
                email,
                phone: optional_update(phone),
                dealer_id,
                role: role.as_deref().map(parse_role_arg),
            };
            UserRepo::update(&conn, id, &update)?;
            println!("Modified user {}", id);
            Ok(())
        }
        UserCommands::Delete { id, yes } => {
            let id = validate_id(&id, "user").unwrap_or_else(|e| user_error(&e));
            let user = UserRepo::get_by_id(&conn, id)?
                .unwrap_or_else(|| user_error(&format!("User {} not found", id)));
            if !yes && !confirm(&format!("Delete user '{}'?", user.name))? {
                println!("Cancelled.");
                return Ok(());
            }

            UserRepo::delete(&conn, id)?;
            println!("Deleted user '{}'", user.name);
            Ok(())
        }
    }
}

fn lot_json(
    lot: &Lot,
    companies: &HashMap<i64, String>,
    dealers: &HashMap<i64, String>,
) -> serde_json::Value {
    serde_json::json!({
        "id": lot.id,
        "uuid": lot.uuid,
        "lot_code": lot.lot_code,
        "company_id": lot.company_id,
        "company": companies.get(&lot.company_id),
        "dealer_id": lot.dealer_id,
        "dealer": dealers.get(&lot.dealer_id),
        "stage": lot.stage,
        "stage_label": lot.stage.label(),
        "status": lot.status().as_str(),
        "created_ts": lot.created_ts,
        "modified_ts": lot.modified_ts,
    })
}

fn handle_lots(config: &Config, cmd: LotCommands) -> Result<()> {
    let conn = connect(config)?;

    match cmd {
        LotCommands::Add { company, dealer, code, fields } => {
            if let Some(code) = &code {
                if let Err(e) = validate_lot_code(code) {
                    user_error(&e);
                }
                if LotRepo::get_by_code(&conn, code)?.is_some() {
                    user_error(&format!("Lot '{}' already exists", code));
                }
            }
            let entries = parse_assignments(&fields);
            let company = resolve_company(&conn, &company)?;
            let dealer = resolve_dealer(&conn, &dealer, company.id)?;
            if Some(dealer.company_id) != company.id {
                user_error(&format!("Dealer '{}' does not belong to company '{}'", dealer.name, company.name));
            }

            let lot = LotRepo::create(
                &conn,
                code.as_deref(),
                company.id.unwrap_or_default(),
                dealer.id.unwrap_or_default(),
                &entries,
            )?;
            println!("Created lot {} for {} / {}", lot.lot_code, company.name, dealer.name);
            Ok(())
        }
        LotCommands::List { stage, company, search, json } => {
            let filter = LotFilter {
                stage: stage.as_deref().map(parse_stage_arg),
                company_id: match company {
                    Some(name_or_id) => resolve_company(&conn, &name_or_id)?.id,
                    None => None,
                },
                dealer_id: None,
            };
            let companies = company_names(&conn)?;
            let dealers = dealer_names(&conn)?;
            let mut lots = LotRepo::list(&conn, &filter).context("Failed to list lots")?;
            if let Some(term) = search.as_deref() {
                lots.retain(|lot| {
                    fuzzy::is_substring_match(&lot.lot_code, term)
                        || companies.get(&lot.company_id).is_some_and(|n| fuzzy::is_substring_match(n, term))
                        || dealers.get(&lot.dealer_id).is_some_and(|n| fuzzy::is_substring_match(n, term))
                });
            }

            if json {
                let json_lots: Vec<serde_json::Value> = lots.iter()
                    .map(|lot| lot_json(lot, &companies, &dealers))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json_lots)?);
            } else {
                println!("{}", format_lot_table(&lots, &companies, &dealers).trim_end());
            }
            Ok(())
        }
        LotCommands::Show { code, stage, json } => {
            let lot = resolve_lot(&conn, &code)?;
            let detail_stage = stage.as_deref().map(parse_stage_arg).unwrap_or(lot.stage);
            let fields = lot.visible_fields(detail_stage)?;
            let companies = company_names(&conn)?;
            let dealers = dealer_names(&conn)?;

            if json {
                let progress: Vec<serde_json::Value> = lot.completion_status().iter().map(|(stage, complete)| {
                    serde_json::json!({
                        "stage": stage,
                        "label": stage.label(),
                        "complete": complete,
                        "current": *stage == lot.stage,
                    })
                }).collect();
                let details: Vec<serde_json::Value> = fields.iter().map(|(name, value)| {
                    serde_json::json!({
                        "field": name,
                        "label": format_field_name(name),
                        "value": value.value(),
                    })
                }).collect();
                let mut json_lot = lot_json(&lot, &companies, &dealers);
                json_lot["progress"] = serde_json::Value::Array(progress);
                json_lot["details"] = serde_json::json!({
                    "stage": detail_stage,
                    "fields": details,
                });
                println!("{}", serde_json::to_string_pretty(&json_lot)?);
            } else {
                let company = companies.get(&lot.company_id).map(String::as_str).unwrap_or("N/A");
                let dealer = dealers.get(&lot.dealer_id).map(String::as_str).unwrap_or("N/A");
                print!("{}", format_lot_detail(&lot, company, dealer, detail_stage, &fields));
            }
            Ok(())
        }
        LotCommands::Record { code, stage, fields } => {
            let lot = resolve_lot(&conn, &code)?;
            let stage = parse_stage_arg(&stage);
            let entries = parse_assignments(&fields);

            LotRepo::record(&conn, lot.id.unwrap_or_default(), stage, &entries)?;
            let names: Vec<&str> = entries.iter().map(|(f, _)| f.as_str()).collect();
            println!("Recorded {} on {} for lot {}", names.join(", "), stage.label(), lot.lot_code);
            Ok(())
        }
        LotCommands::Advance { code, to } => {
            let lot = resolve_lot(&conn, &code)?;
            let target = to.as_deref().map(parse_stage_arg);
            let from = lot.stage;

            let advanced = LotRepo::advance(&conn, lot.id.unwrap_or_default(), target)?;
            println!(
                "Lot {} moved from {} to {}",
                advanced.lot_code,
                from.label(),
                advanced.stage.label()
            );
            Ok(())
        }
        LotCommands::Delete { code, yes } => {
            let lot = resolve_lot(&conn, &code)?;
            if !yes && !confirm(&format!("Delete lot {} and all its stage data?", lot.lot_code))? {
                println!("Cancelled.");
                return Ok(());
            }

            LotRepo::delete(&conn, lot.id.unwrap_or_default())?;
            println!("Deleted lot {}", lot.lot_code);
            Ok(())
        }
    }
}

fn handle_dashboard(config: &Config, stage: Option<String>, json: bool) -> Result<()> {
    let conn = connect(config)?;
    let stage_filter = stage.as_deref().map(parse_stage_arg);

    let counts = LotRepo::stage_counts(&conn)?;
    let total: usize = counts.values().sum();
    let completed = counts.get(&Stage::LAST).copied().unwrap_or(0);

    let filtered = match stage_filter {
        Some(stage) => {
            let filter = LotFilter { stage: Some(stage), ..Default::default() };
            Some(LotRepo::list(&conn, &filter)?)
        }
        None => None,
    };

    if json {
        let companies = company_names(&conn)?;
        let dealers = dealer_names(&conn)?;
        let stages: Vec<serde_json::Value> = counts.iter().map(|(stage, count)| {
            serde_json::json!({
                "stage": stage,
                "label": stage.label(),
                "count": count,
            })
        }).collect();
        let mut dashboard_json = serde_json::json!({
            "total": total,
            "completed": completed,
            "stages": stages,
        });
        if let Some(lots) = &filtered {
            dashboard_json["lots"] = serde_json::Value::Array(
                lots.iter().map(|lot| lot_json(lot, &companies, &dealers)).collect(),
            );
        }
        println!("{}", serde_json::to_string_pretty(&dashboard_json)?);
    } else {
        print!("{}", format_dashboard(total, completed, &counts));
        if let (Some(stage), Some(lots)) = (stage_filter, &filtered) {
            let companies = company_names(&conn)?;
            let dealers = dealer_names(&conn)?;
            println!();
            println!("Lots at {}", stage.label());
            println!("{}", format_lot_table(lots, &companies, &dealers).trim_end());
        }
    }
    Ok(())
}
