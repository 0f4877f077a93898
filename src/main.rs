use lotledger::cli::{internal_error, run};
use lotledger::error::LotError;

/// Exit code for a failed command: 2 for storage failures and integrity
/// faults, 1 for everything the user can fix.
fn exit_code(e: &anyhow::Error) -> i32 {
    if let Some(lot_err) = e.chain().find_map(|cause| cause.downcast_ref::<LotError>()) {
        return if lot_err.is_integrity_fault() { 2 } else { 1 };
    }
    if e.chain().any(|cause| cause.is::<rusqlite::Error>()) {
        return 2;
    }
    1
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let _ = enable_ansi_support::enable_ansi_support();

    if let Err(e) = run() {
        if exit_code(&e) == 2 {
            let mut message = e.to_string();
            let causes: Vec<String> = e.chain().skip(1).map(|c| c.to_string()).collect();
            if !causes.is_empty() {
                message.push_str("\n\nCaused by:");
                for (indent, cause) in causes.iter().enumerate() {
                    message.push_str(&format!("\n{:indent$}  {}", "", cause, indent = indent + 1));
                }
            }
            internal_error(&message);
        }

        let lot_err = e.chain().find_map(|cause| cause.downcast_ref::<LotError>());
        match lot_err {
            Some(lot_err) => eprintln!("Error: {}", lot_err),
            None => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}
