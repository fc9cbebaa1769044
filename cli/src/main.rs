use capsule_core::CapsuleError;

fn main() {
    let exit_code = match capsule_cli::run_main() {
        Ok(()) => 0,
        Err(err) => match err.downcast_ref::<CapsuleError>() {
            // A delegated child already reported its own failure; exit with
            // its status and add nothing.
            Some(CapsuleError::Delegated { status, .. }) => *status,
            _ => {
                eprintln!("capsule: {err:#}");
                1
            }
        },
    };
    std::process::exit(exit_code);
}
