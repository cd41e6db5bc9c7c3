use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let result = tokio::select! {
        result = contractwatch::cli::run() => result,
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, exiting.");
            return ExitCode::from(contractwatch::errors::EXIT_ERROR);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(contractwatch::errors::get_exit_code(&e))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
