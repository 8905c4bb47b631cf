// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use baristacms_server::{
    api::router,
    config::{AuthConfig, ServerConfig},
    logging,
    state::AppState,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "server failed");
        eprintln!("baristacms-server: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let server_config = ServerConfig::from_env()?;
    logging::init(server_config.log_format);

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    let auth_config = AuthConfig::from_env().inspect_err(|err| {
        error!(error = %err, "failed to load auth configuration");
    })?;
    info!(
        local_issuer = %auth_config.local_issuer,
        federation = auth_config.federation.is_some(),
        bypass = auth_config.bypass.is_some(),
        "configuration loaded"
    );

    let state = AppState::new(auth_config.build_gate()?);
    let app = router(state).into_make_service();

    let shutdown = CancellationToken::new();
    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    let addr = server_config.addr;
    match server_config.tls {
        Some(tls) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            info!("BaristaCMS server listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, rustls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            info!("BaristaCMS server listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr).handle(handle).serve(app).await?;
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining connections");
    shutdown.cancel();
}
