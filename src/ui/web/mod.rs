//! HTTP front-end: the download form, the `/epub` API and a health check.

mod router;
mod routes;
mod state;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::base_system::context::{Config, ENV_WEB_ADDR};
use crate::download::pipeline::Pipeline;
use crate::third_party::ArtifactGenerator;
use state::AppState;

pub fn run(config: &Config, generator: Arc<dyn ArtifactGenerator>) -> Result<()> {
    let bind_addrs: Vec<SocketAddr> = parse_bind_addrs(&config.bind_addr)?;

    let pipeline = Pipeline::new(
        config.default_credentials(),
        config.output_dir.clone(),
        generator,
    );
    if !pipeline.has_default_credentials() {
        warn!(target: "web", "JNCEP_EMAIL/JNCEP_PASSWORD not set; requests must supply credentials");
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run_async(bind_addrs, AppState::new(pipeline)))
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(anyhow!("empty bind addr"));
    }

    // Standard formats:
    // - IPv4: 0.0.0.0:5000
    // - IPv6: [::]:5000
    if let Ok(a) = s.parse::<SocketAddr>() {
        return Ok(a);
    }

    // Tolerate missing brackets for IPv6, e.g. "::1:5000".
    // We interpret the last ':' segment as port if it's all digits.
    if !s.starts_with('[')
        && s.contains(':')
        && let Some((host, port)) = s.rsplit_once(':')
        && !host.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
        && host.contains(':')
    {
        let wrapped = format!("[{host}]:{port}");
        if let Ok(a) = wrapped.parse::<SocketAddr>() {
            return Ok(a);
        }
    }

    Err(anyhow!(
        "invalid {ENV_WEB_ADDR}: '{s}'. Use '0.0.0.0:5000' or '[::]:5000' (IPv6 needs brackets). For multiple binds, separate by comma."
    ))
}

fn parse_bind_addrs(raw: &str) -> Result<Vec<SocketAddr>> {
    let parts: Vec<&str> = raw
        .split([',', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(anyhow!("empty {ENV_WEB_ADDR}"));
    }

    let mut out = Vec::with_capacity(parts.len());
    for p in parts {
        let a = parse_bind_addr(p)?;
        if !out.contains(&a) {
            out.push(a);
        }
    }

    Ok(out)
}

async fn run_async(bind_addrs: Vec<SocketAddr>, state: AppState) -> Result<()> {
    // Shared shutdown trigger for all listeners.
    let notify = Arc::new(tokio::sync::Notify::new());
    {
        let notify = notify.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            notify.notify_waiters();
        });
    }

    let mut servers = Vec::new();
    for bind in bind_addrs {
        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(l) => l,
            Err(e) => {
                // [::]:PORT may already accept IPv4 (dual-stack), making the
                // matching 0.0.0.0:PORT bind fail with AddrInUse.
                if !servers.is_empty() && e.kind() == std::io::ErrorKind::AddrInUse {
                    warn!(target: "web", bind = %bind, error = %e, "bind failed (AddrInUse), likely already covered by another listener; skipping");
                    continue;
                }
                return Err(anyhow!(e).context(format!("bind failed: {bind}")));
            }
        };

        info!(target: "web", "listening on http://{bind}/ (set {ENV_WEB_ADDR} to override)");

        let app = router::build_router(state.clone());
        let notify = notify.clone();
        servers.push(tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                notify.notified().await;
            })
            .await
        }));
    }

    if servers.is_empty() {
        return Err(anyhow!("no listeners started (check {ENV_WEB_ADDR})"));
    }

    for h in servers {
        h.await
            .map_err(|e| anyhow!("server task join failed: {e}"))?
            .map_err(|e| anyhow!(e))?;
    }

    info!(target: "web", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(target: "web", error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target: "web", "termination signal received, shutting down");
}
