//! Converges a Proxmox VE cluster to the state described in a JSON manifest.

use clap::Parser;
use pve_converge::{Manifest, ProxmoxClient, ProxmoxResult, ReissuePolicy};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pve-converge")]
#[command(about = "Bring Proxmox VE guests and cloud templates to a declared state")]
#[command(version)]
struct Args {
    /// Manifest listing templates and VMs.
    manifest: PathBuf,

    /// Use the local `pvesh` instead of the HTTPS API.
    #[arg(long, env = "PROXMOX_LOCAL")]
    local: bool,

    #[arg(long, env = "PROXMOX_HOST", required_unless_present = "local")]
    host: Option<String>,

    #[arg(long, env = "PROXMOX_PORT", default_value_t = 8006)]
    port: u16,

    #[arg(long, env = "PROXMOX_USERNAME", required_unless_present = "local")]
    username: Option<String>,

    #[arg(long, env = "PROXMOX_PASSWORD", hide_env_values = true, required_unless_present = "local")]
    password: Option<String>,

    #[arg(long, env = "PROXMOX_REALM", default_value = "pam")]
    realm: String,

    /// Accept self-signed certificates.
    #[arg(long, env = "PROXMOX_INSECURE")]
    insecure: bool,

    /// `always` re-sends create for existing VMs, `on-drift` repairs them in place.
    #[arg(long, env = "PVE_CONVERGE_POLICY", default_value = "on-drift")]
    policy: ReissuePolicy,

    /// Log filter, overridden by RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_client(args: &Args) -> ProxmoxResult<ProxmoxClient> {
    let builder = ProxmoxClient::builder().policy(args.policy);
    if args.local {
        return builder.local(true).build();
    }

    builder
        .host(args.host.clone().unwrap_or_default())?
        .port(args.port)?
        .credentials(
            args.username.clone().unwrap_or_default(),
            args.password.clone().unwrap_or_default(),
            args.realm.clone(),
        )?
        .secure(true)
        .accept_invalid_certs(args.insecure)
        .build()
}

async fn run(args: Args) -> ProxmoxResult<bool> {
    let manifest = Manifest::load(&args.manifest).await?;
    info!(
        templates = manifest.templates.len(),
        vms = manifest.vms.len(),
        "manifest loaded"
    );

    let client = build_client(&args)?;
    client.login().await?;

    let reports = client.apply_manifest(&manifest).await?;
    let mut complete = true;
    for report in &reports {
        if report.outcome.is_incomplete() {
            warn!(vmid = %report.vmid, outcome = %report.outcome, "not converged");
            complete = false;
        }
    }
    let changed = reports.iter().filter(|r| r.changed()).count();
    info!(total = reports.len(), changed, "done");
    Ok(complete)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
