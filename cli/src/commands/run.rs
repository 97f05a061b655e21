// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Foreground sync session
//!
//! `mirror run` resolves the target container, starts one session and maps its
//! outcome onto the process exit code:
//!
//! - engine exited: the engine's own exit code
//! - fatal transport error: 1
//! - setup failure: reported as an error

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use tracing::{info, warn};

use mirror_core::application::mirror::{Mirror, MirrorOptions};
use mirror_core::domain::container::{
    ContainerId, ContainerRef, NodeName, RemoteContainer, RemoteContainerResolver,
};
use mirror_core::domain::mirror_config::MirrorConfigManifest;
use mirror_core::domain::session::MirrorError;
use mirror_core::infrastructure::container_resolver::StaticContainerResolver;
use mirror_core::infrastructure::radar_instance::RadarInstance;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Local directory to sync
    #[arg(value_name = "LOCAL")]
    pub local: PathBuf,

    /// Absolute directory inside the container
    #[arg(value_name = "REMOTE")]
    pub remote: String,

    /// Restart the container's main process after files are sent
    #[arg(long)]
    pub reload: bool,

    /// Pod to sync into
    #[arg(short, long, required_unless_present = "container_id")]
    pub pod: Option<String>,

    /// Container within the pod (default: first listed for the pod)
    #[arg(long)]
    pub container: Option<String>,

    /// Namespace of the pod
    #[arg(short, long, default_value = "default")]
    pub namespace: String,

    /// Target a container by id, bypassing the container table
    #[arg(long, requires = "node")]
    pub container_id: Option<String>,

    /// Node the container runs on (with --container-id)
    #[arg(long, requires = "container_id")]
    pub node: Option<String>,
}

pub async fn execute(args: RunArgs, config_override: Option<PathBuf>) -> Result<i32> {
    let config = MirrorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let local = validate_paths(&args.local, &args.remote)?;
    let container = target(&args, &config).await?;

    println!(
        "{} {} → {}:{}",
        "Mirroring".bold(),
        local.display(),
        container,
        args.remote
    );
    for (key, value) in container.fields() {
        println!("  {}: {}", key, value.dimmed());
    }

    let radar = Arc::new(RadarInstance::new(config.spec.radar.clone()));
    let options = MirrorOptions::new(local.to_string_lossy(), args.remote.clone())
        .reload(args.reload)
        .engine(config.spec.engine.clone())
        .session(&config.spec.session)
        .context("Invalid reload trigger pattern")?;

    let mirror = Mirror::new(
        Arc::new(container),
        radar.clone(),
        radar.transport_errors(),
        options,
    );

    let result = tokio::select! {
        result = mirror.run() => result,
        _ = interrupted(tokio::signal::ctrl_c()) => {
            // Dropping the session kills the engine.
            warn!("interrupted, stopping sync engine");
            return Ok(130);
        }
    };

    match result {
        Ok(status) => {
            let code = exit_code(status);
            info!(code, "mirror finished");
            Ok(code)
        }
        Err(MirrorError::FatalTransport(e)) => {
            eprintln!(
                "{}",
                format!("✗ Lost connection to remote mirror: {}", e).red()
            );
            Ok(1)
        }
        Err(e) => Err(e).context("Mirror session failed"),
    }
}

/// Resolves once the user interrupts. When the signal can't be watched the
/// session keeps running instead of being torn down.
pub async fn interrupted<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!(error = %e, "couldn't listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Check both sides of the sync and return the absolute local path.
pub fn validate_paths(local: &Path, remote: &str) -> Result<PathBuf> {
    if !local.is_dir() {
        anyhow::bail!("local path {} is not a directory", local.display());
    }
    if !remote.starts_with('/') {
        anyhow::bail!("remote path '{}' must be absolute", remote);
    }

    local
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", local.display()))
}

/// Resolve the container named on the command line.
pub async fn target(args: &RunArgs, config: &MirrorConfigManifest) -> Result<RemoteContainer> {
    if let (Some(id), Some(node)) = (&args.container_id, &args.node) {
        return Ok(RemoteContainer {
            id: ContainerId::new(id.clone()),
            node_name: NodeName::new(node.clone()),
            pod_name: args.pod.clone().unwrap_or_default(),
            container_name: args.container.clone().unwrap_or_default(),
            namespace: args.namespace.clone(),
        });
    }

    let pod = args
        .pod
        .clone()
        .context("--pod is required unless --container-id is given")?;
    let mut reference = ContainerRef::new(pod).with_namespace(args.namespace.clone());
    if let Some(container) = &args.container {
        reference = reference.with_container(container.clone());
    }

    let resolver = StaticContainerResolver::new(config.spec.containers.clone());
    resolver
        .resolve(&reference)
        .await
        .with_context(|| format!("Failed to resolve container {}", reference))
}

/// Engine exit code, or `128 + signal` when it was killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::domain::mirror_config::ContainerEntry;

    fn args(pod: Option<&str>) -> RunArgs {
        RunArgs {
            local: PathBuf::from("."),
            remote: "/srv/app".to_string(),
            reload: false,
            pod: pod.map(str::to_string),
            container: None,
            namespace: "default".to_string(),
            container_id: None,
            node: None,
        }
    }

    #[test]
    fn test_validate_paths() {
        let dir = tempfile::tempdir().unwrap();

        let local = validate_paths(dir.path(), "/srv/app").unwrap();
        assert!(local.is_absolute());

        let err = validate_paths(dir.path(), "srv/app").unwrap_err();
        assert!(err.to_string().contains("must be absolute"));

        let missing = dir.path().join("missing");
        assert!(validate_paths(&missing, "/srv/app").is_err());
    }

    #[tokio::test]
    async fn test_target_from_container_table() {
        let mut config = MirrorConfigManifest::default();
        config.spec.containers.push(ContainerEntry {
            pod: "web-7d9f".to_string(),
            container: "app".to_string(),
            namespace: "default".to_string(),
            node: "node-1".to_string(),
            id: "c0ffee".to_string(),
        });

        let container = target(&args(Some("web-7d9f")), &config).await.unwrap();
        assert_eq!(container.id.as_str(), "c0ffee");
        assert_eq!(container.node_name.as_str(), "node-1");

        let err = target(&args(Some("api")), &config).await.unwrap_err();
        assert!(err.to_string().contains("default/api"));
    }

    #[tokio::test]
    async fn test_target_by_explicit_id() {
        let mut args = args(None);
        args.container_id = Some("deadbeef".to_string());
        args.node = Some("node-7".to_string());

        let container = target(&args, &MirrorConfigManifest::default())
            .await
            .unwrap();
        assert_eq!(container.id.as_str(), "deadbeef");
        assert_eq!(container.node_name.as_str(), "node-7");
    }

    #[tokio::test]
    async fn test_interrupted_ignores_signal_setup_failure() {
        let failed = interrupted(async { Err(io::Error::other("no signal driver")) });
        let waited = tokio::time::timeout(std::time::Duration::from_millis(50), failed).await;
        assert!(waited.is_err());

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            interrupted(async { Ok(()) }),
        )
        .await
        .expect("a delivered interrupt resolves");
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    }
}
