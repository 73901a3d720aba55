//! Server management - spawning and health checking the app under test

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to a running server process
pub struct ServerHandle {
    child: Child,
    base_url: String,
}

impl ServerHandle {
    /// Spawn the app server and wait until it answers
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        info!("Spawning app server: {} {}", config.program, config.args.join(" "));

        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn {}: {}", config.program, e))
        })?;

        let mut handle = ServerHandle {
            child,
            base_url: config.base_url.clone(),
        };

        if let Err(e) = handle.wait_for_healthy(&config).await {
            handle.stop().await?;
            return Err(e);
        }

        info!("Server is healthy at {}", handle.base_url);
        Ok(handle)
    }

    /// Wait for the server to respond to health checks
    async fn wait_for_healthy(&mut self, config: &ServerConfig) -> E2eResult<()> {
        let health_url = config.health_url();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < config.startup_timeout {
            attempts += 1;

            if let Some(status) = self.child.try_wait()? {
                return Err(E2eError::ServerStartup(format!("server exited early with {status}")));
            }

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    // Connection refused is expected while server is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(250)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server: SIGTERM, a short grace period, then kill
    pub async fn stop(&mut self) -> E2eResult<()> {
        let Some(id) = self.child.id() else {
            return Ok(());
        };
        info!("Stopping server (pid: {})", id);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(id as i32);
            if kill(pid, Signal::SIGTERM).is_ok()
                && tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await.is_ok()
            {
                return Ok(());
            }
        }

        // Force kill if still running
        let _ = self.child.kill().await;
        Ok(())
    }
}

/// Configuration for spawning a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,

    /// URL the browser will use
    pub base_url: String,

    /// Path probed until it answers 2xx
    pub health_path: String,

    pub startup_timeout: Duration,
}

impl ServerConfig {
    pub fn health_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.health_path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(program: &str) -> ServerConfig {
        ServerConfig {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
            base_url: "http://127.0.0.1:9/".to_string(),
            health_path: "/health".to_string(),
            startup_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_health_url_joins_cleanly() {
        assert_eq!(config("true").health_url(), "http://127.0.0.1:9/health");
    }

    #[tokio::test]
    async fn test_missing_program_fails_startup() {
        let err = ServerHandle::spawn(config("soundcheck-no-such-binary")).await.err().unwrap();
        assert!(matches!(err, E2eError::ServerStartup(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_fails_startup() {
        let err = ServerHandle::spawn(config("true")).await.err().unwrap();
        assert!(matches!(err, E2eError::ServerStartup(_) | E2eError::ServerHealthCheck(_)));
    }
}
