//! Chrome launcher
//!
//! Spawns a Chrome process with remote debugging on a random port, connects
//! a [`CdpBrowser`] to it, runs the caller's body and tears everything down
//! again, whatever the body returned.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use crate::error::{BrowserError, Result};
use crate::session::{CdpBrowser, SessionConfig};

const DEVTOOLS_PREFIX: &str = "DevTools listening on ";

/// Builder for a throwaway Chrome process
#[derive(Debug, Clone)]
pub struct Launcher {
    binary: PathBuf,
    temp_profile: bool,
    xvfb: bool,
    startup_timeout: Duration,
    default_timeout: Duration,
}

impl Default for Launcher {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/usr/bin/google-chrome"),
            temp_profile: false,
            xvfb: false,
            startup_timeout: Duration::from_secs(30),
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl Launcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Run with a fresh profile directory, removed on teardown
    pub fn use_temp_profile(mut self) -> Self {
        self.temp_profile = true;
        self
    }

    /// Run headful inside a private Xvfb display instead of headless
    pub fn use_xvfb(mut self) -> Self {
        self.xvfb = true;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Navigation timeout given to every page of the launched browser
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Launch, run `body` against the browser, then tear down
    pub async fn run<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce(Arc<CdpBrowser>) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut xvfb = if self.xvfb {
            Some(start_xvfb(self.startup_timeout).await?)
        } else {
            None
        };

        let profile = if self.temp_profile {
            Some(tempfile::Builder::new().prefix("sitewalk-profile-").tempdir()?)
        } else {
            None
        };

        let display = xvfb.as_ref().map(|(_, display)| display.clone());
        let launched = self.start_chrome(profile.as_ref(), display.as_deref()).await;
        let mut chrome = match launched {
            Ok(chrome) => chrome,
            Err(e) => {
                stop(xvfb.as_mut().map(|(child, _)| child), "Xvfb").await;
                return Err(e);
            }
        };

        let outcome = match self.connect(&mut chrome).await {
            Ok(browser) => {
                let browser = Arc::new(browser);
                let output = body(browser.clone()).await;
                if let Err(e) = browser.close().await {
                    tracing::warn!("Failed to close CDP connection cleanly: {}", e);
                }
                Ok(output)
            }
            Err(e) => Err(e),
        };

        stop(Some(&mut chrome), "Chrome").await;
        stop(xvfb.as_mut().map(|(child, _)| child), "Xvfb").await;
        drop(profile);

        outcome
    }

    fn chrome_args(&self, profile: Option<&TempDir>) -> Vec<String> {
        let mut args = vec![
            "--remote-debugging-port=0".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if let Some(profile) = profile {
            args.push(format!("--user-data-dir={}", profile.path().display()));
        }
        if !self.xvfb {
            args.push("--headless=new".to_string());
        }
        args.push("about:blank".to_string());
        args
    }

    async fn start_chrome(&self, profile: Option<&TempDir>, display: Option<&str>) -> Result<Child> {
        let mut command = Command::new(&self.binary);
        command
            .args(self.chrome_args(profile))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(display) = display {
            command.env("DISPLAY", display);
        }

        tracing::info!("Launching {}", self.binary.display());
        command.spawn().map_err(|e| {
            BrowserError::Launch(format!("cannot start {}: {}", self.binary.display(), e))
        })
    }

    async fn connect(&self, chrome: &mut Child) -> Result<CdpBrowser> {
        let stderr = chrome
            .stderr
            .take()
            .ok_or_else(|| BrowserError::Launch("Chrome stderr not captured".to_string()))?;

        let ws_url = tokio::time::timeout(self.startup_timeout, read_devtools_url(stderr))
            .await
            .map_err(|_| {
                BrowserError::Launch(format!(
                    "no DevTools endpoint within {:?}",
                    self.startup_timeout
                ))
            })??;

        let config = SessionConfig {
            cdp_url: ws_url,
            default_timeout: self.default_timeout,
        };
        CdpBrowser::connect(&config).await
    }
}

/// Read Chrome's stderr until the DevTools line shows up, then keep draining
/// it in the background so Chrome never blocks on a full pipe.
async fn read_devtools_url(stderr: ChildStderr) -> Result<String> {
    let mut lines = BufReader::new(stderr).lines();

    while let Some(line) = lines.next_line().await? {
        if let Some(url) = parse_devtools_line(&line) {
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!(target: "chrome", "{}", line);
                }
            });
            return Ok(url);
        }
        tracing::trace!(target: "chrome", "{}", line);
    }

    Err(BrowserError::Launch(
        "Chrome exited before opening DevTools".to_string(),
    ))
}

fn parse_devtools_line(line: &str) -> Option<String> {
    let url = line.trim().strip_prefix(DEVTOOLS_PREFIX)?;
    url.starts_with("ws://").then(|| url.to_string())
}

/// `-displayfd` writes the bare display number
fn parse_display_line(line: &str) -> Option<String> {
    let number = line.trim();
    (!number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()))
        .then(|| format!(":{}", number))
}

/// Start Xvfb on a display it picks itself; returns the child and `:N`
async fn start_xvfb(startup_timeout: Duration) -> Result<(Child, String)> {
    let mut child = Command::new("Xvfb")
        .args(["-displayfd", "1", "-screen", "0", "1280x1024x24", "-nolisten", "tcp"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BrowserError::Launch(format!("cannot start Xvfb: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BrowserError::Launch("Xvfb stdout not captured".to_string()))?;
    let mut lines = BufReader::new(stdout).lines();

    let line = tokio::time::timeout(startup_timeout, lines.next_line())
        .await
        .map_err(|_| BrowserError::Launch("Xvfb did not report a display".to_string()))??
        .ok_or_else(|| BrowserError::Launch("Xvfb exited before reporting a display".to_string()))?;

    let display_name = parse_display_line(&line)
        .ok_or_else(|| BrowserError::Launch(format!("unexpected Xvfb display {:?}", line)))?;
    tracing::info!("Xvfb running on display {}", display_name);
    Ok((child, display_name))
}

async fn stop(child: Option<&mut Child>, name: &str) {
    if let Some(child) = child {
        if let Err(e) = child.kill().await {
            tracing::warn!("Failed to stop {}: {}", name, e);
        }
    }
}
