//! netreplay - Sandboxed HTTP Replay CLI
//!
//! Rebuilds the network a recorded browsing session saw inside a fresh
//! network namespace, then runs a command (default: an interactive shell)
//! in it. Recorded hostnames resolve, recorded origins accept connections,
//! and every response comes from the local record corpus.
//!
//! ## Usage
//!
//! ```sh
//! netreplay [--single-server] <directory> [command...]
//! ```
//!
//! Without `--single-server`, every unique recorded origin gets its own
//! interface and replay server (sharded mode). With it, one placeholder
//! address serves every origin, disambiguated by port and DNS override.
//!
//! The process must start with effective uid 0 (setuid root or sudo):
//! namespace and interface setup need it. The corpus is read with the
//! invoking user's identity, and the supervised command runs fully
//! unprivileged with the invoking user's environment restored.

use std::env;
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use netreplay::constants::{DEFAULT_SHELL, EXIT_SETUP_FAILURE, SHELL_PREFIX};
use netreplay::error::{Error, Result};
use netreplay::{dns, netns, privilege, server};
use netreplay::{DnsOverride, PrivilegeGuard, Supervisor, Topology, TopologyMode};

// =============================================================================
// CLI Parsing
// =============================================================================

/// Resolved invocation.
#[derive(Debug, PartialEq, Eq)]
struct Options {
    /// Single-server mode; absent flag means sharded.
    single_server: bool,
    /// Corpus directory, normalized with a trailing separator.
    directory: String,
    /// Command argv tail; empty means the invoking user's shell.
    command: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let program = args.first().map_or("netreplay", String::as_str);
    let usage = || {
        Error::Usage(format!(
            "Usage: {program} [--single-server] directory [command...]"
        ))
    };

    let mut rest = &args[1..];
    let mut single_server = false;
    if rest.first().map(String::as_str) == Some("--single-server") {
        single_server = true;
        rest = &rest[1..];
    }

    let Some(directory) = rest.first() else {
        return Err(usage());
    };
    if directory.is_empty() {
        return Err(Error::Usage(format!(
            "{program}: directory name must be non-empty"
        )));
    }

    // Trailing separator so record file names can be appended directly.
    let mut directory = directory.clone();
    if !directory.ends_with('/') {
        directory.push('/');
    }

    Ok(Options {
        single_server,
        directory,
        command: rest[1..].to_vec(),
    })
}

// =============================================================================
// Orchestration
// =============================================================================

fn run(environment: &[(OsString, OsString)]) -> Result<i32> {
    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;
    let mode = if options.single_server {
        TopologyMode::Single
    } else {
        TopologyMode::Sharded
    };

    privilege::assert_root("netreplay")?;

    // Resolve the working directory once; the replay servers get this
    // exact path in their configs.
    let working_dir = env::current_dir()?;
    env::set_current_dir(&working_dir)?;

    // Isolation must precede every spawn: children inherit the namespace
    // at fork time.
    netns::enter_network_namespace()?;
    netns::bring_up_loopback()?;

    // The only phase that touches untrusted data, and the only phase with
    // lowered privilege.
    let corpus_dir = PathBuf::from(&options.directory);
    let topology = {
        let _guard = PrivilegeGuard::lower()?;
        Topology::scan(&corpus_dir)?
    };
    info!(
        records = topology.record_count(),
        ips = topology.unique_ips.len(),
        endpoints = topology.unique_endpoints.len(),
        "scanned record corpus"
    );

    match mode {
        TopologyMode::Single => info!("running in single-server mode"),
        TopologyMode::Sharded => info!("running in sharded mode"),
    }

    netns::create_interfaces(&netns::origin_interface_plan(mode, &topology))?;

    let fleet = server::build_fleet(mode, &topology, &corpus_dir, &working_dir)?;
    let dns_override = DnsOverride::write(mode, &topology)?;

    let nameservers = dns::nameservers()?;
    netns::create_interfaces(&netns::nameserver_interface_plan(&nameservers))?;

    let mut supervisor = Supervisor::new();
    supervisor.register(dns_override.command(), "dnsmasq")?;
    for (index, replay_server) in fleet.iter().enumerate() {
        supervisor.register(replay_server.command(), &format!("replay-server-{index}"))?;
    }
    supervisor.register_primary(user_command(&options, environment), "command")?;

    let status = supervisor.run()?;
    // fleet and dns_override drop here, removing their artifacts only
    // after every child has been reaped.
    drop(fleet);
    drop(dns_override);
    Ok(status)
}

/// Builds the supervised user command: restored environment, prompt
/// prefix, permanent privilege drop between fork and exec.
fn user_command(options: &Options, environment: &[(OsString, OsString)]) -> Command {
    let argv: Vec<OsString> = if options.command.is_empty() {
        let shell = environment
            .iter()
            .find(|(key, _)| key.to_str() == Some("SHELL"))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| OsString::from(DEFAULT_SHELL));
        vec![shell]
    } else {
        options.command.iter().map(OsString::from).collect()
    };

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);

    // Setup children ran with a cleared environment; only the user's
    // command gets the captured one back.
    cmd.env_clear();
    for (key, value) in environment {
        cmd.env(key, value);
    }
    if let Some((_, ps1)) = environment
        .iter()
        .find(|(key, _)| key.to_str() == Some("PS1"))
    {
        let mut prefixed = OsString::from(SHELL_PREFIX);
        prefixed.push(ps1);
        cmd.env("PS1", prefixed);
    }

    // SAFETY: drop_permanently only makes async-signal-safe calls, so it
    // may run between fork and exec.
    unsafe {
        cmd.pre_exec(privilege::drop_permanently);
    }
    cmd
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() -> ExitCode {
    // Captured before anything else runs; setup children never see it.
    let environment: Vec<(OsString, OsString)> = env::vars_os().collect();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("netreplay: failed to set tracing subscriber");
        return ExitCode::from(EXIT_SETUP_FAILURE);
    }

    match run(&environment) {
        Ok(status) => ExitCode::from((status & 0xff) as u8),
        Err(Error::Usage(message)) => {
            eprintln!("{message}");
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
        Err(err) => {
            eprintln!("netreplay: {err}");
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_sharded_with_command() {
        let options = parse_args(&args(&["netreplay", "corpus", "curl", "example.com"])).unwrap();
        assert_eq!(
            options,
            Options {
                single_server: false,
                directory: "corpus/".to_string(),
                command: vec!["curl".to_string(), "example.com".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_single_server_flag() {
        let options = parse_args(&args(&["netreplay", "--single-server", "corpus/"])).unwrap();
        assert!(options.single_server);
        assert_eq!(options.directory, "corpus/");
        assert!(options.command.is_empty());
    }

    #[test]
    fn test_missing_directory_is_usage_error() {
        let err = parse_args(&args(&["netreplay"])).unwrap_err();
        assert!(err.to_string().starts_with("Usage:"));

        let err = parse_args(&args(&["netreplay", "--single-server"])).unwrap_err();
        assert!(err.to_string().starts_with("Usage:"));
    }

    #[test]
    fn test_empty_directory_rejected() {
        let err = parse_args(&args(&["netreplay", ""])).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }
}
