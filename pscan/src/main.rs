use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use port_scan::{ScanOptions, ScanResult};
use pscan_core::HostsList;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod config;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "pscan", version, about = "TCP port scanner over a persisted host list")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./pscan.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// File with the list of hosts to scan
    #[arg(short = 'f', long, global = true, env = "PSCAN_HOSTS_FILE")]
    hosts_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Manage the hosts list
    Hosts {
        #[command(subcommand)]
        cmd: HostsCmd,
    },
    /// Run a TCP port scan on every host in the list
    Scan {
        /// Ports: comma/range list (e.g., 22,80,443 or 1-1024,8080). Default: 22,80,443.
        #[arg(short, long)]
        ports: Option<String>,
        /// Timeout per port in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Max concurrent connection attempts per host
        #[arg(long)]
        concurrency: Option<usize>,
        /// Output format: text or json
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
}

#[derive(Debug, Subcommand)]
enum HostsCmd {
    /// Add host[s] to the list
    #[command(alias = "a")]
    Add {
        #[arg(required = true)]
        hosts: Vec<String>,
    },
    /// Delete host[s] from the list
    #[command(alias = "d")]
    Delete {
        #[arg(required = true)]
        hosts: Vec<String>,
    },
    /// List all hosts
    #[command(alias = "l")]
    List,
}

// A failed add/delete aborts the batch before save, so the file on disk
// reflects either the whole batch or none of it.
fn add_action(out: &mut impl Write, hosts_file: &Path, hosts: &[String]) -> Result<()> {
    let mut hl = HostsList::new();
    hl.load(hosts_file)?;
    for h in hosts {
        hl.add(h)?;
        writeln!(out, "Added host: {}", h)?;
    }
    hl.save(hosts_file)?;
    Ok(())
}

fn delete_action(out: &mut impl Write, hosts_file: &Path, hosts: &[String]) -> Result<()> {
    let mut hl = HostsList::new();
    hl.load(hosts_file)?;
    for h in hosts {
        hl.remove(h)?;
        writeln!(out, "Deleted host: {}", h)?;
    }
    hl.save(hosts_file)?;
    Ok(())
}

fn list_action(out: &mut impl Write, hosts_file: &Path) -> Result<()> {
    let mut hl = HostsList::new();
    hl.load(hosts_file)?;
    for h in hl.hosts() {
        writeln!(out, "{}", h)?;
    }
    Ok(())
}

async fn scan_action(
    out: &mut impl Write,
    hosts_file: &Path,
    ports: &[u16],
    opts: &ScanOptions,
    format: OutputFormat,
) -> Result<()> {
    let mut hl = HostsList::new();
    hl.load(hosts_file)?;
    let results = port_scan::run(&hl, ports, opts).await;
    print_results(out, &results, format)
}

fn print_results(out: &mut impl Write, results: &[ScanResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(results)?)?,
        OutputFormat::Text => {
            for r in results {
                writeln!(out, "{}", r.host)?;
                if r.not_found {
                    writeln!(out, "Host not found")?;
                }
                for p in &r.port_states {
                    writeln!(out, "\t{}: {}", p.port, p.label())?;
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref());

    // Hosts file resolution: flag/env, then config file, then the default.
    let hosts_file = cli
        .hosts_file
        .clone()
        .or_else(|| cfg.as_ref().and_then(|c| c.hosts_file.clone()))
        .unwrap_or_else(|| PathBuf::from("pscan.hosts"));

    let mut out = std::io::stdout();

    match cli.command {
        Commands::Version => {
            println!("pscan {} (core {})", env!("CARGO_PKG_VERSION"), pscan_core::version());
        }
        Commands::Hosts { cmd } => match cmd {
            HostsCmd::Add { hosts } => add_action(&mut out, &hosts_file, &hosts)?,
            HostsCmd::Delete { hosts } => delete_action(&mut out, &hosts_file, &hosts)?,
            HostsCmd::List => list_action(&mut out, &hosts_file)?,
        },
        Commands::Scan { mut ports, mut timeout_ms, mut concurrency, mut format } => {
            if let Some(cfg) = &cfg {
                if let Some(s) = &cfg.scan {
                    if ports.is_none() { ports = s.ports.clone(); }
                    if timeout_ms.is_none() { timeout_ms = s.timeout_ms; }
                    if concurrency.is_none() { concurrency = s.concurrency; }
                    if format.is_none() {
                        format = s.format.as_deref().map(|f| match f {
                            "json" => OutputFormat::Json,
                            _ => OutputFormat::Text,
                        });
                    }
                }
            }
            let ports_vec = match ports {
                Some(spec) => port_scan::parse_ports(&spec)?,
                None => port_scan::default_ports(),
            };
            let mut opts = ScanOptions::default();
            if let Some(ms) = timeout_ms {
                opts.timeout = Duration::from_millis(ms);
            }
            if let Some(c) = concurrency {
                opts.port_concurrency = c;
            }
            scan_action(&mut out, &hosts_file, &ports_vec, &opts, format.unwrap_or(OutputFormat::Text)).await?;
        }
    }
    Ok(())
}
