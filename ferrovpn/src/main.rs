//! ferrovpn command-line entry point.
//!
//! ```bash
//! ferrovpn --host 203.0.113.7 --user root --vpn-user alice
//! ```
//!
//! The CA passphrase is read from `FERROVPN_PASSPHRASE` or prompted for.
//! Set `RUST_LOG=debug` to see which prompts were answered.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;

use ferrovpn::provision::{self, DEFAULT_CA_NAME, DEFAULT_IMAGE, DEFAULT_VOLUME, DEFAULT_VPN_PORT};
use ferrovpn::{
    Console, DriverBuilder, GenericDriver, HostKeyVerification, LocalTransport, ProvisionConfig,
    Provisioner,
};

/// Provision an OpenVPN server over SSH and export one client profile.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server to provision; also the endpoint written into the profile.
    #[arg(long)]
    host: String,

    /// SSH port.
    #[arg(long, default_value_t = 22)]
    port: u16,

    /// SSH user name.
    #[arg(long, required_unless_present_any = ["local", "dry_run"])]
    user: Option<String>,

    /// Private key file (default: ~/.ssh/id_rsa).
    #[arg(long = "pk")]
    private_key: Option<PathBuf>,

    /// Passphrase of an encrypted private key.
    #[arg(long, env = "FERROVPN_KEY_PASSPHRASE", hide_env_values = true)]
    key_passphrase: Option<String>,

    /// VPN client name; the profile is written to <name>.ovpn.
    #[arg(long = "vpn-user")]
    vpn_user: String,

    /// CA passphrase (prompted for when absent).
    #[arg(long, env = "FERROVPN_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Certificate authority common name.
    #[arg(long, default_value = DEFAULT_CA_NAME)]
    ca_name: String,

    /// OpenVPN Docker image.
    #[arg(long, default_value = DEFAULT_IMAGE)]
    image: String,

    /// Docker volume for the server state.
    #[arg(long, default_value = DEFAULT_VOLUME)]
    volume: String,

    /// Public UDP port of the VPN server.
    #[arg(long, default_value_t = DEFAULT_VPN_PORT)]
    vpn_port: u16,

    /// Directory for the client profile.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// SSH connect timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Abort an interactive step after this many seconds (default: wait forever).
    #[arg(long)]
    interactive_timeout: Option<u64>,

    /// Host key checking: strict, accept-new or disabled.
    #[arg(long, default_value = "accept-new")]
    host_key: HostKeyVerification,

    /// known_hosts file to check and update.
    #[arg(long)]
    known_hosts: Option<PathBuf>,

    /// Do not echo remote output.
    #[arg(long, short)]
    quiet: bool,

    /// Run the steps on this machine instead of over SSH.
    #[arg(long)]
    local: bool,

    /// Print the steps without running anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let passphrase = match (&args.passphrase, args.dry_run) {
        (Some(passphrase), _) => passphrase.clone(),
        (None, true) => "********".to_string(),
        (None, false) => read_passphrase()?,
    };

    let config = ProvisionConfig::new(&args.host, &args.vpn_user, SecretString::from(passphrase))
        .with_ca_name(&args.ca_name)
        .with_image(&args.image)
        .with_volume(&args.volume)
        .with_vpn_port(args.vpn_port)
        .with_output_dir(&args.output_dir);
    config.validate()?;

    if args.dry_run {
        for (i, step) in provision::plan(&config)?.iter().enumerate() {
            println!("{:>2}. {}", i + 1, step);
        }
        println!("    profile -> {}", config.profile_path().display());
        return Ok(());
    }

    let console = if args.quiet {
        Console::Quiet
    } else {
        Console::Terminal
    };
    let interactive_timeout = args.interactive_timeout.map(Duration::from_secs);

    let profile = if args.local {
        let driver = GenericDriver::new(LocalTransport::new())
            .with_console(console)
            .with_interactive_timeout(interactive_timeout);
        Provisioner::new(&driver).run(&config).await?
    } else {
        let user = args.user.clone().context("--user is required")?;
        let key = args
            .private_key
            .clone()
            .or_else(default_key_path)
            .context("no --pk given and no home directory to find ~/.ssh/id_rsa")?;

        let mut builder = DriverBuilder::new(&args.host)
            .port(args.port)
            .username(&user)
            .timeout(Duration::from_secs(args.timeout))
            .host_key_verification(args.host_key.clone())
            .console(console)
            .interactive_timeout(interactive_timeout);
        builder = match &args.key_passphrase {
            Some(passphrase) => {
                builder.private_key_with_passphrase(key, SecretString::from(passphrase.clone()))
            }
            None => builder.private_key(key),
        };
        if let Some(path) = &args.known_hosts {
            builder = builder.known_hosts_path(path);
        }

        let driver = builder
            .connect()
            .await
            .with_context(|| format!("connecting to {}@{}:{}", user, args.host, args.port))?;

        let provisioned = Provisioner::new(&driver).run(&config).await;
        if let Err(e) = driver.close().await {
            log::warn!("disconnect failed: {}", e);
        }
        provisioned?
    };

    println!("Client profile written to {}", profile.display());
    Ok(())
}

fn default_key_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("id_rsa"))
}

fn read_passphrase() -> Result<String> {
    let passphrase = dialoguer::Password::new()
        .with_prompt("Enter pass phrase")
        .interact()
        .context("reading pass phrase")?;
    Ok(passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from([
            "ferrovpn", "--host", "vpn.example.net", "--user", "root", "--vpn-user", "alice",
        ])
        .unwrap();

        assert_eq!(args.port, 22);
        assert_eq!(args.vpn_port, DEFAULT_VPN_PORT);
        assert_eq!(args.host_key, HostKeyVerification::AcceptNew);
        assert!(args.interactive_timeout.is_none());
        assert!(!args.local && !args.dry_run);
    }

    #[test]
    fn test_user_required_for_ssh() {
        let result = Args::try_parse_from(["ferrovpn", "--host", "h", "--vpn-user", "alice"]);
        assert!(result.is_err());

        let args =
            Args::try_parse_from(["ferrovpn", "--host", "h", "--vpn-user", "alice", "--dry-run"])
                .unwrap();
        assert!(args.dry_run);
    }

    #[test]
    fn test_host_key_mode_flag() {
        let args = Args::try_parse_from([
            "ferrovpn", "--host", "h", "--user", "u", "--vpn-user", "a", "--host-key", "strict",
        ])
        .unwrap();
        assert_eq!(args.host_key, HostKeyVerification::Strict);
    }
}
