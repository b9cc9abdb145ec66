//! rndc CLI
//!
//! Sends one control command to a nameserver and prints the reply.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rndc::cli::{describe, render, with_retries};
use rndc::{Address, Algorithm, Client, ClientConfig, Credentials};
use tracing_subscriber::{fmt, EnvFilter};

/// rndc client
#[derive(Parser, Debug)]
#[command(name = "rndc")]
#[command(about = "Send control commands to a nameserver over RNDC")]
#[command(version)]
struct Args {
    /// RNDC server hostname or address, optionally with `:port`
    #[arg(short = 's', long, env = "RNDC_HOST", default_value = "127.0.0.1")]
    host: String,

    /// RNDC server port, used when the host has none
    #[arg(short, long, env = "RNDC_PORT", default_value_t = rndc::config::DEFAULT_PORT,
          value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Name of the shared key
    #[arg(short = 'y', long, env = "RNDC_KEY_NAME", default_value = "rndc-key")]
    key_name: String,

    /// TSIG algorithm (md5, sha1, sha224, sha256, sha384, sha512, optionally hmac- prefixed)
    #[arg(short, long, env = "RNDC_ALGORITHM", default_value = "hmac-sha256")]
    algorithm: Algorithm,

    /// Base64-encoded shared secret
    #[arg(long, env = "RNDC_SECRET", hide_env_values = true)]
    secret: String,

    /// Connect/read/write timeout in seconds
    #[arg(short, long, env = "RNDC_TIMEOUT", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Retries after connection failures (never after the command may have been sent)
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Delay between retries in milliseconds
    #[arg(long, default_value_t = 500)]
    retry_delay: u64,

    /// Command and arguments, joined with spaces
    #[arg(required = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let credentials = match Credentials::from_base64(&args.key_name, &args.secret, args.algorithm) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", describe(&e));
            return ExitCode::FAILURE;
        }
    };

    let config = ClientConfig::builder()
        .port(args.port)
        .timeout(Duration::from_secs(args.timeout))
        .build();
    let address = match Address::parse(&args.host, config.port) {
        Ok(address) => address,
        Err(e) => {
            eprintln!("{}", describe(&e));
            return ExitCode::FAILURE;
        }
    };
    let command = args.command.join(" ");
    let client = Client::new(config);

    let outcome = with_retries(args.retries, Duration::from_millis(args.retry_delay), || {
        client.execute(&command, &credentials, &address)
    });
    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{}", describe(&e));
            return ExitCode::FAILURE;
        }
    };

    match render(&response, &mut io::stdout().lock(), &mut io::stderr().lock()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
