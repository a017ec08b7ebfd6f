//! busproxy - Command-line front end for busproxy-core.
//!
//! Drives a single proxy against the system or session bus and prints every
//! result as JSON on stdout. Logs go to stderr.

mod typed;

use anyhow::Result;
use busproxy_core::{
    BusType, CallFlag, CallFlags, ConnectionSource, ProxyError, ProxyHandle, ServiceEndpoint,
    SetupMode, Value, ZbusTransport,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use typed::PropertyType;

#[derive(Parser, Debug)]
#[command(name = "busproxy")]
#[command(about = "Call methods and access properties of a D-Bus service")]
struct Args {
    /// Use the system bus instead of the session bus
    #[arg(long)]
    system: bool,

    /// Destination bus name
    #[arg(long)]
    dest: String,

    /// Object path
    #[arg(long, default_value = "/")]
    path: String,

    /// Interface of the object (defaults to the destination name)
    #[arg(long)]
    interface: Option<String>,

    /// Allow the service to ask for interactive authorization
    #[arg(long)]
    interactive_auth: bool,

    /// Do not auto-start the service
    #[arg(long)]
    no_auto_start: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the service is alive
    Ping,
    /// Read the service's version property
    Version,
    /// Check whether the object exists
    Exists,
    /// Read a property
    Get { property: String },
    /// Write a property
    Set {
        property: String,
        value: String,
        #[arg(long = "type", value_enum, default_value = "string")]
        kind: PropertyType,
    },
    /// Call a method
    Call {
        method: String,
        /// Method argument as type:value (repeatable)
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Do not wait for a reply
        #[arg(long)]
        no_reply: bool,
    },
}

impl Args {
    fn call_flags(&self) -> CallFlags {
        let mut flags = CallFlags::empty();
        if self.interactive_auth {
            flags |= CallFlag::AllowInteractiveAuth;
        }
        if self.no_auto_start {
            flags |= CallFlag::NoAutoStart;
        }
        flags
    }
}

fn init_logging(args: &Args) {
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_ascii_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn run(args: &Args) -> Result<serde_json::Value> {
    let bus = if args.system {
        BusType::System
    } else {
        BusType::Session
    };
    let interface = args.interface.clone().unwrap_or_else(|| args.dest.clone());
    let endpoint = ServiceEndpoint::new(&args.dest, interface, &args.path);

    let mut proxy = ProxyHandle::new(
        ConnectionSource::owned(ZbusTransport::new(bus)),
        endpoint,
        SetupMode::Immediate,
    )?;
    proxy.set_call_flags(args.call_flags());

    let output = match &args.command {
        Command::Ping => {
            proxy.ping()?;
            json!({ "bus_name": proxy.bus_name(), "alive": true })
        }
        Command::Version => json!({ "version": proxy.get_service_version()? }),
        Command::Exists => json!({ "exists": proxy.check_object_exists()? }),
        Command::Get { property } => {
            json!({ "property": property, "value": proxy.get_property(property)? })
        }
        Command::Set {
            property,
            value,
            kind,
        } => {
            let value = typed::parse_property(*kind, value)?;
            proxy.set_property(property, value.clone())?;
            json!({ "property": property, "value": value })
        }
        Command::Call {
            method,
            args: raw_args,
            no_reply,
        } => {
            let call_args = raw_args
                .iter()
                .map(|arg| typed::parse_argument(arg))
                .collect::<Result<Vec<Value>>>()?;
            if *no_reply {
                proxy.call_no_reply(method, &call_args)?;
                json!({ "method": method, "reply": null })
            } else {
                json!({ "method": method, "reply": proxy.call(method, &call_args)? })
            }
        }
    };
    Ok(output)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    match run(&args) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            if let Some(detail) = err.downcast_ref::<ProxyError>().and_then(ProxyError::debug_detail) {
                debug!("Bus error detail: {}", detail);
            }
            Err(err)
        }
    }
}
