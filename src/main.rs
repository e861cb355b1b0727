//! X11Panorama - Main entry point
//!
//! Builds a Xinerama desktop over in-memory screens and replays a recorded
//! request stream against it.

use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::process;

use x11panorama::protocol::ByteOrder;
use x11panorama::security::SecurityPolicy;
use x11panorama::{ScreenGeometry, Server, VERSION};

fn print_usage() {
    println!("X11Panorama v{}", VERSION);
    println!("One logical X11 screen spread across several physical screens");
    println!();
    println!("Usage: x11panorama [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -screen <WxH+X+Y>     Add a screen at a desktop position (repeatable)");
    println!("  -replay <file>        Replay raw X11 requests (LSB first), replies to stdout");
    println!("  -security <level>     Security level: permissive, default, strict");
    println!("  -h, --help            Show this help message");
    println!();
    println!("Without -screen, two 1920x1080 screens are placed side by side.");
    println!();
    println!("Examples:");
    println!("  x11panorama -screen 1920x1080+0+0 -screen 1280x1024+1920+0");
    println!("  x11panorama -replay session.bin > replies.bin");
    println!();
}

#[derive(Debug, Default)]
struct Config {
    screens: Vec<ScreenGeometry>,
    replay: Option<String>,
    security: SecurityPolicy,
}

fn default_layout() -> Vec<ScreenGeometry> {
    vec![
        ScreenGeometry {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        },
        ScreenGeometry {
            x: 1920,
            y: 0,
            width: 1920,
            height: 1080,
        },
    ]
}

fn parse_args() -> Result<Config, String> {
    let mut config = Config::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-screen" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -screen".to_string());
                }
                config.screens.push(ScreenGeometry::parse(&args[i])?);
            }
            "-replay" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -replay".to_string());
                }
                config.replay = Some(args[i].clone());
            }
            "-security" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -security".to_string());
                }
                config.security = args[i].parse()?;
            }
            arg => {
                return Err(format!("Unknown option: {}", arg));
            }
        }
        i += 1;
    }

    if config.screens.is_empty() {
        config.screens = default_layout();
    }
    Ok(config)
}

fn replay(server: &mut Server, path: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let bytes = fs::read(path).map_err(|e| format!("Cannot read {}: {}", path, e))?;
    let client = server.register_client(ByteOrder::LSBFirst);
    log::info!("Replaying {} bytes from {}", bytes.len(), path);

    let output = server.process(client, &bytes);
    io::stdout().write_all(&output)?;
    io::stdout().flush()?;

    log::info!(
        "Replay done: {} reply bytes, {} composites live",
        output.len(),
        server.table().len()
    );
    server.close_client(client);
    Ok(())
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    log::info!("X11Panorama v{}", VERSION);
    log::info!(
        "Security policy: resource_isolation={}, allow_screen_capture={}",
        config.security.resource_isolation,
        config.security.allow_screen_capture
    );

    let mut server = match Server::with_memory_screens(&config.screens, config.security) {
        Ok((server, _probes)) => server,
        Err(e) => {
            eprintln!("Error: Failed to initialize server: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = config.replay {
        if let Err(e) = replay(&mut server, &path) {
            eprintln!("Error: Replay failed: {}", e);
            process::exit(1);
        }
    }
}
