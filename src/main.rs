use std::io;

use clap::error::ErrorKind;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use rfid_console::{Config, Console, Error, EventDelivery, Reader, ReaderOps, Session};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(config: &Config) -> Result<(), Error> {
    let mut session = Session::connect(&config.host, config.port)?;

    match session.tag_storage_settings() {
        Ok(mut settings) => {
            settings.discard_tags_on_inventory_stop = config.discard_tags_on_inventory_stop;
            if let Err(e) = session.set_tag_storage_settings(settings) {
                warn!(error = %e, "could not update tag storage settings");
            }
        }
        Err(e) => warn!(error = %e, "could not read tag storage settings"),
    }

    let mut events = EventDelivery::new();
    events.start(session.event_queue(), config.delivery, |notification| {
        println!("\n{}", notification)
    })?;

    let stdin = io::stdin();
    Console::new(session, events, config, stdin.lock(), io::stdout()).run()
}

fn main() {
    init_tracing();

    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => {
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {}
                _ => println!("\nEnter either 0 or 2 arguments (HOST PORT)"),
            }
            let _ = e.print();
            return;
        }
    };

    if let Err(e) = run(&config) {
        error!(error = %e, "console exited with an error");
        println!("\n{}", e);
    }
}
