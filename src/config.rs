//! Process arguments and the per-session state that the menus share.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;

use crate::error::Error;
use crate::events::DeliveryMode;
use crate::ops::ReaderOps;
use crate::session::Reader;
use crate::types::{ReaderCapabilities, SingulationControl};

pub const DEFAULT_HOST: &str = "localhost";

/// How long the simple and periodic inventories run before being stopped.
pub const DEFAULT_INVENTORY_DURATION: Duration = Duration::from_secs(5);

/// Interactive console for network-attached RFID readers
#[derive(Parser, Debug, Clone)]
#[command(name = "rfid-console", version, about, long_about = None)]
#[command(override_usage = "rfid-console [OPTIONS] [HOST PORT]")]
pub struct Args {
    /// Reader host name or address
    #[arg(requires = "port")]
    pub host: Option<String>,

    /// Reader port; 0 selects the reader's default port
    pub port: Option<u16>,

    /// How reader notifications are delivered to the console
    #[arg(long, value_enum, env = "RFID_EVENT_MODE", default_value = "callback")]
    pub event_mode: DeliveryMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub delivery: DeliveryMode,
    /// Applied to the reader's tag storage before the menus open.
    pub discard_tags_on_inventory_stop: bool,
    pub inventory_duration: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            delivery: DeliveryMode::default(),
            discard_tags_on_inventory_stop: true,
            inventory_duration: DEFAULT_INVENTORY_DURATION,
        }
    }
}

impl Config {
    /// Parses the full argument list, program name included.
    pub fn from_args<I, T>(args: I) -> Result<Config, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Args::try_parse_from(args).map(Config::from)
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Config {
        let mut config = Config {
            delivery: args.event_mode,
            ..Config::default()
        };
        if let (Some(host), Some(port)) = (args.host, args.port) {
            config.host = host;
            config.port = port;
        }
        config
    }
}

/// Antenna identifiers reported by the reader, fetched on first use.
#[derive(Debug, Default)]
pub struct AntennaInfo {
    list: Option<Vec<u16>>,
}

impl AntennaInfo {
    pub fn is_allocated(&self) -> bool {
        self.list.is_some()
    }

    /// Fills the list from capabilities that were already fetched.
    pub fn populate(&mut self, caps: &ReaderCapabilities) {
        if self.list.is_none() {
            self.list = Some((1..=caps.antenna_count).collect());
        }
    }

    pub fn get_or_query<R: Reader + ?Sized>(&mut self, reader: &mut R) -> Result<&[u16], Error> {
        if self.list.is_none() {
            let caps = reader.capabilities()?;
            self.populate(&caps);
        }
        Ok(self.list.as_deref().unwrap_or_default())
    }

    /// Frees the list. Returns `false` if there was nothing to free.
    pub fn release(&mut self) -> bool {
        self.list.take().is_some()
    }
}

/// Reader state the menus keep between selections.
#[derive(Debug, Default)]
pub struct SessionState {
    pub antennas: AntennaInfo,
    pub singulation: Option<SingulationControl>,
    /// Indices of the pre-filters added through the console.
    pub prefilters: Vec<u32>,
}
