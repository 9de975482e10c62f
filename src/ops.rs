//! Typed reader operations on top of [`Reader::issue`].

use std::thread;
use std::time::Duration;

use crate::error::Error;
use crate::frame::CommandType;
use crate::session::Reader;
use crate::types::*;

fn unexpected(command: CommandType, reply: Reply) -> Error {
    Error::Protocol(format!("unexpected reply to {:?}: {:?}", command, reply))
}

pub trait ReaderOps: Reader {
    /// Issues a request that answers with a bare acknowledgement.
    fn execute(&mut self, request: Request) -> Result<(), Error> {
        let command = request.command();
        match self.issue(request)? {
            Reply::Done => Ok(()),
            other => Err(unexpected(command, other)),
        }
    }

    fn capabilities(&mut self) -> Result<ReaderCapabilities, Error> {
        match self.issue(Request::GetCapabilities)? {
            Reply::Capabilities(caps) => Ok(caps),
            other => Err(unexpected(CommandType::GetCapabilities, other)),
        }
    }

    fn tag_storage_settings(&mut self) -> Result<TagStorageSettings, Error> {
        match self.issue(Request::GetTagStorageSettings)? {
            Reply::TagStorage(settings) => Ok(settings),
            other => Err(unexpected(CommandType::GetTagStorageSettings, other)),
        }
    }

    fn set_tag_storage_settings(&mut self, settings: TagStorageSettings) -> Result<(), Error> {
        self.execute(Request::SetTagStorageSettings(settings))
    }

    fn singulation_control(&mut self, antenna: u16) -> Result<SingulationControl, Error> {
        match self.issue(Request::GetSingulationControl { antenna })? {
            Reply::Singulation(control) => Ok(control),
            other => Err(unexpected(CommandType::GetSingulationControl, other)),
        }
    }

    fn set_singulation_control(
        &mut self,
        antenna: u16,
        control: SingulationControl,
    ) -> Result<(), Error> {
        self.execute(Request::SetSingulationControl { antenna, control })
    }

    fn set_gpo(&mut self, port: u8, high: bool) -> Result<(), Error> {
        self.execute(Request::SetGpo { port, high })
    }

    fn gpi_state(&mut self, port: u8) -> Result<GpiState, Error> {
        match self.issue(Request::GetGpi { port })? {
            Reply::Gpi(state) => Ok(state),
            other => Err(unexpected(CommandType::GetGpi, other)),
        }
    }

    fn enable_gpi(&mut self, port: u8, enable: bool) -> Result<(), Error> {
        self.execute(Request::EnableGpi { port, enable })
    }

    fn antenna_config(&mut self, antenna: u16) -> Result<AntennaConfig, Error> {
        match self.issue(Request::GetAntennaConfig { antenna })? {
            Reply::Antenna(config) => Ok(config),
            other => Err(unexpected(CommandType::GetAntennaConfig, other)),
        }
    }

    fn set_antenna_config(&mut self, antenna: u16, config: AntennaConfig) -> Result<(), Error> {
        self.execute(Request::SetAntennaConfig { antenna, config })
    }

    fn rf_mode(&mut self, antenna: u16) -> Result<RfModeConfig, Error> {
        match self.issue(Request::GetRfMode { antenna })? {
            Reply::RfMode(mode) => Ok(mode),
            other => Err(unexpected(CommandType::GetRfMode, other)),
        }
    }

    fn set_rf_mode(&mut self, antenna: u16, mode: RfModeConfig) -> Result<(), Error> {
        self.execute(Request::SetRfMode { antenna, mode })
    }

    fn start_inventory(&mut self, params: InventoryParams) -> Result<(), Error> {
        self.execute(Request::StartInventory(params))
    }

    fn stop_inventory(&mut self) -> Result<(), Error> {
        self.execute(Request::StopInventory)
    }

    /// Runs an inventory for `duration`. Tags arrive as notifications.
    fn run_inventory(&mut self, params: InventoryParams, duration: Duration) -> Result<(), Error> {
        self.start_inventory(params)?;
        thread::sleep(duration);
        self.stop_inventory()
    }

    /// Returns the index the reader assigned to the filter.
    fn add_prefilter(&mut self, filter: PreFilter) -> Result<u32, Error> {
        match self.issue(Request::AddPreFilter(filter))? {
            Reply::PreFilterAdded { index } => Ok(index),
            other => Err(unexpected(CommandType::AddPreFilter, other)),
        }
    }

    fn remove_prefilter(&mut self, index: Option<u32>) -> Result<(), Error> {
        self.execute(Request::RemovePreFilter { index })
    }

    fn read_tag(&mut self, target: AccessTarget, params: ReadParams) -> Result<Vec<TagData>, Error> {
        match self.issue(Request::ReadTag { target, params })? {
            Reply::Tags(tags) => Ok(tags),
            other => Err(unexpected(CommandType::ReadTag, other)),
        }
    }

    fn write_tag(&mut self, target: AccessTarget, params: WriteParams) -> Result<(), Error> {
        self.execute(Request::WriteTag { target, params })
    }

    fn lock_tag(&mut self, target: AccessTarget, params: LockParams) -> Result<(), Error> {
        self.execute(Request::LockTag { target, params })
    }

    fn kill_tag(&mut self, target: AccessTarget, params: KillParams) -> Result<(), Error> {
        self.execute(Request::KillTag { target, params })
    }
}

impl<R: Reader + ?Sized> ReaderOps for R {}
