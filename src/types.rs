//! Records exchanged with the reader service.
//!
//! These travel as bincode payloads inside [`Frame`](crate::frame::Frame)s.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::CommandType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderCapabilities {
    pub reader_id: String,
    pub model: String,
    pub firmware_version: String,
    pub antenna_count: u16,
    pub gpi_count: u8,
    pub gpo_count: u8,
    pub max_prefilters: u8,
    pub rf_mode_count: u16,
    /// Transmit power table in hundredths of dBm, indexed by power index.
    pub transmit_power_levels: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TagStorageSettings {
    pub max_tag_count: u32,
    pub max_memory_bank_bytes: u32,
    pub discard_tags_on_inventory_stop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InventoryState {
    A,
    B,
    AbFlip,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SlFlag {
    Asserted,
    Deasserted,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SingulationControl {
    /// Gen2 session, 0 to 3.
    pub session: u8,
    pub tag_population: u16,
    pub tag_transit_time_ms: u16,
    pub inventory_state: InventoryState,
    pub sl_flag: SlFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpiState {
    pub enabled: bool,
    pub high: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntennaConfig {
    pub receive_sensitivity_index: u16,
    pub transmit_power_index: u16,
    pub transmit_frequency_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfModeConfig {
    pub mode_index: u32,
    pub tari: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InventoryTrigger {
    Immediate,
    Periodic { period_ms: u32, duration_ms: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryParams {
    pub trigger: InventoryTrigger,
    /// Antennas to scan with; empty means all of them.
    pub antennas: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MemoryBank {
    Reserved,
    Epc,
    Tid,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterAction {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreFilter {
    pub antenna: u16,
    pub bank: MemoryBank,
    pub bit_offset: u16,
    pub pattern: Vec<u8>,
    pub action: FilterAction,
}

/// Which tags an access operation applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessTarget {
    /// The single tag with this EPC.
    Tag(Vec<u8>),
    /// Every tag matched by the reader's access filters.
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadParams {
    pub bank: MemoryBank,
    pub byte_offset: u16,
    /// Zero reads the whole bank.
    pub byte_count: u16,
    pub password: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteParams {
    pub bank: MemoryBank,
    pub byte_offset: u16,
    pub data: Vec<u8>,
    pub password: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LockField {
    KillPassword,
    AccessPassword,
    Epc,
    Tid,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LockPrivilege {
    ReadWrite,
    PermanentLock,
    PermanentUnlock,
    Unlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockParams {
    pub field: LockField,
    pub privilege: LockPrivilege,
    pub password: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KillParams {
    pub password: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagData {
    pub epc: Vec<u8>,
    pub antenna: u16,
    pub peak_rssi: i8,
    pub seen_count: u16,
    /// Memory read by an access operation; empty for plain inventory reads.
    pub memory: Vec<u8>,
}

impl fmt::Display for TagData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "EPC {} antenna {} RSSI {} seen {}",
            hex(&self.epc),
            self.antenna,
            self.peak_rssi,
            self.seen_count
        )?;
        if !self.memory.is_empty() {
            write!(f, " data {}", hex(&self.memory))?;
        }
        Ok(())
    }
}

/// Upper-case hex rendering of tag memory.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Parses hex digits, ignoring spaces. Odd digit counts are rejected.
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// An opaque command for the reader service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    GetCapabilities,
    GetTagStorageSettings,
    SetTagStorageSettings(TagStorageSettings),
    GetSingulationControl { antenna: u16 },
    SetSingulationControl { antenna: u16, control: SingulationControl },
    SetGpo { port: u8, high: bool },
    GetGpi { port: u8 },
    EnableGpi { port: u8, enable: bool },
    GetAntennaConfig { antenna: u16 },
    SetAntennaConfig { antenna: u16, config: AntennaConfig },
    GetRfMode { antenna: u16 },
    SetRfMode { antenna: u16, mode: RfModeConfig },
    StartInventory(InventoryParams),
    StopInventory,
    AddPreFilter(PreFilter),
    /// `None` removes every pre-filter.
    RemovePreFilter { index: Option<u32> },
    ReadTag { target: AccessTarget, params: ReadParams },
    WriteTag { target: AccessTarget, params: WriteParams },
    LockTag { target: AccessTarget, params: LockParams },
    KillTag { target: AccessTarget, params: KillParams },
}

impl Request {
    pub fn command(&self) -> CommandType {
        match self {
            Request::GetCapabilities => CommandType::GetCapabilities,
            Request::GetTagStorageSettings => CommandType::GetTagStorageSettings,
            Request::SetTagStorageSettings(_) => CommandType::SetTagStorageSettings,
            Request::GetSingulationControl { .. } => CommandType::GetSingulationControl,
            Request::SetSingulationControl { .. } => CommandType::SetSingulationControl,
            Request::SetGpo { .. } => CommandType::SetGpo,
            Request::GetGpi { .. } => CommandType::GetGpi,
            Request::EnableGpi { .. } => CommandType::EnableGpi,
            Request::GetAntennaConfig { .. } => CommandType::GetAntennaConfig,
            Request::SetAntennaConfig { .. } => CommandType::SetAntennaConfig,
            Request::GetRfMode { .. } => CommandType::GetRfMode,
            Request::SetRfMode { .. } => CommandType::SetRfMode,
            Request::StartInventory(_) => CommandType::StartInventory,
            Request::StopInventory => CommandType::StopInventory,
            Request::AddPreFilter(_) => CommandType::AddPreFilter,
            Request::RemovePreFilter { .. } => CommandType::RemovePreFilter,
            Request::ReadTag { .. } => CommandType::ReadTag,
            Request::WriteTag { .. } => CommandType::WriteTag,
            Request::LockTag { .. } => CommandType::LockTag,
            Request::KillTag { .. } => CommandType::KillTag,
        }
    }
}

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Done,
    Capabilities(ReaderCapabilities),
    TagStorage(TagStorageSettings),
    Singulation(SingulationControl),
    Gpi(GpiState),
    Antenna(AntennaConfig),
    RfMode(RfModeConfig),
    PreFilterAdded { index: u32 },
    Tags(Vec<TagData>),
}

/// Asynchronous notification pushed by the reader service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    TagRead(Vec<TagData>),
    InventoryStarted,
    InventoryStopped,
    AccessStarted,
    AccessStopped,
    AntennaConnected(u16),
    AntennaDisconnected(u16),
    GpiChanged { port: u8, high: bool },
    BufferFullWarning,
    BufferFull,
    ReaderException(String),
    Disconnected,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Notification::TagRead(tags) => {
                write!(f, "Tag read event: {} tag(s)", tags.len())?;
                for tag in tags {
                    write!(f, "\n  {}", tag)?;
                }
                Ok(())
            }
            Notification::InventoryStarted => write!(f, "Inventory started"),
            Notification::InventoryStopped => write!(f, "Inventory stopped"),
            Notification::AccessStarted => write!(f, "Access started"),
            Notification::AccessStopped => write!(f, "Access stopped"),
            Notification::AntennaConnected(id) => write!(f, "Antenna {} connected", id),
            Notification::AntennaDisconnected(id) => write!(f, "Antenna {} disconnected", id),
            Notification::GpiChanged { port, high } => write!(
                f,
                "GPI {} changed to {}",
                port,
                if *high { "HIGH" } else { "LOW" }
            ),
            Notification::BufferFullWarning => write!(f, "Tag buffer almost full"),
            Notification::BufferFull => write!(f, "Tag buffer full"),
            Notification::ReaderException(msg) => write!(f, "Reader exception: {}", msg),
            Notification::Disconnected => write!(f, "Reader disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0xE2, 0x00, 0x1A]), "E2001A");
        assert_eq!(parse_hex("e2 00 1a"), Some(vec![0xE2, 0x00, 0x1A]));
        assert_eq!(parse_hex("E2001"), None);
        assert_eq!(parse_hex("zz"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn test_request_command() {
        assert_eq!(Request::StopInventory.command(), CommandType::StopInventory);
        assert_eq!(
            Request::RemovePreFilter { index: None }.command(),
            CommandType::RemovePreFilter
        );
    }

    #[test]
    fn test_tag_read_display() {
        let event = Notification::TagRead(vec![TagData {
            epc: vec![0x30, 0x08],
            antenna: 2,
            peak_rssi: -52,
            seen_count: 3,
            memory: Vec::new(),
        }]);
        assert_eq!(
            event.to_string(),
            "Tag read event: 1 tag(s)\n  EPC 3008 antenna 2 RSSI -52 seen 3"
        );
    }
}
