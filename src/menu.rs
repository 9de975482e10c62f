//! The interactive menus.
//!
//! [`Menu`] is the state machine: each level lists numbered options and maps
//! a selection to an [`Action`]. [`Console`] runs it against a reader, reading
//! selections and parameters from an input stream and writing prompts,
//! results and failure reasons to an output stream.

use std::io::{BufRead, Write};
use std::ops::RangeInclusive;
use std::time::Duration;

use tracing::debug;

use crate::config::{Config, SessionState};
use crate::error::Error;
use crate::events::EventDelivery;
use crate::ops::ReaderOps;
use crate::session::Reader;
use crate::types::*;

/// Pre-filters the console lets the user install at the same time.
pub const MAX_PREFILTERS: usize = 2;

const PERIODIC_TRIGGER: InventoryTrigger = InventoryTrigger::Periodic {
    period_ms: 1000,
    duration_ms: 500,
};

const BANKS: [(&str, MemoryBank); 4] = [
    ("Reserved", MemoryBank::Reserved),
    ("EPC", MemoryBank::Epc),
    ("TID", MemoryBank::Tid),
    ("User", MemoryBank::User),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Main,
    Configuration,
    Inventory,
    Access,
    InventoryFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Capability,
    SingulationControl,
    Gpo,
    Gpi,
    AntennaConfig,
    RfMode,
    SimpleInventory,
    PeriodicInventory,
    AddPreFilter,
    RemovePreFilter,
    SingleTagAccess,
    MultipleTagAccess,
    Open(Menu),
    Back,
    Exit,
}

impl Menu {
    pub fn options(self) -> &'static [(&'static str, Action)] {
        match self {
            Menu::Main => &[
                ("Capability -- Displays the device capabilities", Action::Capability),
                ("Configuration", Action::Open(Menu::Configuration)),
                ("Inventory", Action::Open(Menu::Inventory)),
                ("Access  - Select Mode of Access", Action::Open(Menu::Access)),
                ("Exit", Action::Exit),
            ],
            Menu::Configuration => &[
                ("Singulation Control", Action::SingulationControl),
                ("GPO", Action::Gpo),
                ("GPI", Action::Gpi),
                ("Antenna Config", Action::AntennaConfig),
                ("RF Mode", Action::RfMode),
                ("Back to main menu", Action::Back),
            ],
            Menu::Inventory => &[
                ("Simple", Action::SimpleInventory),
                ("Periodic Inventory", Action::PeriodicInventory),
                ("Pre-filter", Action::Open(Menu::InventoryFilter)),
                ("Back to main menu", Action::Back),
            ],
            Menu::Access => &[
                ("Access Operation with Specific EPC-ID", Action::SingleTagAccess),
                ("Access Operation with Access-Filters", Action::MultipleTagAccess),
                ("Back to main menu", Action::Back),
            ],
            Menu::InventoryFilter => &[
                ("Add Pre-Filter [only 2 filters are allowed]", Action::AddPreFilter),
                ("Remove Pre-Filter", Action::RemovePreFilter),
                ("Exit to Inventory-Menu", Action::Back),
            ],
        }
    }

    /// Maps a 1-based selection to its action.
    pub fn select(self, option: u32) -> Option<Action> {
        let index = option.checked_sub(1)? as usize;
        self.options().get(index).map(|&(_, action)| action)
    }

    pub fn render(self) -> String {
        let mut text = String::from("\n\n----Command Menu----");
        for (i, (label, _)) in self.options().iter().enumerate() {
            text.push_str(&format!("\n{}. {}", i + 1, label));
        }
        text.push('\n');
        text
    }
}

fn parse_number(line: &str) -> Option<u32> {
    line.trim().parse().ok()
}

enum Flow {
    Stay,
    Exit,
}

#[derive(Clone, Copy)]
enum AccessOp {
    Read,
    Write,
    Lock,
    Kill,
}

/// Runs the menus until the user exits or input ends, then tears the
/// session down.
pub struct Console<R, I, O> {
    reader: R,
    events: EventDelivery,
    state: SessionState,
    inventory_duration: Duration,
    input: I,
    output: O,
    stack: Vec<Menu>,
}

impl<R: Reader, I: BufRead, O: Write> Console<R, I, O> {
    pub fn new(reader: R, events: EventDelivery, config: &Config, input: I, output: O) -> Self {
        Console {
            reader,
            events,
            state: SessionState::default(),
            inventory_duration: config.inventory_duration,
            input,
            output,
            stack: vec![Menu::Main],
        }
    }

    pub fn current(&self) -> Menu {
        self.stack.last().copied().unwrap_or(Menu::Main)
    }

    pub fn run(mut self) -> Result<(), Error> {
        loop {
            let menu = self.current();
            write!(self.output, "{}", menu.render())?;
            self.output.flush()?;
            let line = match self.read_line()? {
                Some(line) => line,
                None => break,
            };
            let option = match parse_number(&line) {
                Some(option) => option,
                None => {
                    write!(self.output, "\nEnter a Valid Input:")?;
                    continue;
                }
            };
            match menu.select(option) {
                Some(action) => {
                    if let Flow::Exit = self.dispatch(action)? {
                        break;
                    }
                }
                None => debug!(?menu, option, "selection out of range"),
            }
        }
        self.exit()
    }

    fn dispatch(&mut self, action: Action) -> Result<Flow, Error> {
        match action {
            Action::Open(menu) => self.stack.push(menu),
            Action::Back => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
            }
            Action::Exit => return Ok(Flow::Exit),
            operation => {
                if let Err(e) = self.perform(operation) {
                    self.report(&e)?;
                }
            }
        }
        Ok(Flow::Stay)
    }

    fn report(&mut self, error: &Error) -> Result<(), Error> {
        match error {
            Error::Input(msg) => write!(self.output, "\n{}", msg)?,
            Error::Operation { .. } => write!(
                self.output,
                "\nOperation Failed. Reason : {} ",
                self.reader.last_error().description
            )?,
            other => write!(self.output, "\nOperation Failed. Reason : {} ", other)?,
        }
        Ok(())
    }

    /// Stops the event worker, frees the antenna list, then disconnects.
    fn exit(self) -> Result<(), Error> {
        let Console {
            reader,
            mut events,
            mut state,
            mut output,
            ..
        } = self;
        events.stop();
        if state.antennas.release() {
            debug!("antenna info released");
        }
        reader.disconnect();
        writeln!(output)?;
        Ok(())
    }

    fn perform(&mut self, action: Action) -> Result<(), Error> {
        match action {
            Action::Capability => self.capability(),
            Action::SingulationControl => self.singulation_control(),
            Action::Gpo => self.gpo(),
            Action::Gpi => self.gpi(),
            Action::AntennaConfig => self.antenna_config(),
            Action::RfMode => self.rf_mode(),
            Action::SimpleInventory => self.inventory(InventoryTrigger::Immediate),
            Action::PeriodicInventory => self.inventory(PERIODIC_TRIGGER),
            Action::AddPreFilter => self.add_prefilter(),
            Action::RemovePreFilter => self.remove_prefilter(),
            Action::SingleTagAccess => {
                let epc = self.ask_with("Enter EPC-ID (hex): ", parse_hex)?;
                self.access(AccessTarget::Tag(epc))
            }
            Action::MultipleTagAccess => self.access(AccessTarget::Filtered),
            Action::Open(_) | Action::Back | Action::Exit => Ok(()),
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, Error> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Prompts until `parse` accepts the answer.
    fn ask_with<T, F>(&mut self, prompt: &str, parse: F) -> Result<T, Error>
    where
        F: Fn(&str) -> Option<T>,
    {
        write!(self.output, "\n{}", prompt)?;
        loop {
            self.output.flush()?;
            let line = self
                .read_line()?
                .ok_or_else(|| Error::Input("input ended".to_string()))?;
            if let Some(value) = parse(line.trim()) {
                return Ok(value);
            }
            write!(self.output, "\nEnter a Valid Input:")?;
        }
    }

    fn ask_number(&mut self, prompt: &str, range: RangeInclusive<u32>) -> Result<u32, Error> {
        self.ask_with(prompt, |s| s.parse::<u32>().ok().filter(|n| range.contains(n)))
    }

    fn ask_flag(&mut self, prompt: &str) -> Result<bool, Error> {
        Ok(self.ask_number(prompt, 0..=1)? == 1)
    }

    fn ask_password(&mut self, prompt: &str) -> Result<u32, Error> {
        self.ask_with(prompt, |s| u32::from_str_radix(s, 16).ok())
    }

    fn choose<T: Copy>(&mut self, title: &str, choices: &[(&str, T)]) -> Result<T, Error> {
        write!(self.output, "\n{}:", title)?;
        for (i, (label, _)) in choices.iter().enumerate() {
            write!(self.output, "\n{}. {}", i + 1, label)?;
        }
        let n = self.ask_number("Enter choice: ", 1..=choices.len() as u32)?;
        Ok(choices[n as usize - 1].1)
    }

    fn choose_antenna(&mut self) -> Result<u16, Error> {
        let antennas = self.state.antennas.get_or_query(&mut self.reader)?.to_vec();
        let (first, last) = match (antennas.first(), antennas.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(Error::Input("The reader reports no antennas".to_string())),
        };
        let prompt = format!("Enter antenna ID ({}-{}): ", first, last);
        Ok(self.ask_number(&prompt, u32::from(first)..=u32::from(last))? as u16)
    }

    fn capability(&mut self) -> Result<(), Error> {
        let caps = self.reader.capabilities()?;
        self.state.antennas.populate(&caps);
        write!(
            self.output,
            "\nReader ID: {}\nModel: {}\nFirmware version: {}\nAntennas: {}\nGPI ports: {}\nGPO ports: {}\nMax pre-filters: {}\nRF modes: {}",
            caps.reader_id,
            caps.model,
            caps.firmware_version,
            caps.antenna_count,
            caps.gpi_count,
            caps.gpo_count,
            caps.max_prefilters,
            caps.rf_mode_count
        )?;
        if let (Some(min), Some(max)) = (
            caps.transmit_power_levels.first(),
            caps.transmit_power_levels.last(),
        ) {
            write!(
                self.output,
                "\nTransmit power: {:.2} to {:.2} dBm",
                f32::from(*min) / 100.0,
                f32::from(*max) / 100.0
            )?;
        }
        Ok(())
    }

    fn singulation_control(&mut self) -> Result<(), Error> {
        let antenna = self.choose_antenna()?;
        let mut control = self.reader.singulation_control(antenna)?;
        self.state.singulation = Some(control);
        write!(
            self.output,
            "\nSession: S{}\nTag population: {}\nTag transit time: {} ms\nInventory state: {:?}\nSL flag: {:?}",
            control.session,
            control.tag_population,
            control.tag_transit_time_ms,
            control.inventory_state,
            control.sl_flag
        )?;
        if !self.ask_flag("Change session and tag population? (0 = no, 1 = yes): ")? {
            return Ok(());
        }
        control.session = self.ask_number("Enter session (0-3): ", 0..=3)? as u8;
        control.tag_population =
            self.ask_number("Enter tag population: ", 0..=u32::from(u16::MAX))? as u16;
        self.reader.set_singulation_control(antenna, control)?;
        self.state.singulation = Some(control);
        write!(self.output, "\nSingulation control updated")?;
        Ok(())
    }

    fn gpo(&mut self) -> Result<(), Error> {
        let port = self.ask_number("Enter GPO port: ", 1..=u32::from(u8::MAX))? as u8;
        let high = self.ask_flag("Enter state (0 = LOW, 1 = HIGH): ")?;
        self.reader.set_gpo(port, high)?;
        write!(
            self.output,
            "\nGPO {} set {}",
            port,
            if high { "HIGH" } else { "LOW" }
        )?;
        Ok(())
    }

    fn gpi(&mut self) -> Result<(), Error> {
        let port = self.ask_number("Enter GPI port: ", 1..=u32::from(u8::MAX))? as u8;
        let enable = self.ask_flag("Enable port? (0 = no, 1 = yes): ")?;
        self.reader.enable_gpi(port, enable)?;
        let state = self.reader.gpi_state(port)?;
        write!(
            self.output,
            "\nGPI {} {}, level {}",
            port,
            if state.enabled { "enabled" } else { "disabled" },
            if state.high { "HIGH" } else { "LOW" }
        )?;
        Ok(())
    }

    fn antenna_config(&mut self) -> Result<(), Error> {
        let antenna = self.choose_antenna()?;
        let mut config = self.reader.antenna_config(antenna)?;
        write!(
            self.output,
            "\nAntenna {}: receive sensitivity index {}, transmit power index {}, transmit frequency index {}",
            antenna,
            config.receive_sensitivity_index,
            config.transmit_power_index,
            config.transmit_frequency_index
        )?;
        config.transmit_power_index =
            self.ask_number("Enter transmit power index: ", 0..=u32::from(u16::MAX))? as u16;
        self.reader.set_antenna_config(antenna, config)?;
        write!(self.output, "\nAntenna config updated")?;
        Ok(())
    }

    fn rf_mode(&mut self) -> Result<(), Error> {
        let antenna = self.choose_antenna()?;
        let mut mode = self.reader.rf_mode(antenna)?;
        write!(
            self.output,
            "\nAntenna {}: RF mode index {}, tari {}",
            antenna, mode.mode_index, mode.tari
        )?;
        mode.mode_index = self.ask_number("Enter RF mode index: ", 0..=u32::MAX)?;
        self.reader.set_rf_mode(antenna, mode)?;
        write!(self.output, "\nRF mode updated")?;
        Ok(())
    }

    fn inventory(&mut self, trigger: InventoryTrigger) -> Result<(), Error> {
        let params = InventoryParams {
            trigger,
            antennas: Vec::new(),
        };
        write!(
            self.output,
            "\nInventory running for {:.1} s",
            self.inventory_duration.as_secs_f32()
        )?;
        self.output.flush()?;
        self.reader.run_inventory(params, self.inventory_duration)?;
        write!(self.output, "\nInventory stopped")?;
        Ok(())
    }

    fn add_prefilter(&mut self) -> Result<(), Error> {
        if self.state.prefilters.len() >= MAX_PREFILTERS {
            return Err(Error::Input(format!(
                "Only {} pre-filters are allowed",
                MAX_PREFILTERS
            )));
        }
        let antenna = self.choose_antenna()?;
        let bank = self.choose("Memory bank", &BANKS)?;
        let bit_offset = self.ask_number("Enter bit offset: ", 0..=u32::from(u16::MAX))? as u16;
        let pattern = self.ask_with("Enter pattern (hex): ", parse_hex)?;
        let action = self.choose(
            "Filter action",
            &[
                ("Include matching tags", FilterAction::Include),
                ("Exclude matching tags", FilterAction::Exclude),
            ],
        )?;
        let index = self.reader.add_prefilter(PreFilter {
            antenna,
            bank,
            bit_offset,
            pattern,
            action,
        })?;
        self.state.prefilters.push(index);
        write!(self.output, "\nPre-filter added at index {}", index)?;
        Ok(())
    }

    fn remove_prefilter(&mut self) -> Result<(), Error> {
        if self.state.prefilters.is_empty() {
            return Err(Error::Input("No pre-filters to remove".to_string()));
        }
        let known = self.state.prefilters.clone();
        let listed: Vec<String> = known.iter().map(|i| i.to_string()).collect();
        write!(self.output, "\nPre-filters: {}", listed.join(", "))?;
        let choice = self.ask_with("Enter index to remove (A = all): ", |s| {
            if s.eq_ignore_ascii_case("a") {
                Some(None)
            } else {
                s.parse::<u32>().ok().filter(|i| known.contains(i)).map(Some)
            }
        })?;
        self.reader.remove_prefilter(choice)?;
        match choice {
            Some(index) => self.state.prefilters.retain(|&i| i != index),
            None => self.state.prefilters.clear(),
        }
        write!(self.output, "\nPre-filter removed")?;
        Ok(())
    }

    fn access(&mut self, target: AccessTarget) -> Result<(), Error> {
        let op = self.choose(
            "Access operation",
            &[
                ("Read", AccessOp::Read),
                ("Write", AccessOp::Write),
                ("Lock", AccessOp::Lock),
                ("Kill", AccessOp::Kill),
            ],
        )?;
        match op {
            AccessOp::Read => {
                let bank = self.choose("Memory bank", &BANKS)?;
                let byte_offset =
                    self.ask_number("Enter byte offset: ", 0..=u32::from(u16::MAX))? as u16;
                let byte_count = self.ask_number(
                    "Enter byte count (0 = whole bank): ",
                    0..=u32::from(u16::MAX),
                )? as u16;
                let password = self.ask_password("Enter access password (hex): ")?;
                let tags = self.reader.read_tag(
                    target,
                    ReadParams {
                        bank,
                        byte_offset,
                        byte_count,
                        password,
                    },
                )?;
                if tags.is_empty() {
                    write!(self.output, "\nNo tags responded")?;
                }
                for tag in &tags {
                    write!(self.output, "\n{}", tag)?;
                }
            }
            AccessOp::Write => {
                let bank = self.choose("Memory bank", &BANKS)?;
                let byte_offset =
                    self.ask_number("Enter byte offset: ", 0..=u32::from(u16::MAX))? as u16;
                let data = self.ask_with("Enter data (hex): ", parse_hex)?;
                let password = self.ask_password("Enter access password (hex): ")?;
                self.reader.write_tag(
                    target,
                    WriteParams {
                        bank,
                        byte_offset,
                        data,
                        password,
                    },
                )?;
                write!(self.output, "\nWrite succeeded")?;
            }
            AccessOp::Lock => {
                let field = self.choose(
                    "Lock field",
                    &[
                        ("Kill password", LockField::KillPassword),
                        ("Access password", LockField::AccessPassword),
                        ("EPC memory", LockField::Epc),
                        ("TID memory", LockField::Tid),
                        ("User memory", LockField::User),
                    ],
                )?;
                let privilege = self.choose(
                    "Lock privilege",
                    &[
                        ("Read-write", LockPrivilege::ReadWrite),
                        ("Permanent lock", LockPrivilege::PermanentLock),
                        ("Permanent unlock", LockPrivilege::PermanentUnlock),
                        ("Unlock", LockPrivilege::Unlock),
                    ],
                )?;
                let password = self.ask_password("Enter access password (hex): ")?;
                self.reader.lock_tag(
                    target,
                    LockParams {
                        field,
                        privilege,
                        password,
                    },
                )?;
                write!(self.output, "\nLock succeeded")?;
            }
            AccessOp::Kill => {
                let password = self.ask_password("Enter kill password (hex): ")?;
                self.reader.kill_tag(target, KillParams { password })?;
                write!(self.output, "\nKill succeeded")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DeliveryMode;
    use crate::frame::Status;
    use crate::queue::EventQueue;
    use crate::session::ErrorInfo;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::{Arc, Weak};

    #[derive(Default)]
    struct Journal {
        requests: Vec<Request>,
        /// Event workers still holding the queue when disconnect ran.
        disconnected_with_workers: Option<usize>,
    }

    struct MockReader {
        journal: Rc<RefCell<Journal>>,
        queue: Arc<EventQueue>,
        failing: Option<(Status, &'static str)>,
        last_error: ErrorInfo,
        next_filter: u32,
    }

    impl MockReader {
        fn new() -> (MockReader, Rc<RefCell<Journal>>) {
            let journal = Rc::new(RefCell::new(Journal::default()));
            let reader = MockReader {
                journal: journal.clone(),
                queue: Arc::new(EventQueue::new()),
                failing: None,
                last_error: ErrorInfo::default(),
                next_filter: 0,
            };
            (reader, journal)
        }
    }

    impl Reader for MockReader {
        fn issue(&mut self, request: Request) -> Result<Reply, Error> {
            self.journal.borrow_mut().requests.push(request.clone());
            if let Some((status, reason)) = self.failing {
                self.last_error = ErrorInfo {
                    status,
                    description: reason.to_string(),
                };
                return Err(Error::Operation {
                    status,
                    reason: reason.to_string(),
                });
            }
            Ok(match request {
                Request::GetCapabilities => Reply::Capabilities(ReaderCapabilities {
                    reader_id: "FX7500-1".to_string(),
                    model: "FX7500".to_string(),
                    firmware_version: "3.2.1".to_string(),
                    antenna_count: 4,
                    gpi_count: 2,
                    gpo_count: 3,
                    max_prefilters: 2,
                    rf_mode_count: 30,
                    transmit_power_levels: vec![1000, 3000],
                }),
                Request::ReadTag { .. } => Reply::Tags(vec![TagData {
                    epc: vec![0xE2, 0x00, 0x34, 0x12],
                    antenna: 1,
                    peak_rssi: -48,
                    seen_count: 1,
                    memory: vec![0xAB, 0xCD],
                }]),
                Request::AddPreFilter(_) => {
                    self.next_filter += 1;
                    Reply::PreFilterAdded {
                        index: self.next_filter,
                    }
                }
                _ => Reply::Done,
            })
        }

        fn last_error(&self) -> ErrorInfo {
            self.last_error.clone()
        }

        fn event_queue(&self) -> Weak<EventQueue> {
            Arc::downgrade(&self.queue)
        }

        fn disconnect(self) {
            self.journal.borrow_mut().disconnected_with_workers =
                Some(Arc::strong_count(&self.queue) - 1);
        }
    }

    fn run_console(input: &str, reader: MockReader, events: EventDelivery) -> String {
        let config = Config {
            inventory_duration: Duration::from_millis(0),
            ..Config::default()
        };
        let mut output = Vec::new();
        Console::new(reader, events, &config, input.as_bytes(), &mut output)
            .run()
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    fn commands(journal: &Rc<RefCell<Journal>>) -> Vec<String> {
        journal
            .borrow()
            .requests
            .iter()
            .map(|r| format!("{:?}", r.command()))
            .collect()
    }

    #[test]
    fn test_select() {
        assert_eq!(Menu::Main.select(1), Some(Action::Capability));
        assert_eq!(Menu::Main.select(2), Some(Action::Open(Menu::Configuration)));
        assert_eq!(Menu::Main.select(5), Some(Action::Exit));
        assert_eq!(Menu::Main.select(0), None);
        assert_eq!(Menu::Main.select(6), None);
        assert_eq!(Menu::Configuration.select(6), Some(Action::Back));
        assert_eq!(
            Menu::Inventory.select(3),
            Some(Action::Open(Menu::InventoryFilter))
        );
        assert_eq!(Menu::InventoryFilter.select(3), Some(Action::Back));
        assert_eq!(Menu::Access.select(4), None);
    }

    #[test]
    fn test_only_main_exits() {
        for &menu in &[
            Menu::Configuration,
            Menu::Inventory,
            Menu::Access,
            Menu::InventoryFilter,
        ] {
            assert!(menu.options().iter().all(|&(_, a)| a != Action::Exit));
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(
            Menu::Access.render(),
            "\n\n----Command Menu----\n1. Access Operation with Specific EPC-ID\n2. Access Operation with Access-Filters\n3. Back to main menu\n"
        );
    }

    #[test]
    fn test_non_numeric_input_redisplays_menu() {
        let (reader, journal) = MockReader::new();
        let output = run_console("abc\n2\nxyz\n6\n5\n", reader, EventDelivery::new());

        assert_eq!(output.matches("Enter a Valid Input:").count(), 2);
        assert_eq!(output.matches("1. Capability").count(), 3);
        assert_eq!(output.matches("1. Singulation Control").count(), 2);
        assert!(journal.borrow().requests.is_empty());
    }

    #[test]
    fn test_navigation() {
        let (reader, journal) = MockReader::new();
        let output = run_console("2\n9\n6\n3\n3\n3\n4\n5\n", reader, EventDelivery::new());

        assert_eq!(output.matches("5. RF Mode").count(), 2);
        assert_eq!(output.matches("1. Add Pre-Filter").count(), 1);
        assert_eq!(output.matches("1. Simple").count(), 2);
        assert_eq!(output.matches("1. Capability").count(), 3);
        assert_eq!(journal.borrow().disconnected_with_workers, Some(0));
    }

    #[test]
    fn test_failure_reported_and_menu_redisplayed() {
        let (mut reader, journal) = MockReader::new();
        reader.failing = Some((Status::ReaderBusy, "Reader is busy"));
        let output = run_console("1\n5\n", reader, EventDelivery::new());

        assert!(output.contains("Operation Failed. Reason : Reader is busy"));
        assert_eq!(output.matches("1. Capability").count(), 2);
        assert_eq!(commands(&journal), ["GetCapabilities"]);
        assert!(journal.borrow().disconnected_with_workers.is_some());
    }

    #[test]
    fn test_exit_stops_worker_before_disconnect() {
        for &mode in &[DeliveryMode::CallbackDriven, DeliveryMode::WaitDriven] {
            let (reader, journal) = MockReader::new();
            let mut events = EventDelivery::new();
            events.start(reader.event_queue(), mode, |_| {}).unwrap();

            run_console("5\n", reader, events);
            assert_eq!(journal.borrow().disconnected_with_workers, Some(0));
        }
    }

    #[test]
    fn test_end_of_input_exits() {
        let (reader, journal) = MockReader::new();
        run_console("2\n", reader, EventDelivery::new());
        assert_eq!(journal.borrow().disconnected_with_workers, Some(0));
    }

    #[test]
    fn test_capability_output() {
        let (reader, journal) = MockReader::new();
        let output = run_console("1\n5\n", reader, EventDelivery::new());
        assert!(output.contains("Reader ID: FX7500-1"));
        assert!(output.contains("Antennas: 4"));
        assert!(output.contains("Transmit power: 10.00 to 30.00 dBm"));
        assert_eq!(commands(&journal), ["GetCapabilities"]);
    }

    #[test]
    fn test_gpo_reprompts_invalid_parameter() {
        let (reader, journal) = MockReader::new();
        let output = run_console("2\n2\nport\n1\n7\n1\n6\n5\n", reader, EventDelivery::new());

        assert_eq!(output.matches("Enter a Valid Input:").count(), 2);
        assert!(output.contains("GPO 1 set HIGH"));
        assert_eq!(
            journal.borrow().requests,
            vec![Request::SetGpo {
                port: 1,
                high: true
            }]
        );
    }

    #[test]
    fn test_single_tag_read() {
        let (reader, journal) = MockReader::new();
        let output = run_console(
            "4\n1\nE2003412\n1\n2\n0\n4\n0\n3\n5\n",
            reader,
            EventDelivery::new(),
        );

        assert!(output.contains("EPC E2003412 antenna 1 RSSI -48 seen 1 data ABCD"));
        assert_eq!(
            journal.borrow().requests,
            vec![Request::ReadTag {
                target: AccessTarget::Tag(vec![0xE2, 0x00, 0x34, 0x12]),
                params: ReadParams {
                    bank: MemoryBank::Epc,
                    byte_offset: 0,
                    byte_count: 4,
                    password: 0,
                },
            }]
        );
    }

    #[test]
    fn test_kill_with_access_filters() {
        let (reader, journal) = MockReader::new();
        let output = run_console("4\n2\n4\nDEADBEEF\n3\n5\n", reader, EventDelivery::new());

        assert!(output.contains("Kill succeeded"));
        assert_eq!(
            journal.borrow().requests,
            vec![Request::KillTag {
                target: AccessTarget::Filtered,
                params: KillParams {
                    password: 0xDEAD_BEEF
                },
            }]
        );
    }

    #[test]
    fn test_prefilter_limit() {
        let (reader, journal) = MockReader::new();
        let add = "1\n1\n2\n32\nE200\n1\n";
        let input = format!("3\n3\n{}{}1\n3\n4\n5\n", add, add);
        let output = run_console(&input, reader, EventDelivery::new());

        assert!(output.contains("Pre-filter added at index 1"));
        assert!(output.contains("Pre-filter added at index 2"));
        assert!(output.contains("Only 2 pre-filters are allowed"));
        assert_eq!(
            commands(&journal),
            ["GetCapabilities", "AddPreFilter", "AddPreFilter"]
        );
    }

    #[test]
    fn test_remove_prefilter() {
        let (reader, journal) = MockReader::new();
        let input = "3\n3\n2\n1\n1\n2\n32\nE200\n2\n2\n7\n1\n2\n3\n4\n5\n";
        let output = run_console(input, reader, EventDelivery::new());

        assert!(output.contains("No pre-filters to remove"));
        assert!(output.contains("Pre-filter removed"));
        assert_eq!(
            journal.borrow().requests.last(),
            Some(&Request::RemovePreFilter { index: Some(1) })
        );
    }

    #[test]
    fn test_simple_inventory() {
        let (reader, journal) = MockReader::new();
        let output = run_console("3\n1\n4\n5\n", reader, EventDelivery::new());

        assert!(output.contains("Inventory stopped"));
        assert_eq!(commands(&journal), ["StartInventory", "StopInventory"]);
    }
}
