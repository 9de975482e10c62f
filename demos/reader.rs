extern crate rfid_console;

use std::env;
use std::io::{self, Read};

use rfid_console::types::{InventoryParams, InventoryTrigger, Notification};
use rfid_console::{DeliveryMode, EventDelivery, Reader, ReaderOps, Session};

fn main() {
    let args: Vec<String> = env::args().collect();
    let host = args.get(1).map(String::as_str).unwrap_or("localhost");
    let port = args.get(2).and_then(|p| p.parse().ok()).unwrap_or(0);

    let mut reader = Session::connect(host, port).unwrap();
    println!("Reader info: {:?}", reader.capabilities().unwrap());

    let mut events = EventDelivery::new();
    events
        .start(reader.event_queue(), DeliveryMode::CallbackDriven, |n| {
            if let Notification::TagRead(tags) = n {
                for tag in tags {
                    println!("Found tag: {}", tag);
                }
            }
        })
        .unwrap();

    reader
        .start_inventory(InventoryParams {
            trigger: InventoryTrigger::Immediate,
            antennas: Vec::new(),
        })
        .unwrap();
    println!("Reading tags; press Enter to stop");
    let _ = io::stdin().read(&mut [0]);

    reader.stop_inventory().unwrap();
    events.stop();
    reader.disconnect();
}
