//! Minimal reader example: attach to a map created by `shm_writer` and
//! watch it for changes made by other handles.

use sharded_map_shm::codec::JsonCodec;
use sharded_map_shm::handle::{SharedMap, SharedMapOptions};
use sharded_map_shm::ShmResult;
use std::io;
use std::time::Duration;

fn main() -> ShmResult<()> {
    println!("Shared map reader example");
    println!("==========================");

    let name = "example_map";
    println!("Attaching to map '{name}'...");

    let map: SharedMap<String, String, JsonCodec> =
        match SharedMap::attach(name, JsonCodec, SharedMapOptions::default()) {
            Ok(map) => map,
            Err(e) => {
                println!("Failed to attach: {e}");
                println!("Run the shm_writer demo first to create the map.");
                return Err(e);
            }
        };

    println!("Attached. Current contents:");
    for (key, value) in map.items()? {
        println!("  {key} = {value}");
    }

    println!("\nWatching for changes (press Enter to exit)...");
    let watch_name = name.to_string();
    std::thread::spawn(move || {
        let watcher: SharedMap<String, String, JsonCodec> =
            SharedMap::attach(&watch_name, JsonCodec, SharedMapOptions::default()).unwrap();
        let mut last_epoch = watcher.status().remote_snapshot_epoch;
        let mut last_len = watcher.len().unwrap_or(0);
        loop {
            std::thread::sleep(Duration::from_millis(200));
            let status = watcher.status();
            let len = watcher.len().unwrap_or(last_len);
            if status.remote_snapshot_epoch != last_epoch || len != last_len {
                println!("\nmap changed: epoch={} len={len}", status.remote_snapshot_epoch);
                last_epoch = status.remote_snapshot_epoch;
                last_len = len;
            }
        }
    });

    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();
    println!("Reader exiting.");

    Ok(())
}
