//! Minimal writer example: create a map and set a couple of keys.

use sharded_map_shm::codec::JsonCodec;
use sharded_map_shm::handle::{SharedMap, SharedMapOptions};
use sharded_map_shm::ShmResult;
use std::io;

fn main() -> ShmResult<()> {
    println!("Shared map writer example");
    println!("==========================");

    let name = "example_map";
    println!("Creating map '{name}'...");

    let map: SharedMap<String, String, JsonCodec> =
        SharedMap::create(name, JsonCodec, SharedMapOptions::default())?;

    println!("Map created.");
    let status = map.status();
    println!("  creator: {}", status.is_creator);
    println!("  snapshot epoch: {}", status.remote_snapshot_epoch);

    map.set("greeting".to_string(), "Hello, shared map!".to_string())?;
    println!("Set 'greeting'.");

    map.set(
        "updated_at".to_string(),
        format!("{:?}", std::time::SystemTime::now()),
    )?;
    println!("Set 'updated_at'.");

    println!("\nPress Enter to exit (this will unlink the map)...");
    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();

    map.unlink()
}
