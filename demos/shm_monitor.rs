//! Live radar over every shared map on the host, reporting new maps, lost
//! maps, and locks held by dead processes.

use sharded_map_shm::discovery::SegmentDiscovery;
use sharded_map_shm::ShmResult;
use std::collections::HashSet;
use std::{thread, time::Duration};

fn main() -> ShmResult<()> {
    println!("Shared map radar - watching for new maps...");

    let discovery = SegmentDiscovery::new();
    let mut known: HashSet<String> = discovery
        .list_segments()?
        .into_iter()
        .map(|info| info.name)
        .collect();
    println!("Initial state: {} maps present.", known.len());

    loop {
        let current = discovery.list_segments()?;
        let current_set: HashSet<String> = current.iter().map(|info| info.name.clone()).collect();

        for name in current_set.difference(&known) {
            if let Ok(Some(info)) = discovery.find_segment(name) {
                println!(
                    ">>> new map [{name}]: size={} epoch={} shared_lock={}",
                    info.size, info.snapshot_epoch, info.shared_lock
                );
            }
        }

        for name in known.difference(&current_set) {
            println!("<<< map gone [{name}]");
        }

        for info in &current {
            if info.lock_owner_pid != 0 && !info.lock_owner_alive {
                println!(
                    "!!! stuck lock on [{}]: held by dead pid {}",
                    info.name, info.lock_owner_pid
                );
            }
        }

        known = current_set;
        thread::sleep(Duration::from_millis(500));
    }
}
