//! Basic usage example: a producer thread streaming keyed sensor readings
//! into a map, and a consumer thread catching up with whatever is new each
//! time it polls.

use sharded_map_shm::codec::JsonCodec;
use sharded_map_shm::handle::{SharedMap, SharedMapOptions};
use sharded_map_shm::ShmResult;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SensorReading {
    temperature: f32,
    humidity: f32,
    timestamp_ms: u64,
}

impl SensorReading {
    fn new(temp: f32, hum: f32) -> Self {
        Self {
            temperature: temp,
            humidity: hum,
            timestamp_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64,
        }
    }
}

const MAP_NAME: &str = "sensor_readings";

fn producer() -> ShmResult<()> {
    println!("Producer: starting...");
    let map: SharedMap<u32, SensorReading, JsonCodec> =
        SharedMap::create(MAP_NAME, JsonCodec, SharedMapOptions::default())?;

    for i in 0..100u32 {
        let reading = SensorReading::new(20.0 + i as f32 * 0.1, 50.0 + i as f32 * 0.2);
        if i % 10 == 0 {
            println!("Producer: set #{i}: temp={:.1}C", reading.temperature);
        }
        map.set(i, reading)?;
        thread::sleep(Duration::from_millis(20));
    }

    thread::sleep(Duration::from_millis(200));
    map.unlink()
}

fn consumer() -> ShmResult<()> {
    println!("Consumer: starting...");
    thread::sleep(Duration::from_millis(100));

    let map: SharedMap<u32, SensorReading, JsonCodec> =
        SharedMap::attach(MAP_NAME, JsonCodec, SharedMapOptions::default())?;

    let mut last_len = 0;
    for _ in 0..30 {
        thread::sleep(Duration::from_millis(40));
        let len = match map.len() {
            Ok(len) => len,
            Err(e) => {
                println!("Consumer: read error (map likely unlinked): {e}");
                break;
            }
        };
        if len != last_len {
            if let Some(latest) = map.get(&(len as u32 - 1))? {
                println!("Consumer: now have {len} readings, latest temp={:.1}C", latest.temperature);
            }
            last_len = len;
        }
    }

    Ok(())
}

fn main() -> ShmResult<()> {
    println!("Shared map - basic producer/consumer example");
    println!("=============================================");

    let producer_handle = thread::spawn(|| {
        if let Err(e) = producer() {
            eprintln!("Producer error: {e}");
        }
    });
    let consumer_handle = thread::spawn(|| {
        if let Err(e) = consumer() {
            eprintln!("Consumer error: {e}");
        }
    });

    producer_handle.join().unwrap();
    consumer_handle.join().unwrap();

    println!("Basic usage example completed!");
    Ok(())
}
