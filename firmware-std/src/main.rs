//! SmartRadar ESP-IDF std firmware
//!
//! Thread-based implementation using FreeRTOS threads and std::sync::mpsc
//! channels. The NimBLE scan callback only parses advertisements and
//! `try_send`s them; the registry thread applies them and raises
//! surveillance alerts, the command thread serves the companion app, and a
//! maintenance thread retries failed NVS writes.

mod adv;
mod nvs;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use smartradar::recent::DeviceStatus;
use smartradar::{board, comm, protocol, registry};

use comm::LineReader;
use esp_idf_svc::hal::task::block_on;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use protocol::{HostCommand, MsgBuffer, MAX_MSG_LEN, VERSION};
use registry::{DetectionEvent, DeviceRegistry, RegistryConfig};

use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{BLEAdvertisementData, BLEDevice, BLEScan, NimbleProperties};

use nvs::NvsStore;

type SharedRegistry = Arc<Mutex<DeviceRegistry<NvsStore>>>;

/// How often pending list writes are retried
const FLUSH_INTERVAL: Duration = Duration::from_secs(10);

static BLE_CLIENTS: AtomicU8 = AtomicU8::new(0);
static LAST_ALERT: Mutex<heapless::String<56>> = Mutex::new(heapless::String::new());

/// Boot time, captured once in main
static BOOT_INSTANT: Mutex<Option<Instant>> = Mutex::new(None);

fn uptime_millis_u32() -> u32 {
    BOOT_INSTANT
        .lock()
        .ok()
        .and_then(|i| i.map(|boot| (boot.elapsed().as_millis() & 0xFFFF_FFFF) as u32))
        .unwrap_or(0)
}

/// Registry state stays valid across a panic in another holder.
fn lock(registry: &SharedRegistry) -> MutexGuard<'_, DeviceRegistry<NvsStore>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn main() -> anyhow::Result<()> {
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();
    if let Ok(mut boot) = BOOT_INSTANT.lock() {
        *boot = Some(Instant::now());
    }

    log::info!("SmartRadar v{} starting on {} (std)", VERSION, board::BOARD_NAME);

    // ── Registry ─────────────────────────────────────────────────────

    let nvs = EspDefaultNvsPartition::take()?;
    let store = NvsStore::new(nvs)?;
    let registry: SharedRegistry = Arc::new(Mutex::new(registry::create(RegistryConfig::new(), store)));

    // ── Channels ─────────────────────────────────────────────────────

    let (scan_tx, scan_rx) = mpsc::sync_channel::<DetectionEvent>(32);
    let (cmd_tx, cmd_rx) = mpsc::sync_channel::<HostCommand>(4);
    let (reply_tx, reply_rx) = mpsc::sync_channel::<MsgBuffer>(8);

    // ── Registry thread ──────────────────────────────────────────────

    let detection_registry = registry.clone();
    thread::Builder::new()
        .name("registry".into())
        .stack_size(4096)
        .spawn(move || {
            detection_thread(scan_rx, detection_registry);
        })?;
    log::info!("Registry thread spawned");

    // ── Command thread ───────────────────────────────────────────────

    let command_registry = registry.clone();
    thread::Builder::new()
        .name("command".into())
        .stack_size(6144)
        .spawn(move || {
            command_thread(cmd_rx, reply_tx, command_registry);
        })?;
    log::info!("Command thread spawned");

    // ── Maintenance thread ───────────────────────────────────────────

    thread::Builder::new()
        .name("maint".into())
        .stack_size(4096)
        .spawn(move || {
            maintenance_thread(registry);
        })?;
    log::info!("Maintenance thread spawned");

    // ── BLE (NimBLE), main thread ───────────────────────────

    ble_main(scan_tx, cmd_tx, reply_rx)
}

// ── Registry thread ──────────────────────────────────────────────────

fn detection_thread(scan_rx: mpsc::Receiver<DetectionEvent>, registry: SharedRegistry) {
    log::info!("Registry thread started");

    while let Ok(event) = scan_rx.recv() {
        let (sighting, line) = {
            let mut reg = lock(&registry);
            let sighting = reg.on_detection(&event);
            (sighting, reg.recent_line(0))
        };
        let Some(sighting) = sighting else {
            continue;
        };

        if sighting.alert {
            log::warn!("ALERT {} ({} dBm)", line, event.rssi);
            if let Ok(mut s) = LAST_ALERT.lock() {
                s.clear();
                let _ = s.push_str(&line);
            }
        } else if sighting.status == DeviceStatus::Blocked {
            log::warn!("Blacklisted device nearby: {} ({} dBm)", line, event.rssi);
        }
    }
}

// ── Command thread ───────────────────────────────────────────────────

fn command_thread(
    cmd_rx: mpsc::Receiver<HostCommand>,
    reply_tx: SyncSender<MsgBuffer>,
    registry: SharedRegistry,
) {
    while let Ok(cmd) = cmd_rx.recv() {
        log::debug!("Command: {:?}", cmd);
        let reply = {
            let mut reg = lock(&registry);
            comm::handle_command(cmd, &mut *reg)
        };

        let mut buf = MsgBuffer::new();
        buf.resize_default(MAX_MSG_LEN).ok();
        if let Some(len) = comm::serialize_message(&reply, &mut buf) {
            buf.truncate(len);
            if let Ok(s) = std::str::from_utf8(&buf) {
                log::info!("{}", s.trim_end());
            }
            let _ = reply_tx.try_send(buf);
        }
    }
}

// ── Maintenance thread ───────────────────────────────────────────────

fn maintenance_thread(registry: SharedRegistry) {
    loop {
        thread::sleep(FLUSH_INTERVAL);

        let mut reg = lock(&registry);
        let stats = reg.stats();
        if stats.pending_writes {
            if let Err(e) = reg.flush() {
                log::warn!("NVS flush failed, will retry: {}", e);
            }
        }

        log::debug!(
            "{} recent, {} whitelisted, {} blacklisted, {} detections, {} ignored",
            stats.recent,
            stats.whitelisted,
            stats.blacklisted,
            stats.detections,
            stats.ignored
        );
        if stats.armed {
            let last = LAST_ALERT.lock().map(|s| s.clone()).unwrap_or_default();
            log::info!("Armed, {} alert(s), last: {}", stats.alerts, last);
        }
        for age in 0..board::DISPLAY_ROWS.min(stats.recent) {
            log::debug!("  {}", reg.recent_line(age));
        }
    }
}

// ── BLE (NimBLE) main loop ───────────────────────────────────────────

fn ble_main(
    scan_tx: SyncSender<DetectionEvent>,
    cmd_tx: SyncSender<HostCommand>,
    reply_rx: mpsc::Receiver<MsgBuffer>,
) -> anyhow::Result<()> {
    let ble_device = BLEDevice::take();
    let server = ble_device.get_server();

    // Track connections; NimBLE auto-restarts advertising on disconnect
    server.on_connect(|_server, desc| {
        log::info!("BLE client connected: {}", desc.address());
        BLE_CLIENTS.fetch_add(1, Ordering::Relaxed);
    });
    server.on_disconnect(|desc, _reason| {
        log::info!("BLE client disconnected: {}", desc.address());
        BLE_CLIENTS.fetch_sub(1, Ordering::Relaxed);
    });

    let service_uuid = BleUuid::from_uuid128_string(comm::ble_uuids::SERVICE)
        .map_err(|e| anyhow::anyhow!("invalid service UUID: {:?}", e))?;
    let tx_uuid = BleUuid::from_uuid128_string(comm::ble_uuids::TX_CHAR)
        .map_err(|e| anyhow::anyhow!("invalid TX UUID: {:?}", e))?;
    let rx_uuid = BleUuid::from_uuid128_string(comm::ble_uuids::RX_CHAR)
        .map_err(|e| anyhow::anyhow!("invalid RX UUID: {:?}", e))?;

    let service = server.create_service(service_uuid);

    let tx_char = service.lock().create_characteristic(tx_uuid, NimbleProperties::NOTIFY);

    let rx_char = service.lock().create_characteristic(rx_uuid, NimbleProperties::WRITE);

    // RX write handler: parse incoming NDJSON commands
    rx_char.lock().on_write(move |args| {
        thread_local! {
            static LINE_READER: std::cell::RefCell<LineReader> =
                std::cell::RefCell::new(LineReader::new());
        }
        LINE_READER.with(|lr| {
            let mut lr = lr.borrow_mut();
            for &byte in args.recv_data() {
                if let Some(line) = lr.feed(byte) {
                    match comm::parse_command(line) {
                        Some(cmd) => {
                            let _ = cmd_tx.try_send(cmd);
                        }
                        None => log::warn!("Ignoring malformed command"),
                    }
                }
            }
        });
    });

    // Configure and start advertising
    let mut adv_data = BLEAdvertisementData::new();
    adv_data.name(comm::BLE_ADV_NAME).add_service_uuid(service_uuid);
    ble_device
        .get_advertising()
        .lock()
        .set_data(&mut adv_data)
        .map_err(|e| anyhow::anyhow!("BLE advertising data failed: {:?}", e))?;
    ble_device
        .get_advertising()
        .lock()
        .start()
        .map_err(|e| anyhow::anyhow!("BLE advertising start failed: {:?}", e))?;
    log::info!("BLE advertising as '{}'", comm::BLE_ADV_NAME);

    thread::Builder::new()
        .name("blescan".into())
        .stack_size(4096)
        .spawn(move || {
            ble_scan_thread(scan_tx);
        })?;
    log::info!("BLE scan thread spawned");

    // TX notify loop: forward replies to connected clients
    loop {
        match reply_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(msg) => {
                if BLE_CLIENTS.load(Ordering::Relaxed) == 0 {
                    continue;
                }
                for chunk in msg.chunks(comm::BLE_MAX_NOTIFY) {
                    let mut padded = [b'\n'; comm::BLE_MAX_NOTIFY];
                    padded[..chunk.len()].copy_from_slice(chunk);
                    tx_char.lock().set_value(&padded).notify();
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    anyhow::bail!("reply channel disconnected")
}

// ── BLE scan thread ──────────────────────────────────────────────────

fn ble_scan_thread(scan_tx: SyncSender<DetectionEvent>) {
    log::info!("BLE scan thread started");

    let ble_device = BLEDevice::take();
    let mut scan = BLEScan::new();
    scan.active_scan(true).interval(100).window(99);

    // Run scan in a loop with 5-second rounds
    loop {
        let _ = block_on(scan.start(ble_device, 5000, |device, data| {
            let addr_bytes = device.addr().as_be_bytes();
            let event = adv::parse_advertisement(&addr_bytes, device.rssi(), data.payload())
                .at(uptime_millis_u32());
            // Registry thread busy: drop rather than stall the host stack
            let _ = scan_tx.try_send(event);
            None::<()>
        }));
    }
}
