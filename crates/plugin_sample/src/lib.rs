//! Sample plugin
//!
//! Registers one of everything the host offers: a command-line flag, a
//! packet handler, a battle setting and a console command. Output goes to
//! stdout since the plugin does not share the host's log subscriber.

use hpm_abi::{
    datacheck_entry, hpm_plugin, ConfCategory, HostInterface, PacketHookPoint, PluginInfo,
    ServerType, VARIABLE_LENGTH,
};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

hpm_plugin! {
    name: "sample",
    version: "0.1.0",
    server_type: ServerType::ALL,
    shared_symbols: ["server_name"],
    datacheck: [
        datacheck_entry!(HostInterface, ServerType::ALL),
        datacheck_entry!(PluginInfo, ServerType::ALL),
    ],
}

/// Variable-length command handled by this plugin.
pub const SAMPLE_PACKET: u16 = 0x7f01;

static VERBOSE: AtomicBool = AtomicBool::new(false);
static PACKETS: AtomicU32 = AtomicU32::new(0);
static SAMPLE_RATE: AtomicU32 = AtomicU32::new(1);

fn text(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

// ============================================================================
// Callbacks
// ============================================================================

unsafe extern "C" fn on_verbose(_name: *const c_char, _params: *const c_char) -> bool {
    VERBOSE.store(true, Ordering::Relaxed);
    true
}

unsafe extern "C" fn on_sample_packet(fd: c_int) {
    let count = PACKETS.fetch_add(1, Ordering::Relaxed) + 1;
    if VERBOSE.load(Ordering::Relaxed) {
        println!("[sample] packet 0x{:04x} from session {} (#{})", SAMPLE_PACKET, fd, count);
    }
}

/// Parses `sample_rate`; values that are not positive integers are refused.
fn parse_rate(value: &str) -> Option<u32> {
    value.trim().parse().ok().filter(|rate| *rate > 0)
}

unsafe extern "C" fn on_sample_rate(value: *const c_char) {
    let value = text(value);
    match parse_rate(&value) {
        Some(rate) => SAMPLE_RATE.store(rate, Ordering::Relaxed),
        None => println!("[sample] ignoring invalid sample_rate '{}'", value),
    }
}

unsafe extern "C" fn on_console(line: *const c_char) {
    let args = text(line);
    match args.trim() {
        "reset" => {
            PACKETS.store(0, Ordering::Relaxed);
            println!("[sample] counters reset");
        }
        _ => println!(
            "[sample] {} packets seen, sample_rate {}",
            PACKETS.load(Ordering::Relaxed),
            SAMPLE_RATE.load(Ordering::Relaxed)
        ),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[export_name = "server_preinit"]
pub extern "C" fn server_preinit() {
    let Some(table) = hpm() else { return };
    if let Some(add_arg) = table.add_arg {
        unsafe {
            add_arg(
                table.pid,
                b"--sample-verbose\0".as_ptr().cast(),
                false,
                on_verbose,
                b"Log every packet the sample plugin handles\0".as_ptr().cast(),
            )
        };
    }
}

#[export_name = "plugin_init"]
pub extern "C" fn plugin_init() {
    let Some(table) = hpm() else { return };
    unsafe { register(table) };
}

unsafe fn register(table: &HostInterface) {
    if let Some(add_packet) = table.add_packet {
        add_packet(
            SAMPLE_PACKET,
            VARIABLE_LENGTH,
            on_sample_packet,
            PacketHookPoint::CLIF_PARSE,
            table.pid,
        );
    }
    if let Some(add_conf) = table.add_conf {
        add_conf(
            table.pid,
            ConfCategory::BATTLE,
            b"sample_rate\0".as_ptr().cast(),
            on_sample_rate,
        );
    }
    if let Some(add_console_command) = table.add_console_command {
        add_console_command(b"sample\0".as_ptr().cast(), on_console, table.pid);
    }
}

#[export_name = "server_online"]
pub extern "C" fn server_online() {
    let name = unsafe { hpm_import::<c_char>(b"server_name\0".as_ptr().cast()) };
    println!("[sample] running on '{}'", text(name));
}

#[export_name = "plugin_final"]
pub extern "C" fn plugin_final() {
    println!("[sample] handled {} packets", PACKETS.load(Ordering::Relaxed));
}
