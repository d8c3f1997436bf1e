//! Loads the `plugin_sample` shared library through the platform loader.
//!
//! The library is built into a scratch target directory on first use, so
//! these tests exercise the exports `hpm_plugin!` actually writes rather than
//! a hand-built export table.

use hpm_abi::symbols;
use hpm_abi::{ConfCategory, EventKind, PacketHookPoint, ServerType, DATACHECK_VERSION};
use plugin_system::datacheck::CORE_DATACHECK;
use plugin_system::{
    host, DynamicLibraryLoader, ModuleLoader, PacketBuffer, PacketParse, PluginManager, Session,
};
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::CStr;
use std::os::raw::{c_uint, c_void};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

const SAMPLE_PACKET: u16 = 0x7f01;

fn sample_library() -> &'static Path {
    static LIBRARY: OnceLock<PathBuf> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("../plugin_sample/Cargo.toml");
        let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("plugin_sample");
        let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());

        let output = Command::new(cargo)
            .arg("build")
            .arg("--manifest-path")
            .arg(&manifest)
            .arg("--target-dir")
            .arg(&target_dir)
            .output()
            .expect("failed to run cargo");
        assert!(
            output.status.success(),
            "building plugin_sample failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );

        let library = target_dir
            .join("debug")
            .join(format!("{}plugin_sample{}", DLL_PREFIX, DLL_SUFFIX));
        assert!(library.exists(), "missing {}", library.display());
        library
    })
}

#[test]
fn test_macro_exports_match_lookup_names() {
    let module = DynamicLibraryLoader.open(sample_library()).unwrap();

    for name in [
        symbols::PLUGIN_INFO,
        symbols::IMPORT_SYMBOL,
        symbols::INTERFACE,
        symbols::INTERFACE_STORAGE,
        symbols::SHARED_SYMBOLS,
        symbols::DATACHECK,
        symbols::DATACHECK_LEN,
        symbols::DATACHECK_VER,
    ] {
        assert!(module.symbol(name).is_some(), "{} is not exported", name);
    }
    for kind in [EventKind::PreInit, EventKind::Init, EventKind::Ready, EventKind::Final] {
        assert!(module.symbol(kind.export_name()).is_some(), "{:?} is not exported", kind);
    }

    assert!(module.symbol(EventKind::PostFinal.export_name()).is_none());
    assert!(module.symbol(symbols::HOOKED).is_none());
    assert!(module.symbol(symbols::ADD_HOOK).is_none());
    assert!(module.symbol("no_such_export").is_none());

    // The data slots resolve to the plugin's statics, not to null.
    let len = module.symbol(symbols::DATACHECK_LEN).unwrap();
    assert_eq!(unsafe { *len.as_ptr().cast::<c_uint>() }, 2);
}

#[test]
fn test_native_plugin_lifecycle() {
    let library = sample_library();
    host::uninstall();
    let manager = host::install(PluginManager::new(ServerType::MAP));
    unsafe { manager.datacheck_init(&CORE_DATACHECK, DATACHECK_VERSION) };

    static SERVER_NAME: &[u8] = b"map-server\0";
    manager.share(SERVER_NAME.as_ptr() as *mut c_void, "server_name");

    let idx = manager.load(library).unwrap().expect("sample applies to every role");
    assert!(manager.exists(library));
    assert_eq!(manager.pid2name(idx), "sample");
    assert_eq!(manager.list_plugins()[0].version, "0.1.0");
    assert_eq!(manager.interface(idx).map(|table| table.pid), Some(idx));

    // Loading the same file again is skipped.
    assert_eq!(manager.load(library).unwrap(), None);

    manager.event(EventKind::PreInit);
    let args = manager.cmdline().args();
    assert!(args.iter().any(|arg| arg.name == "--sample-verbose" && arg.pid == idx));
    manager.cmdline().exec(&["--sample-verbose"]).unwrap();

    manager.event(EventKind::Init);
    assert_eq!(manager.packets().owner(SAMPLE_PACKET, PacketHookPoint::CLIF_PARSE), Some(idx));
    assert_eq!(manager.conf().owner("sample_rate", ConfCategory::BATTLE), Some(idx));
    assert!(manager
        .console()
        .commands()
        .iter()
        .any(|(name, pid)| name == "sample" && *pid == idx));

    let mut session = Session::new(7);
    session.feed(&[0x01, 0x7f, 0x06, 0x00, 0xaa, 0xbb]);
    assert_eq!(manager.parse_packets(&mut session, PacketHookPoint::CLIF_PARSE), PacketParse::Handled);
    assert_eq!(session.consumed(), 6);
    assert!(session.remaining().is_empty());

    // Only the length header has arrived.
    session.feed(&[0x01, 0x7f, 0x08, 0x00]);
    assert_eq!(manager.parse_packets(&mut session, PacketHookPoint::CLIF_PARSE), PacketParse::Incomplete);

    let rate = CStr::from_bytes_with_nul(b"5\0").unwrap();
    assert!(manager.parse_conf("sample_rate", rate, ConfCategory::BATTLE));
    assert!(manager.run_command("sample"));

    manager.event(EventKind::Ready);
    manager.event(EventKind::Final);

    assert!(manager.unload(idx));
    assert!(!manager.exists(library));
    assert_eq!(manager.pid2name(idx), "UnknownPlugin");

    manager.shutdown();
    assert_eq!(manager.packets().owner(SAMPLE_PACKET, PacketHookPoint::CLIF_PARSE), None);
    manager.datacheck_final();
    host::uninstall();
}
