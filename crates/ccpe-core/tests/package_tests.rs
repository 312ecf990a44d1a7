use std::fs;
use std::io::Write as _;
use std::path::Path;

use ccpe_core::{ImportOptions, PackageIndex, ShipPath, discover, load_body, read_meta};
use serde_json::json;
use tempfile::tempdir;
use zip::write::FileOptions;

fn package_json(name: &str) -> String {
    json!({
        "__meta": {"Name": name, "Author": "me", "Description": "d", "RequiredMods": ["M1"]},
        "map": {"currentLocation": "(1, 1)"}
    })
    .to_string()
}

fn write_zip(path: &Path, entries: &[(&str, String)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in entries {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Rewrite the compression method of `name` in both its local and central
/// header, turning it into an entry this zip build cannot decompress.
fn set_compression_method(archive: &Path, name: &str, method: u16) {
    let mut bytes = fs::read(archive).unwrap();
    let u16_at = |b: &[u8], at: usize| u16::from_le_bytes([b[at], b[at + 1]]) as usize;
    let mut patched = 0;
    let mut i = 0;
    while i + 4 <= bytes.len() {
        // (method offset, name length offset, name offset)
        let layout = match &bytes[i..i + 4] {
            b"PK\x03\x04" => Some((8, 26, 30)),
            b"PK\x01\x02" => Some((10, 28, 46)),
            _ => None,
        };
        if let Some((method_at, len_at, name_at)) = layout {
            let len = u16_at(&bytes, i + len_at);
            if &bytes[i + name_at..i + name_at + len] == name.as_bytes() {
                bytes[i + method_at..i + method_at + 2].copy_from_slice(&method.to_le_bytes());
                patched += 1;
            }
        }
        i += 1;
    }
    assert_eq!(patched, 2);
    fs::write(archive, bytes).unwrap();
}

#[test]
fn discovers_loose_and_archived_packages() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("loose.ccpj"), package_json("Loose")).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    write_zip(
        &dir.path().join("bundle.zip"),
        &[
            ("a.ccpj", package_json("A")),
            ("sub/b.ccpj", package_json("B")),
            ("readme.md", "ignored".to_string()),
        ],
    );

    let ships = discover(dir.path()).unwrap();
    assert_eq!(ships.len(), 3);
    let loose: Vec<_> = ships.iter().filter(|s| s.path.entry.is_none()).collect();
    assert_eq!(loose.len(), 1);
    assert_eq!(loose[0].meta.name, "Loose");
    assert_eq!(loose[0].meta.required_mods, ["M1"]);

    let archived: Vec<_> = ships.iter().filter(|s| s.path.entry.is_some()).collect();
    assert_eq!(archived.len(), 2);
    assert!(archived.iter().all(|s| s.path.path.ends_with("bundle.zip")));
    let names: Vec<&str> = archived.iter().map(|s| s.meta.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
}

#[test]
fn undecodable_archive_entries_do_not_hide_later_packages() {
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("bundle.zip");
    write_zip(
        &bundle,
        &[
            ("a.ccpj", package_json("A")),
            ("readme.txt", "compressed with something exotic".to_string()),
            ("b.ccpj", package_json("B")),
        ],
    );
    // 12 is bzip2, which the deflate-only build rejects on open
    set_compression_method(&bundle, "readme.txt", 12);

    let ships = discover(dir.path()).unwrap();
    let names: Vec<&str> = ships.iter().map(|s| s.meta.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
}

#[test]
fn undecodable_package_entry_is_skipped_alone() {
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("bundle.zip");
    write_zip(
        &bundle,
        &[("a.ccpj", package_json("A")), ("b.ccpj", package_json("B")), ("c.ccpj", package_json("C"))],
    );
    set_compression_method(&bundle, "b.ccpj", 12);

    let ships = discover(dir.path()).unwrap();
    let names: Vec<&str> = ships.iter().map(|s| s.meta.name.as_str()).collect();
    assert_eq!(names, ["A", "C"]);
}

#[test]
fn extensions_match_regardless_of_case() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Ship.CCPJ"), package_json("Upper")).unwrap();
    write_zip(&dir.path().join("Bundle.ZIP"), &[("Inner.Ccpj", package_json("Inner"))]);

    let ships = discover(dir.path()).unwrap();
    let names: Vec<&str> = ships.iter().map(|s| s.meta.name.as_str()).collect();
    assert_eq!(names, ["Upper", "Inner"]);
    assert_eq!(ships[1].path.entry.as_deref(), Some("Inner.Ccpj"));

    let archive = dir.path().join("out.zip");
    let packed = dir.path().join("packed");
    fs::create_dir_all(&packed).unwrap();
    fs::copy(dir.path().join("Ship.CCPJ"), packed.join("Ship.CCPJ")).unwrap();
    assert_eq!(ccpe_core::pack_folder(&packed, &archive).unwrap(), 1);
}

#[test]
fn loose_files_are_found_recursively_but_archives_only_at_top() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("x/y");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("deep.ccpj"), package_json("Deep")).unwrap();
    write_zip(&nested.join("hidden.zip"), &[("c.ccpj", package_json("C"))]);

    let ships = discover(dir.path()).unwrap();
    assert_eq!(ships.len(), 1);
    assert_eq!(ships[0].meta.name, "Deep");
}

#[test]
fn missing_meta_decodes_to_empty_fields_and_bad_files_are_skipped() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bare.ccpj"), r#"{"ship": {"parts": []}}"#).unwrap();
    fs::write(dir.path().join("broken.ccpj"), "{ not json").unwrap();
    let ships = discover(dir.path()).unwrap();
    assert_eq!(ships.len(), 1);
    assert_eq!(ships[0].meta, ccpe_core::ShipMetaData::default());

    let meta = read_meta(r#"{"__meta": {"Name": 5, "Author": "x"}}"#).unwrap();
    assert_eq!(meta.name, "");
    assert_eq!(meta.author, "x");
}

#[test]
fn load_body_reads_both_kinds_and_tolerates_stale_paths() {
    let dir = tempdir().unwrap();
    let loose = dir.path().join("s.ccpj");
    fs::write(&loose, package_json("S")).unwrap();
    let zip_path = dir.path().join("z.zip");
    write_zip(&zip_path, &[("in.ccpj", package_json("Z"))]);

    let body = load_body(&ShipPath::loose(&loose)).unwrap().unwrap();
    assert!(body.contains("\"S\""));
    let body = load_body(&ShipPath::in_archive(&zip_path, "in.ccpj")).unwrap().unwrap();
    assert!(body.contains("\"Z\""));

    assert!(load_body(&ShipPath::in_archive(&zip_path, "gone.ccpj")).unwrap().is_none());
    fs::remove_file(&loose).unwrap();
    assert!(load_body(&ShipPath::loose(&loose)).unwrap().is_none());
    fs::remove_file(&zip_path).unwrap();
    assert!(load_body(&ShipPath::in_archive(&zip_path, "in.ccpj")).unwrap().is_none());
}

#[test]
fn index_rescans_once_per_invalidation() {
    let dir = tempdir().unwrap();
    let mut index = PackageIndex::new(dir.path());
    assert!(index.refresh_if_dirty().unwrap());
    assert!(index.ships().is_empty());
    assert!(!index.refresh_if_dirty().unwrap());

    fs::write(dir.path().join("one.ccpj"), package_json("One")).unwrap();
    // not seen until someone invalidates
    assert!(!index.refresh_if_dirty().unwrap());
    assert!(index.ships().is_empty());

    let handle = index.invalidator();
    handle.invalidate();
    handle.invalidate();
    index.invalidate();
    assert!(index.refresh_if_dirty().unwrap());
    assert!(!index.refresh_if_dirty().unwrap());
    assert_eq!(index.ships().len(), 1);
    assert!(index.load(0).unwrap().unwrap().contains("One"));
    assert!(index.load(7).unwrap().is_none());
}

#[test]
fn write_and_pack_packages() {
    let dir = tempdir().unwrap();
    let mods = dir.path().join("ShipMods");
    let pkg: serde_json::Value = serde_json::from_str(&package_json("My/Ship?")).unwrap();
    let written = ccpe_core::write_package(&mods, &pkg).unwrap();
    let file_name = written.file_name().unwrap().to_str().unwrap().to_string();
    assert!(file_name.starts_with("MyShip_"), "{file_name}");
    assert!(file_name.ends_with(".ccpj"));

    let text = fs::read_to_string(&written).unwrap();
    assert!(text.starts_with(r#"{"__meta""#));

    let archive = dir.path().join("out.zip");
    assert_eq!(ccpe_core::pack_folder(&mods, &archive).unwrap(), 1);
    let body = load_body(&ShipPath::in_archive(&archive, file_name)).unwrap().unwrap();
    assert_eq!(body, text);
}

fn make_profile(root: &Path) -> std::path::PathBuf {
    let slot = root.join("Slot1");
    fs::create_dir_all(&slot).unwrap();
    let save = json!({
        "ship": {"key": "artemis", "baseEnergy": 3, "baseDraw": 5, "evadeMax": 0,
                 "hpGainFromEliteKills": 1, "hpGainFromBossKills": 3, "chassisUnder": "c",
                 "chassisOver": null, "hull": 9, "hullMax": 10, "shieldMaxBase": 4,
                 "heatMin": 0, "heatTrigger": 3, "overheatDamage": 2,
                 "parts": [{"type": "cockpit", "skin": "c", "flip": false, "damageModifier": "none", "invincible": false}]},
        "artifacts": [],
        "deck": [],
        "map": {"currentLocation": "(5, 5)"},
        "characters": [],
        "runConfig": {"selectedShip": "artemis", "selectedChars": []}
    });
    let path = slot.join("Save.json");
    fs::write(&path, save.to_string()).unwrap();
    path
}

#[test]
fn slot_layout_detection() {
    use ccpe_core::locations::{existing_slot, is_game_root, is_profile_root, valid_slots};
    let dir = tempdir().unwrap();
    assert!(!is_profile_root(dir.path()));
    make_profile(dir.path());
    assert!(is_profile_root(dir.path()));
    assert_eq!(valid_slots(dir.path()), [false, true, false]);
    assert!(existing_slot(dir.path(), 1).is_ok());
    assert!(existing_slot(dir.path(), 0).is_err());
    assert!(existing_slot(dir.path(), 3).is_err());

    let game = dir.path().join("game");
    fs::create_dir_all(game.join("Data")).unwrap();
    assert!(!is_game_root(&game));
    fs::write(game.join("CobaltCore.exe"), b"").unwrap();
    assert!(is_game_root(&game));
    let mods = ccpe_core::locations::ensure_mod_folder(&game).unwrap();
    assert!(mods.ends_with("ShipMods") && mods.is_dir());
}

#[test]
fn steam_library_paths_are_parsed() {
    let vdf = r#"
"libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
		"label"		""
		"apps"
		{
			"228980"		"359718266"
		}
	}
	"1"
	{
		"path"		"/mnt/games/SteamLibrary"
	}
}
"#;
    let libs = ccpe_core::locations::parse_library_folders(vdf);
    assert_eq!(libs.len(), 2);
    assert_eq!(libs[0], Path::new(r"C:\Program Files (x86)\Steam"));
    assert_eq!(libs[1], Path::new("/mnt/games/SteamLibrary"));
}

#[test]
fn steam_library_parsing_follows_vdf_structure() {
    use ccpe_core::locations::parse_library_folders;

    // tokens sharing lines, an escaped quote, and a nested "path" that is not a library
    let vdf = r#""libraryfolders" { "0" { "label" "x" "path" "/games/\"quoted\" lib" }
	"1" { "path" "/games/second" "apps" { "path" "/not/a/library" } }
	"contentstatsid" "-123" }"#;
    let libs = parse_library_folders(vdf);
    assert_eq!(libs, [Path::new("/games/\"quoted\" lib"), Path::new("/games/second")]);

    // older layout: the number maps straight to the path
    let old = r#""LibraryFolders" { "TimeNextStatsReport" "1700000000" "1" "D:\\SteamLibrary" }"#;
    assert_eq!(parse_library_folders(old), [Path::new(r"D:\SteamLibrary")]);

    // other documents and unparsable text list nothing
    assert!(parse_library_folders(r#""AppState" { "0" { "path" "/x" } }"#).is_empty());
    assert!(parse_library_folders("\"libraryfolders\" { \"0\"").is_empty());
}

#[test]
fn slot_falls_back_to_the_last_one_used() {
    let mut settings = ccpe_core::Settings::default();
    assert!(settings.slot_or_last(None).is_err());
    assert_eq!(settings.slot_or_last(Some(2)).unwrap(), 2);
    assert!(settings.slot_or_last(Some(3)).is_err());

    settings.last_selected_profile = Some(1);
    assert_eq!(settings.slot_or_last(None).unwrap(), 1);
    assert_eq!(settings.slot_or_last(Some(0)).unwrap(), 0);

    settings.last_selected_profile = Some(9);
    assert!(settings.slot_or_last(None).is_err());
}

#[test]
fn export_then_import_through_files_with_backup() {
    let dir = tempdir().unwrap();
    let save_path = make_profile(dir.path());
    let mods = dir.path().join("mods");
    let meta = ccpe_core::ShipMetaData { name: "Cockpit".into(), ..Default::default() };
    let flags = ccpe_core::ExportFlags { ship: true, map: true, ..Default::default() };
    let pkg_path = ccpe_core::export_slot(&save_path, &mods, flags, &meta).unwrap();

    let mut save: serde_json::Value = ccpe_core::read_json_file(&save_path).unwrap();
    save["ship"]["parts"] = json!([]);
    save["map"]["currentLocation"] = json!("(8, 8)");
    ccpe_core::write_json_to_file(&save_path, &save).unwrap();

    let pkg = fs::read_to_string(&pkg_path).unwrap();
    let outcome = ccpe_core::import_into_slot(&save_path, &pkg, ImportOptions::default()).unwrap();
    assert!(outcome.report.is_clean());
    let backup = outcome.backup.unwrap();
    assert!(backup.to_string_lossy().ends_with(".backup"));
    let backed_up = ccpe_core::read_json_file(&backup).unwrap();
    assert_eq!(backed_up["map"]["currentLocation"], json!("(8, 8)"));

    let merged = ccpe_core::read_json_file(&save_path).unwrap();
    assert_eq!(merged["ship"]["parts"][0]["type"], json!("cockpit"));
    assert_eq!(merged["ship"]["parts"][0]["active"], json!(true));
    // reset applies after the map itself was overwritten
    assert_eq!(merged["map"]["currentLocation"], json!("(2, 0)"));
}

#[test]
fn settings_roundtrip_and_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg/settings.json");
    let loaded = ccpe_core::Settings::load(&path).unwrap();
    assert_eq!(loaded, ccpe_core::Settings::default());

    let s = ccpe_core::Settings {
        author_name: "me".into(),
        last_selected_profile: Some(2),
        ..Default::default()
    };
    s.save(&path).unwrap();
    assert_eq!(ccpe_core::Settings::load(&path).unwrap(), s);

    fs::write(&path, r#"{"author_name": "partial"}"#).unwrap();
    let partial = ccpe_core::Settings::load(&path).unwrap();
    assert_eq!(partial.author_name, "partial");
    assert_eq!(partial.last_selected_profile, None);
}

#[test]
fn backup_timestamp_format() {
    let ts = ccpe_core::backup::timestamp();
    let (date, time) = ts.split_once('_').unwrap();
    assert_eq!(date.split('-').count(), 3);
    assert_eq!(time.split('-').count(), 3);
    assert_eq!(date.split('-').next().unwrap().len(), 4);
    assert_eq!(ccpe_core::backup::make_valid_file_name("a<b>:c|d"), "abcd");
}
