use ccpe_core::{ExportFlags, ImportOptions, PackageIndex, Settings, ShipMetaData};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ccpe",
    about = "Export and import Cobalt Core ship packages (.ccpj)",
    version
)]
struct Cli {
    /// Profile folder holding Slot0..Slot2 (defaults to the saved or standard location)
    #[arg(long, global = true)]
    profile_root: Option<PathBuf>,
    /// Game install folder (defaults to the saved folder or a Steam library lookup)
    #[arg(long, global = true)]
    game_root: Option<PathBuf>,
    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List packages in the mod folder
    Ships(FolderArgs),
    /// Export categories of a save slot into a new package
    Export(ExportArgs),
    /// Merge a package into a save slot
    Import(ImportArgs),
    /// Bundle every package of a folder into a zip archive
    Pack(PackArgs),
    /// Get value at JSON pointer in a save or package
    Get(PointerArgs),
    /// List children at JSON pointer in a save or package
    List(PointerArgs),
    /// Keep listing packages as the mod folder changes
    Watch(FolderArgs),
    /// Show or update persisted settings
    Config(ConfigArgs),
}

#[derive(ClapArgs, Debug)]
struct FolderArgs {
    /// Folder to scan (defaults to <game root>/ShipMods)
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct ExportArgs {
    /// Save slot (0-2, defaults to the last one used)
    #[arg(long)]
    slot: Option<usize>,
    /// Ship name shown to other players
    #[arg(long)]
    name: String,
    /// Author (defaults to the saved author name)
    #[arg(long)]
    author: Option<String>,
    #[arg(long, default_value = "")]
    description: String,
    /// Mod required by this package (repeatable)
    #[arg(long = "require")]
    required_mods: Vec<String>,
    #[arg(long)]
    ship: bool,
    #[arg(long)]
    artifacts: bool,
    #[arg(long)]
    deck: bool,
    #[arg(long)]
    map: bool,
    #[arg(long)]
    characters: bool,
    /// Output folder (defaults to <game root>/ShipMods)
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct ImportArgs {
    /// Save slot (0-2, defaults to the last one used)
    #[arg(long)]
    slot: Option<usize>,
    /// Package file to import
    #[arg(long, conflicts_with = "index")]
    file: Option<PathBuf>,
    /// Index of a package as printed by `ships`
    #[arg(long, required_unless_present = "file")]
    index: Option<usize>,
    /// Folder the index refers to (defaults to <game root>/ShipMods)
    #[arg(long)]
    folder: Option<PathBuf>,
    /// Keep the current map position
    #[arg(long, default_value_t = false)]
    no_reset_position: bool,
    /// Do not write a .backup copy of the save first
    #[arg(long, default_value_t = false)]
    no_backup: bool,
}

#[derive(ClapArgs, Debug)]
struct PackArgs {
    /// Output .zip path
    #[arg(long, value_name = "ZIP")]
    out: PathBuf,
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct PointerArgs {
    /// Save or package file
    path: PathBuf,
    /// JSON Pointer, e.g. /ship/parts/0
    #[arg(long, default_value = "")]
    ptr: String,
}

#[derive(ClapArgs, Debug)]
struct ConfigArgs {
    #[arg(long)]
    set_profile_root: Option<PathBuf>,
    #[arg(long)]
    set_game_root: Option<PathBuf>,
    #[arg(long)]
    set_author: Option<String>,
    #[arg(long)]
    set_slot: Option<usize>,
}

struct Ctx {
    settings: Settings,
    settings_path: Option<PathBuf>,
    profile_root: Option<PathBuf>,
    game_root: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let settings_path = Settings::default_path();
    let settings = settings_path
        .as_deref()
        .map(|p| Settings::load(p).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable settings");
            Settings::default()
        }))
        .unwrap_or_default();
    let ctx = Ctx {
        profile_root: cli.profile_root.or_else(|| settings.resolve_profile_root()),
        game_root: cli.game_root.or_else(|| settings.resolve_game_root()),
        settings,
        settings_path,
    };

    match cli.cmd {
        Cmd::Ships(a) => cmd_ships(&ctx, a),
        Cmd::Export(a) => cmd_export(ctx, a),
        Cmd::Import(a) => cmd_import(ctx, a),
        Cmd::Pack(a) => cmd_pack(&ctx, a),
        Cmd::Get(a) => cmd_get(a),
        Cmd::List(a) => cmd_list(a),
        Cmd::Watch(a) => cmd_watch(&ctx, a),
        Cmd::Config(a) => cmd_config(ctx, a),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(code: i32, msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", msg);
    std::process::exit(code);
}

fn mod_folder(ctx: &Ctx, folder: Option<PathBuf>) -> PathBuf {
    if let Some(f) = folder {
        return f;
    }
    let Some(root) = &ctx.game_root else {
        fail(2, "game folder not found; pass --game-root or --folder");
    };
    ccpe_core::locations::ensure_mod_folder(root).unwrap_or_else(|e| fail(2, e))
}

fn slot_save(ctx: &mut Ctx, slot: Option<usize>) -> PathBuf {
    let slot = ctx.settings.slot_or_last(slot).unwrap_or_else(|e| fail(2, e));
    let Some(root) = &ctx.profile_root else {
        fail(2, "profile folder not found; pass --profile-root");
    };
    let save = ccpe_core::locations::existing_slot(root, slot).unwrap_or_else(|e| fail(2, e));
    if ctx.settings.last_selected_profile != Some(slot) {
        ctx.settings.last_selected_profile = Some(slot);
        persist_settings(ctx);
    }
    save
}

fn load_index(folder: PathBuf) -> PackageIndex {
    let mut index = PackageIndex::new(folder);
    index.refresh_if_dirty().unwrap_or_else(|e| fail(3, e));
    index
}

fn print_ships(index: &PackageIndex) {
    for (i, ship) in index.ships().iter().enumerate() {
        let mods = if ship.meta.required_mods.is_empty() {
            String::new()
        } else {
            format!("\t(requires {})", ship.meta.required_mods.join(", "))
        };
        println!("{}\t{}\tby {}\t{}{}", i, ship.meta.name, ship.meta.author, ship.path, mods);
        if !ship.meta.description.is_empty() {
            println!("\t{}", ship.meta.description);
        }
    }
}

fn cmd_ships(ctx: &Ctx, args: FolderArgs) {
    let index = load_index(mod_folder(ctx, args.folder));
    print_ships(&index);
}

fn cmd_export(mut ctx: Ctx, args: ExportArgs) {
    let save = slot_save(&mut ctx, args.slot);
    let folder = mod_folder(&ctx, args.folder);
    let mut flags = ExportFlags {
        ship: args.ship,
        artifacts: args.artifacts,
        deck: args.deck,
        map: args.map,
        characters: args.characters,
    };
    if flags == ExportFlags::default() {
        flags.ship = true;
    }
    let author = args.author.unwrap_or_else(|| ctx.settings.author_name.clone());
    let meta = ShipMetaData {
        name: args.name,
        author: author.clone(),
        description: args.description,
        required_mods: args.required_mods,
    };
    if meta.name.trim().is_empty() {
        fail(2, "ship name must not be empty");
    }
    let out = ccpe_core::export_slot(&save, &folder, flags, &meta).unwrap_or_else(|e| fail(4, e));
    println!("{}", out.display());

    if ctx.settings.author_name != author {
        ctx.settings.author_name = author;
        persist_settings(&ctx);
    }
}

fn cmd_import(mut ctx: Ctx, args: ImportArgs) {
    let save = slot_save(&mut ctx, args.slot);
    let json = match (args.file, args.index) {
        (Some(file), _) => std::fs::read_to_string(&file).unwrap_or_else(|e| fail(3, format!("{}: {}", file.display(), e))),
        (None, Some(i)) => {
            let index = load_index(mod_folder(&ctx, args.folder));
            match index.load(i) {
                Ok(Some(json)) => json,
                Ok(None) => fail(3, format!("package {} is no longer available", i)),
                Err(e) => fail(3, e),
            }
        }
        (None, None) => fail(2, "pass --file or --index"),
    };
    let options = ImportOptions {
        reset_position: !args.no_reset_position,
        backup: !args.no_backup,
    };
    let outcome = ccpe_core::import_into_slot(&save, &json, options).unwrap_or_else(|e| fail(4, e));
    if let Some(b) = &outcome.backup {
        println!("backup\t{}", b.display());
    }
    for key in &outcome.report.applied {
        println!("applied\t{}", key);
    }
    for (key, err) in &outcome.report.skipped {
        println!("skipped\t{}\t{}", key, err);
    }
}

fn cmd_pack(ctx: &Ctx, args: PackArgs) {
    let folder = mod_folder(ctx, args.folder);
    let n = ccpe_core::pack_folder(&folder, &args.out).unwrap_or_else(|e| fail(4, e));
    println!("{}\t{} packages", args.out.display(), n);
}

fn load_json(path: &Path) -> serde_json::Value {
    ccpe_core::read_json_file(path).unwrap_or_else(|e| fail(2, e))
}

fn cmd_get(args: PointerArgs) {
    let v = load_json(&args.path);
    match ccpe_core::get_by_pointer(&v, &args.ptr) {
        Some(x) => println!("{}", serde_json::to_string_pretty(&x).unwrap_or_else(|e| fail(2, e))),
        None => fail(3, format!("not found: {}", args.ptr)),
    }
}

fn cmd_list(args: PointerArgs) {
    let v = load_json(&args.path);
    match ccpe_core::list_children(&v, &args.ptr) {
        Ok(children) => {
            for c in children {
                println!(
                    "{}\t{}{}",
                    c.key,
                    c.kind,
                    c.len.map(|n| format!("\t(len={})", n)).unwrap_or_default()
                );
            }
        }
        Err(e) => fail(3, e),
    }
}

fn cmd_watch(ctx: &Ctx, args: FolderArgs) {
    use notify::{RecursiveMode, Watcher};

    let folder = mod_folder(ctx, args.folder);
    let mut index = PackageIndex::new(folder.clone());
    let invalidator = index.invalidator();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(_) => invalidator.invalidate(),
        Err(e) => tracing::warn!(error = %e, "watch error"),
    })
    .unwrap_or_else(|e| fail(2, e));
    watcher
        .watch(&folder, RecursiveMode::Recursive)
        .unwrap_or_else(|e| fail(2, e));

    loop {
        match index.refresh_if_dirty() {
            Ok(true) => {
                println!("-- {} packages in {}", index.ships().len(), folder.display());
                print_ships(&index);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "rescan failed"),
        }
        std::thread::sleep(Duration::from_millis(500));
    }
}

fn persist_settings(ctx: &Ctx) {
    if let Some(p) = &ctx.settings_path
        && let Err(e) = ctx.settings.save(p)
    {
        tracing::warn!(error = %e, "could not save settings");
    }
}

fn cmd_config(mut ctx: Ctx, args: ConfigArgs) {
    use ccpe_core::locations::{SLOT_COUNT, is_game_root, is_profile_root};

    if let Some(p) = args.set_profile_root {
        if !is_profile_root(&p) {
            fail(2, format!("no Slot[0-2]/Save.json in {}", p.display()));
        }
        ctx.settings.last_selected_root = Some(p);
    }
    if let Some(p) = args.set_game_root {
        if !is_game_root(&p) {
            fail(2, format!("not a Cobalt Core install: {}", p.display()));
        }
        ctx.settings.last_selected_game_root = Some(p);
    }
    if let Some(a) = args.set_author {
        ctx.settings.author_name = a;
    }
    if let Some(s) = args.set_slot {
        if s >= SLOT_COUNT {
            fail(2, format!("slot must be 0..{}", SLOT_COUNT - 1));
        }
        ctx.settings.last_selected_profile = Some(s);
    }
    persist_settings(&ctx);

    let show = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".into());
    println!("settings\t{}", show(&ctx.settings_path));
    println!("profile_root\t{}", show(&ctx.settings.last_selected_root));
    println!("game_root\t{}", show(&ctx.settings.last_selected_game_root));
    println!("author\t{}", ctx.settings.author_name);
    println!(
        "slot\t{}",
        ctx.settings.last_selected_profile.map(|s| s.to_string()).unwrap_or_else(|| "-".into())
    );
    if let Some(root) = &ctx.profile_root {
        let slots = ccpe_core::locations::valid_slots(root);
        println!("active_profile_root\t{}\t{:?}", root.display(), slots);
    }
    if let Some(root) = &ctx.game_root {
        println!("active_game_root\t{}", root.display());
    }
}
