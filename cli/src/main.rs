use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracker_engine::{
    Attack, Collection, Combat, Dice, DiceTray, HandleFile, LocationPicker, Notifier, Npc,
    PresetPicker, RecordStore, Scalar, Severity, TrackerConfig, Translator,
};

mod views;

/// How many records the list views show unless `--all` is given.
const RECENT_LIMIT: usize = 5;

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "NPC and combat tracker for game masters")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct Overrides {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the default database file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Directory for the local fallback copy and the remembered location
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Directory exports are written to
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,
    /// Database name, used for file names
    #[arg(long, global = true)]
    db_name: Option<String>,
    /// Interface language (fr, en, ...)
    #[arg(long, global = true)]
    lang: Option<String>,
    /// Open (or create) the database at this path
    #[arg(long, global = true)]
    open: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load or create the database and print collection sizes
    Init,
    /// Manage NPC sheets
    Npc {
        #[command(subcommand)]
        cmd: NpcCmd,
    },
    /// Manage combats
    Combat {
        #[command(subcommand)]
        cmd: CombatCmd,
    },
    /// Print one record as JSON
    Get { collection: String, id: String },
    /// Change fields of a record
    Update {
        collection: String,
        id: String,
        /// `key=value`; values are read as JSON when they parse, text otherwise
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<(String, Value)>,
    },
    /// Remove a record
    Delete { collection: String, id: String },
    /// Write the whole database to the export directory
    Export,
    /// Replace the whole database with a previously exported file
    Import { file: PathBuf },
    /// Roll dice, e.g. `tracker roll 2d6 1d20`
    Roll {
        #[arg(required = true)]
        dice: Vec<String>,
        /// RNG seed for determinism
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List available languages
    Languages,
    /// Translate a key
    T { key: String },
}

#[derive(Subcommand)]
enum NpcCmd {
    /// Record a new NPC
    Add(NpcArgs),
    /// Most recently created NPCs
    List {
        #[arg(long)]
        all: bool,
    },
    /// Full NPC sheet
    Show { id: String },
}

#[derive(Args)]
struct NpcArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    class: Option<String>,
    /// Challenge rating
    #[arg(long)]
    fp: Option<String>,
    #[arg(long)]
    init: Option<String>,
    #[arg(long)]
    perception: Option<String>,
    /// Hit points
    #[arg(long)]
    pv: Option<String>,
    #[arg(long)]
    vd: Option<String>,
    #[arg(long)]
    ce: Option<String>,
    #[arg(long)]
    cc: Option<String>,
    #[arg(long = "ref")]
    reflex: Option<String>,
    #[arg(long)]
    vig: Option<String>,
    #[arg(long)]
    vol: Option<String>,
    #[arg(long)]
    immunities: Option<String>,
    /// `name|modifier|damage|type|note`, repeatable
    #[arg(long = "attack", value_parser = parse_attack)]
    attacks: Vec<Attack>,
    #[arg(long)]
    details: Option<String>,
}

#[derive(Subcommand)]
enum CombatCmd {
    /// Record a new combat
    Add {
        #[arg(long)]
        scenario: String,
        #[arg(long)]
        scene: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Most recently created combats
    List {
        #[arg(long)]
        all: bool,
    },
    /// Combat details
    Show { id: String },
}

fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got: {s}"))?;
    if key.is_empty() {
        return Err(format!("empty key in: {s}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}

fn parse_attack(s: &str) -> Result<Attack, String> {
    let mut parts = s.split('|').map(str::trim).map(|p| {
        (!p.is_empty()).then(|| p.to_string())
    });
    let attack = Attack {
        name: parts.next().flatten(),
        modifier: parts.next().flatten(),
        damage: parts.next().flatten(),
        damage_type: parts.next().flatten(),
        note: parts.next().flatten(),
    };
    if attack.name.is_none() {
        return Err(format!("attack needs a name: {s}"));
    }
    Ok(attack)
}

/// Numbers stay numbers; anything else is kept as typed.
fn scalar(value: Option<String>) -> Option<Scalar> {
    value.map(|v| match v.parse::<i64>() {
        Ok(n) => Scalar::from(n),
        Err(_) => Scalar::from(v.as_str()),
    })
}

impl NpcArgs {
    fn into_npc(self) -> Npc {
        Npc {
            name: Some(self.name),
            class: self.class,
            fp: scalar(self.fp),
            init: scalar(self.init),
            perception: scalar(self.perception),
            pv: scalar(self.pv),
            vd: scalar(self.vd),
            ce: scalar(self.ce),
            cc: scalar(self.cc),
            reflex: scalar(self.reflex),
            vig: scalar(self.vig),
            vol: scalar(self.vol),
            immunities: self.immunities,
            attacks: self.attacks,
            details: self.details,
            ..Npc::default()
        }
    }
}

/// Prints notifications to stderr so stdout stays clean for data.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        let _ = writeln!(std::io::stderr(), "[{severity}] {message}");
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(o: &Overrides) -> anyhow::Result<TrackerConfig> {
    let mut config = match &o.config {
        Some(path) => TrackerConfig::from_yaml_file(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(v) = &o.data_dir {
        config.data_dir = v.clone();
    }
    if let Some(v) = &o.cache_dir {
        config.cache_dir = v.clone();
    }
    if let Some(v) = &o.export_dir {
        config.export_dir = v.clone();
    }
    if let Some(v) = &o.db_name {
        config.db_name = v.clone();
    }
    if let Some(v) = &o.lang {
        config.language = v.clone();
    }
    Ok(config)
}

async fn load_translator(config: &TrackerConfig) -> anyhow::Result<Arc<Translator>> {
    let translator = Translator::builtin();
    if let Some(dir) = &config.i18n_dir {
        translator
            .load_dir(dir)
            .await
            .with_context(|| format!("failed to read translations: {}", dir.display()))?;
    }
    translator.set_language(&config.language)?;
    Ok(Arc::new(translator))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli.overrides)?;
    let translator = load_translator(&config).await?;

    match cli.cmd {
        Cmd::Roll { dice, seed } => roll(&dice, seed, &translator),
        Cmd::Languages => {
            let current = translator.language();
            for lang in translator.available() {
                let marker = if lang.code == current { "*" } else { " " };
                println!("{marker} {}\t{}\t{}", lang.code, lang.name, lang.country);
            }
            Ok(())
        }
        Cmd::T { key } => {
            println!("{}", translator.t(&key));
            Ok(())
        }
        cmd => {
            let handle_file = HandleFile::new(config.handle_path());
            let handle = match &cli.overrides.open {
                Some(path) => Some(path.clone()),
                None => handle_file.read().await,
            };
            let picker = cli
                .overrides
                .open
                .as_ref()
                .map(|path| Box::new(PresetPicker::new(path)) as Box<dyn LocationPicker>);
            let store = RecordStore::from_config(&config, picker)
                .handle(handle)
                .notifier(Arc::new(ConsoleNotifier))
                .translator(translator)
                .build();
            let snapshot = store.init().await;

            let result = match cmd {
                Cmd::Init => {
                    for collection in Collection::ALL {
                        println!("{collection}: {}", snapshot.len(collection));
                    }
                    Ok(())
                }
                cmd => run(&store, cmd).await,
            };

            if let Some(handle) = store.handle().await {
                if let Err(e) = handle_file.write(&handle).await {
                    warn!(error = %e, "failed to remember the database location");
                }
            }
            result
        }
    }
}

fn roll(terms: &[String], seed: Option<u64>, tr: &Translator) -> anyhow::Result<()> {
    let mut tray = DiceTray::new();
    for term in terms {
        tray.add_notation(term)?;
    }
    let mut dice = match seed {
        Some(seed) => Dice::from_seed(seed),
        None => Dice::from_entropy(),
    };
    if let Some(result) = tray.roll(&mut dice) {
        println!("{}", result.render(tr));
    }
    Ok(())
}

async fn run(store: &RecordStore, cmd: Cmd) -> anyhow::Result<()> {
    let tr = store.translator().clone();
    match cmd {
        Cmd::Npc { cmd } => match cmd {
            NpcCmd::Add(args) => {
                let id = store.insert(args.into_npc()).await?;
                println!("{id}");
            }
            NpcCmd::List { all } => {
                let limit = if all { usize::MAX } else { RECENT_LIMIT };
                let npcs = store.recent::<Npc>(limit).await?;
                if npcs.is_empty() {
                    println!("{}", tr.t("no_npcs"));
                }
                for npc in &npcs {
                    println!("{}", views::npc_line(npc, &tr));
                }
            }
            NpcCmd::Show { id } => match store.fetch::<Npc>(&id).await? {
                Some(npc) => print!("{}", views::npc_detail(&npc, &tr)),
                None => bail!("npc \"{id}\" not found"),
            },
        },
        Cmd::Combat { cmd } => match cmd {
            CombatCmd::Add {
                scenario,
                scene,
                status,
            } => {
                let combat = Combat {
                    scenario: Some(scenario),
                    scene,
                    status,
                    ..Combat::default()
                };
                println!("{}", store.insert(combat).await?);
            }
            CombatCmd::List { all } => {
                let limit = if all { usize::MAX } else { RECENT_LIMIT };
                let combats = store.recent::<Combat>(limit).await?;
                if combats.is_empty() {
                    println!("{}", tr.t("no_combats"));
                }
                for combat in &combats {
                    println!("{}", views::combat_line(combat, &tr));
                }
            }
            CombatCmd::Show { id } => match store.fetch::<Combat>(&id).await? {
                Some(combat) => print!("{}", views::combat_detail(&combat, &tr)),
                None => bail!("combat \"{id}\" not found"),
            },
        },
        Cmd::Get { collection, id } => match store.get(&collection, &id).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => bail!("record \"{id}\" not found in {collection}"),
        },
        Cmd::Update { collection, id, set } => {
            let Some(mut record) = store.get(&collection, &id).await? else {
                bail!("record \"{id}\" not found in {collection}");
            };
            for (key, value) in set {
                if key == "id" {
                    bail!("the id of a record cannot be changed");
                }
                record.insert(key, value);
            }
            record.insert("updatedAt", tracker_engine::store::now_millis());
            store.update(&collection, record).await?;
        }
        Cmd::Delete { collection, id } => store.delete(&collection, &id).await?,
        Cmd::Export => match store.export().await {
            Ok(export) => {
                store.notify_key("export_success", Severity::Success);
                println!("{}", export.location.display());
            }
            Err(e) => {
                store.notify_key("export_error", Severity::Error);
                return Err(e.into());
            }
        },
        Cmd::Import { file } => import(store, &file).await?,
        Cmd::Init | Cmd::Roll { .. } | Cmd::Languages | Cmd::T { .. } => {}
    }
    Ok(())
}

async fn import(store: &RecordStore, file: &Path) -> anyhow::Result<()> {
    match store.import_file(file).await {
        Ok(()) => {
            store.notify_key("import_success", Severity::Success);
            Ok(())
        }
        Err(e) => {
            store.notify_key("import_error", Severity::Error);
            Err(e).with_context(|| format!("failed to import {}", file.display()))
        }
    }
}
