//! Storage and utilities for a tabletop encounter tracker: NPC sheets and
//! combat records kept in one portable JSON document, plus translations and a
//! dice tray.

pub mod backend;
pub mod collection;
pub mod config;
pub mod content;
pub mod dice;
pub mod error;
pub mod i18n;
pub mod ids;
pub mod model;
pub mod notify;
pub mod store;
pub mod transfer;

pub use backend::{
    Backend, BackendError, BackendKind, DefaultLocation, Handle, HandleFile, LocalCache,
    LocationPicker, MemoryBackend, PickerBackend, PresetPicker, RememberedHandle,
};
pub use collection::{Collection, Record, Snapshot};
pub use config::TrackerConfig;
pub use dice::{Dice, DiceError, DiceTray, RollGroup, TrayRoll, DIE_TYPES};
pub use error::{Result, StoreError};
pub use i18n::{I18nError, LanguageChanged, LanguageInfo, Translator, FALLBACK_LANGUAGE};
pub use ids::{IdGenerator, TimestampIds};
pub use model::{Attack, Combat, Entity, Npc, Scalar};
pub use notify::{Notification, NotificationCenter, Notifier, Severity, TracingNotifier};
pub use store::{Export, Phase, RecordStore, RecordStoreBuilder};
pub use transfer::{export_file_name, DirectorySink, ExportSink, MemorySink};
