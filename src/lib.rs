//! api-history: Replayable API Change History
//!
//! Don't store every dump, store what changed.
//!
//! Change history for a versioned API surface (classes, members, enums,
//! enum items):
//! - Structural diff between API dumps, one action per changed field
//! - Append-only ledger indexed by class, member, enum, item and type
//! - Cursor that replays the ledger forward or backward to any build
//! - Incremental merge of a build archive against a stored history
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`archive`] | Build archive access (directory-backed and in-memory) |
//! | [`codec`] | Persisted JSON form of a history |
//! | [`cursor`] | Replay engine over the update chain |
//! | [`diff`] | Snapshot diff, inversion and patching |
//! | [`dump`] | In-memory API dump snapshot |
//! | [`error`] | Crate error type |
//! | [`history`] | Ledger of updates and changes with per-entity indexes |
//! | [`id`] | Entity identifiers and composite index keys |
//! | [`merge`] | Merge engine and the merge entrypoint |
//! | [`tags`] | Tag and security context normalization |
//! | [`version`] | Four-part build versions |
//!
//! # Quick Start
//!
//! ```
//! use api_history::{diff, Build, Class, Cursor, Member, MemberKind, Root, Snapshot, UpdateId};
//!
//! let v1 = Snapshot::new().with_class(
//!     "Foo",
//!     Class::default().with_member("Bar", Member::new(MemberKind::Property)),
//! );
//! let v2 = Snapshot::new();
//!
//! let mut root = Root::new();
//! let b1 = Build::new("g1", "2020-01-01T00:00:00Z".parse().unwrap());
//! let b2 = Build::new("g2", "2020-02-01T00:00:00Z".parse().unwrap());
//! root.append_update(&b1, diff(None, &v1), None);
//! root.append_update(&b2, diff(Some(&v1), &v2), Some(&v1));
//!
//! // Removing Foo is also recorded against Foo.Bar
//! assert_eq!(root.member_changes("Foo", "Bar").len(), 2);
//!
//! // Replay back to the first build
//! let mut cursor = Cursor::new();
//! assert!(cursor.roll(&root, UpdateId(1)));
//! assert!(cursor.roll(&root, UpdateId(0)));
//! assert_eq!(cursor.dump(), &v1);
//! ```
//!
//! Author: Moroya Sakamoto

pub mod archive;
pub mod codec;
pub mod cursor;
pub mod diff;
pub mod dump;
pub mod error;
pub mod history;
pub mod id;
pub mod merge;
pub mod tags;
pub mod version;

pub use archive::{Archive, Build, DirArchive, MemoryArchive};
pub use codec::{read_history, write_history};
pub use cursor::Cursor;
pub use diff::{apply, diff, inverse, Action, ActionType, Element};
pub use dump::{Class, Enum, EnumItem, Fields, Member, MemberKind, Parameter, Snapshot, TypeDesc, Value};
pub use error::{Error, Result};
pub use history::{Change, ChangeId, Objects, RefContainer, Root, TypeRef, Update, UpdateId};
pub use id::{EnumItemKey, MemberKey, TypeKey};
pub use merge::{merge_history, run, MergeConfig, MergeReport, MergeResult};
pub use tags::normalize_tags;
pub use version::Version;
