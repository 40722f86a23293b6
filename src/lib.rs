//! Layered configuration for Rust applications: default literals, one config
//! file, environment variables and CLI flags, resolved into a typed struct.
//!
//! ```ignore
//! let loaded = Layerfig::builder::<AppConfig>()
//!     .name("my-app")
//!     .flags(flags)
//!     .load()?;
//! let config: AppConfig = loaded.config;
//! ```
//!
//! That call looks for `my-app.json|yaml|yml|toml` in the working directory
//! and the home directory, applies `MY_APP_*` environment variables and any
//! flags the user passed, on top of the defaults declared for each field.
//!
//! # Describing a config
//!
//! A config type implements [`Schema`] by describing its fields once. The
//! description drives everything else: which environment keys exist, how
//! string values are coerced, and which defaults are applied.
//!
//! ```ignore
//! impl Schema for AppConfig {
//!     fn shape() -> Shape {
//!         Record::of::<Self>()
//!             .field(Field::new::<String>("host").default("localhost"))
//!             .field(Field::new::<u16>("port").default(8080))
//!             .field(Field::new::<Vec<IpAddr>>("allow").key("ALLOWED"))
//!             .field(Field::new::<Option<Tls>>("tls"))
//!             .into()
//!     }
//! }
//! ```
//!
//! Field names are the serde keys of the struct. Leaf types that are not
//! built in can be declared with [`Shape::text`], which uses `FromStr`.
//!
//! # Layers
//!
//! Lowest priority first:
//!
//! 1. **Defaults.** Every zero-valued field with a default literal gets it.
//!    Optional records stay `None`.
//! 2. **File.** The builder's explicit path, the file named by `CONFIG`, or
//!    the first `{name}.{ext}` found by the search. Fields the file leaves
//!    out keep their defaults, including inside optional records the file
//!    brings into existence.
//! 3. **Environment.** Variables starting with the prefix derived from the
//!    name (`my-app` → `MY_APP_`) are matched against the [`Index`].
//! 4. **Flags.** Bound [`Flags`] that the user explicitly set.
//!
//! # Environment keys
//!
//! The [`Index`] maps an upper snake-case key per field to its dotted path:
//! `SERVER_HOST` → `server.host`. Collections get a bracketed slot, so
//! `SERVERS[2]_PORT` writes `servers[2].port` and `LABELS[env]` writes
//! `labels[env]`. Fields can choose their key, be flattened into their parent
//! or be skipped.
//!
//! # Flags
//!
//! The flag layer is parser-agnostic: anything implementing [`FlagSource`]
//! can be bound. With the `clap` feature (on by default), [`ArgFlag`] and
//! [`Flags::bind_arg`] read arguments straight from `ArgMatches`.
//!
//! # Error handling
//!
//! All fallible operations return [`LayerfigError`];
//! [`LayerfigError::kind`] groups them into structural, discovery,
//! deserialization, lookup and coercion failures.

pub mod env;
pub mod error;
pub mod index;
pub mod schema;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod codec;
mod coerce;
mod document;
mod file;
mod flags;
mod merge;
mod resolve;

#[cfg(test)]
mod fixtures;

pub use builder::{DEFAULT_NAME, Layerfig, LayerfigBuilder};
#[cfg(feature = "clap")]
pub use cli::ArgFlag;
pub use document::Document;
pub use env::EnvLayer;
pub use error::{DecodeError, ErrorKind, LayerfigError};
pub use file::CONFIG_VAR;
pub use flags::{Flag, FlagKind, FlagSource, FlagValue, Flags};
pub use index::{FieldDescriptor, Index};
pub use resolve::{ResolveInput, SourceFile, resolve};
pub use schema::{Field, KeyMode, Record, Scalar, Schema, Shape, Text};
pub use types::{Extension, FileKind, Loaded, SearchPath};
