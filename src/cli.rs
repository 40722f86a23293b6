//! Clap adapter for layerfig flags.
//!
//! This module is the **optional integration layer** between layerfig's
//! parser-agnostic flag layer and the [clap](https://docs.rs/clap) CLI parser.
//! It is compiled only when the `clap` Cargo feature is enabled (on by
//! default).
//!
//! [`ArgFlag`] snapshots one argument of a parsed `ArgMatches`: whether the
//! user passed it, its declared kind (detected from the argument's value
//! parser) and its value. [`Flags::bind_arg`] looks the argument up on the
//! command, snapshots it and binds it to a target in one step:
//!
//! ```ignore
//! let cmd = Command::new("app").arg(Arg::new("port").long("port").value_parser(value_parser!(u16)));
//! let matches = cmd.clone().get_matches();
//!
//! let mut flags = Flags::new(None);
//! flags.bind_arg(&cmd, &matches, "Port", "port")?;
//! ```
//!
//! If you use a different CLI parser, implement [`FlagSource`] instead.

use std::net::IpAddr;
use std::time::Duration;

use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, Command};

use crate::error::LayerfigError;
use crate::flags::{FlagKind, FlagSource, FlagValue, Flags};

/// One clap argument, read out of `ArgMatches`.
#[derive(Debug, Clone)]
pub struct ArgFlag {
    name: String,
    set: bool,
    kind: FlagKind,
    value: Option<FlagValue>,
    raw: Option<String>,
    parent: String,
    persistent: bool,
}

impl ArgFlag {
    /// Reads argument `id` of `cmd` from `matches`.
    ///
    /// `matches` must come from parsing `cmd` (or a clone of it).
    pub fn from_command(cmd: &Command, matches: &ArgMatches, id: &str) -> Option<Self> {
        let arg = cmd.get_arguments().find(|arg| arg.get_id() == id)?;
        let multi = matches!(arg.get_action(), ArgAction::Append)
            || arg
                .get_num_args()
                .is_some_and(|range| range.max_values() > 1);

        let set = matches!(
            matches.value_source(id),
            Some(source) if source != ValueSource::DefaultValue
        );
        let (kind, value) = detect(matches, id, multi);
        let raw = matches.try_get_raw(id).ok().flatten().map(|values| {
            values
                .map(|v| v.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(",")
        });

        Some(Self {
            name: id.to_string(),
            set,
            kind,
            value,
            raw,
            parent: cmd.get_name().to_string(),
            persistent: arg.is_global_set(),
        })
    }

    /// Name of the command the argument was read from.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Whether the argument is declared `global` and so shared with
    /// subcommands.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

impl FlagSource for ArgFlag {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_set(&self) -> bool {
        self.set
    }

    fn kind(&self) -> FlagKind {
        self.kind
    }

    fn typed_value(&self, _kind: FlagKind) -> Result<FlagValue, String> {
        self.value
            .clone()
            .ok_or_else(|| format!("no value for '{}'", self.name))
    }

    fn raw_value(&self) -> Option<String> {
        self.raw.clone()
    }
}

impl Flags {
    /// Binds argument `id` of `cmd` to `target`.
    pub fn bind_arg(
        &mut self,
        cmd: &Command,
        matches: &ArgMatches,
        target: &str,
        id: &str,
    ) -> Result<(), LayerfigError> {
        if target.is_empty() {
            return Err(LayerfigError::EmptyTarget);
        }
        let flag = ArgFlag::from_command(cmd, matches, id).ok_or_else(|| LayerfigError::FlagNotFound {
            flag: id.to_string(),
            target: target.to_string(),
        })?;
        let parent = Some(flag.parent.clone());
        let persistent = flag.persistent;
        self.insert(target, Box::new(flag), parent, persistent)
    }
}

macro_rules! detect_types {
    ($matches:expr, $id:expr, $multi:expr; $($ty:ty => $kind:ident, $list:ident, $conv:expr);* $(;)?) => {
        $(
            if $multi {
                if let Ok(values) = $matches.try_get_many::<$ty>($id) {
                    let items = values
                        .map(|values| values.cloned().map($conv).collect())
                        .unwrap_or_default();
                    return (FlagKind::$list, Some(FlagValue::List(items)));
                }
            } else if let Ok(value) = $matches.try_get_one::<$ty>($id) {
                return (FlagKind::$kind, value.cloned().map($conv));
            }
        )*
    };
}

/// Finds the kind of argument `id` by trying the typed accessors in turn.
fn detect(matches: &ArgMatches, id: &str, multi: bool) -> (FlagKind, Option<FlagValue>) {
    detect_types! { matches, id, multi;
        String => String, StringList, FlagValue::Str;
        bool => Bool, BoolList, FlagValue::Bool;
        i64 => Int, IntList, FlagValue::Int;
        i32 => Int, IntList, |v: i32| FlagValue::Int(v.into());
        i16 => Int, IntList, |v: i16| FlagValue::Int(v.into());
        i8 => Int, IntList, |v: i8| FlagValue::Int(v.into());
        u64 => Uint, UintList, FlagValue::Uint;
        u32 => Uint, UintList, |v: u32| FlagValue::Uint(v.into());
        u16 => Uint, UintList, |v: u16| FlagValue::Uint(v.into());
        u8 => Uint, UintList, |v: u8| FlagValue::Uint(v.into());
        usize => Uint, UintList, |v: usize| FlagValue::Uint(v as u64);
        f64 => Float, FloatList, FlagValue::Float;
        f32 => Float, FloatList, |v: f32| FlagValue::Float(v.into());
        Duration => Duration, DurationList, FlagValue::Duration;
        IpAddr => Ip, IpList, FlagValue::Ip;
    }
    (FlagKind::Other, None)
}
