//! Configuration structs for the layerfig demo application.
//!
//! # Env var mapping
//!
//! With the name `layerfig-demo` the prefix is `LAYERFIG_DEMO_`, and keys come
//! from the index built from [`DemoConfig`]:
//!
//! | Env var                              | Config path            |
//! |--------------------------------------|------------------------|
//! | `LAYERFIG_DEMO_NAME`                 | `name`                 |
//! | `LAYERFIG_DEMO_VERBOSE`              | `verbose`              |
//! | `LAYERFIG_DEMO_SERVER_HOST`          | `server.host`          |
//! | `LAYERFIG_DEMO_SERVER_PORT`          | `server.port`          |
//! | `LAYERFIG_DEMO_SERVER_ALLOWED_IPS`   | `server.allow`         |
//! | `LAYERFIG_DEMO_SERVER_ALLOWED_IPS[0]`| `server.allow[0]`      |
//! | `LAYERFIG_DEMO_SERVER_TIMEOUT`       | `server.timeout`       |
//! | `LAYERFIG_DEMO_TLS_CERT`             | `tls.cert`             |
//! | `LAYERFIG_DEMO_LABELS[team]`         | `labels[team]`         |

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use layerfig::{Field, Record, Schema, Shape};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct DemoConfig {
    /// Application name shown in the echo banner.
    pub name: String,
    pub verbose: bool,
    pub server: ServerConfig,
    /// Only present when a layer mentions it.
    pub tls: Option<TlsConfig>,
    pub labels: HashMap<String, String>,
}

impl Schema for DemoConfig {
    fn shape() -> Shape {
        Record::of::<Self>()
            .field(Field::new::<String>("name").default("layerfig-demo"))
            .field(Field::new::<bool>("verbose"))
            .field(Field::new::<ServerConfig>("server"))
            .field(Field::new::<Option<TlsConfig>>("tls"))
            .field(Field::new::<HashMap<String, String>>("labels"))
            .into()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Addresses allowed to connect. Empty allows everyone.
    pub allow: Vec<IpAddr>,
    pub timeout: Duration,
}

impl Schema for ServerConfig {
    fn shape() -> Shape {
        Record::of::<Self>()
            .field(Field::new::<String>("host").default("127.0.0.1"))
            .field(Field::new::<u16>("port").default(3000))
            .field(Field::new::<Vec<IpAddr>>("allow").key("allowed-ips"))
            .field(Field::new::<Duration>("timeout").default("5s"))
            .into()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub min_version: String,
}

impl Schema for TlsConfig {
    fn shape() -> Shape {
        Record::of::<Self>()
            .field(Field::new::<PathBuf>("cert"))
            .field(Field::new::<PathBuf>("key"))
            .field(Field::new::<String>("min_version").default("1.2"))
            .into()
    }
}
