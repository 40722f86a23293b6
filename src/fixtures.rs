#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::fmt;
    use std::net::IpAddr;
    use std::str::FromStr;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use crate::schema::{Field, Record, Schema, Shape};

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TestLoadConfig {
        pub host: String,
        pub port: i64,
        pub enabled: bool,
        pub timeout: Duration,
        pub mode: Mode,
        pub sub: TestSub,
        pub sub2: Option<TestSub2>,
        pub slice: Vec<String>,
        pub servers: Vec<TestServer>,
        pub labels: HashMap<String, String>,
        pub flags: [bool; 2],
    }

    impl Schema for TestLoadConfig {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("host").default("localhost"))
                .field(Field::new::<i64>("port").default(8080))
                .field(Field::new::<bool>("enabled").default(true))
                .field(Field::new::<Duration>("timeout").default("30s"))
                .field(Field::new::<Mode>("mode").default("fast"))
                .field(Field::new::<TestSub>("sub"))
                .field(Field::new::<Option<TestSub2>>("sub2"))
                .field(Field::new::<Vec<String>>("slice"))
                .field(Field::new::<Vec<TestServer>>("servers"))
                .field(Field::new::<HashMap<String, String>>("labels"))
                .field(Field::new::<[bool; 2]>("flags"))
                .into()
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TestSub {
        pub name: String,
    }

    impl Schema for TestSub {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("name").default("sub-default"))
                .into()
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TestSub2 {
        pub name: String,
        pub other: String,
    }

    impl Schema for TestSub2 {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("name"))
                .field(Field::new::<String>("other").default("sub2-default"))
                .into()
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TestServer {
        pub host: String,
        pub port: u16,
    }

    impl Schema for TestServer {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("host").default("0.0.0.0"))
                .field(Field::new::<u16>("port"))
                .into()
        }
    }

    // -- A text leaf defined outside the crate ----------------------------------

    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Mode {
        Fast,
        Slow,
    }

    impl FromStr for Mode {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.to_ascii_lowercase().as_str() {
                "fast" => Ok(Mode::Fast),
                "slow" => Ok(Mode::Slow),
                other => Err(format!("unknown mode '{other}'")),
            }
        }
    }

    impl fmt::Display for Mode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Mode::Fast => f.write_str("fast"),
                Mode::Slow => f.write_str("slow"),
            }
        }
    }

    impl Schema for Mode {
        fn shape() -> Shape {
            Shape::text::<Mode>()
        }
    }

    // -- Shape-only fixtures for index tests ------------------------------------

    pub struct IndexTestConfig;
    pub struct IndexServer;
    pub struct IndexSettings;
    pub struct IndexName;
    pub struct IndexDb;

    impl Schema for IndexTestConfig {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<IndexServer>("server"))
                .field(Field::new::<IndexDb>("db"))
                .into()
        }
    }

    impl Schema for IndexServer {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("host"))
                .field(Field::new::<i64>("port"))
                .field(Field::new::<Vec<IpAddr>>("white_list").key("WL"))
                .field(Field::new::<HashMap<u32, IpAddr>>("route"))
                .field(Field::new::<[bool; 2]>("flags"))
                .field(Field::new::<bool>("very_long_name"))
                .field(Field::new::<String>("api_url"))
                .field(Field::new::<Vec<IndexSettings>>("settings"))
                .field(Field::new::<IndexName>("settings2").flatten())
                .field(Field::new::<IndexName>("settings3").skip())
                .field(Field::new::<String>("hidden").skip())
                .into()
        }
    }

    impl Schema for IndexSettings {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("name"))
                .field(Field::new::<i64>("value"))
                .field(Field::new::<HashMap<String, String>>("tags"))
                .into()
        }
    }

    impl Schema for IndexName {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("name"))
                .into()
        }
    }

    impl Schema for IndexDb {
        fn shape() -> Shape {
            Record::of::<Self>()
                .field(Field::new::<String>("user"))
                .field(Field::new::<HashMap<String, String>>("tags"))
                .into()
        }
    }
}
