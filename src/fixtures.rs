#[cfg(test)]
pub mod test {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use chrono::NaiveDate;

    use crate::config::Config;
    use crate::error::StratumError;
    use crate::size::SizeInBytes;
    use crate::spec::{Item, Spec};
    use crate::value::{ConfigValue, Fields, RecordDesc, TypeDesc, Value};

    /// Handles for the items of [`server_spec`].
    #[derive(Clone)]
    pub struct ServerItems {
        /// The application host.
        pub host: Item<String>,
        /// The port number.
        pub port: Item<u16>,
        pub tags: Item<Vec<String>>,
        pub workers: Item<usize>,
        /// Ten times the port, until set.
        pub timeout_ms: Item<u64>,
        /// Connection string URL; required but may be null.
        pub url: Item<Option<String>>,
    }

    /// `server.{host,port,tags,workers,timeout_ms}` plus `server.database.url`.
    pub fn server_spec() -> (Spec, ServerItems) {
        let mut server = Spec::new("server");
        let host = server.optional("host", "localhost".to_string(), "The application host.");
        let port = server.optional("port", 8080u16, "The port number.");
        let tags = server.optional("tags", Vec::new(), "Free-form labels.");
        let workers = server.optional("workers", 4usize, "Worker threads.");
        let from_port = port.clone();
        let timeout_ms = server.lazy("timeout_ms", "Request timeout.", move |c: &Config| {
            Ok(u64::from(c.get(&from_port)?) * 10)
        });

        let mut database = Spec::new("database");
        let url = database.required::<Option<String>>("url", "Connection string URL.");
        server.add_inner(database);

        let items = ServerItems {
            host,
            port,
            tags,
            workers,
            timeout_ms,
            url,
        };
        (server, items)
    }

    /// A root layer with [`server_spec`] registered.
    pub fn server_config() -> (Config, ServerItems) {
        let (spec, items) = server_spec();
        let config = Config::new();
        config.add_spec(spec).unwrap();
        (config, items)
    }

    // -- Fixture for enum coercion tests ----------------------------------------

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Mode {
        Fast,
        Slow,
    }

    impl ConfigValue for Mode {
        fn type_desc() -> TypeDesc {
            TypeDesc::Enum(vec!["fast".into(), "slow".into()])
        }

        fn from_value(value: Value) -> Result<Self, StratumError> {
            match value {
                Value::Enum(name) if name == "fast" => Ok(Mode::Fast),
                Value::Enum(name) if name == "slow" => Ok(Mode::Slow),
                other => Err(other.mismatch(&Self::type_desc())),
            }
        }

        fn into_value(self) -> Value {
            let name = match self {
                Mode::Fast => "fast",
                Mode::Slow => "slow",
            };
            Value::Enum(name.to_string())
        }
    }

    // -- Fixture for record coercion and flat-map round trips -----------------

    #[derive(Debug, Clone, PartialEq)]
    pub struct Endpoint {
        pub host: String,
        pub port: u16,
    }

    impl ConfigValue for Endpoint {
        fn type_desc() -> TypeDesc {
            TypeDesc::Record(
                RecordDesc::new("Endpoint")
                    .field::<String>("host")
                    .field_with_default("port", 80u16),
            )
        }

        fn from_value(value: Value) -> Result<Self, StratumError> {
            let mut fields = Fields::new("Endpoint", value)?;
            Ok(Endpoint {
                host: fields.take("host")?,
                port: fields.take("port")?,
            })
        }

        fn into_value(self) -> Value {
            Value::record([("host", self.host.into_value()), ("port", self.port.into_value())])
        }
    }

    /// One item per kind of value a flat map has to carry.
    #[derive(Clone)]
    pub struct SampleItems {
        pub flag: Item<bool>,
        pub ratio: Item<f64>,
        pub timeout: Item<Duration>,
        pub limit: Item<SizeInBytes>,
        pub since: Item<NaiveDate>,
        pub single: Item<Vec<i32>>,
        pub empty: Item<Vec<String>>,
        pub commas: Item<Vec<String>>,
        pub weights: Item<BTreeMap<String, i32>>,
        pub primary: Item<Endpoint>,
        pub replicas: Item<Vec<Endpoint>>,
    }

    pub fn sample_spec() -> (Spec, SampleItems) {
        let mut spec = Spec::new("sample");
        let items = SampleItems {
            flag: spec.required("flag", ""),
            ratio: spec.required("ratio", ""),
            timeout: spec.required("timeout", ""),
            limit: spec.required("limit", ""),
            since: spec.required("since", ""),
            single: spec.required("single", ""),
            empty: spec.required("empty", ""),
            commas: spec.required("commas", ""),
            weights: spec.required("weights", ""),
            primary: spec.required("primary", ""),
            replicas: spec.required("replicas", ""),
        };
        (spec, items)
    }

    #[test]
    fn server_config_reads_defaults() {
        let (config, items) = server_config();
        assert_eq!(config.get(&items.host).unwrap(), "localhost");
        assert_eq!(config.get(&items.port).unwrap(), 8080);
        assert!(config.get(&items.tags).unwrap().is_empty());
        assert_eq!(config.get(&items.workers).unwrap(), 4);
        assert_eq!(config.get(&items.timeout_ms).unwrap(), 80800);
    }

    #[test]
    fn mode_round_trips_through_value() {
        assert_eq!(Mode::from_value(Mode::Slow.into_value()).unwrap(), Mode::Slow);
        assert!(Mode::from_value(Value::Enum("medium".into())).is_err());
    }
}
