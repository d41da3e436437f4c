use serde::Deserialize;

/// Root application configuration. Loaded from an optional `eventrank.toml`
/// and environment variables with the prefix `EVENTRANK__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    /// Number of aggregator partitions. Each user is pinned to one partition.
    #[serde(default = "default_aggregator_workers")]
    pub aggregator_workers: usize,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_nats_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_nats_max_reconnects")]
    pub max_reconnects: usize,
    /// Capacity of each outbound publish queue.
    #[serde(default = "default_publish_buffer")]
    pub publish_buffer: usize,
    /// Capacity of each aggregator partition's inbound queue.
    #[serde(default = "default_partition_buffer")]
    pub partition_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Weight assigned to each action kind. A kind missing from the mapping,
/// or configured as 0, is discarded by the aggregator.
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_view_weight")]
    pub view: f64,
    #[serde(default = "default_register_weight")]
    pub register: f64,
    #[serde(default = "default_like_weight")]
    pub like: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_aggregator_workers() -> usize {
    8
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_nats_urls() -> Vec<String> {
    vec!["nats://localhost:4222".to_string()]
}
fn default_subject_prefix() -> String {
    "stats".to_string()
}
fn default_nats_max_reconnects() -> usize {
    60
}
fn default_publish_buffer() -> usize {
    100_000
}
fn default_partition_buffer() -> usize {
    10_000
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_view_weight() -> f64 {
    0.4
}
fn default_register_weight() -> f64 {
    0.8
}
fn default_like_weight() -> f64 {
    1.0
}
fn default_limit() -> usize {
    10
}
fn default_max_limit() -> usize {
    100
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: default_nats_urls(),
            subject_prefix: default_subject_prefix(),
            max_reconnects: default_nats_max_reconnects(),
            publish_buffer: default_publish_buffer(),
            partition_buffer: default_partition_buffer(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            view: default_view_weight(),
            register: default_register_weight(),
            like: default_like_weight(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            aggregator_workers: default_aggregator_workers(),
            api: ApiConfig::default(),
            nats: NatsConfig::default(),
            metrics: MetricsConfig::default(),
            weights: WeightsConfig::default(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl NatsConfig {
    /// Subject an action for `user_id` is published on.
    pub fn action_subject(&self, user_id: i64) -> String {
        format!("{}.user-actions.{}", self.subject_prefix, user_id)
    }

    /// Wildcard covering every user's action subject.
    pub fn action_wildcard(&self) -> String {
        format!("{}.user-actions.*", self.subject_prefix)
    }

    /// Subject a similarity delta is published on, keyed by its lower item id.
    pub fn similarity_subject(&self, item_a: i64) -> String {
        format!("{}.similarity.{}", self.subject_prefix, item_a)
    }

    pub fn similarity_wildcard(&self) -> String {
        format!("{}.similarity.*", self.subject_prefix)
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("eventrank").required(false))
            .add_source(
                config::Environment::with_prefix("EVENTRANK")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("nats.urls"),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
