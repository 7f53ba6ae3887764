//! Files whose content depends only on the node configuration (and, for the
//! metrics inputs, on one database name).

use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::{BootstrapError, Result};
use crate::types::config::{ConsulConfig, ElasticsearchConfig, NodeConfig};

use super::basic_quote;

const JVM_FLAGS: &[&str] = &[
    "-XX:+UseConcMarkSweepGC",
    "-XX:CMSInitiatingOccupancyFraction=75",
    "-XX:+UseCMSInitiatingOccupancyOnly",
    "-XX:+AlwaysPreTouch",
    "-server",
    "-Xss1m",
    "-Djava.awt.headless=true",
    "-Dfile.encoding=UTF-8",
    "-Djna.nosys=true",
    "-XX:-OmitStackTraceInFastThrow",
    "-Dio.netty.noUnsafe=true",
    "-Dio.netty.noKeySetOptimization=true",
    "-Dio.netty.recycler.maxCapacityPerThread=0",
    "-Dlog4j.shutdownHookEnabled=false",
    "-Dlog4j2.disable.jmx=true",
    "-XX:+HeapDumpOnOutOfMemoryError",
];

pub fn java_security_path(es: &ElasticsearchConfig) -> PathBuf {
    es.paths.config.join("java.security")
}

pub fn jvm_options_path(es: &ElasticsearchConfig) -> PathBuf {
    es.paths.config.join("jvm.options")
}

/// JVM security overrides. DNS answers are not cached by the JVM; the host
/// resolver does the caching.
pub fn java_security() -> String {
    "networkaddress.cache.ttl=0\nnetworkaddress.cache.negative.ttl=0\n".to_string()
}

/// Heap size for a host with `total_mb` of memory, rounded to the nearest
/// MiB.
pub fn heap_size_mb(total_mb: u64, ratio: u32) -> u64 {
    total_mb.saturating_mul(ratio as u64).saturating_add(50) / 100
}

/// JVM flags. With the host's memory known, the heap is pinned (`-Xms` equal
/// to `-Xmx`) at `heap_ratio` percent of it; otherwise the JVM default
/// applies.
pub fn jvm_options(es: &ElasticsearchConfig, total_memory_mb: Option<u64>) -> String {
    let mut out = String::new();
    for flag in JVM_FLAGS {
        out.push_str(flag);
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "-Djava.security.properties={}",
        java_security_path(es).display()
    );
    if let Some(heap) = total_memory_mb
        .map(|total| heap_size_mb(total, es.heap_ratio))
        .filter(|heap| *heap > 0)
    {
        let _ = writeln!(out, "-Xms{}m", heap);
        let _ = writeln!(out, "-Xmx{}m", heap);
    }
    out
}

pub fn systemd_unit_path(es: &ElasticsearchConfig) -> PathBuf {
    Path::new("/etc/systemd/system").join(format!("{}.service", es.service_name))
}

/// Unit file for the managed search service.
pub fn systemd_unit(es: &ElasticsearchConfig) -> String {
    let pid_file = es.pid_file();
    let mut out = String::new();
    let _ = write!(
        out,
        "\
[Unit]
Description=Elasticsearch
Documentation=https://elastic.co
Requires=network-online.target
After=network-online.target
StartLimitIntervalSec=0

[Service]
EnvironmentFile=-/etc/default/elasticsearch
Environment=ES_HOME={home}
Environment=ES_PATH_CONF={conf}
Environment=PID_DIR={pid_dir}
ExecStart={bin}/elasticsearch -d -p {pid_file} --quiet
User={user}
Group={group}
Type=forking
PIDFile={pid_file}
KillMode=process
KillSignal=SIGTERM
SendSIGKILL=no
SuccessExitStatus=143
TimeoutStopSec=0
Restart=always
RestartSec=5
LimitAS=infinity
LimitFSIZE=infinity
LimitNOFILE=65536
LimitNPROC=4096

[Install]
WantedBy=multi-user.target
",
        home = es.paths.home.display(),
        conf = es.paths.config.display(),
        pid_dir = es.paths.pid.display(),
        bin = es.paths.bin.display(),
        pid_file = pid_file.display(),
        user = es.service_user,
        group = es.service_group,
    );
    out
}

pub fn consul_service_path(consul: &ConsulConfig) -> PathBuf {
    consul.config_dir.join("elasticsearch-http.json")
}

/// Service-directory registration with an HTTP health check on the
/// client/API port.
pub fn consul_service(config: &NodeConfig) -> Result<String> {
    let http_port = config.elasticsearch.ports.http;
    let consul = &config.consul;
    let doc = json!({
        "services": [
            {
                "checks": [
                    {
                        "http": format!("http://localhost:{}{}", http_port, consul.health_path),
                        "id": "elasticsearch_http_health_check",
                        "interval": consul.check_interval,
                        "method": "GET",
                        "name": "ElasticSearch HTTP health check",
                        "timeout": consul.check_timeout,
                    }
                ],
                "enable_tag_override": false,
                "id": "elasticsearch_http",
                "name": consul.service_name,
                "port": http_port,
                "tags": [consul.service_tag],
            }
        ]
    });
    let mut out = serde_json::to_string_pretty(&doc).map_err(|e| BootstrapError::Encode {
        what: "service registration",
        detail: e.to_string(),
    })?;
    out.push('\n');
    Ok(out)
}

/// Collector input that scrapes the local node.
pub fn metrics_inputs(es: &ElasticsearchConfig, database: &str) -> String {
    format!(
        "\
[[inputs.elasticsearch]]
  servers = [\"http://localhost:{port}\"]
  http_timeout = \"5s\"
  local = true
  cluster_health = false
  cluster_stats = false

  [inputs.elasticsearch.tags]
    influxdb_database = {database}
",
        port = es.ports.http,
        database = basic_quote(database),
    )
}
