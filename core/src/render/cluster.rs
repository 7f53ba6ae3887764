use std::fmt::Write;

use crate::kv::ClusterPrerequisites;
use crate::types::config::ElasticsearchConfig;

use super::yaml_quote;

/// `elasticsearch.yml` for a node joining the cluster described by `prereqs`.
pub fn cluster_config(es: &ElasticsearchConfig, prereqs: &ClusterPrerequisites) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_cluster_config(&mut out, es, prereqs);
    out
}

fn write_cluster_config(
    out: &mut String,
    es: &ElasticsearchConfig,
    prereqs: &ClusterPrerequisites,
) -> std::fmt::Result {
    writeln!(out, "cluster.name: {}", yaml_quote(&prereqs.datacenter))?;
    writeln!(out, "node.name: ${{HOSTNAME}}")?;
    writeln!(out, "path.data: {}", yaml_quote(&es.paths.data.to_string_lossy()))?;
    writeln!(out, "path.logs: {}", yaml_quote(&es.paths.logs.to_string_lossy()))?;
    writeln!(out)?;
    writeln!(out, "network.bind_host: {}", flow_list(&es.bind_hosts))?;
    writeln!(out, "network.publish_host: {}", flow_list(&es.publish_hosts))?;
    writeln!(out)?;
    writeln!(out, "http.port: {}", es.ports.http)?;
    writeln!(out, "transport.tcp.port: {}", es.ports.discovery)?;
    writeln!(out)?;
    writeln!(out, "discovery.zen.ping.unicast.hosts: '127.0.0.1'")?;
    writeln!(out, "discovery.zen.hosts_provider: file")?;
    writeln!(
        out,
        "discovery.zen.minimum_master_nodes: {}",
        prereqs.minimum_master_nodes
    )?;
    if es.monitoring {
        writeln!(out)?;
        writeln!(out, "xpack.monitoring.enabled: true")?;
        writeln!(out, "xpack.monitoring.elasticsearch.collection.enabled: true")?;
        writeln!(out, "xpack.monitoring.collection.enabled: true")?;
    }
    Ok(())
}

fn flow_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| yaml_quote(i)).collect();
    format!("[ {} ]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prereqs() -> ClusterPrerequisites {
        ClusterPrerequisites {
            datacenter: "dc1".into(),
            minimum_master_nodes: 2,
        }
    }

    #[test]
    fn renders_default_node() {
        let rendered = cluster_config(&ElasticsearchConfig::default(), &prereqs());
        let expected = "\
cluster.name: \"dc1\"
node.name: ${HOSTNAME}
path.data: \"/srv/elasticsearch/data\"
path.logs: \"/var/log/elasticsearch\"

network.bind_host: [ \"_eth0:ipv4_\", \"_local:ipv4_\" ]
network.publish_host: [ \"_eth0:ipv4_\" ]

http.port: 9200
transport.tcp.port: 9300

discovery.zen.ping.unicast.hosts: '127.0.0.1'
discovery.zen.hosts_provider: file
discovery.zen.minimum_master_nodes: 2
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let es = ElasticsearchConfig::default();
        assert_eq!(cluster_config(&es, &prereqs()), cluster_config(&es, &prereqs()));
    }

    #[test]
    fn monitoring_block_is_optional() {
        let mut es = ElasticsearchConfig::default();
        assert!(!cluster_config(&es, &prereqs()).contains("xpack"));
        es.monitoring = true;
        let rendered = cluster_config(&es, &prereqs());
        assert!(rendered.ends_with("xpack.monitoring.collection.enabled: true\n"));
    }

    #[test]
    fn hostile_datacenter_stays_one_scalar() {
        let p = ClusterPrerequisites {
            datacenter: "dc1\"\nnode.master: false".into(),
            minimum_master_nodes: 1,
        };
        let rendered = cluster_config(&ElasticsearchConfig::default(), &p);
        let first = rendered.lines().next().unwrap();
        assert_eq!(first, "cluster.name: \"dc1\\\"\\nnode.master: false\"");
        assert!(!rendered.contains("\nnode.master"));
    }

    #[test]
    fn ports_follow_config() {
        let mut es = ElasticsearchConfig::default();
        es.ports.http = 9201;
        es.ports.discovery = 9301;
        let rendered = cluster_config(&es, &prereqs());
        assert!(rendered.contains("http.port: 9201\n"));
        assert!(rendered.contains("transport.tcp.port: 9301\n"));
    }
}
