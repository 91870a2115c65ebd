use crate::core::placeholder::PlaceholderResolver;
use crate::domain::model::{Datasource, ThreadPool};
use crate::domain::runtime::ArgumentSource;
use crate::domain::tree::Node;

/// Datasources (plain and XA) declared anywhere under the profile, in document order.
pub fn datasources<S>(profile: Node<'_>, resolver: &PlaceholderResolver, source: &S) -> Vec<Datasource>
where
    S: ArgumentSource + ?Sized,
{
    let text = |value: Option<String>| {
        value
            .map(|v| resolver.interpolate(&v, source))
            .unwrap_or_default()
    };
    let number = |value: Option<String>| {
        value.and_then(|v| resolver.interpolate(&v, source).trim().parse::<u32>().ok())
    };

    profile
        .find_all(|key| key == "datasource" || key == "xa-datasource")
        .into_iter()
        .map(|(key, node)| {
            let xa = key == "xa-datasource";
            let pool = node.child(if xa { "xa-pool" } else { "pool" });
            let connection_url = if xa {
                xa_property(node, "URL").or_else(|| xa_property(node, "Url"))
            } else {
                node.attr_string("connection-url")
            };

            Datasource {
                pool_name: text(node.attr_string("pool-name")),
                jndi_name: text(node.attr_string("jndi-name")),
                driver: text(node.attr_string("driver")),
                connection_url: text(connection_url),
                user_name: text(
                    node.child("security")
                        .and_then(|s| s.attr_string("user-name")),
                ),
                enabled: node
                    .attr("enabled")
                    .map(|e| resolver.interpolate(e, source) != "false")
                    .unwrap_or(true),
                xa,
                min_pool_size: number(pool.and_then(|p| p.attr_string("min-pool-size"))),
                max_pool_size: number(pool.and_then(|p| p.attr_string("max-pool-size"))),
            }
        })
        .collect()
}

fn xa_property(node: Node<'_>, name: &str) -> Option<String> {
    node.children("xa-datasource-property")
        .into_iter()
        .find(|p| p.name() == Some(name))
        .and_then(|p| p.attr_string("value").or_else(|| p.attr_string("#text")))
}

/// Every element whose name ends in `thread-pool`, so bounded, unbounded, blocking and
/// scheduled pools are all included.
pub fn thread_pools<S>(profile: Node<'_>, resolver: &PlaceholderResolver, source: &S) -> Vec<ThreadPool>
where
    S: ArgumentSource + ?Sized,
{
    profile
        .find_all(|key| key.ends_with("thread-pool"))
        .into_iter()
        .filter_map(|(kind, node)| {
            let name = node.name()?;
            let keepalive = node.child("keepalive-time");
            let resolved = |value: Option<String>| value.map(|v| resolver.interpolate(&v, source));

            Some(ThreadPool {
                name: name.to_string(),
                kind: kind.to_string(),
                max_threads: resolved(
                    node.child("max-threads")
                        .and_then(|m| m.attr_string("count"))
                        .or_else(|| node.attr_string("max-threads")),
                )
                .and_then(|v| v.trim().parse().ok()),
                keepalive_time: resolved(
                    keepalive
                        .and_then(|k| k.attr_string("time"))
                        .or_else(|| node.attr_string("keepalive-time")),
                )
                .and_then(|v| v.trim().parse().ok()),
                keepalive_unit: keepalive.and_then(|k| k.attr_string("unit")),
            })
        })
        .collect()
}
