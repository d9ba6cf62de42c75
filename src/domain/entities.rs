//! Helpers over the JSON documents the server stores
//!
//! Nodes, roles, clients and data bag items are passed through as
//! `serde_json::Value`; these functions cover the few places the client
//! itself looks inside them.

use std::net::Ipv4Addr;

use serde_json::{json, Value};

/// Node attribute levels, in lookup order after top-level keys.
pub const ATTRIBUTE_LEVELS: [&str; 4] = ["override", "normal", "default", "automatic"];

/// Expand environment variables and tilde in a path string.
///
/// Handles `~`, `$VAR`, and `${VAR}` syntax. Unknown variables leave the
/// input unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Skeleton document for a new node.
pub fn default_node(name: &str) -> Value {
    json!({
        "name": name,
        "json_class": "Chef::Node",
        "chef_type": "node",
        "automatic": {},
        "normal": {},
        "default": {},
        "override": {},
        "run_list": []
    })
}

/// Skeleton document for a new API client.
pub fn default_client(name: &str, admin: bool) -> Value {
    json!({"name": name, "admin": admin})
}

/// Identifier of a search row or stored item: `id`, falling back to `name`.
pub fn item_id(value: &Value) -> Option<String> {
    value
        .get("id")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .map(String::from)
}

fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.get(key))
}

/// Resolve a dotted attribute path.
///
/// Top-level keys win; node documents then fall through the precedence
/// levels (`override`, `normal`, `default`, `automatic`).
pub fn lookup_attribute<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    walk(value, path).or_else(|| {
        ATTRIBUTE_LEVELS
            .iter()
            .filter_map(|level| value.get(*level))
            .find_map(|level| walk(level, path))
    })
}

/// Split comma-separated run list arguments into entries.
pub fn split_run_list<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| {
            item.as_ref()
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// RFC 1918 address check; non-IPv4 input counts as public.
pub fn is_private_address(address: &str) -> bool {
    address
        .parse::<Ipv4Addr>()
        .map(|ip| ip.is_private())
        .unwrap_or(false)
}

/// Partition addresses into (public, private).
pub fn classify_addresses(addresses: &[String]) -> (Vec<String>, Vec<String>) {
    addresses
        .iter()
        .cloned()
        .partition(|a| !is_private_address(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn given_top_level_attribute_when_lookup_then_wins_over_levels() {
        let node = json!({"name": "web1", "normal": {"name": "shadowed"}});
        assert_eq!(lookup_attribute(&node, "name"), Some(&json!("web1")));
    }

    #[test]
    fn given_nested_attribute_when_lookup_then_uses_precedence() {
        let node = json!({
            "default": {"apache": {"port": 80}},
            "override": {"apache": {"port": 8080}}
        });
        assert_eq!(lookup_attribute(&node, "apache.port"), Some(&json!(8080)));
        assert_eq!(lookup_attribute(&node, "apache.user"), None);
    }

    #[test]
    fn given_row_without_id_when_item_id_then_falls_back_to_name() {
        assert_eq!(item_id(&json!({"name": "db1"})), Some("db1".to_string()));
        assert_eq!(item_id(&json!({"id": "bob", "name": "x"})), Some("bob".to_string()));
        assert_eq!(item_id(&json!({})), None);
    }

    #[test]
    fn given_comma_separated_items_when_split_then_flattens() {
        let items = vec!["role[base], recipe[nginx]".to_string(), "recipe[app]".to_string()];
        assert_eq!(
            split_run_list(&items),
            vec!["role[base]", "recipe[nginx]", "recipe[app]"]
        );
    }

    #[rstest]
    #[case("10.176.2.5", true)]
    #[case("172.16.0.1", true)]
    #[case("192.168.1.1", true)]
    #[case("67.23.18.11", false)]
    #[case("not-an-ip", false)]
    fn given_address_when_classified_then_private_per_rfc1918(
        #[case] address: &str,
        #[case] private: bool,
    ) {
        assert_eq!(is_private_address(address), private);
    }

    #[test]
    fn given_mixed_addresses_when_partitioned_then_public_first() {
        let (public, private) =
            classify_addresses(&["10.0.0.1".to_string(), "67.23.18.11".to_string()]);
        assert_eq!(public, vec!["67.23.18.11"]);
        assert_eq!(private, vec!["10.0.0.1"]);
    }
}
