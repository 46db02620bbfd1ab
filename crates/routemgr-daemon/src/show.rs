//! Operator status dumps.
//!
//! Three read-only views, written to any [`fmt::Write`] so the CLI layer
//! can route them to a terminal or a show-command reply: adapter status,
//! the xpath registry, and the resolved subscribers of one path.

use std::fmt;
use std::sync::Arc;

use routemgr_core::{CapabilityTriple, SubscriptionMap};

use crate::registry::AdapterRegistry;

fn bit(value: bool) -> &'static str {
    if value {
        "T"
    } else {
        "F"
    }
}

fn caps_line(caps: CapabilityTriple) -> String {
    format!(
        "Validate:{}, Notify:{}, Own:{}",
        bit(caps.validate_config),
        bit(caps.notify_config),
        bit(caps.own_oper_data),
    )
}

/// Writes one line per adapter: identity, fd, references, counters.
///
/// # Errors
///
/// Propagates formatting errors from the writer.
pub fn write_adapter_status(w: &mut impl fmt::Write, registry: &AdapterRegistry) -> fmt::Result {
    writeln!(w, "Backend adapters")?;
    for adapter in registry.iter() {
        let counters = adapter.counters().snapshot();
        writeln!(w, "  Client: \t\t\t{}", adapter.name())?;
        writeln!(w, "    Conn-FD: \t\t\t{}", adapter.fd())?;
        writeln!(
            w,
            "    Client-Id: \t\t\t{}",
            adapter.id().map_or_else(|| "unassigned".to_string(), |id| id.to_string()),
        )?;
        if let Some(peer) = adapter.peer() {
            writeln!(w, "    Peer: \t\t\t{peer}")?;
        }
        writeln!(w, "    Ref-Count: \t\t\t{}", Arc::strong_count(adapter))?;
        writeln!(w, "    Msg-Recvd: \t\t\t{}", counters.rx_msgs)?;
        writeln!(w, "    Bytes-Recvd: \t\t{}", counters.rx_bytes)?;
        writeln!(w, "    Msg-Sent: \t\t\t{}", counters.tx_msgs)?;
        writeln!(w, "    Bytes-Sent: \t\t{}", counters.tx_bytes)?;
    }
    writeln!(w, "  Total: {}", registry.len())
}

/// Writes every registered pattern with its subscribers and their
/// capability bits, noting which subscribers are currently connected.
///
/// # Errors
///
/// Propagates formatting errors from the writer.
pub fn write_xpath_registry(
    w: &mut impl fmt::Write,
    subscriptions: &SubscriptionMap,
    registry: &AdapterRegistry,
) -> fmt::Result {
    writeln!(w, "Backend XPath Registry")?;
    for entry in subscriptions.entries() {
        writeln!(w, " - XPATH: '{}'", entry.pattern())?;
        for (id, caps) in entry.subscribers() {
            writeln!(w, "   -- Client: '{id}' \t {}", caps_line(caps))?;
            if let Some(adapter) = registry.get_by_id(id) {
                writeln!(w, "     -- Adapter: '{}' (fd {})", adapter.name(), adapter.fd())?;
            }
        }
    }
    writeln!(w, "Total XPath Registries: {}", subscriptions.len())
}

/// Resolves `xpath` and writes the subscribers that would receive it.
///
/// # Errors
///
/// Propagates formatting errors from the writer.
pub fn write_xpath_subscr_info(
    w: &mut impl fmt::Write,
    subscriptions: &SubscriptionMap,
    registry: &AdapterRegistry,
    xpath: &str,
) -> fmt::Result {
    writeln!(w, "XPath: '{xpath}'")?;
    let info = subscriptions.resolve(xpath);
    for (id, caps) in info.iter() {
        writeln!(w, "  -- Client: '{id}' \t {}", caps_line(caps))?;
        if let Some(adapter) = registry.get_by_id(id) {
            writeln!(w, "    -- Adapter: '{}' (fd {})", adapter.name(), adapter.fd())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{spawned_adapter, test_state};
    use routemgr_core::ClientId;

    #[tokio::test]
    async fn status_lists_every_adapter_and_the_total() {
        let state = test_state();
        let (adapter, _client) = spawned_adapter(&state).await;
        adapter.set_name("staticd");

        let mut out = String::new();
        write_adapter_status(&mut out, &state.registry()).unwrap();
        assert!(out.contains("Client: \t\t\tstaticd"));
        assert!(out.contains("Ref-Count:"));
        assert!(out.contains("Total: 1"));
    }

    #[tokio::test]
    async fn registry_dump_shows_patterns_bits_and_live_adapters() {
        let state = test_state();
        let (adapter, _client) = spawned_adapter(&state).await;
        adapter.set_name("staticd");
        adapter.set_id(ClientId::Staticd);
        let _ = state.registry().install(ClientId::Staticd, &adapter);

        let mut out = String::new();
        write_xpath_registry(&mut out, &state.subscriptions, &state.registry()).unwrap();
        assert!(out.contains("'/frr-vrf:lib/*'"));
        assert!(out.contains("Validate:T, Notify:T, Own:T"));
        assert!(out.contains("-- Adapter: 'staticd'"));
        assert!(out.contains("Total XPath Registries: 3"));
    }

    #[tokio::test]
    async fn subscr_info_resolves_one_path() {
        let state = test_state();
        let mut out = String::new();
        write_xpath_subscr_info(
            &mut out,
            &state.subscriptions,
            &state.registry(),
            "/frr-vrf:lib/vrf[name='default']",
        )
        .unwrap();
        assert!(out.contains("'staticd'"));
        assert!(out.contains("Validate:T"));
    }
}
