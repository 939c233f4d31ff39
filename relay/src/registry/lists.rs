//! Registry of configured mailing lists and route diagnostics.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::provider::MailProvider;
use crate::types::MailingList;

/// Configured mailing lists keyed by public address.
#[derive(Debug, Clone, Default)]
pub struct ListRegistry {
    lists: HashMap<String, MailingList>,
}

impl ListRegistry {
    /// Build the registry from configuration.
    ///
    /// Public addresses are unique; when configured twice the first
    /// definition wins.
    pub fn load(configured: impl IntoIterator<Item = MailingList>) -> Self {
        let mut lists = HashMap::new();

        for list in configured {
            if lists.contains_key(&list.public_address) {
                warn!(public = %list.public_address, "mailing_list_duplicate_ignored");
                continue;
            }
            info!(
                public = %list.public_address,
                internal = %list.internal_address,
                "mailing_list_registered"
            );
            lists.insert(list.public_address.clone(), list);
        }

        Self { lists }
    }

    /// Exact, case-sensitive lookup.
    pub fn find_by_public_address(&self, address: &str) -> Option<&MailingList> {
        self.lists.get(address)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// Status of a provider route that notifies this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStatus {
    pub recipient: String,
    /// Whether the route stops further route evaluation
    pub has_stop: bool,
}

/// Report every `match_recipient` route that stores and notifies `notify_url`.
///
/// Purely diagnostic; a failed lookup is logged and yields no statuses.
pub async fn check_routes(provider: &dyn MailProvider, notify_url: &str) -> Vec<RouteStatus> {
    let routes = match provider.list_routes().await {
        Ok(routes) => routes,
        Err(e) => {
            warn!(error = %e, "mailing_list_routes_unknown");
            return Vec::new();
        }
    };

    let store_action = format!("store(notify=\"{}\")", notify_url);
    let mut statuses = Vec::new();

    for route in routes {
        let Some(recipient) = matched_recipient(&route.expression) else {
            continue;
        };
        if route.actions.first() != Some(&store_action) {
            continue;
        }

        let has_stop = route.actions.get(1).map(String::as_str) == Some("stop()");
        if has_stop {
            info!(recipient = %recipient, status = "✔", "mailing_list_route_status");
        } else {
            info!(
                recipient = %recipient,
                status = "✘ Stop box not checked",
                "mailing_list_route_status"
            );
        }

        statuses.push(RouteStatus {
            recipient: recipient.to_string(),
            has_stop,
        });
    }

    statuses
}

/// Extract the address from `match_recipient("<addr>")`.
fn matched_recipient(expression: &str) -> Option<&str> {
    expression
        .trim()
        .strip_prefix("match_recipient(\"")?
        .strip_suffix("\")")
}
