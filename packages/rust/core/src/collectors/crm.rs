//! CRM collectors: clients, offers, campaigns.

use agencypulse_shared::{CampaignRecord, ClientRecord, OfferRecord, Result, collections};
use agencypulse_storage::{Filter, RecordStore};

use super::{CollectConstraints, describe, fetch_typed, money};

pub(super) async fn clients(
    store: &dyn RecordStore,
    constraints: &CollectConstraints,
) -> Result<Vec<String>> {
    let mut filters = Vec::new();
    if let Some(id) = &constraints.client_id {
        filters.push(Filter::IdEq(id.clone()));
    }
    filters.extend(constraints.window_filter());

    let found =
        fetch_typed::<ClientRecord>(store, collections::CLIENTS, &filters, constraints.limit)
            .await?;
    Ok(found
        .into_iter()
        .map(|(record, client)| {
            describe(
                &client.name,
                &[
                    ("id", Some(record.id)),
                    ("company", client.company),
                    ("status", client.status),
                    ("service", client.service),
                    ("source", client.source),
                    ("budget", money(client.budget)),
                    ("notes", client.notes),
                ],
            )
        })
        .collect())
}

pub(super) async fn offers(
    store: &dyn RecordStore,
    constraints: &CollectConstraints,
) -> Result<Vec<String>> {
    let mut filters = Vec::new();
    if let Some(id) = &constraints.client_id {
        filters.push(Filter::field_eq("clientId", id.clone()));
    }
    filters.extend(constraints.window_filter());

    let found =
        fetch_typed::<OfferRecord>(store, collections::OFFERS, &filters, constraints.limit).await?;
    Ok(found
        .into_iter()
        .map(|(_, offer)| {
            describe(
                &offer.title,
                &[
                    ("status", offer.status),
                    ("total", money(offer.total)),
                    ("client", offer.client_id),
                ],
            )
        })
        .collect())
}

pub(super) async fn campaigns(
    store: &dyn RecordStore,
    constraints: &CollectConstraints,
) -> Result<Vec<String>> {
    let filters: Vec<Filter> = constraints.window_filter().into_iter().collect();
    let found =
        fetch_typed::<CampaignRecord>(store, collections::CAMPAIGNS, &filters, constraints.limit)
            .await?;
    Ok(found
        .into_iter()
        .map(|(_, campaign)| {
            describe(
                &campaign.name,
                &[
                    ("status", campaign.status),
                    ("channel", campaign.channel),
                    ("budget", money(campaign.budget)),
                ],
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::collectors::tests::MemoryStore;
    use crate::collectors::{CollectConstraints, SectionStatus, SourceId, collect};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::default();
        let now = Utc::now();
        store.insert(
            "clients",
            "c1",
            json!({"name": "Acme", "status": "Lead", "service": "SEO", "budget": 1500.0}),
            now - Duration::hours(2),
        );
        store.insert(
            "clients",
            "c2",
            json!({"name": "Globex", "status": "Client"}),
            now - Duration::hours(1),
        );
        store.insert("offers", "o1", json!({"title": "SEO retainer", "clientId": "c1", "total": 900}), now);
        store.insert("offers", "o2", json!({"title": "Rebrand", "clientId": "c2"}), now);
        store
    }

    #[tokio::test]
    async fn clients_render_newest_first() {
        let store = seeded();
        let section = collect(&store, SourceId::Clients, &CollectConstraints::new(10, 4_000)).await;
        assert_eq!(section.record_count(), 2);
        let text = section.text();
        let globex = text.find("Globex").unwrap();
        let acme = text.find("Acme").unwrap();
        assert!(globex < acme);
        assert!(text.contains("budget: 1500"));
    }

    #[tokio::test]
    async fn client_scope_restricts_clients_and_offers() {
        let store = seeded();
        let constraints = CollectConstraints::new(10, 4_000).for_client("c1");

        let clients = collect(&store, SourceId::Clients, &constraints).await;
        assert_eq!(clients.record_count(), 1);
        assert!(clients.text().contains("Acme"));

        let offers = collect(&store, SourceId::Offers, &constraints).await;
        assert_eq!(offers.record_count(), 1);
        assert!(offers.text().contains("SEO retainer"));
        assert!(!offers.text().contains("Rebrand"));
    }

    #[tokio::test]
    async fn unknown_client_scope_is_empty() {
        let store = seeded();
        let constraints = CollectConstraints::new(10, 4_000).for_client("missing");
        let section = collect(&store, SourceId::Clients, &constraints).await;
        assert_eq!(section.status(), SectionStatus::Empty);
    }

    #[tokio::test]
    async fn limit_is_applied() {
        let store = seeded();
        let section = collect(&store, SourceId::Clients, &CollectConstraints::new(1, 4_000)).await;
        assert_eq!(section.record_count(), 1);
    }
}
