//! Operational collectors: tasks, meetings, website chat logs.

use agencypulse_shared::{ChatLogRecord, MeetingRecord, Result, TaskRecord, collections};
use agencypulse_storage::{Filter, RecordStore};

use super::{CollectConstraints, describe, fetch_typed};

/// Tasks that are not done yet.
pub(super) async fn tasks(
    store: &dyn RecordStore,
    constraints: &CollectConstraints,
) -> Result<Vec<String>> {
    let mut filters = vec![Filter::field_not_eq("status", "done")];
    filters.extend(constraints.window_filter());

    let found =
        fetch_typed::<TaskRecord>(store, collections::TASKS, &filters, constraints.limit).await?;
    Ok(found
        .into_iter()
        .map(|(_, task)| {
            describe(
                &task.title,
                &[
                    ("status", task.status),
                    ("assignee", task.assignee),
                    ("due", task.due_date),
                ],
            )
        })
        .collect())
}

pub(super) async fn meetings(
    store: &dyn RecordStore,
    constraints: &CollectConstraints,
) -> Result<Vec<String>> {
    let filters: Vec<Filter> = constraints.window_filter().into_iter().collect();
    let found =
        fetch_typed::<MeetingRecord>(store, collections::MEETINGS, &filters, constraints.limit)
            .await?;
    Ok(found
        .into_iter()
        .map(|(_, meeting)| {
            describe(
                &meeting.title,
                &[
                    (
                        "starts",
                        meeting
                            .starts_at
                            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string()),
                    ),
                    ("client", meeting.client_name),
                ],
            )
        })
        .collect())
}

pub(super) async fn chat_logs(
    store: &dyn RecordStore,
    constraints: &CollectConstraints,
) -> Result<Vec<String>> {
    let filters: Vec<Filter> = constraints.window_filter().into_iter().collect();
    let found =
        fetch_typed::<ChatLogRecord>(store, collections::CHAT_LOGS, &filters, constraints.limit)
            .await?;
    Ok(found
        .into_iter()
        .map(|(record, chat)| {
            let at = record.created_at.format("%H:%M").to_string();
            describe(
                &format!("[{at}] {}", chat.message.trim()),
                &[("visitor", chat.visitor), ("reply", chat.reply)],
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

    #[tokio::test]
    async fn done_tasks_are_excluded() {
        let store = MemoryStore::default();
        let now = Utc::now();
        store.insert("tasks", "t1", json!({"title": "Write copy", "status": "open"}), now);
        store.insert("tasks", "t2", json!({"title": "Ship site", "status": "done"}), now);
        store.insert("tasks", "t3", json!({"title": "Call Acme"}), now);

        let section = collect(&store, SourceId::Tasks, &CollectConstraints::new(10, 4_000)).await;
        assert_eq!(section.record_count(), 2);
        assert!(!section.text().contains("Ship site"));
        assert!(section.text().contains("Call Acme"));
    }

    #[tokio::test]
    async fn window_excludes_old_chat_logs() {
        let store = MemoryStore::default();
        let now = Utc::now();
        store.insert("chat_logs", "l1", json!({"message": "Do you do SEO?"}), now - Duration::hours(1));
        store.insert("chat_logs", "l2", json!({"message": "Old question"}), now - Duration::days(3));

        let constraints = CollectConstraints::new(10, 4_000).since(now - Duration::hours(24));
        let section = collect(&store, SourceId::ChatLogs, &constraints).await;
        assert_eq!(section.record_count(), 1);
        assert!(section.text().contains("Do you do SEO?"));
    }

    #[tokio::test]
    async fn window_with_nothing_recent_is_empty() {
        let store = MemoryStore::default();
        let now = Utc::now();
        store.insert("meetings", "m1", json!({"title": "Kickoff"}), now - Duration::days(10));
        let constraints = CollectConstraints::new(10, 4_000).since(now - Duration::hours(24));
        let section = collect(&store, SourceId::Meetings, &constraints).await;
        assert_eq!(section.status(), SectionStatus::Empty);
    }
}
