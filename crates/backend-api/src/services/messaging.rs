use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;
use wardline_supabase::Page;

use crate::pagination::Pagination;
use crate::routes::models::{
    CreateThreadRequest, Message, MessageThread, SendMessageRequest, ThreadParticipant,
    ThreadSummary,
};
use crate::services::{audit::AuditLog, ServiceError};
use crate::state::Session;

#[derive(Debug, Serialize)]
struct NewThread<'a> {
    subject: &'a str,
    created_by: Uuid,
    last_message_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct NewParticipant {
    thread_id: Uuid,
    user_id: Uuid,
    last_read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct NewMessage<'a> {
    thread_id: Uuid,
    sender_id: Uuid,
    body: &'a str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedThread {
    pub thread: MessageThread,
    pub participants: Vec<ThreadParticipant>,
    pub message: Message,
}

/// Caller plus requested participants, caller first, duplicates removed.
pub fn participant_set(creator: Uuid, requested: &[Uuid]) -> Vec<Uuid> {
    let mut ids = vec![creator];
    for id in requested {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

pub fn is_unread(thread: &MessageThread, last_read_at: Option<DateTime<Utc>>) -> bool {
    last_read_at.map_or(true, |read| thread.last_message_at > read)
}

pub async fn list_threads(
    session: &Session,
    pagination: Pagination,
) -> Result<Page<ThreadSummary>, ServiceError> {
    let memberships: Vec<ThreadParticipant> = session
        .db
        .from("thread_participants")
        .select("thread_id,user_id,last_read_at")
        .eq("user_id", session.user_id())
        .fetch()
        .await?;

    if memberships.is_empty() {
        return Ok(Page {
            rows: Vec::new(),
            total: Some(0),
        });
    }

    let last_read: HashMap<Uuid, Option<DateTime<Utc>>> = memberships
        .iter()
        .map(|m| (m.thread_id, m.last_read_at))
        .collect();

    let page: Page<MessageThread> = pagination
        .apply(
            session
                .db
                .from("message_threads")
                .select("*")
                .in_list("id", last_read.keys())
                .order("last_message_at", false),
        )
        .fetch_page()
        .await?;

    let rows = page
        .rows
        .into_iter()
        .map(|thread| {
            let last_read_at = last_read.get(&thread.id).copied().flatten();
            ThreadSummary {
                unread: is_unread(&thread, last_read_at),
                last_read_at,
                thread,
            }
        })
        .collect();

    Ok(Page {
        rows,
        total: page.total,
    })
}

pub async fn create_thread(
    session: &Session,
    req: CreateThreadRequest,
) -> Result<CreatedThread, ServiceError> {
    let now = Utc::now();
    let thread: MessageThread = session
        .db
        .from("message_threads")
        .insert(&NewThread {
            subject: req.subject.trim(),
            created_by: session.user_id(),
            last_message_at: now,
        })
        .await?;

    let rows: Vec<NewParticipant> = participant_set(session.user_id(), &req.participant_ids)
        .into_iter()
        .map(|user_id| NewParticipant {
            thread_id: thread.id,
            user_id,
            last_read_at: (user_id == session.user_id()).then_some(now),
        })
        .collect();

    let participants: Vec<ThreadParticipant> = match session
        .db
        .from("thread_participants")
        .insert_many(&rows)
        .await
    {
        Ok(participants) => participants,
        Err(error) => {
            if let Err(cleanup) = session
                .db
                .from("message_threads")
                .eq("id", thread.id)
                .delete()
                .await
            {
                warn!(thread_id = %thread.id, error = %cleanup, "failed to remove orphaned thread");
            }
            return Err(error.into());
        }
    };

    let message: Message = session
        .db
        .from("messages")
        .insert(&NewMessage {
            thread_id: thread.id,
            sender_id: session.user_id(),
            body: &req.body,
        })
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "message_thread.create",
        "message_thread",
        Some(thread.id.to_string()),
        json!({ "participants": participants.len() }),
    )
    .await;

    Ok(CreatedThread {
        thread,
        participants,
        message,
    })
}

async fn require_participant(session: &Session, thread_id: Uuid) -> Result<(), ServiceError> {
    let membership: Option<ThreadParticipant> = session
        .db
        .from("thread_participants")
        .select("thread_id,user_id,last_read_at")
        .eq("thread_id", thread_id)
        .eq("user_id", session.user_id())
        .fetch_optional()
        .await?;

    if membership.is_none() {
        return Err(ServiceError::forbidden("not a participant in this thread"));
    }
    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadDetail {
    pub thread: MessageThread,
    pub participants: Vec<ThreadParticipant>,
    #[schema(value_type = crate::pagination::MessagePage)]
    pub messages: crate::pagination::Paginated<Message>,
}

pub async fn get_thread(
    session: &Session,
    thread_id: Uuid,
    pagination: Pagination,
) -> Result<ThreadDetail, ServiceError> {
    require_participant(session, thread_id).await?;

    let thread: MessageThread = session
        .db
        .from("message_threads")
        .select("*")
        .eq("id", thread_id)
        .fetch_one()
        .await?;
    let participants: Vec<ThreadParticipant> = session
        .db
        .from("thread_participants")
        .select("thread_id,user_id,last_read_at")
        .eq("thread_id", thread_id)
        .fetch()
        .await?;
    let messages: Page<Message> = pagination
        .apply(
            session
                .db
                .from("messages")
                .select("*")
                .eq("thread_id", thread_id)
                .order("created_at", false),
        )
        .fetch_page()
        .await?;

    Ok(ThreadDetail {
        thread,
        participants,
        messages: pagination.wrap(messages),
    })
}

pub async fn send_message(
    session: &Session,
    thread_id: Uuid,
    req: SendMessageRequest,
) -> Result<Message, ServiceError> {
    require_participant(session, thread_id).await?;

    let message: Message = session
        .db
        .from("messages")
        .insert(&NewMessage {
            thread_id,
            sender_id: session.user_id(),
            body: &req.body,
        })
        .await?;

    if let Err(error) = session
        .db
        .from("message_threads")
        .eq("id", thread_id)
        .update_all(&json!({ "last_message_at": message.created_at }))
        .await
    {
        warn!(thread_id = %thread_id, error = %error, "failed to bump thread activity");
    }
    if let Err(error) = mark_read_at(session, thread_id, message.created_at).await {
        warn!(thread_id = %thread_id, error = ?error, "failed to mark sent message as read");
    }

    AuditLog::record(
        &session.db,
        session.user_id(),
        "message.send",
        "message_thread",
        Some(thread_id.to_string()),
        json!({ "message_id": message.id }),
    )
    .await;

    Ok(message)
}

async fn mark_read_at(
    session: &Session,
    thread_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    session
        .db
        .from("thread_participants")
        .eq("thread_id", thread_id)
        .eq("user_id", session.user_id())
        .update_all(&json!({ "last_read_at": at }))
        .await?;
    Ok(())
}

pub async fn mark_read(session: &Session, thread_id: Uuid) -> Result<(), ServiceError> {
    require_participant(session, thread_id).await?;
    mark_read_at(session, thread_id, Utc::now()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_set_adds_creator_and_dedupes() {
        let me = Uuid::new_v4();
        let colleague = Uuid::new_v4();

        let ids = participant_set(me, &[colleague, me, colleague]);
        assert_eq!(ids, vec![me, colleague]);
    }

    #[test]
    fn unread_tracks_last_activity() {
        let now = Utc::now();
        let thread = MessageThread {
            id: Uuid::new_v4(),
            subject: "Night shift".to_string(),
            created_by: Uuid::new_v4(),
            last_message_at: now,
            created_at: now,
        };

        assert!(is_unread(&thread, None));
        assert!(is_unread(&thread, Some(now - chrono::Duration::minutes(1))));
        assert!(!is_unread(&thread, Some(now)));
    }
}
