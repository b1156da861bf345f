use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::identity::ActorIdentity;
use crate::listing::ListingSummary;
use crate::messaging::Message;
use crate::ports::listings::ListingDirectory;
use crate::ports::messages::MessageRepository;
use crate::ports::users::UserDirectory;

/// A party appearing in a conversation. Name and email come from the
/// denormalized sender snapshot when the id ever appeared as a sender;
/// recipient-only ids start bare and are back-filled from the user
/// directory in one batched lookup.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Derived view over the message ledger; never persisted. Title, kind
/// and owner are only filled when the viewing user owns the listing —
/// a non-owner's UI shows a generic label instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub listing_id: String,
    pub title: Option<String>,
    pub kind: Option<String>,
    pub owner_id: Option<String>,
    pub participants: Vec<Participant>,
    pub last_message: Option<Message>,
}

#[derive(Clone)]
pub struct ConversationService {
    messages: Arc<dyn MessageRepository>,
    listings: Arc<dyn ListingDirectory>,
    users: Arc<dyn UserDirectory>,
}

impl ConversationService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        listings: Arc<dyn ListingDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            messages,
            listings,
            users,
        }
    }

    /// Derive the caller's conversations, newest activity first. The
    /// grouping itself is a pure function over a ledger snapshot so it
    /// can be re-derived on every call without drift.
    pub async fn list_conversations(
        &self,
        actor: &ActorIdentity,
    ) -> DomainResult<Vec<Conversation>> {
        let owned = self.listings.list_owned_by(&actor.user_id).await?;
        let related = self.messages.list_for_user(&actor.user_id).await?;
        let mut conversations = fold_conversations(&owned, related);

        let missing: Vec<String> = conversations
            .iter()
            .flat_map(|conversation| conversation.participants.iter())
            .filter(|participant| participant.name.is_none() && participant.email.is_none())
            .map(|participant| participant.user_id.clone())
            .collect();
        if !missing.is_empty() {
            let profiles = self.users.get_many(&missing).await?;
            let by_id: HashMap<&str, _> = profiles
                .iter()
                .map(|profile| (profile.user_id.as_str(), profile))
                .collect();
            for conversation in &mut conversations {
                for participant in &mut conversation.participants {
                    if participant.name.is_some() || participant.email.is_some() {
                        continue;
                    }
                    if let Some(profile) = by_id.get(participant.user_id.as_str()) {
                        participant.name = Some(profile.name.clone());
                        participant.email = Some(profile.email.clone());
                    }
                }
            }
        }

        Ok(conversations)
    }
}

/// Group a user's related messages by listing id and seed metadata from
/// the owned-listing lookup. Conversations require at least one
/// message; an owned listing nobody ever wrote to produces nothing.
pub fn fold_conversations(
    owned: &[ListingSummary],
    related: Vec<Message>,
) -> Vec<Conversation> {
    let owned_by_id: HashMap<&str, &ListingSummary> = owned
        .iter()
        .map(|listing| (listing.listing_id.as_str(), listing))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut by_listing: HashMap<String, Conversation> = HashMap::new();

    for message in related {
        let conversation = by_listing
            .entry(message.listing_id.clone())
            .or_insert_with(|| {
                order.push(message.listing_id.clone());
                let owned = owned_by_id.get(message.listing_id.as_str());
                Conversation {
                    listing_id: message.listing_id.clone(),
                    title: owned.map(|listing| listing.title.clone()),
                    kind: owned.map(|listing| listing.kind.clone()),
                    owner_id: owned.map(|listing| listing.owner_id.clone()),
                    participants: Vec::new(),
                    last_message: None,
                }
            });

        upsert_participant(
            &mut conversation.participants,
            Participant {
                user_id: message.sender_id.clone(),
                name: Some(message.sender_name.clone()),
                email: Some(message.sender_email.clone()),
            },
        );
        if let Some(recipient_id) = &message.recipient_id {
            upsert_participant(
                &mut conversation.participants,
                Participant {
                    user_id: recipient_id.clone(),
                    name: None,
                    email: None,
                },
            );
        }

        let is_newer = conversation
            .last_message
            .as_ref()
            .is_none_or(|last| message.created_at_ms > last.created_at_ms);
        if is_newer {
            conversation.last_message = Some(message);
        }
    }

    let mut conversations: Vec<Conversation> = order
        .into_iter()
        .filter_map(|listing_id| by_listing.remove(&listing_id))
        .collect();
    // Stable sort keeps encounter order for equal timestamps; no
    // last message sorts as epoch zero.
    conversations.sort_by_key(|conversation| {
        std::cmp::Reverse(
            conversation
                .last_message
                .as_ref()
                .map_or(0, |message| message.created_at_ms),
        )
    });
    conversations
}

/// Dedup by id; a sender snapshot wins over a bare recipient entry.
fn upsert_participant(participants: &mut Vec<Participant>, candidate: Participant) {
    match participants
        .iter_mut()
        .find(|existing| existing.user_id == candidate.user_id)
    {
        Some(existing) => {
            if existing.name.is_none() && candidate.name.is_some() {
                existing.name = candidate.name;
                existing.email = candidate.email;
            }
        }
        None => participants.push(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserProfile;
    use crate::messaging::testing::Fixture;

    fn message(
        listing_id: &str,
        sender_id: &str,
        sender_name: &str,
        recipient_id: Option<&str>,
        created_at_ms: i64,
    ) -> Message {
        Message {
            message_id: format!("m-{listing_id}-{created_at_ms}"),
            listing_id: listing_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            sender_email: format!("{sender_id}@example.edu"),
            recipient_id: recipient_id.map(str::to_string),
            body: "hello".to_string(),
            created_at_ms,
        }
    }

    fn listing(listing_id: &str, owner_id: &str, title: &str) -> ListingSummary {
        ListingSummary {
            listing_id: listing_id.to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            kind: "found".to_string(),
        }
    }

    #[test]
    fn groups_by_listing_and_dedups_participants() {
        let owned = vec![listing("l-1", "owner-a", "Keys")];
        let related = vec![
            message("l-1", "user-b", "Bruno", Some("owner-a"), 1_000),
            message("l-1", "owner-a", "Alice", Some("user-b"), 2_000),
            message("l-1", "user-b", "Bruno", Some("owner-a"), 3_000),
        ];

        let conversations = fold_conversations(&owned, related);
        assert_eq!(conversations.len(), 1);
        let conversation = &conversations[0];
        assert_eq!(conversation.title.as_deref(), Some("Keys"));
        assert_eq!(conversation.owner_id.as_deref(), Some("owner-a"));
        assert_eq!(conversation.participants.len(), 2);
        let ids: Vec<_> = conversation
            .participants
            .iter()
            .map(|participant| participant.user_id.as_str())
            .collect();
        assert_eq!(ids, vec!["user-b", "owner-a"]);
        assert_eq!(
            conversation
                .last_message
                .as_ref()
                .map(|message| message.created_at_ms),
            Some(3_000)
        );
    }

    #[test]
    fn recipient_only_participant_is_backfilled_by_later_sender_snapshot() {
        let related = vec![
            message("l-1", "user-b", "Bruno", Some("owner-a"), 1_000),
            message("l-1", "owner-a", "Alice", Some("user-b"), 2_000),
        ];
        let conversations = fold_conversations(&[], related);
        let owner = conversations[0]
            .participants
            .iter()
            .find(|participant| participant.user_id == "owner-a")
            .expect("owner participant");
        assert_eq!(owner.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn non_owned_listing_has_no_title_metadata() {
        let related = vec![message("l-2", "user-b", "Bruno", Some("owner-x"), 500)];
        let conversations = fold_conversations(&[], related);
        assert_eq!(conversations[0].title, None);
        assert_eq!(conversations[0].kind, None);
        assert_eq!(conversations[0].owner_id, None);
    }

    #[test]
    fn sorts_newest_activity_first_and_keeps_stable_ties() {
        let related = vec![
            message("l-old", "user-b", "Bruno", None, 1_000),
            message("l-tie-1", "user-b", "Bruno", None, 5_000),
            message("l-tie-2", "user-b", "Bruno", None, 5_000),
            message("l-new", "user-b", "Bruno", None, 9_000),
        ];
        let conversations = fold_conversations(&[], related);
        let ids: Vec<_> = conversations
            .iter()
            .map(|conversation| conversation.listing_id.as_str())
            .collect();
        assert_eq!(ids, vec!["l-new", "l-tie-1", "l-tie-2", "l-old"]);
    }

    #[test]
    fn owned_listing_without_messages_produces_no_conversation() {
        let owned = vec![listing("l-quiet", "owner-a", "Umbrella")];
        let conversations = fold_conversations(&owned, Vec::new());
        assert!(conversations.is_empty());
    }

    #[tokio::test]
    async fn service_backfills_recipient_only_participants_from_directory() {
        let fixture = Fixture::new();
        fixture
            .users
            .insert(UserProfile {
                user_id: "owner-a".to_string(),
                name: "Alice".to_string(),
                email: "owner-a@example.edu".to_string(),
            })
            .await;
        fixture
            .messages
            .messages
            .write()
            .await
            .push(message("l-1", "user-b", "Bruno", Some("owner-a"), 1_000));

        let service = ConversationService::new(
            fixture.messages.clone(),
            fixture.listings.clone(),
            fixture.users.clone(),
        );
        let conversations = service
            .list_conversations(&ActorIdentity::with_user_id("user-b"))
            .await
            .expect("conversations");

        let owner = conversations[0]
            .participants
            .iter()
            .find(|participant| participant.user_id == "owner-a")
            .expect("owner participant");
        assert_eq!(owner.name.as_deref(), Some("Alice"));
        assert_eq!(owner.email.as_deref(), Some("owner-a@example.edu"));
    }
}
