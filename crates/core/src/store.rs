//! In-process repositories standing in for the Postgres-like durable store
//! Each repository is a `DashMap` keyed by id plus
//! whatever secondary indices its access patterns need, the same shape as
//! a `JourneyEngine`'s `Arc<DashMap<Uuid, Journey>>` and a
//! segment engine's segment map. Swapping in
//! a real SQL-backed store later only touches this module and its callers'
//! narrow `insert`/`get`/`update`/`list_by_*` surface.

use crate::ids::{ChannelId, ContactId, ConversationId, LeadId, OrgId};
use crate::model::{Channel, Contact, Conversation, Lead, Message};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ChannelStore {
    by_id: Arc<DashMap<ChannelId, Channel>>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, channel: Channel) {
        self.by_id.insert(channel.id, channel);
    }

    pub fn get(&self, id: &ChannelId) -> Option<Channel> {
        self.by_id.get(id).map(|r| r.clone())
    }

    pub fn list_by_org(&self, org_id: OrgId) -> Vec<Channel> {
        self.by_id
        .iter()
        .map(|r| r.value().clone())
        .filter(|c| c.org_id == org_id)
        .collect()
    }

    /// Distinct organizations that have onboarded at least one channel.
    /// The scheduler loop uses this as its org worklist — an org with no
    /// channel has nothing a campaign or journey could send through.
    pub fn all_org_ids(&self) -> Vec<OrgId> {
        let mut orgs: Vec<OrgId> = self.by_id.iter().map(|r| r.value().org_id).collect();
        orgs.sort_unstable();
        orgs.dedup();
        orgs
    }
}

#[derive(Clone, Default)]
pub struct ContactStore {
    by_id: Arc<DashMap<ContactId, Contact>>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: Contact) {
        self.by_id.insert(contact.id, contact);
    }

    pub fn get(&self, id: &ContactId) -> Option<Contact> {
        self.by_id.get(id).map(|r| r.clone())
    }

    /// Finds an existing contact in this org whose channel identity (phone
    /// or email) matches `external_id`. Linear scan — fine for the
    /// in-process store; a SQL backend would index `(org_id, phone)` /
    /// `(org_id, email)` instead.
    pub fn find_by_external_id(&self, org_id: OrgId, external_id: &str) -> Option<Contact> {
        self.by_id
        .iter()
        .map(|r| r.value().clone())
        .find(|c| c.org_id == org_id && c.matches_external_id(external_id))
    }

    pub fn update<F>(&self, id: &ContactId, f: F) -> Option<Contact>
    where
    F: FnOnce(&mut Contact),
    {
        let mut entry = self.by_id.get_mut(id)?;
        f(&mut entry);
        Some(entry.clone())
    }

    pub fn list_by_org(&self, org_id: OrgId) -> Vec<Contact> {
        self.by_id
        .iter()
        .map(|r| r.value().clone())
        .filter(|c| c.org_id == org_id)
        .collect()
    }
}

#[derive(Clone, Default)]
pub struct ConversationStore {
    by_id: Arc<DashMap<ConversationId, Conversation>>,
    /// `(contact_id, channel_id) -> conversation_id`, enforcing "exactly
    /// one open conversation per (contact, channel)".
    by_contact_channel: Arc<DashMap<(ContactId, ChannelId), ConversationId>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        org_id: OrgId,
        contact_id: ContactId,
        channel_id: ChannelId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Conversation {
        let key = (contact_id, channel_id);
        if let Some(id) = self.by_contact_channel.get(&key) {
            return self.by_id.get(&id).expect("index/store out of sync").clone();
        }
        let conversation = Conversation {
            id: ConversationId::new(),
            org_id,
            contact_id,
            channel_id,
            last_activity_at: now,
        };
        self.by_contact_channel.insert(key, conversation.id);
        self.by_id.insert(conversation.id, conversation.clone());
        conversation
    }

    /// Every conversation this contact has across channels — the join
    /// point C5 uses to walk from a Lead's contact to its outbound
    /// Messages when building a touchpoint set.
    pub fn list_by_contact(&self, contact_id: ContactId) -> Vec<Conversation> {
        self.by_id
        .iter()
        .map(|r| r.value().clone())
        .filter(|c| c.contact_id == contact_id)
        .collect()
    }

    pub fn list_by_org(&self, org_id: OrgId) -> Vec<Conversation> {
        self.by_id
        .iter()
        .map(|r| r.value().clone())
        .filter(|c| c.org_id == org_id)
        .collect()
    }

    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.by_id.get(id).map(|r| r.clone())
    }

    pub fn touch(&self, id: &ConversationId, at: chrono::DateTime<chrono::Utc>) {
        if let Some(mut entry) = self.by_id.get_mut(id) {
            entry.last_activity_at = at;
        }
    }
}

#[derive(Clone, Default)]
pub struct MessageStore {
    by_id: Arc<DashMap<crate::ids::MessageId, Message>>,
    /// `(conversation_id, external_id) -> message_id`, backing inbound
    /// dedup by provider `external_id`.
    by_external_id: Arc<DashMap<(ConversationId, String), crate::ids::MessageId>>,
    /// `provider_message_id -> message_id`, backing status reconciliation.
    by_provider_message_id: Arc<DashMap<String, crate::ids::MessageId>>,
    by_conversation: Arc<DashMap<ConversationId, Vec<crate::ids::MessageId>>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_external_id(
        &self,
        conversation_id: ConversationId,
        external_id: &str,
    ) -> Option<Message> {
        let id = self
        .by_external_id
        .get(&(conversation_id, external_id.to_string()))?;
        self.by_id.get(&id).map(|r| r.clone())
    }

    pub fn insert(&self, message: Message) {
        self.by_conversation
        .entry(message.conversation_id)
        .or_default()
        .push(message.id);
        if let Some(ext) = &message.external_id {
            self.by_external_id
            .insert((message.conversation_id, ext.clone()), message.id);
        }
        if let Some(pmid) = &message.provider_message_id {
            self.by_provider_message_id.insert(pmid.clone(), message.id);
        }
        self.by_id.insert(message.id, message);
    }

    pub fn get(&self, id: &crate::ids::MessageId) -> Option<Message> {
        self.by_id.get(id).map(|r| r.clone())
    }

    pub fn find_by_provider_message_id(&self, provider_message_id: &str) -> Option<Message> {
        let id = self.by_provider_message_id.get(provider_message_id)?;
        self.by_id.get(&id).map(|r| r.clone())
    }

    pub fn update<F>(&self, id: &crate::ids::MessageId, f: F) -> Option<Message>
    where
    F: FnOnce(&mut Message),
    {
        let mut entry = self.by_id.get_mut(id)?;
        f(&mut entry);
        if let Some(pmid) = &entry.provider_message_id {
            self.by_provider_message_id.insert(pmid.clone(), entry.id);
        }
        Some(entry.clone())
    }

    pub fn list_by_conversation(&self, conversation_id: ConversationId) -> Vec<Message> {
        self.by_conversation
        .get(&conversation_id)
        .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
        .unwrap_or_default()
    }
}

#[derive(Clone, Default)]
pub struct LeadStore {
    by_id: Arc<DashMap<LeadId, Lead>>,
    /// One active lead per contact per org.
    by_contact: Arc<DashMap<ContactId, LeadId>>,
}

impl LeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, org_id: OrgId, contact_id: ContactId, now: chrono::DateTime<chrono::Utc>) -> Lead {
        if let Some(id) = self.by_contact.get(&contact_id) {
            return self.by_id.get(&id).expect("index/store out of sync").clone();
        }
        let lead = Lead {
            id: LeadId::new(),
            org_id,
            contact_id,
            stage: "new".to_string(),
            tags: Vec::new(),
            score: 0.0,
            source: None,
            metadata: Default::default(),
            created_at: now,
            last_activity_at: now,
            converted_at: None,
        };
        self.by_contact.insert(contact_id, lead.id);
        self.by_id.insert(lead.id, lead.clone());
        lead
    }

    pub fn get(&self, id: &LeadId) -> Option<Lead> {
        self.by_id.get(id).map(|r| r.clone())
    }

    pub fn get_by_contact(&self, contact_id: &ContactId) -> Option<Lead> {
        let id = self.by_contact.get(contact_id)?;
        self.by_id.get(&id).map(|r| r.clone())
    }

    pub fn update<F>(&self, id: &LeadId, f: F) -> Option<Lead>
    where
    F: FnOnce(&mut Lead),
    {
        let mut entry = self.by_id.get_mut(id)?;
        f(&mut entry);
        Some(entry.clone())
    }

    pub fn list_by_org(&self, org_id: OrgId) -> Vec<Lead> {
        self.by_id
        .iter()
        .map(|r| r.value().clone())
        .filter(|l| l.org_id == org_id)
        .collect()
    }
}
