use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::agent::AgentId;

use super::domain::{
    CustomerId, CustomerSummary, FollowUp, FollowUpEntry, FollowUpId, FollowUpStatus, Lookup,
};
use super::pagination::slice_page;
use super::ranking::{is_due_today, sort_ranked};
use super::repository::{
    FollowUpQuery, FollowUpRepository, ListScope, Listing, RepositoryError, StatusChange,
};

/// Process-local repository used by the demo, tests, and database-less deployments.
#[derive(Default, Clone)]
pub struct InMemoryFollowUpRepository {
    customers: Arc<Mutex<HashMap<CustomerId, CustomerSummary>>>,
    records: Arc<Mutex<HashMap<FollowUpId, FollowUp>>>,
}

impl InMemoryFollowUpRepository {
    pub fn with_customers(customers: impl IntoIterator<Item = CustomerSummary>) -> Self {
        let repository = Self::default();
        if let Ok(mut guard) = repository.customers.lock() {
            guard.extend(customers.into_iter().map(|c| (c.id.clone(), c)));
        }
        repository
    }

    pub fn register_customer(&self, customer: CustomerSummary) -> Result<(), RepositoryError> {
        lock(&self.customers)?.insert(customer.id.clone(), customer);
        Ok(())
    }

    /// Removes the customer and, like the foreign-key cascade, every follow-up attached to it.
    pub fn remove_customer(&self, id: &CustomerId) -> Result<usize, RepositoryError> {
        lock(&self.customers)?.remove(id);
        let mut records = lock(&self.records)?;
        let before = records.len();
        records.retain(|_, record| &record.customer_id != id);
        Ok(before - records.len())
    }

    pub fn len(&self) -> usize {
        lock(&self.records).map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

fn owned<'a>(
    records: &'a mut HashMap<FollowUpId, FollowUp>,
    id: &FollowUpId,
    agent_id: &AgentId,
) -> Option<&'a mut FollowUp> {
    records
        .get_mut(id)
        .filter(|record| &record.agent_id == agent_id)
}

#[async_trait]
impl FollowUpRepository for InMemoryFollowUpRepository {
    async fn insert(&self, follow_up: FollowUp) -> Result<FollowUp, RepositoryError> {
        if !lock(&self.customers)?.contains_key(&follow_up.customer_id) {
            return Err(RepositoryError::MissingCustomer(follow_up.customer_id));
        }

        let mut records = lock(&self.records)?;
        if records.contains_key(&follow_up.id) {
            return Err(RepositoryError::Corrupt(format!(
                "duplicate follow-up id {}",
                follow_up.id
            )));
        }
        records.insert(follow_up.id.clone(), follow_up.clone());
        Ok(follow_up)
    }

    async fn find_owned(
        &self,
        id: &FollowUpId,
        agent_id: &AgentId,
    ) -> Result<Lookup<FollowUp>, RepositoryError> {
        let mut records = lock(&self.records)?;
        Ok(owned(&mut records, id, agent_id).map(|record| record.clone()).into())
    }

    async fn update_status(
        &self,
        change: StatusChange,
    ) -> Result<Lookup<FollowUp>, RepositoryError> {
        let mut records = lock(&self.records)?;
        let updated = owned(&mut records, &change.id, &change.agent_id)
            .filter(|record| change.expected.map_or(true, |expected| record.status == expected))
            .map(|record| {
                record.status = change.status;
                record.clone()
            });
        Ok(updated.into())
    }

    async fn list(&self, query: &FollowUpQuery) -> Result<Listing, RepositoryError> {
        let mut matching: Vec<FollowUp> = lock(&self.records)?
            .values()
            .filter(|record| record.agent_id == query.agent_id)
            .filter(|record| match &query.scope {
                ListScope::Customer {
                    customer_id,
                    include_cancelled,
                } => {
                    &record.customer_id == customer_id
                        && (*include_cancelled || record.status != FollowUpStatus::Cancelled)
                }
                ListScope::DueToday => is_due_today(record, &query.today),
            })
            .cloned()
            .collect();

        sort_ranked(&mut matching, &query.today);
        let (page, total) = slice_page(matching, query.page);

        let customers = if query.scope.attaches_customer() {
            Some(lock(&self.customers)?)
        } else {
            None
        };
        let entries = page
            .into_iter()
            .map(|follow_up| {
                let customer = customers
                    .as_ref()
                    .and_then(|directory| directory.get(&follow_up.customer_id).cloned());
                FollowUpEntry {
                    follow_up,
                    customer,
                }
            })
            .collect();

        Ok(Listing { entries, total })
    }
}
