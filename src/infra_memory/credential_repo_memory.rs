use crate::application_port::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Credential records keyed by identifier. Used by the `memory` backend and
/// seeded from settings.
#[derive(Default)]
pub struct MemoryCredentialRepo {
    records: DashMap<String, CredentialRecord>,
}

impl MemoryCredentialRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MemoryCredentialRepo {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, AuthError> {
        Ok(self.records.get(identifier).map(|r| r.value().clone()))
    }

    async fn any_exists(&self) -> Result<bool, AuthError> {
        Ok(!self.records.is_empty())
    }

    async fn create(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        match self.records.entry(record.identifier.clone()) {
            Entry::Occupied(_) => Err(AuthError::UserExists),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }
}
