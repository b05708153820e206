use std::sync::Arc;

use tracing::info;

use super::clock::Clock;
use super::domain::{AgentId, LeadId, LeadStatus, LeadToSaleLink, SaleId};
use super::store::{LeadStore, StoreError};

/// Records the one-to-one link between a `SALE_MADE` lead and the sale the
/// caller created for it.
pub struct ConversionRecorder<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> ConversionRecorder<S>
where
    S: LeadStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn record(
        &self,
        lead_id: LeadId,
        sale_id: SaleId,
        converted_by: &AgentId,
    ) -> Result<LeadToSaleLink, ConversionError> {
        let lead = self
            .store
            .fetch_lead(lead_id)?
            .ok_or(ConversionError::NotFound(lead_id))?;

        if lead.current_status != LeadStatus::SaleMade {
            return Err(ConversionError::NotSaleMade {
                lead: lead_id,
                status: lead.current_status,
            });
        }

        let link = LeadToSaleLink {
            lead_id,
            sale_id,
            converted_by: converted_by.clone(),
            converted_at: self.clock.now(),
        };

        match self.store.insert_sale_link(link) {
            Ok(link) => {
                info!(%lead_id, sale_id = %link.sale_id.0, converted_by = %converted_by, "lead converted to sale");
                Ok(link)
            }
            Err(StoreError::Conflict(detail)) => Err(ConversionError::AlreadyLinked(detail)),
            Err(StoreError::NotFound) => Err(ConversionError::NotFound(lead_id)),
            Err(other) => Err(other.into()),
        }
    }

    pub fn link_for(&self, lead_id: LeadId) -> Result<Option<LeadToSaleLink>, ConversionError> {
        Ok(self.store.sale_link(lead_id)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("lead {0} not found")]
    NotFound(LeadId),
    #[error("lead {lead} is {status}; only SALE_MADE leads can be converted")]
    NotSaleMade { lead: LeadId, status: LeadStatus },
    #[error("conversion already recorded: {0}")]
    AlreadyLinked(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
