//! In-memory store
//!
//! Implements every transactional port over plain collections. A unit of
//! work holds the store-wide lock for its whole lifetime and edits a
//! working copy; `commit` writes the copy back, dropping it discards it.
//! Units of work are therefore fully serialised, which is what the row
//! locks of the PostgreSQL store guarantee for the rows that matter.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{
    BillingEntityId, BookingId, ClientId, DateRange, InvoiceId, PaymentRequestId, PortError,
    RelationshipId, SeriesId, Store, TimeSlot, UnitOfWork,
};
use domain_billing::{BillingLink, BillingTx, Invoice, PaymentRequest, PaymentRequestFilter};
use domain_booking::{Booking, BookingStatus, BookingTx};
use domain_client::{BillingEntity, BillingType, Client, ClientRelationship, ClientTx};
use domain_credit::{CreditBalance, CreditTransaction, LedgerTx};

/// Everything the store holds
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub clients: HashMap<ClientId, Client>,
    pub relationships: Vec<ClientRelationship>,
    pub entities: HashMap<BillingEntityId, BillingEntity>,
    pub balances: HashMap<ClientId, CreditBalance>,
    pub transactions: Vec<CreditTransaction>,
    pub bookings: Vec<Booking>,
    pub payment_requests: Vec<PaymentRequest>,
    pub invoices: Vec<Invoice>,
}

impl MemoryState {
    fn slot_taken(&self, booking: &Booking) -> bool {
        booking.status != BookingStatus::Cancelled
            && self.bookings.iter().any(|other| {
                other.id != booking.id
                    && other.status != BookingStatus::Cancelled
                    && other.slot.overlaps(&booking.slot)
            })
    }

    fn booking_mut(&mut self, id: BookingId) -> Result<&mut Booking, PortError> {
        self.bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| PortError::not_found("Booking", id))
    }
}

/// Shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Edits committed state directly, bypassing every domain rule
    pub async fn modify<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state)
    }

    pub async fn booking(&self, id: BookingId) -> Option<Booking> {
        self.state.lock().await.bookings.iter().find(|b| b.id == id).cloned()
    }

    pub async fn balance(&self, client_id: ClientId) -> i64 {
        self.state
            .lock()
            .await
            .balances
            .get(&client_id)
            .map(|b| b.balance)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, PortError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx { guard, working })
    }
}

/// Unit of work over [`InMemoryStore`]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for InMemoryTx {
    async fn commit(mut self) -> Result<(), PortError> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), PortError> {
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn read_balance(&mut self, client_id: ClientId) -> Result<Option<CreditBalance>, PortError> {
        Ok(self.working.balances.get(&client_id).cloned())
    }

    async fn lock_balance(&mut self, client_id: ClientId) -> Result<CreditBalance, PortError> {
        Ok(self
            .working
            .balances
            .entry(client_id)
            .or_insert_with(|| CreditBalance::empty(client_id))
            .clone())
    }

    async fn save_balance(&mut self, balance: &CreditBalance) -> Result<(), PortError> {
        self.working.balances.insert(balance.client_id, balance.clone());
        Ok(())
    }

    async fn append_transaction(&mut self, transaction: &CreditTransaction) -> Result<(), PortError> {
        self.working.transactions.push(transaction.clone());
        Ok(())
    }

    async fn list_transactions(&mut self, client_id: ClientId) -> Result<Vec<CreditTransaction>, PortError> {
        Ok(self
            .working
            .transactions
            .iter()
            .filter(|t| t.client_id == client_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClientTx for InMemoryTx {
    async fn get_client(&mut self, id: ClientId) -> Result<Option<Client>, PortError> {
        Ok(self.working.clients.get(&id).cloned())
    }

    async fn save_client(&mut self, client: &Client) -> Result<(), PortError> {
        self.working.clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn list_clients(&mut self, billing_type: Option<BillingType>) -> Result<Vec<Client>, PortError> {
        let mut clients: Vec<Client> = self
            .working
            .clients
            .values()
            .filter(|c| billing_type.map_or(true, |t| c.billing_type == t))
            .cloned()
            .collect();
        clients.sort_by_key(|c| c.created_at);
        Ok(clients)
    }

    async fn get_relationship(&mut self, id: RelationshipId) -> Result<Option<ClientRelationship>, PortError> {
        Ok(self.working.relationships.iter().find(|r| r.id == id).cloned())
    }

    async fn save_relationship(&mut self, relationship: &ClientRelationship) -> Result<(), PortError> {
        match self.working.relationships.iter_mut().find(|r| r.id == relationship.id) {
            Some(existing) => *existing = relationship.clone(),
            None => self.working.relationships.push(relationship.clone()),
        }
        Ok(())
    }

    async fn relationships_of(&mut self, client_id: ClientId) -> Result<Vec<ClientRelationship>, PortError> {
        Ok(self
            .working
            .relationships
            .iter()
            .filter(|r| r.involves(client_id))
            .cloned()
            .collect())
    }

    async fn get_billing_entity(&mut self, id: BillingEntityId) -> Result<Option<BillingEntity>, PortError> {
        Ok(self.working.entities.get(&id).cloned())
    }

    async fn save_billing_entity(&mut self, entity: &BillingEntity) -> Result<(), PortError> {
        self.working.entities.insert(entity.id, entity.clone());
        Ok(())
    }
}

#[async_trait]
impl BookingTx for InMemoryTx {
    async fn get_booking(&mut self, id: BookingId) -> Result<Option<Booking>, PortError> {
        Ok(self.working.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        if self.working.slot_taken(booking) {
            return Err(PortError::conflict(format!(
                "slot {} {} is taken",
                booking.slot.date, booking.slot.start_time
            )));
        }
        self.working.bookings.push(booking.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        if self.working.slot_taken(booking) {
            return Err(PortError::conflict(format!(
                "slot {} {} is taken",
                booking.slot.date, booking.slot.start_time
            )));
        }
        *self.working.booking_mut(booking.id)? = booking.clone();
        Ok(())
    }

    async fn delete_booking(&mut self, id: BookingId) -> Result<(), PortError> {
        self.working.bookings.retain(|b| b.id != id);
        Ok(())
    }

    async fn series_bookings(&mut self, series_id: SeriesId) -> Result<Vec<Booking>, PortError> {
        let mut bookings: Vec<Booking> = self
            .working
            .bookings
            .iter()
            .filter(|b| b.series_id == Some(series_id))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.slot.starts_at());
        Ok(bookings)
    }

    async fn client_bookings(&mut self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, PortError> {
        let mut bookings: Vec<Booking> = self
            .working
            .bookings
            .iter()
            .filter(|b| b.client_id == client_id && range.contains(b.date()))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.slot.starts_at());
        Ok(bookings)
    }

    async fn overlapping_bookings(
        &mut self,
        slot: &TimeSlot,
        ignore: Option<BookingId>,
    ) -> Result<Vec<Booking>, PortError> {
        Ok(self
            .working
            .bookings
            .iter()
            .filter(|b| {
                Some(b.id) != ignore && b.status != BookingStatus::Cancelled && b.slot.overlaps(slot)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BillingTx for InMemoryTx {
    async fn insert_payment_request(&mut self, request: &PaymentRequest) -> Result<(), PortError> {
        if self.working.payment_requests.iter().any(|r| r.number == request.number) {
            return Err(PortError::conflict(format!("payment request {} exists", request.number)));
        }
        self.working.payment_requests.push(request.clone());
        Ok(())
    }

    async fn update_payment_request(&mut self, request: &PaymentRequest) -> Result<(), PortError> {
        let stored = self
            .working
            .payment_requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| PortError::not_found("PaymentRequest", request.id))?;
        stored.status = request.status;
        stored.paid_at = request.paid_at;
        stored.payment_reference = request.payment_reference.clone();
        stored.invoice_id = request.invoice_id;
        stored.cancelled_at = request.cancelled_at;
        Ok(())
    }

    async fn get_payment_request(&mut self, id: PaymentRequestId) -> Result<Option<PaymentRequest>, PortError> {
        Ok(self.working.payment_requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_payment_requests(&mut self, filter: PaymentRequestFilter) -> Result<Vec<PaymentRequest>, PortError> {
        let mut requests: Vec<PaymentRequest> = self
            .working
            .payment_requests
            .iter()
            .filter(|r| filter.client_id.map_or(true, |id| r.client_id == id))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(requests)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        self.working.invoices.push(invoice.clone());
        Ok(())
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        let stored = self
            .working
            .invoices
            .iter_mut()
            .find(|i| i.id == invoice.id)
            .ok_or_else(|| PortError::not_found("Invoice", invoice.id))?;
        *stored = invoice.clone();
        Ok(())
    }

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(self.working.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn list_invoices(&mut self, client_id: Option<ClientId>) -> Result<Vec<Invoice>, PortError> {
        let mut invoices: Vec<Invoice> = self
            .working
            .invoices
            .iter()
            .filter(|i| client_id.map_or(true, |id| i.client_id == id))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices)
    }

    async fn linked_bookings(&mut self, link: BillingLink) -> Result<Vec<Booking>, PortError> {
        Ok(self
            .working
            .bookings
            .iter()
            .filter(|b| match link {
                BillingLink::PaymentRequest(id) => b.payment_request_id == Some(id),
                BillingLink::Invoice(id) => b.invoice_id == Some(id),
            })
            .cloned()
            .collect())
    }

    async fn unbilled_bookings(&mut self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, PortError> {
        let mut bookings: Vec<Booking> = self
            .working
            .bookings
            .iter()
            .filter(|b| {
                b.client_id == client_id
                    && range.contains(b.date())
                    && b.is_unbilled()
                    && b.status != BookingStatus::Cancelled
            })
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.slot.starts_at());
        Ok(bookings)
    }

    async fn link_booking(&mut self, booking_id: BookingId, link: BillingLink) -> Result<(), PortError> {
        let booking = self.working.booking_mut(booking_id)?;
        if !booking.is_unbilled() || booking.status == BookingStatus::Cancelled {
            return Err(PortError::conflict(format!(
                "booking {} was cancelled or billed concurrently",
                booking_id
            )));
        }
        match link {
            BillingLink::PaymentRequest(id) => booking.payment_request_id = Some(id),
            BillingLink::Invoice(id) => booking.invoice_id = Some(id),
        }
        booking.updated_at = Utc::now();
        Ok(())
    }
}
