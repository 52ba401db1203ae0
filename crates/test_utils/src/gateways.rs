//! Scripted Payment Gateways
//!
//! Gateways whose answers are set by the test instead of derived from a
//! balance. They record every invoice they are asked about.

use async_trait::async_trait;
use core_kernel::{CustomerId, InvoiceId, PortError};
use domain_billing::{BillingError, Invoice, PaymentGateway};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What a scripted gateway answers for a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedAnswer {
    Chargeable,
    NotChargeable,
    Unavailable,
    Panic,
}

/// Gateway answering per customer or per invoice from a script
///
/// An invoice entry wins over its customer's entry. Anything unscripted falls
/// through to the wrapped gateway, or is chargeable if there is none.
#[derive(Default)]
pub struct ScriptedGateway {
    answers: Mutex<HashMap<CustomerId, ScriptedAnswer>>,
    invoice_answers: Mutex<HashMap<InvoiceId, ScriptedAnswer>>,
    fallback: Option<Arc<dyn PaymentGateway>>,
    calls: Mutex<Vec<InvoiceId>>,
}

impl ScriptedGateway {
    /// Creates a gateway that accepts every invoice
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway that delegates unscripted customers to `fallback`
    pub fn wrapping(fallback: Arc<dyn PaymentGateway>) -> Self {
        Self {
            fallback: Some(fallback),
            ..Self::default()
        }
    }

    /// Scripts the answer for `customer_id`
    pub fn answer(self, customer_id: CustomerId, answer: ScriptedAnswer) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(customer_id, answer);
        self
    }

    /// Scripts the answer for a single invoice
    pub fn answer_invoice(self, invoice_id: InvoiceId, answer: ScriptedAnswer) -> Self {
        self.invoice_answers
            .lock()
            .unwrap()
            .insert(invoice_id, answer);
        self
    }

    /// Invoices checked so far, in call order
    pub fn calls(&self) -> Vec<InvoiceId> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of checks made for `invoice_id`
    pub fn calls_for(&self, invoice_id: InvoiceId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == invoice_id)
            .count()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn is_chargeable(&self, invoice: &Invoice) -> Result<bool, BillingError> {
        self.calls.lock().unwrap().push(invoice.id);
        let scripted_invoice = self.invoice_answers.lock().unwrap().get(&invoice.id).copied();
        let answer = scripted_invoice
            .or_else(|| self.answers.lock().unwrap().get(&invoice.customer_id).copied());

        match answer {
            Some(ScriptedAnswer::Chargeable) => Ok(true),
            Some(ScriptedAnswer::NotChargeable) => Ok(false),
            Some(ScriptedAnswer::Unavailable) => Err(BillingError::GatewayUnavailable(
                PortError::unavailable("scripted-gateway"),
            )),
            Some(ScriptedAnswer::Panic) => {
                panic!("scripted gateway panic for {}", invoice.id)
            }
            None => match &self.fallback {
                Some(gateway) => gateway.is_chargeable(invoice).await,
                None => Ok(true),
            },
        }
    }
}
