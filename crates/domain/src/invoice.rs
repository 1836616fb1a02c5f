//! Invoice messages handed to the notification pipeline.
//!
//! An invoice is never persisted. It is a point-in-time snapshot of an
//! order and the parties involved, built once at checkout and consumed by
//! the renderer and the mailer.

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};
use store::Order;

/// Name and contact details of a party on the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartySnapshot {
    pub name: String,
    pub email: String,
    pub address: Option<String>,
}

impl PartySnapshot {
    /// Creates a snapshot without an address.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            address: None,
        }
    }

    /// Returns true if the snapshot has somewhere to send mail.
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// The issuing company, printed in the invoice header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_id: String,
    pub name: String,
    pub address: String,
    pub email: String,
    pub url: String,
}

impl CompanyProfile {
    /// The company acting as seller.
    pub fn as_seller(&self) -> PartySnapshot {
        PartySnapshot {
            name: self.name.clone(),
            email: self.email.clone(),
            address: Some(self.address.clone()),
        }
    }
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            company_id: "123".to_string(),
            name: "NY Official Company".to_string(),
            address: "XYZ, city, state, country".to_string(),
            email: "nyofficialcc@abc.com".to_string(),
            url: "https://example.com".to_string(),
        }
    }
}

/// One priced line of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub item: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// Discount percentage applied to the line.
    pub discount: f64,
    pub total: Money,
}

/// An invoice for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: OrderId,
    pub title: String,
    pub customer: PartySnapshot,
    pub seller: PartySnapshot,
    pub company: CompanyProfile,
    pub items: Vec<InvoiceItem>,
    pub sub_total: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    pub is_paid: bool,
    pub generated_at: DateTime<Utc>,
}

impl Invoice {
    /// Builds an invoice from the stored order totals. The seller is the
    /// company itself.
    pub fn for_order(
        order: &Order,
        items: Vec<InvoiceItem>,
        customer: PartySnapshot,
        company: &CompanyProfile,
    ) -> Self {
        Self {
            invoice_id: order.order_id,
            title: "Invoice".to_string(),
            customer,
            seller: company.as_seller(),
            company: company.clone(),
            items,
            sub_total: order.sub_total,
            discount: order.discount_amount,
            tax: order.tax_amount,
            total: order.total_amount,
            is_paid: order.is_paid,
            generated_at: Utc::now(),
        }
    }
}
