//! Customer-facing email content.

use std::path::Path;

use domain::Invoice;

use crate::Email;

const SUPPORT_ADDRESS: &str = "support@yourcompany.com";

pub fn confirmation_subject(invoice: &Invoice) -> String {
    format!(
        "Order #{} Confirmation - We've Received Your Order!",
        invoice.invoice_id
    )
}

pub fn invoice_subject(invoice: &Invoice) -> String {
    format!(
        "Your Order #{} Invoice File Attached Below",
        invoice.invoice_id
    )
}

/// The "we received your order" email, sent before rendering.
pub fn confirmation_email(invoice: &Invoice) -> Email {
    let html_body = format!(
        "Hello {name},<br><br>\n\
         We have received your order and it is currently being processed!<br><br>\n\
         Order ID: {order_id}<br>\n\
         Total Amount: ${total}<br><br>\n\
         You will be notified once your order is ready to ship. \
         Your items are being prepared.<br><br>\n\
         If you have any questions, please contact our support team at \
         <a href=\"mailto:{support}\">{support}</a>.<br><br>\n\
         Thank you for shopping with us!<br><br>\n\
         Best regards,<br>\n\
         The Team\n",
        name = invoice.customer.name,
        order_id = invoice.invoice_id,
        total = invoice.total,
        support = SUPPORT_ADDRESS,
    );

    Email {
        to: invoice.customer.email.clone(),
        subject: confirmation_subject(invoice),
        html_body,
        attachment: None,
    }
}

/// The email carrying the rendered invoice document.
pub fn invoice_email(invoice: &Invoice, document: &Path) -> Email {
    let html_body = format!(
        "Hello {name},<br><br>\n\
         Thank you for your order! We are pleased to send you the invoice for your \
         recent purchase.<br><br>\n\
         <b>Invoice Number:</b> {invoice_id}<br>\n\
         <b>Order ID:</b> {invoice_id}<br>\n\
         Your invoice is attached to this email. You can download and review it anytime.<br><br>\n\
         If you have any questions or concerns, feel free to contact our support team.<br><br>\n\
         Thank you for your purchase!<br><br>\n\
         Best regards,<br>\n\
         The Team\n",
        name = invoice.customer.name,
        invoice_id = invoice.invoice_id,
    );

    Email {
        to: invoice.customer.email.clone(),
        subject: invoice_subject(invoice),
        html_body,
        attachment: Some(document.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{Money, OrderId};
    use domain::{CompanyProfile, PartySnapshot};

    use super::*;

    fn invoice() -> Invoice {
        let company = CompanyProfile::default();
        Invoice {
            invoice_id: OrderId::new(42),
            title: "Invoice".to_string(),
            customer: PartySnapshot::new("Ada Lovelace", "ada@example.com"),
            seller: company.as_seller(),
            company,
            items: vec![],
            sub_total: Money::from_cents(9000),
            discount: Money::from_cents(1000),
            tax: Money::from_cents(1620),
            total: Money::from_cents(10620),
            is_paid: true,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_subjects() {
        let invoice = invoice();
        assert_eq!(
            confirmation_subject(&invoice),
            "Order #42 Confirmation - We've Received Your Order!"
        );
        assert_eq!(
            invoice_subject(&invoice),
            "Your Order #42 Invoice File Attached Below"
        );
    }

    #[test]
    fn test_confirmation_body() {
        let email = confirmation_email(&invoice());
        assert_eq!(email.to, "ada@example.com");
        assert!(email.html_body.contains("Hello Ada Lovelace"));
        assert!(email.html_body.contains("Total Amount: $106.20"));
        assert!(email.attachment.is_none());
    }

    #[test]
    fn test_invoice_email_attaches_document() {
        let email = invoice_email(&invoice(), Path::new("/tmp/42_invoice_1.txt"));
        assert_eq!(
            email.attachment.as_deref(),
            Some(Path::new("/tmp/42_invoice_1.txt"))
        );
        assert!(email.html_body.contains("<b>Invoice Number:</b> 42"));
    }
}
