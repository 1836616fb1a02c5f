//! Invoice document rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domain::Invoice;

use crate::NotificationError;

/// Trait for turning an invoice into a document on disk.
#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    /// Renders the invoice and returns the path of the written file.
    async fn render(&self, invoice: &Invoice) -> Result<PathBuf, NotificationError>;
}

/// Writes plain-text invoices into a directory.
///
/// Files are named `{invoice_id}_invoice_{unix_ts}.txt`.
#[derive(Debug, Clone)]
pub struct TextInvoiceRenderer {
    dir: PathBuf,
}

impl TextInvoiceRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(invoice: &Invoice) -> String {
        format!(
            "{}_invoice_{}.txt",
            invoice.invoice_id,
            invoice.generated_at.timestamp()
        )
    }
}

#[async_trait]
impl InvoiceRenderer for TextInvoiceRenderer {
    async fn render(&self, invoice: &Invoice) -> Result<PathBuf, NotificationError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(invoice));
        tokio::fs::write(&path, render_text(invoice)).await?;
        tracing::debug!(
            invoice_id = %invoice.invoice_id,
            path = %path.display(),
            "invoice rendered"
        );
        Ok(path)
    }
}

/// Lays out an invoice as a fixed-width text document.
pub fn render_text(invoice: &Invoice) -> String {
    let mut out = String::new();
    // fmt::Write for String never errors.
    let _ = write_invoice(&mut out, invoice);
    out
}

fn write_invoice(out: &mut String, invoice: &Invoice) -> std::fmt::Result {
    let company = &invoice.company;

    writeln!(out, "{}", invoice.title.to_uppercase())?;
    writeln!(out, "{}, {}", company.name, company.address)?;
    writeln!(out, "{}", company.email)?;
    writeln!(out, "{}", company.url)?;
    writeln!(out)?;
    writeln!(out, "Invoice #: {}", invoice.invoice_id)?;
    writeln!(
        out,
        "Date:      {}",
        invoice.generated_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(
        out,
        "Status:    {}",
        if invoice.is_paid { "PAID" } else { "UNPAID" }
    )?;
    writeln!(out)?;

    for (label, party) in [("Billed to", &invoice.customer), ("Seller", &invoice.seller)] {
        writeln!(out, "{label}: {} <{}>", party.name, party.email)?;
        if let Some(address) = &party.address {
            writeln!(out, "    {address}")?;
        }
    }
    writeln!(out)?;

    writeln!(
        out,
        "{:<4}{:<28}{:>6}{:>12}{:>10}{:>12}",
        "Sr.", "Item", "Qty", "Price", "Disc %", "Total"
    )?;
    for (i, item) in invoice.items.iter().enumerate() {
        writeln!(
            out,
            "{:<4}{:<28}{:>6}{:>12}{:>10}{:>12}",
            i + 1,
            item.item,
            item.quantity,
            item.unit_price.to_string(),
            format!("{}", item.discount),
            item.total.to_string()
        )?;
        if !item.description.is_empty() {
            writeln!(out, "    {}", item.description)?;
        }
    }
    writeln!(out)?;

    writeln!(out, "{:<20}{:>12}", "Sub total:", invoice.sub_total.to_string())?;
    writeln!(out, "{:<20}{:>12}", "Total discount:", invoice.discount.to_string())?;
    writeln!(out, "{:<20}{:>12}", "Tax:", invoice.tax.to_string())?;
    writeln!(out, "{:<20}{:>12}", "Total:", invoice.total.to_string())?;
    Ok(())
}
