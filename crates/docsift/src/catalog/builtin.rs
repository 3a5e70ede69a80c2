use super::DocumentTypeDefinition;

const PDF: &str = "application/pdf";
const PNG: &str = "image/png";
const JPEG: &str = "image/jpeg";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const CSV: &str = "text/csv";

/// Built-in document types, in classifier tie-break order.
pub fn builtin_types() -> Vec<(String, DocumentTypeDefinition)> {
    vec![
        ("invoice".to_string(), invoice()),
        ("receipt".to_string(), receipt()),
        ("contract".to_string(), contract()),
        ("financial_statement".to_string(), financial_statement()),
    ]
}

fn invoice() -> DocumentTypeDefinition {
    DocumentTypeDefinition::new("Invoice")
        .extensions(&[".pdf", ".png", ".jpg", ".jpeg"])
        .mime_types(&[PDF, PNG, JPEG])
        .keywords(&["invoice", "bill", "inv", "billing", "payment", "due"])
        .fields(&[
            ("vendor_name", "Company or vendor name"),
            ("invoice_number", "Invoice or bill number"),
            ("date", "Invoice date"),
            ("due_date", "Payment due date"),
            ("total_amount", "Total amount due"),
            ("subtotal", "Subtotal before tax"),
            ("tax_amount", "Tax amount"),
            ("line_items", "List of items/services"),
            ("vendor_address", "Company location & Vendor location"),
            ("user_address", "User location"),
            ("vendor_email", "Company email & Vendor email"),
            ("user_email", "User email & buyer email"),
        ])
        .steps(&[
            "Text extraction from PDF/Image",
            "Invoice header identification",
            "Line item parsing",
            "Amount calculation validation",
            "Date format standardization",
        ])
}

fn receipt() -> DocumentTypeDefinition {
    DocumentTypeDefinition::new("Receipt")
        .extensions(&[".pdf", ".png", ".jpg", ".jpeg"])
        .mime_types(&[PDF, PNG, JPEG])
        .keywords(&["receipt", "rec", "purchase", "transaction", "store", "shop"])
        .fields(&[
            ("merchant_name", "Store or merchant name"),
            ("transaction_date", "Purchase date"),
            ("transaction_time", "Purchase time"),
            ("total_amount", "Total paid"),
            ("payment_method", "Payment method used"),
            ("items", "Purchased items"),
            ("tax_amount", "Tax paid"),
            ("vendor_address", "Company location & Vendor location"),
            ("user_address", "User location"),
            ("vendor_email", "Company email & Vendor email"),
            ("user_email", "User email & buyer email"),
        ])
        .steps(&[
            "OCR text extraction",
            "Merchant identification",
            "Transaction details parsing",
            "Item list extraction",
            "Payment validation",
        ])
}

fn contract() -> DocumentTypeDefinition {
    DocumentTypeDefinition::new("Contract")
        .extensions(&[".pdf", ".docx", ".doc"])
        .mime_types(&[PDF, DOCX])
        .keywords(&["contract", "agreement", "terms", "conditions", "party", "parties"])
        .fields(&[
            ("contract_title", "Contract title or type"),
            ("parties", "Contracting parties"),
            ("effective_date", "Contract effective date"),
            ("expiration_date", "Contract end date"),
            ("key_terms", "Important terms and conditions"),
            ("signatures", "Signature information"),
            ("governing_law", "Applicable law/jurisdiction"),
            ("contractor1_address", "Contract1 location"),
            ("contractor2_address", "Contract2 location"),
            ("contractor1_email", "Contract1 email"),
            ("contractor2_email", "Contract2 email"),
        ])
        .steps(&[
            "Document text extraction",
            "Party identification",
            "Date extraction and validation",
            "Key terms identification",
            "Legal clause analysis",
        ])
}

fn financial_statement() -> DocumentTypeDefinition {
    DocumentTypeDefinition::new("Financial Statement")
        .extensions(&[".pdf", ".xlsx", ".xls", ".csv"])
        .mime_types(&[PDF, XLSX, CSV])
        .keywords(&[
            "financial",
            "statement",
            "balance",
            "income",
            "cash",
            "flow",
            "report",
        ])
        .fields(&[
            ("statement_type", "Type of financial statement"),
            ("period", "Reporting period"),
            ("company_name", "Company name"),
            ("total_assets", "Total assets"),
            ("total_liabilities", "Total liabilities"),
            ("revenue", "Total revenue"),
            ("net_income", "Net income/loss"),
            ("key_ratios", "Important financial ratios"),
        ])
        .steps(&[
            "Financial data extraction",
            "Statement type identification",
            "Numerical data validation",
            "Ratio calculations",
            "Period standardization",
        ])
}
